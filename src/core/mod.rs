pub mod catalog;
pub mod engine;
pub mod index;
pub mod matcher;
pub mod pipeline;
pub mod resolver;

pub use crate::domain::model::{ChainInput, IndexEntry, Technique, TestList};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, TechniqueSource};
pub use crate::utils::error::Result;
