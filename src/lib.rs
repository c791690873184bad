pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{cli::LocalStorage, toml_config::FileConfig, RunConfig};
pub use core::{
    engine::ChainEngine, pipeline::GroupTestPipeline, resolver::StixTechniqueSource,
};
pub use domain::model::{IndexEntry, Technique, TestList};
pub use utils::error::{ChainError, Result};
