use crate::domain::model::{ChainInput, Technique, TestList};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn group(&self) -> &str;
    fn index_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn include_subtechniques(&self) -> bool;
}

/// Resolves a threat-actor group to its ordered technique chain.
pub trait TechniqueSource: Send + Sync {
    fn resolve(
        &self,
        group: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Technique>>> + Send;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ChainInput>;
    async fn transform(&self, input: ChainInput) -> Result<TestList>;
    async fn load(&self, result: TestList) -> Result<String>;
}
