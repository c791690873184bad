use crate::core::index::parse_index;
use crate::core::matcher::{match_tests, MatchOptions};
use crate::core::{ChainInput, ConfigProvider, Pipeline, Storage, TechniqueSource, TestList};
use crate::utils::error::{ChainError, Result};

/// Group name + index file in, ordered test list file out.
pub struct GroupTestPipeline<S: Storage, C: ConfigProvider, T: TechniqueSource> {
    storage: S,
    config: C,
    source: T,
}

impl<S: Storage, C: ConfigProvider, T: TechniqueSource> GroupTestPipeline<S, C, T> {
    pub fn new(storage: S, config: C, source: T) -> Self {
        Self {
            storage,
            config,
            source,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, T: TechniqueSource> Pipeline for GroupTestPipeline<S, C, T> {
    async fn extract(&self) -> Result<ChainInput> {
        let group = self.config.group().trim();
        let chain = self.source.resolve(group).await?;

        let index_path = self.config.index_path();
        tracing::debug!("Reading index file: {}", index_path);
        let data = self
            .storage
            .read_file(index_path)
            .await
            .map_err(|e| ChainError::IndexParseError {
                path: index_path.to_string(),
                message: format!("cannot read index file: {}", e),
            })?;
        let index_content = String::from_utf8(data).map_err(|e| ChainError::IndexParseError {
            path: index_path.to_string(),
            message: format!("index file is not valid UTF-8: {}", e),
        })?;

        Ok(ChainInput {
            group: group.to_string(),
            chain,
            index_path: index_path.to_string(),
            index_content,
        })
    }

    async fn transform(&self, input: ChainInput) -> Result<TestList> {
        let entries = parse_index(&input.index_content, &input.index_path)?;
        tracing::info!("Index lists {} tests", entries.len());

        let options = MatchOptions {
            include_subtechniques: self.config.include_subtechniques(),
        };
        let list = match_tests(&input.chain, &entries, options);

        tracing::info!(
            "Matched {} tests across {} techniques for group '{}'",
            list.len(),
            input.chain.len(),
            input.group
        );
        Ok(list)
    }

    async fn load(&self, result: TestList) -> Result<String> {
        let output_path = self.config.output_path();
        let rendered = result.render();

        tracing::debug!(
            "Writing {} tests ({} bytes) to {}",
            result.len(),
            rendered.len(),
            output_path
        );
        self.storage
            .write_file(output_path, rendered.as_bytes())
            .await
            .map_err(|e| match e {
                ChainError::IoError(source) => ChainError::OutputError {
                    path: output_path.to_string(),
                    source,
                },
                other => other,
            })?;

        Ok(output_path.to_string())
    }
}
