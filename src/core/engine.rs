use crate::core::Pipeline;
use crate::utils::error::Result;

/// Runs a pipeline once: extract, transform, load. Any stage failure aborts the run.
pub struct ChainEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ChainEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Resolving attack chain...");
        let input = self.pipeline.extract().await?;
        tracing::info!(
            "Attack chain for '{}' has {} techniques",
            input.group,
            input.chain.len()
        );
        for technique in &input.chain {
            tracing::debug!(
                "#{} {} {} [{}]",
                technique.position + 1,
                technique.id,
                technique.name,
                technique.tactic.as_deref().unwrap_or("no tactic")
            );
        }

        tracing::info!("Matching index entries...");
        let list = self.pipeline.transform(input).await?;

        tracing::info!("Writing test list...");
        let output_path = self.pipeline.load(list).await?;
        tracing::info!("Test list saved to: {}", output_path);

        Ok(output_path)
    }
}
