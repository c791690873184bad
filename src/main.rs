use attack_chain::utils::{logger, validation::Validate};
use attack_chain::{ChainEngine, CliConfig, GroupTestPipeline, LocalStorage, StixTechniqueSource};
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting attack-chain");
    tracing::debug!("CLI config: {:?}", cli);

    // 合併並驗證配置
    let config = match cli.resolve().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    tracing::info!(
        "Group '{}', index '{}', ATT&CK source '{}'",
        config.group,
        config.index_path,
        config.attack_source
    );

    let source = match StixTechniqueSource::new(config.attack_source.clone(), config.timeout) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    };

    // 創建存儲和管道
    let storage = LocalStorage::new(".".to_string());
    let pipeline = GroupTestPipeline::new(storage, config, source);
    let engine = ChainEngine::new(pipeline);

    match engine.run().await {
        Ok(output_path) => {
            println!("{}", output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!("❌ Run failed: {} (Category: {:?})", e, e.category());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}
