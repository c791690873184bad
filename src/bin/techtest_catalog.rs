use attack_chain::core::catalog::{build_catalog, Catalog};
use attack_chain::core::index::parse_index_document;
use attack_chain::core::Storage;
use attack_chain::utils::logger;
use attack_chain::utils::validation::validate_path;
use attack_chain::{ChainError, LocalStorage, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "techtest-catalog")]
#[command(about = "Build the technique/test-number catalog used to recognise test command lines")]
struct Args {
    /// Index file to read (Atomic Red Team index.yaml)
    #[arg(short, long, default_value = "example.index.yaml")]
    index: String,

    /// Catalog file to write
    #[arg(short, long, default_value = "CANDIDATE-techniques_testnumber.py")]
    output: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

async fn run(args: &Args, storage: &LocalStorage) -> Result<Catalog> {
    validate_path("index", &args.index)?;
    validate_path("output", &args.output)?;

    let data = storage
        .read_file(&args.index)
        .await
        .map_err(|e| ChainError::IndexParseError {
            path: args.index.clone(),
            message: format!("cannot read index file: {}", e),
        })?;
    let content = String::from_utf8(data).map_err(|e| ChainError::IndexParseError {
        path: args.index.clone(),
        message: format!("index file is not valid UTF-8: {}", e),
    })?;

    tracing::info!("Parsing {}", args.index);
    let index = parse_index_document(&content, &args.index)?;
    let catalog = build_catalog(&index);

    storage
        .write_file(&args.output, catalog.render().as_bytes())
        .await
        .map_err(|e| match e {
            ChainError::IoError(source) => ChainError::OutputError {
                path: args.output.clone(),
                source,
            },
            other => other,
        })?;

    Ok(catalog)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    let storage = LocalStorage::new(".".to_string());
    match run(&args, &storage).await {
        Ok(catalog) => {
            tracing::info!("            Techniques found: {}", catalog.techniques);
            tracing::info!("Implemented test cases found: {}", catalog.tests);
            tracing::info!("Manual only test cases found: {}", catalog.manual_tests);
            println!("{}", args.output);
            Ok(())
        }
        Err(e) => {
            tracing::error!("❌ Catalog generation failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}
