//! Calibra — calibration card generation server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod framing;
mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CALIBRA_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                println!("Calibra — calibration card generation server");
                println!();
                println!("Usage: calibra [command]");
                println!();
                println!("Commands:");
                println!("  (none)    Start the server");
                println!("  help      Show this help message");
                println!();
                println!("Environment:");
                println!("  CALIBRA_DATA_DIR               Data directory (default ./data)");
                println!("  PORT                           HTTP port (default 3010)");
                println!("  CALIBRA_FRAGMENT_TIMEOUT_MS    Inter-fragment timeout (default 20000)");
                println!("  CALIBRA_RESOLVE_CONCURRENCY    Concurrent comparison lookups (default 4)");
                println!("  TMDB_API_KEY                   Metadata catalog key");
                println!("  GROQ_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'calibra help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = calibra_core::CalibraConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = calibra_store::SqliteStore::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let catalog = calibra_resolve::create_catalog(config.catalog_api_key.as_deref());

    let state = Arc::new(AppState::new(config, Arc::new(store), catalog));

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Calibra server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
