use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voyage_memory::{
    api,
    client::TravelServicesClient,
    config::Config,
    engine::MemoryEngine,
    memory::MemoryDomain,
};

#[derive(Parser)]
#[command(name = "voyage")]
#[command(about = "Travel planning memory: flights, stays and travelers kept consistent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port for HTTP API (default: VOYAGE_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print one memory as JSON
    Show {
        /// flight, accommodation, travel or negative-preferences
        domain: String,
    },
    /// Reset one memory, or all of them
    Reset {
        domain: Option<String>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "voyage_memory=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_domain(raw: &str) -> anyhow::Result<MemoryDomain> {
    MemoryDomain::from_str(raw).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown memory '{}' (expected flight, accommodation, travel or negative-preferences)",
            raw
        )
    })
}

async fn serve(config: &Config, port: u16) -> anyhow::Result<()> {
    let db = config.open_database()?;
    let engine = MemoryEngine::load(Arc::new(db));
    let services = TravelServicesClient::from_config(config);
    if services.is_none() {
        tracing::info!("VOYAGE_SERVICES_URL not set; chat messages and lookups are disabled");
    }

    let app = api::create_router(api::AppState::new(engine, services));

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Voyage memory server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = Config::from_env();

    match cli.command {
        Some(Commands::Serve { port }) => serve(&config, port.unwrap_or(config.port())).await?,
        Some(Commands::Show { domain }) => {
            let domain = parse_domain(&domain)?;
            let engine = MemoryEngine::load(Arc::new(config.open_database()?));
            let body: serde_json::Value = serde_json::from_str(&engine.serialize(domain)?)?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Some(Commands::Reset { domain }) => {
            let mut engine = MemoryEngine::load(Arc::new(config.open_database()?));
            match domain {
                Some(raw) => {
                    let domain = parse_domain(&raw)?;
                    engine.reset(domain)?;
                    println!("Reset {} memory", domain.as_str());
                }
                None => {
                    engine.reset_all();
                    println!("Reset all memories");
                }
            }
        }
        None => serve(&config, config.port()).await?,
    }

    Ok(())
}
