use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use planwise::ai::{
    ApplyEngine, ModelProvider, OpenAiCompatibleProvider, RateLimiter, SuggestionService,
};
use planwise::clock::{Clock, SystemClock};
use planwise::config::PlannerConfig;
use planwise::store::PlannerStore;
use planwise::{api, db};

#[derive(Parser)]
#[command(name = "planwise")]
#[command(about = "Monthly planner with AI-generated plans, briefings and reschedules")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API (overrides PLANWISE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply database migrations and exit
    Migrate,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "planwise=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(config: &PlannerConfig) -> anyhow::Result<db::Database> {
    let db = match &config.db_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: PlannerConfig, port: u16) -> anyhow::Result<()> {
    let db = open_database(&config)?;

    if config.provider.api_key.is_none() {
        tracing::warn!("PLANWISE_AI_API_KEY is not set; the AI provider must accept unauthenticated requests");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn PlannerStore> = Arc::new(db.clone());
    let provider = OpenAiCompatibleProvider::new(
        config.provider.base_url.clone(),
        config.provider.api_key.clone(),
        config.provider.model.clone(),
    );
    tracing::info!(
        "Using model {} at {}",
        provider.model(),
        config.provider.base_url
    );
    let provider: Arc<dyn ModelProvider> = Arc::new(provider);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), Arc::clone(&clock)));

    let service = Arc::new(
        SuggestionService::new(Arc::clone(&store), provider, Arc::clone(&limiter), clock)
            .with_settings(config.generation),
    );
    let engine = Arc::new(ApplyEngine::new(store));

    // Background maintenance
    let rollover = limiter.spawn_rollover();
    let sweeps = service.spawn_cache_cleanup(config.cache_sweep_interval);

    let app = api::create_router(api::AppState {
        db,
        service,
        engine,
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Planwise server listening on http://127.0.0.1:{}", port);

    let result = axum::serve(listener, app).await;
    rollover.abort();
    for sweep in sweeps {
        sweep.abort();
    }
    Ok(result?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = PlannerConfig::from_env();

    match cli.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(config.port);
            tracing::info!("Starting Planwise server on port {}", port);
            serve(config, port).await?;
        }
        Some(Commands::Migrate) => {
            open_database(&config)?;
            tracing::info!("Migrations applied");
        }
        None => {
            // Default: start server
            let port = config.port;
            tracing::info!("Starting Planwise server on port {}", port);
            serve(config, port).await?;
        }
    }

    Ok(())
}
