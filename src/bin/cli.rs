use clap::{Parser, Subcommand};
use kanban_rest_api::{api, db};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// The address to bind to
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        addr: SocketAddr,
    },
    /// Populate an empty database with the starter board
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "kanban.db".to_string());
    let pool = db::build_pool(&database_url)?;

    // Schema migration runs once here, never inside the handlers.
    {
        let mut conn = pool.get()?;
        db::run_migrations(&mut conn).map_err(|e| anyhow::anyhow!(e))?;
    }

    match cli.command {
        Commands::Serve { addr } => {
            tracing::info!("Starting server on {addr}");

            let app = api::create_router(pool);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Commands::Seed => {
            let mut conn = pool.get()?;
            db::seed(&mut conn)?;
        }
    }

    Ok(())
}
