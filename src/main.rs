use anyhow::{Context, Result};
use clap::Parser;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use tracing::{error, info};

use travel_agent::booking::Selections;
use travel_agent::config::{API_KEY_VAR, DEFAULT_BASE_URL, DEFAULT_MODEL};
use travel_agent::preferences::TravelForm;
use travel_agent::web_server::{self, AppState};
use travel_agent::{GeminiClient, GeminiConfig, TravelAgent};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    gemini: GeminiArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct GeminiArgs {
    #[arg(long, env = API_KEY_VAR, hide_env_values = true, global = true, help = "API key for the Gemini text-generation service.")]
    api_key: Option<String>,
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL, global = true, help = "Model used for every generation call.")]
    model: String,
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL, global = true, help = "Base URL of the Gemini API.")]
    base_url: String,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the travel agent web UI.
    Serve {
        #[arg(long, default_value = "0.0.0.0", help = "Address to listen on.")]
        host: IpAddr,
        #[arg(long, default_value_t = 8501, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding the page templates.")]
        templates_dir: PathBuf,
        #[arg(long, default_value = "static", help = "Directory served under /static.")]
        static_dir: PathBuf,
    },
    /// Search for flights and hotels once and print the options.
    Plan {
        #[arg(long)]
        destination: String,
        #[arg(long, help = "Departure date, YYYY-MM-DD.")]
        departure_date: String,
        #[arg(long, help = "Return date, YYYY-MM-DD.")]
        return_date: String,
        #[arg(long, default_value = "1")]
        adults: String,
        #[arg(long, default_value = "0")]
        children: String,
        #[arg(long, default_value = "")]
        budget: String,
        #[arg(long, default_value = "")]
        preferences: String,
        #[arg(long, help = "Flight to book after the search.")]
        flight: Option<String>,
        #[arg(long, help = "Hotel to book after the search.")]
        hotel: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for secrets like GEMINI_API_KEY)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,travel_agent=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = GeminiConfig::new(cli.gemini.api_key, cli.gemini.model, cli.gemini.base_url)?;
    info!(model = %config.model, "Using Gemini model");
    let client = GeminiClient::new(&config).context("Failed to create Gemini client")?;
    let agent = TravelAgent::new(Arc::new(client));

    match cli.command {
        Commands::Serve {
            host,
            port,
            templates_dir,
            static_dir,
        } => {
            let state = AppState::new(templates_dir, agent);
            let addr = SocketAddr::new(host, port);

            tokio::select! {
                res = web_server::start_web_server(addr, state, &static_dir) => {
                    if let Err(e) = &res {
                        error!("Web server failed: {:?}", e);
                    }
                    res?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down.");
                }
            }
        }
        Commands::Plan {
            destination,
            departure_date,
            return_date,
            adults,
            children,
            budget,
            preferences,
            flight,
            hotel,
        } => {
            let form = TravelForm {
                destination,
                departure_date,
                return_date,
                num_adults: adults,
                num_children: children,
                budget,
                preferences,
            };
            run_plan(agent, form, flight, hotel).await?;
        }
    }

    Ok(())
}

async fn run_plan(
    mut agent: TravelAgent,
    form: TravelForm,
    flight: Option<String>,
    hotel: Option<String>,
) -> Result<()> {
    let results = agent.search(&form).await?;
    println!("Flight Options:\n{}\n", results.flight_options);
    println!("Hotel Options:\n{}", results.hotel_options);

    if flight.is_none() && hotel.is_none() {
        return Ok(());
    }
    let confirmation = agent.book(Selections {
        selected_flight: flight.unwrap_or_default(),
        selected_hotel: hotel.unwrap_or_default(),
    })?;
    println!("\n{}", confirmation);
    Ok(())
}
