use clap::{Parser, Subcommand};
use incident_oracle::{
    config::Config,
    llm::HttpLlmClient,
    models::IncidentDocument,
    search::{SearchConfig, TantivyStore},
    seed::{ingest, sample_incidents},
};
use reqwest::Client;
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oracle-cli")]
#[command(about = "Incident Oracle CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an incident description
    Analyze {
        #[arg(value_name = "DESCRIPTION")]
        description: String,

        #[arg(short, long)]
        user_id: Option<String>,

        /// Print stage events as they arrive
        #[arg(short, long)]
        stream: bool,
    },

    /// Get a historical incident
    Get {
        #[arg(value_name = "INCIDENT_ID")]
        id: String,
    },

    /// Show document store statistics
    Stats,

    /// Check server health
    Health,

    /// Embed and index incidents into the local index
    Seed {
        /// Number of generated sample incidents
        #[arg(short, long, default_value = "20")]
        count: usize,

        /// JSON array of incidents to ingest instead of generated ones
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Index directory; defaults to the configured path
        #[arg(long)]
        index_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Analyze {
            description,
            user_id,
            stream,
        } => {
            let path = if stream {
                "api/v1/incidents/analyze/stream"
            } else {
                "api/v1/incidents/analyze"
            };
            let mut response = client
                .post(format!("{}/{}", cli.endpoint, path))
                .json(&json!({
                    "description": description,
                    "user_id": user_id,
                }))
                .send()
                .await?;

            if stream && response.status().is_success() {
                while let Some(chunk) = response.chunk().await? {
                    print!("{}", String::from_utf8_lossy(&chunk));
                }
                println!();
            } else {
                let body: serde_json::Value = response.json().await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }

        Commands::Get { id } => {
            let response = client
                .get(format!("{}/api/v1/incidents/{}", cli.endpoint, id))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Stats => {
            let response = client
                .get(format!("{}/api/v1/stats", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Seed {
            count,
            input,
            index_path,
        } => {
            let config = Config::load().unwrap_or_else(|e| {
                eprintln!("Failed to load configuration: {}", e);
                eprintln!("Using default configuration");
                Config::default()
            });

            let documents: Vec<IncidentDocument> = match input {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => sample_incidents(count),
            };

            let search = SearchConfig {
                index_path: index_path.unwrap_or(config.search.index_path.clone()),
                ..config.search.clone()
            };
            let store = TantivyStore::open(&search).await?;
            let embedder = HttpLlmClient::new(&config.llm)?;

            println!(
                "Ingesting {} incidents into {}",
                documents.len(),
                search.index_path.display()
            );
            let indexed = ingest(&store, &embedder, documents).await?;
            println!("Ingestion complete: {} incidents indexed", indexed);
        }
    }

    Ok(())
}
