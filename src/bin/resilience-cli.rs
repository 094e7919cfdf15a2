use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "resilience-cli")]
#[command(about = "Management CLI for service-resilience", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key, if the server requires one
    #[arg(short, long, env = "RESILIENCE_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every circuit breaker
    Status,
    /// Run all health checks
    Health,
    /// Close a circuit breaker and clear its counters
    Reset { name: String },
    /// Open a circuit breaker immediately
    ForceOpen { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let request = match &cli.command {
        Commands::Status => client.get(format!("{base}/admin/circuit-breakers")),
        Commands::Health => client.get(format!("{base}/health")),
        Commands::Reset { name } => client.post(format!("{base}/admin/circuit-breakers/{name}/reset")),
        Commands::ForceOpen { name } => {
            client.post(format!("{base}/admin/circuit-breakers/{name}/force-open"))
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{text}"),
        Err(_) => {}
    }

    if !status.is_success() {
        eprintln!("Error: Admin API returned status {status}");
        std::process::exit(1);
    }
    Ok(())
}
