use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use config_server::auth::issue_token;

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Client for the config server", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CONFIG_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Shared HS256 secret used to mint tokens.
    #[arg(short, long, env = "JWT_SECRET", hide_env_values = true)]
    secret: String,

    /// Lifetime of minted tokens, in seconds.
    #[arg(long, default_value_t = 3600)]
    ttl: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one configuration value
    Get {
        product: String,
        environment: String,
        key: String,
        /// Subject put in the minted token
        #[arg(long, default_value = "config-cli")]
        user: String,
    },
    /// Print a bearer token for use with other clients
    Token {
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let ttl = Duration::from_secs(cli.ttl);

    match cli.command {
        Commands::Token { user } => {
            println!("{}", issue_token(&cli.secret, &user, ttl)?);
        }
        Commands::Get {
            product,
            environment,
            key,
            user,
        } => {
            let token = issue_token(&cli.secret, &user, ttl)?;
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );

            let url = format!(
                "{}/{}/{}/{}",
                cli.url.trim_end_matches('/'),
                product,
                environment,
                key
            );
            let res = reqwest::Client::new().get(url).headers(headers).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: config server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
