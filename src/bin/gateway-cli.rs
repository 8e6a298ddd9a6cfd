use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::SET_COOKIE;
use serde_json::json;

use storefront_gateway::auth::{TokenSigner, UserDetails};
use storefront_gateway::config::{config_from_env, load_config, GatewayConfig};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the storefront gateway", long_about = None)]
struct Cli {
    /// Configuration file. Defaults plus environment overrides when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration, then print it
    CheckConfig,
    /// Sign a bearer credential for a user
    IssueToken {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Fetch an anti-forgery token from a running gateway
    Csrf {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    match cli.command {
        Commands::CheckConfig => {
            let config = config(&cli.config)?;
            println!("Configuration OK");
            println!("{}", toml::to_string_pretty(&redacted(config))?);
        }
        Commands::IssueToken {
            id,
            name,
            email,
            role,
        } => {
            let config = config(&cli.config)?;
            let signer = TokenSigner::new(&config.auth);
            let token = signer.sign(UserDetails {
                object_id: id,
                name,
                email,
                role,
            })?;
            println!("{token}");
        }
        Commands::Csrf { url } => {
            let config = config(&cli.config)?;
            let res = reqwest::Client::new().get(&url).send().await?;
            let status = res.status();

            let token = res
                .headers()
                .get(config.csrf.header_name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let cookie = res
                .headers()
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            match token {
                Some(token) => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "status": status.as_u16(),
                        "token": token,
                        "set_cookie": cookie,
                    }))?
                ),
                None => {
                    eprintln!("Error: {url} returned status {status} without a CSRF token");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn config(path: &Option<PathBuf>) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    })
}

fn redacted(mut config: GatewayConfig) -> GatewayConfig {
    config.auth.jwt_secret = "***".to_string();
    config
}
