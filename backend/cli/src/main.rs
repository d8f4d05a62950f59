mod bootstrap;
mod chart_types_cmd;
mod output;
mod serve_cmd;
mod status_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use chartforge_config::defaults::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "chartforge")]
#[command(about = "ChartForge: natural-language chart generation over WebSocket")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ChartForge server
    Serve {
        /// Port to bind the HTTP/WebSocket server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Config file (defaults to ~/.chartforge/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Query a running server's health
    Status {
        #[arg(short, long, env = "CHARTFORGE_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// List supported chart types
    ChartTypes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => serve_cmd::run(port, config.as_deref()).await?,
        Commands::Status { port } => status_cmd::run(port).await?,
        Commands::ChartTypes => chart_types_cmd::run(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from(["chartforge", "serve", "--port", "9001", "--config", "/tmp/cf.yaml"]).unwrap();
        match cli.command {
            Commands::Serve { port, config } => {
                assert_eq!(port, Some(9001));
                assert_eq!(config, Some(PathBuf::from("/tmp/cf.yaml")));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parses_chart_types() {
        let cli = Cli::try_parse_from(["chartforge", "chart-types"]).unwrap();
        assert!(matches!(cli.command, Commands::ChartTypes));
    }
}
