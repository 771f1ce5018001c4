use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rune_alert_bot::{Config, NotificationBot};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "RUNE price, ATH and pool cap notifications for Telegram")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the network and broadcast notifications until Ctrl-C
    Run,
    /// Re-seed the price series from the market chart of the last 8 days
    FillHistory,
    /// Forget the stored all-time high
    ResetAth,
    /// Print the liquidity positions of an address
    LpReport {
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let bot = NotificationBot::from_config(&config)?;

    match args.command {
        Command::Run => bot.run().await?,
        Command::FillHistory => {
            let added = bot.fill_price_history().await?;
            println!("Stored {} price points", added);
        }
        Command::ResetAth => bot.reset_ath().await?,
        Command::LpReport { address } => {
            let messages = bot.liquidity_report(&address).await?;
            if messages.is_empty() {
                println!("No liquidity found for {}", address);
            }
            for message in messages {
                println!("{}\n", message);
            }
        }
    }

    Ok(())
}
