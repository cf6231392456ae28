//! robobot — Telegram front end for the Robot dedicated-server API
//!
//! Lists servers and runs two-phase resets on request from allow-listed chats.

use clap::{Parser, Subcommand};
use robo_dispatch::{Command, CommandInvocation};
use robobot::{BotConfig, build_dispatcher};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "robobot")]
#[command(about = "Telegram bot for the Robot dedicated-server API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Telegram and serve commands
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/robobot/config.yaml")]
        config: PathBuf,

        /// Debug logging, including every Bot API and Robot API request
        #[arg(short = 'D', long)]
        debug: bool,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "/etc/robobot/config.yaml")]
        output: PathBuf,
    },

    /// Run one chat command locally and print the reply
    ///
    /// Examples:
    ///   robobot exec list
    ///   robobot exec reset 203.0.113.10
    ///   robobot exec reset_sure 203.0.113.10 sw
    Exec {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/robobot/config.yaml")]
        config: PathBuf,

        /// Command name followed by its arguments
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Exec prints the reply on stdout; keep logs out of it
    if let Commands::Run { debug, .. } = &cli.command {
        let level = if *debug { "debug" } else { "info" };
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(
                EnvFilter::from_default_env()
                    .add_directive(format!("robobot={level}").parse()?)
                    .add_directive(format!("robo_dispatch={level}").parse()?)
                    .add_directive(format!("robo_client={level}").parse()?)
                    .add_directive(format!("robo_auth={level}").parse()?),
            )
            .init();
    }

    match cli.command {
        Commands::Run { config, .. } => {
            run_bot(config).await?;
        }
        Commands::InitConfig { output } => {
            init_config(output)?;
        }
        Commands::Exec { config, command } => {
            exec_command(config, &command).await?;
        }
    }

    Ok(())
}

// ─── Run ─────────────────────────────────────────────────────────────────────

async fn run_bot(config_path: PathBuf) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting robobot");

    let config = BotConfig::load(&config_path)?;
    info!(
        robot_url = %config.robot_url,
        authorized = config.authorized_ids.len(),
        require_confirmation = config.require_confirmation,
        "loaded config"
    );

    let mut bot = robobot::connect(&config).await?;
    bot.run(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    info!("robobot stopped");
    Ok(())
}

// ─── InitConfig ───────────────────────────────────────────────────────────────

fn init_config(output: PathBuf) -> anyhow::Result<()> {
    BotConfig::sample().save(&output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Edit the file to add your bot token, chat ids and Robot credentials, then run:");
    println!("  robobot run --config {}", output.display());

    Ok(())
}

// ─── Exec ─────────────────────────────────────────────────────────────────────

async fn exec_command(config_path: PathBuf, words: &[String]) -> anyhow::Result<()> {
    let config = BotConfig::load(&config_path)?;
    let dispatcher = build_dispatcher(&config)?;

    let text = format!("/{}", words.join(" ").trim_start_matches('/'));
    let invocation = CommandInvocation::parse(&text);

    match Command::from_invocation(&invocation) {
        Ok(command) => {
            let reply = dispatcher.execute(0, command).await;
            println!("{reply}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.reply_text());
            std::process::exit(2);
        }
    }
}
