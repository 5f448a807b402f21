//! CLI entry point for bulkcard

use anyhow::Result;
use bulkcard_channels::ChannelManager;
use bulkcard_core::bus::{InboundMessage, MessageBus};
use bulkcard_core::config::{Config, ConfigLoader};
use bulkcard_core::contact::parse_contact_line;
use bulkcard_core::logging::init_logging;
use bulkcard_core::vcard::render_vcards;
use bulkcard_core::SessionStore;
use bulkcard_engine::CollectorEngine;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "bulkcard")]
#[command(about = "A Telegram bot that bulk-collects contacts into vCard files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize bulkcard configuration
    Onboard,
    /// Run the bot gateway
    Gateway,
    /// Show status information
    Status,
    /// Convert a text file of contact lines into a .vcf file
    Export {
        /// Input file, one `Name +Number` line per contact
        #[arg(short, long)]
        input: PathBuf,
        /// Output .vcf path (defaults to the input path with a .vcf extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };

    match cli.command {
        Commands::Onboard => run_onboard(&config_loader)?,
        Commands::Gateway => run_gateway(&config_loader).await?,
        Commands::Status => run_status(&config_loader)?,
        Commands::Export { input, output } => run_export(&input, output.as_deref())?,
    }

    Ok(())
}

fn run_onboard(loader: &ConfigLoader) -> Result<()> {
    println!("{}", style("Welcome to bulkcard!").bold().cyan());
    println!("This will set up the Telegram bot configuration.\n");

    let token: String = Input::new()
        .with_prompt("Telegram bot token (from @BotFather)")
        .interact_text()?;

    let enable = Confirm::new()
        .with_prompt("Enable the Telegram channel now?")
        .default(true)
        .interact()?;

    let mut config = Config::default();
    config.channels.telegram.token = token.trim().to_string();
    config.channels.telegram.enabled = enable;

    loader.save(&config)?;

    println!(
        "\n{} Configuration written to {}",
        style("Done.").green(),
        loader.config_dir().join("config.json").display()
    );
    println!("Run {} to start the bot.", style("bulkcard gateway").bold());

    Ok(())
}

async fn run_gateway(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let _log_guard = init_logging(&config.logging);

    if !config.channels.telegram.enabled {
        anyhow::bail!(
            "No channel enabled. Run `bulkcard onboard` or set channels.telegram.enabled"
        );
    }

    println!("{}", style("Starting bulkcard gateway...").bold().cyan());

    let bus = MessageBus::new();
    let store = Arc::new(SessionStore::new());
    let engine = Arc::new(CollectorEngine::new(bus.clone(), store));

    let mut channel_manager = ChannelManager::new(config.clone());

    // Bridge channel inbound queue -> message bus inbound queue
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(1024);
    channel_manager.set_inbound_sender(inbound_tx);
    let bus_for_inbound_bridge = bus.clone();
    let inbound_bridge_handle = tokio::spawn(async move {
        while let Some(msg) = inbound_rx.recv().await {
            if let Err(e) = bus_for_inbound_bridge.publish_inbound(msg) {
                error!("Failed to publish inbound message to bus: {}", e);
            }
        }
    });

    if let Err(e) = channel_manager.initialize().await {
        error!("Failed to initialize channels: {}", e);
    }
    if let Err(e) = channel_manager.start_all().await {
        error!("Failed to start channels: {}", e);
    }

    let channel_manager = Arc::new(channel_manager);

    // Route outbound messages back to their channel
    for name in channel_manager.channel_names().await {
        let manager = channel_manager.clone();
        bus.subscribe_outbound(name, move |msg| {
            let manager = manager.clone();
            async move {
                if let Err(e) = manager.send(msg).await {
                    error!("Failed to send outbound message: {}", e);
                }
            }
        })
        .await;
    }

    let bus_for_dispatch = bus.clone();
    let dispatch_handle = tokio::spawn(async move {
        bus_for_dispatch.dispatch_outbound_loop().await;
    });

    let engine_handle = tokio::spawn({
        let engine = engine.clone();
        async move {
            if let Err(e) = engine.run().await {
                error!("Collector engine exited with error: {}", e);
            }
        }
    });

    println!(
        "\n{}",
        style("Gateway is running. Press Ctrl+C to stop.").green()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down gateway");

    bus.stop().await;
    channel_manager.stop_all().await.ok();
    inbound_bridge_handle.abort();
    dispatch_handle.abort();
    engine_handle.abort();

    println!("{}", style("Gateway stopped.").dim());
    Ok(())
}

fn run_status(loader: &ConfigLoader) -> Result<()> {
    println!("{}", style("bulkcard status").bold());
    println!("Config dir: {}", loader.config_dir().display());

    match loader.load() {
        Ok(config) => {
            let telegram = &config.channels.telegram;
            let state = if telegram.enabled {
                style("enabled").green()
            } else {
                style("disabled").dim()
            };
            println!("Telegram channel: {}", state);
            println!(
                "Token configured: {}",
                if telegram.token.is_empty() { "no" } else { "yes" }
            );
            if telegram.allow_from.is_empty() {
                println!("Allow list: open to everyone");
            } else {
                println!("Allow list: {} sender(s)", telegram.allow_from.len());
            }
            println!("Log level: {}", config.logging.level);
        }
        Err(e) => {
            println!("{} {}", style("Invalid configuration:").red(), e);
        }
    }

    Ok(())
}

fn run_export(input: &Path, output: Option<&Path>) -> Result<()> {
    let (exported, skipped, path) = export_file(input, output)?;

    println!(
        "{} {} contact(s) written to {}",
        style("Exported").green(),
        exported,
        path.display()
    );
    if skipped > 0 {
        println!(
            "{} {} line(s) did not match `Name +Number` and were skipped",
            style("Note:").yellow(),
            skipped
        );
    }

    Ok(())
}

/// Parse contact lines from a file and write the rendered vCards.
///
/// Returns the exported count, the skipped-line count and the output path.
fn export_file(input: &Path, output: Option<&Path>) -> Result<(usize, usize, PathBuf)> {
    let content = std::fs::read_to_string(input)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_contact_line(line) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }

    if records.is_empty() {
        anyhow::bail!("No contact lines found in {}", input.display());
    }

    let path = match output {
        Some(p) => p.to_path_buf(),
        None => input.with_extension("vcf"),
    };
    std::fs::write(&path, render_vcards(&records))?;

    Ok((records.len(), skipped, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_export_file_writes_vcf() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("contacts.txt");
        std::fs::write(&input, "Alice +15551234\n\nnot a contact\nbob 15559999\n").unwrap();

        let (exported, skipped, path) = export_file(&input, None).unwrap();
        assert_eq!(exported, 2);
        assert_eq!(skipped, 1);
        assert_eq!(path, dir.path().join("contacts.vcf"));

        let rendered = std::fs::read_to_string(&path).unwrap();
        assert!(rendered.starts_with("BEGIN:VCARD\nVERSION:3.0\nFN:RT ALICE\n"));
        assert_eq!(rendered.matches("END:VCARD").count(), 2);
    }

    #[test]
    fn test_export_file_with_no_contacts_fails() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("contacts.txt");
        std::fs::write(&input, "nothing to see\n").unwrap();

        assert!(export_file(&input, None).is_err());
    }

    #[test]
    fn test_export_file_honors_output_path() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("contacts.txt");
        let output = dir.path().join("out.vcf");
        std::fs::write(&input, "Carol 5550001\n").unwrap();

        let (exported, _, path) = export_file(&input, Some(&output)).unwrap();
        assert_eq!(exported, 1);
        assert_eq!(path, output);
        assert!(output.exists());
    }
}
