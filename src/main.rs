use clap::Parser;
use scrivener::config::Config;
use scrivener::manager::TranscriptManager;
use scrivener::tokens::{TokenMessage, deserialize_tokens};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(name = "scrivener", version, about = "Incremental transcript fusion for streaming speech-to-text")]
struct Cli {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Read NDJSON token messages from stdin and stream merged transcripts
    Run,
    /// Deserialize one NDJSON token message and print its word list
    Print,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)?.with_env_overrides();

    match cli.command {
        Some(Commands::Run) => run(config).await,
        Some(Commands::Print) => print_words().await,
        None => {
            println!("scrivener - incremental transcript fusion");
            println!("Run with --help for usage");
            Ok(())
        }
    }
}

/// Feeds stdin token messages through the manager and prints every
/// published transcript snapshot as one JSON line.
async fn run(config: Config) -> anyhow::Result<()> {
    let manager = TranscriptManager::new(&config);
    let mut snapshots = manager.subscribe();
    manager.start()?;

    let printer = tokio::spawn(async move {
        loop {
            match snapshots.recv().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(line) => println!("{}", line),
                    Err(e) => eprintln!("[output] failed to serialize transcript: {}", e),
                },
                // A slow terminal only costs intermediate snapshots.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TokenMessage>(&line) {
            Ok(msg) => manager.handle_tokens(&msg),
            Err(e) => eprintln!("[input] skipping unparseable line: {}", e),
        }
    }

    // Let the driver pick up anything still queued, then shut down.
    let transcript = manager.stop().await;
    printer.abort();
    eprintln!("{}", transcript.render());
    Ok(())
}

/// Debug aid: dump the deserialized word list of a single message.
async fn print_words() -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let msg: TokenMessage = serde_json::from_str(&line)?;
        let words = deserialize_tokens(&msg)?;
        let mut first = true;
        for word in &words {
            if let Some(segment) = word.as_segment() {
                println!();
                println!("{}", segment);
                first = true;
                continue;
            }
            if !first {
                print!("||");
            }
            print!("{}", word.text());
            first = false;
        }
        println!();
    }
    Ok(())
}
