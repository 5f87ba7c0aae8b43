//! Command-line front end for the analysis pipeline.
//!
//! ```text
//! analyze --fen "<FEN>" [--depth N] [--multi-pv K]
//! analyze --batch positions.txt [--depth N]     one FEN per line
//! analyze --pgn game.pgn
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use anyhow::{bail, Context};
use tracing::info;

use analysis_engine::{AnalysisConfig, AnalysisService};

enum Command {
    Position {
        fen: String,
        depth: Option<u32>,
        multi_pv: Option<u32>,
    },
    Batch {
        path: String,
        depth: Option<u32>,
    },
    Game {
        path: String,
    },
}

/// Value following `flag`, if present
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn flag_number(args: &[String], flag: &str) -> anyhow::Result<Option<u32>> {
    flag_value(args, flag)
        .map(|v| v.parse().with_context(|| format!("{flag} expects a number, got '{v}'")))
        .transpose()
}

fn parse_command() -> anyhow::Result<Command> {
    let args: Vec<String> = std::env::args().collect();
    let depth = flag_number(&args, "--depth")?;

    if let Some(fen) = flag_value(&args, "--fen") {
        return Ok(Command::Position {
            fen,
            depth,
            multi_pv: flag_number(&args, "--multi-pv")?,
        });
    }
    if let Some(path) = flag_value(&args, "--batch") {
        return Ok(Command::Batch { path, depth });
    }
    if let Some(path) = flag_value(&args, "--pgn") {
        return Ok(Command::Game { path });
    }
    bail!("usage: analyze (--fen <FEN> | --batch <FILE> | --pgn <FILE>) [--depth N] [--multi-pv K]")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let command = parse_command()?;
    let config = AnalysisConfig::from_env();
    let service = AnalysisService::from_config(&config).await?;

    let output = match command {
        Command::Position { fen, depth, multi_pv } => {
            let result = service.analyze_position(&fen, depth, multi_pv).await?;
            serde_json::to_string_pretty(&result)?
        }
        Command::Batch { path, depth } => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {path}"))?;
            let fens: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            info!(positions = fens.len(), "Analyzing batch");
            let results = service.analyze_batch(&fens, depth).await?;
            serde_json::to_string_pretty(&results)?
        }
        Command::Game { path } => {
            let pgn = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {path}"))?;
            let review = service.analyze_game(&pgn).await?;
            serde_json::to_string_pretty(&review)?
        }
    };

    println!("{output}");
    service.shutdown().await;
    Ok(())
}
