use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stickler_domain::{
    io::{load_config, load_drill},
    ClientMessage, DocumentFormat, DrillCatalog, EngineConfig, ServerMessage,
};
use stickler_tutor::{ManualClock, NewSession, SessionStore};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Score a recorded take against a drill and print every feedback record"
)]
struct Args {
    /// JSON file holding the client messages of the take, in arrival order
    #[arg(required_unless_present = "list")]
    take: Option<PathBuf>,
    /// Built-in drill to play against
    #[arg(short, long, default_value = "paradiddle_120")]
    drill: String,
    /// Drill definition (JSON or YAML) to use instead of a built-in one
    #[arg(long, conflicts_with = "drill")]
    drill_file: Option<PathBuf>,
    /// Engine configuration (JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Initial client-to-server latency offset in milliseconds
    #[arg(long, allow_hyphen_values = true)]
    latency: Option<f64>,
    /// Tempo override in beats per minute
    #[arg(long)]
    tempo: Option<f64>,
    /// List the built-in drills and exit
    #[arg(long)]
    list: bool,
}

fn read_document(path: &PathBuf) -> Result<(Vec<u8>, DocumentFormat)> {
    let bytes = fs::read(path).with_context(|| format!("read {:?}", path))?;
    Ok((bytes, DocumentFormat::from_path(path)))
}

fn flush(rx: &mut UnboundedReceiver<ServerMessage>, out: &mut impl Write) -> Result<()> {
    while let Ok(message) = rx.try_recv() {
        serde_json::to_writer(&mut *out, &message)?;
        writeln!(out)?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let catalog = DrillCatalog::with_defaults();
    if args.list {
        for drill in catalog.list() {
            println!("{}\t{}\t{} bpm", drill.id, drill.name, drill.tempo_bpm);
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => {
            let (bytes, format) = read_document(path)?;
            load_config(&bytes, format)?
        }
        None => EngineConfig::default(),
    };

    // hit times in the take are relative to the moment the session opened
    let store = SessionStore::new(catalog, config, Arc::new(ManualClock::new(0.0)));
    let (session, mut rx) = match &args.drill_file {
        Some(path) => {
            let (bytes, format) = read_document(path)?;
            let drill = load_drill(&bytes, format)?;
            store.create_session_with_drill(drill, args.latency, args.tempo)?
        }
        None => store.create_session(NewSession {
            drill_id: args.drill.clone(),
            client_latency_ms: args.latency,
            tempo_override: args.tempo,
        })?,
    };

    let Some(take_path) = &args.take else {
        bail!("a take file is required");
    };
    let take_bytes = fs::read(take_path).with_context(|| format!("read {:?}", take_path))?;
    let messages: Vec<ClientMessage> =
        serde_json::from_slice(&take_bytes).context("parse take messages")?;
    info!(count = messages.len(), session = %session.id(), "replaying take");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for message in messages {
        session.dispatch(message);
        flush(&mut rx, &mut out)?;
    }

    let take = store.finalize(session.id()).await?;
    flush(&mut rx, &mut out)?;
    info!(
        total_hits = take.metrics.total_hits,
        diamond = take.metrics.diamond_score,
        "take finished"
    );
    Ok(())
}
