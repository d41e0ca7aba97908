mod config;
mod db;
mod error;
mod exchange;
mod ipc;
mod roster;
mod student;

use std::io::{self, BufRead, Write};
use tracing::{info, warn};

fn init_tracing() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env(config::LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::DEFAULT_LOG_FILTER));

    // stdout carries the IPC stream.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;
    Ok(())
}

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("{e:#}");
    }

    let config = config::Config::from_env();
    let mut state = ipc::AppState {
        workspace: None,
        roster: None,
    };
    match roster::Roster::open(&config.workspace) {
        Ok(r) => {
            info!(workspace = %config.workspace.display(), "roster opened");
            state.workspace = Some(config.workspace.clone());
            state.roster = Some(r);
        }
        Err(e) => {
            let message = format!("{e:#}");
            warn!(error = %message, "starting without a workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // Can't reply with the caller's id.
            Err(e) => ipc::err("", "bad_json", e.to_string(), None),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
