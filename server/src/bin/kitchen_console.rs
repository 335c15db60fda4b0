// comanda_server/src/bin/kitchen_console.rs

//! Terminal kitchen console: polls the order API, chimes while orders wait
//! for approval, and reads staff commands from stdin.
//!
//! Commands: `pause`, `resume`, `accept-all [minutes]`, `status`, `quit`.
//!
//! The accepting-orders toggle is saved to `COMANDA_CONSOLE_STATE`
//! (default `.kitchen_console.json`) and restored on start.

use comanda::approval::{ApprovalWorkflow, TracingAlertSink};
use comanda_server::services::HttpStaffOrders;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn, Level};

const DEFAULT_STATE_FILE: &str = ".kitchen_console.json";

#[derive(Debug, Serialize, Deserialize)]
struct ConsoleState {
  accepting: bool,
}

/// A missing or unreadable file means the kitchen is open.
fn load_accepting(path: &Path) -> bool {
  let raw = match std::fs::read_to_string(path) {
    Ok(raw) => raw,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
    Err(e) => {
      warn!(path = %path.display(), error = %e, "Could not read console state, accepting orders.");
      return true;
    }
  };
  match serde_json::from_str::<ConsoleState>(&raw) {
    Ok(state) => state.accepting,
    Err(e) => {
      warn!(path = %path.display(), error = %e, "Console state is malformed, accepting orders.");
      true
    }
  }
}

fn save_accepting(path: &Path, accepting: bool) -> anyhow::Result<()> {
  let body = serde_json::to_string(&ConsoleState { accepting })?;
  std::fs::write(path, body)?;
  Ok(())
}

fn set_and_save(workflow: &ApprovalWorkflow, state_path: &Path, accepting: bool) {
  workflow.set_accepting(accepting);
  if let Err(e) = save_accepting(state_path, accepting) {
    warn!(path = %state_path.display(), error = %e, "Failed to save the accepting-orders toggle.");
  }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
  Pause,
  Resume,
  AcceptAll(Option<u32>),
  Status,
  Quit,
}

fn parse_command(line: &str) -> Option<Command> {
  let mut parts = line.split_whitespace();
  match parts.next()? {
    "pause" => Some(Command::Pause),
    "resume" => Some(Command::Resume),
    "accept-all" => Some(Command::AcceptAll(parts.next().and_then(|m| m.parse().ok()))),
    "status" => Some(Command::Status),
    "quit" | "exit" => Some(Command::Quit),
    _ => None,
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  dotenvy::dotenv().ok();
  let api_url = env::var("COMANDA_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
  let token = match env::var("COMANDA_STAFF_TOKEN") {
    Ok(token) if !token.trim().is_empty() => token,
    _ => {
      error!("COMANDA_STAFF_TOKEN must hold an admin or chef session token.");
      std::process::exit(2);
    }
  };

  let state_path = PathBuf::from(env::var("COMANDA_CONSOLE_STATE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string()));
  let accepting = load_accepting(&state_path);
  if !accepting {
    warn!("Restored toggle: not accepting orders; pending orders will be rejected.");
  }

  let staff = Arc::new(HttpStaffOrders::new(api_url.clone(), token));
  let workflow = Arc::new(ApprovalWorkflow::new(staff, Arc::new(TracingAlertSink)).with_accepting(accepting));
  let (shutdown_tx, shutdown_rx) = watch::channel(false);

  let runner = {
    let workflow = workflow.clone();
    tokio::spawn(async move { workflow.run(shutdown_rx).await })
  };
  info!(%api_url, "Kitchen console started. Commands: pause | resume | accept-all [minutes] | status | quit");

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    let line = tokio::select! {
      line = lines.next_line() => line,
      _ = tokio::signal::ctrl_c() => break,
    };
    let line = match line {
      Ok(Some(line)) => line,
      Ok(None) => break,
      Err(e) => {
        warn!(error = %e, "Failed to read from stdin.");
        break;
      }
    };
    match parse_command(line.trim()) {
      Some(Command::Pause) => {
        set_and_save(&workflow, &state_path, false);
        info!("No longer accepting orders; pending orders will be rejected on the next poll.");
      }
      Some(Command::Resume) => {
        set_and_save(&workflow, &state_path, true);
        info!("Accepting orders again.");
      }
      Some(Command::AcceptAll(minutes)) => match workflow.accept_all(minutes).await {
        Ok(report) => info!("{}", report.summary()),
        Err(e) => warn!(error = %e, "Accept all refused."),
      },
      Some(Command::Status) => info!(
        accepting = workflow.is_accepting(),
        pending = workflow.pending_count(),
        alarm = workflow.alarm_active(),
        "Kitchen status."
      ),
      Some(Command::Quit) => break,
      None if line.trim().is_empty() => {}
      None => warn!(input = %line.trim(), "Unknown command."),
    }
  }

  let _ = shutdown_tx.send(true);
  if let Err(e) = runner.await {
    error!(error = %e, "Approval workflow task failed.");
  }
}
