//! wmserver - standalone window manager core
//!
//! Reads one JSON request per line on stdin and writes one JSON response per
//! line on stdout. Observer events are written to stdout as they are
//! broadcast, tagged by `event`. Logs go to stderr.

use std::io::{BufRead, Write};
use std::sync::Arc;

use wmserver::config::WmConfig;
use wmserver::display::StaticDisplays;
use wmserver::minimize::{AbilityError, AbilityManager};
use wmserver::request::{self, Response};
use wmserver::window_node::AbilityToken;
use wmserver::{AgentCategory, AgentEvent, WindowManagerAgent, WindowRoot};

/// Prints every event as a JSON line
struct StdoutAgent;

impl WindowManagerAgent for StdoutAgent {
    fn on_event(&self, event: &AgentEvent) {
        match serde_json::to_string(event) {
            Ok(line) => write_line(&line),
            Err(e) => tracing::warn!(error = %e, "failed to encode event"),
        }
    }
}

/// Ability service stand-in: logs and accepts every minimize
struct LoggingAbilityManager;

impl AbilityManager for LoggingAbilityManager {
    fn minimize_ability(&self, token: AbilityToken, from_user: bool) -> Result<(), AbilityError> {
        tracing::info!(token = token.0, from_user, "minimize ability");
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    setup_logging();

    tracing::info!("starting wmserver");

    let config = WmConfig::load();
    let displays = Arc::new(StaticDisplays::new(config.displays.iter().map(|d| d.info())));
    tracing::info!(displays = config.displays.len(), "displays configured");

    let root = WindowRoot::new(config, displays, Arc::new(LoggingAbilityManager));

    let agent: Arc<dyn WindowManagerAgent> = Arc::new(StdoutAgent);
    for category in [
        AgentCategory::Focus,
        AgentCategory::SystemBar,
        AgentCategory::WindowUpdate,
        AgentCategory::AvoidArea,
    ] {
        root.register_agent(Arc::clone(&agent), category);
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match request::parse_request(&line) {
            Ok(req) => request::dispatch(&root, req),
            Err(e) => {
                tracing::warn!(error = %e, "rejected request");
                Response::Error {
                    kind: "bad_request".to_string(),
                    message: e.to_string(),
                }
            }
        };

        write_line(&serde_json::to_string(&response)?);
    }

    tracing::info!(windows = root.window_count(), "stdin closed, shutting down");
    Ok(())
}

fn write_line(line: &str) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
        tracing::warn!("stdout closed");
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Respect NO_COLOR environment variable for testing
    let use_ansi = std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(use_ansi),
        )
        .with(filter)
        .init();
}
