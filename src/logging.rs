//! Structured logging setup.
//!
//! Events go to stderr; stdout carries only the report. `RUST_LOG` wins over
//! the `-v` count when it is set.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global fmt subscriber.
///
/// In the TUI, stderr shares the alternate screen, so logging stays off unless
/// `RUST_LOG` asks for it explicitly. Calling this twice is a no-op.
pub fn init_logging(verbosity: u8, tui: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if tui => EnvFilter::new("off"),
        Err(_) => EnvFilter::new(level_for_verbosity(verbosity)),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
