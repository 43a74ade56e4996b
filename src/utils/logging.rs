use std::str::FromStr;

use tracing::Level;

/// Initialize tracing for the process at `default_level`.
///
/// Output goes to stderr; stdout is reserved for wire bytes. Unknown levels
/// fall back to `info`.
pub fn init(default_level: &str) {
    let lvl = Level::from_str(default_level.trim()).unwrap_or(Level::INFO);

    // try_init so tests can call this repeatedly
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
