//! Shared tracing configuration utilities for the carbide workspace.
//!
//! Executables, integration tests, and benches all install their `tracing`
//! subscriber through this crate so the logging surface stays consistent
//! across binaries instead of each one copy-pasting builder logic.

use std::env;
use std::sync::OnceLock;

pub use tracing::{debug, error, info, trace, warn};

use tracing_subscriber::EnvFilter;

/// Output format for the formatter layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingOutput {
    /// Human-oriented multi-line output with ANSI colour.
    Pretty,
    /// Single-line output, suited to terminals and test logs.
    Compact,
    /// Machine-readable JSON, suited to log collection.
    Json,
}

/// Configuration describing how the shared tracing subscriber should behave.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Optional tracing directives (e.g. `carbide_core=debug,info`). When
    /// absent the crate falls back to `RUST_LOG` and finally to
    /// [`TracingConfig::default_directive`].
    pub directives: Option<String>,
    /// Fallback directive used when neither [`TracingConfig::directives`] nor
    /// `RUST_LOG` resolve to a valid filter.
    pub default_directive: String,
    /// Controls whether event targets (module paths) appear in output.
    pub include_targets: bool,
    /// Controls ANSI formatting. Disable for CI logs that strip colour codes.
    pub ansi: bool,
    /// Output format for the formatter layer.
    pub output: TracingOutput,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Returns a configuration tuned for local development.
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            output: TracingOutput::Pretty,
        }
    }

    /// Returns a configuration tuned for CI or log collection environments.
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            output: TracingOutput::Json,
        }
    }

    /// Build a configuration using environment hints.
    ///
    /// # Environment Variables
    ///
    /// - `CARBIDE_TRACING_PROFILE` - Profile preset: `local` (default) or `ci`
    /// - `CARBIDE_TRACING_DIRECTIVES` - Overrides tracing directives
    /// - `CARBIDE_TRACING_FORMAT` - Output format: `pretty`, `compact`, or `json`
    pub fn from_env() -> Self {
        let profile = env::var("CARBIDE_TRACING_PROFILE")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();

        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var("CARBIDE_TRACING_DIRECTIVES") {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Ok(format) = env::var("CARBIDE_TRACING_FORMAT") {
            config.output = match format.to_ascii_lowercase().as_str() {
                "json" => TracingOutput::Json,
                "compact" => TracingOutput::Compact,
                _ => TracingOutput::Pretty,
            };
        }

        config
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(directives) = &self.directives {
            if let Ok(filter) = EnvFilter::try_new(directives) {
                return filter;
            }
        }

        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing subscriber is left untouched.
pub fn init(config: &TracingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_ansi(config.ansi)
        .with_target(config.include_targets);

    match config.output {
        TracingOutput::Pretty => builder.pretty().try_init().is_ok(),
        TracingOutput::Compact => builder.compact().try_init().is_ok(),
        TracingOutput::Json => builder.json().try_init().is_ok(),
    }
}

/// Install a compact subscriber for tests, exactly once per process.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_for_tests() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let mut config = TracingConfig::from_env();
        if env::var("CARBIDE_TRACING_FORMAT").is_err() {
            config.output = TracingOutput::Compact;
        }
        config.ansi = false;
        init(&config);
    });
}
