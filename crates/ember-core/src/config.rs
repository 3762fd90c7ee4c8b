//! Engine level configuration flags.

use crate::profiling::ProfilingBackend;

/// Configurations for the Ember engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Run without a renderer, the asset pipeline falls back to its minimum atlas size.
    pub headless: bool,
    /// Verbose diagnostics requested on the command line.
    pub debug: bool,
    pub benchmark: BenchmarkMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            headless: false,
            debug: false,
            benchmark: BenchmarkMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkMode {
    /// Benchmarking is disabled
    Off,
    /// Benchmarking is enabled, and can be viewed using the built-in viewer
    On,
    /// Benchmarking is enabled, and can be viewed either using the built-in viewer or
    /// using external tools such as 'puffin_viewer'
    WithWebserver,
}

impl BenchmarkMode {
    /// The profiling backend this mode asks for, if any.
    pub fn profiling_backend(self) -> Option<ProfilingBackend> {
        match self {
            BenchmarkMode::Off => None,
            BenchmarkMode::On => Some(ProfilingBackend::Local),
            BenchmarkMode::WithWebserver => Some(ProfilingBackend::PuffinHttp),
        }
    }
}

impl Config {
    /// Build a config from command line arguments (program name excluded).
    ///
    /// Recognised flags: `Debug` / `--debug`, `--headless`, `--benchmark`,
    /// `--benchmark-server`. Unknown arguments are ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Config::default();
        for arg in args {
            match arg.as_ref() {
                "Debug" | "--debug" => config.debug = true,
                "--headless" => config.headless = true,
                "--benchmark" => config.benchmark = BenchmarkMode::On,
                "--benchmark-server" => config.benchmark = BenchmarkMode::WithWebserver,
                other => tracing::trace!("Ignoring argument '{}'", other),
            }
        }
        config
    }

    /// Build a config from `EMBER_HEADLESS` and `EMBER_DEBUG`.
    pub fn from_env() -> Self {
        Config {
            headless: env_flag("EMBER_HEADLESS"),
            debug: env_flag("EMBER_DEBUG"),
            ..Config::default()
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
