//! Compiler configuration.
//!
//! Defaults can be overridden through environment variables:
//!
//! - `REGPACK_INITIAL_CAPACITY`: starting word capacity of every buffer
//! - `REGPACK_REQUIRE_DEFINITIONS`: reject top-level nodes that are not definitions
//! - `REGPACK_LOG`: minimum log level (`debug`, `info`, `warn`, `error`)
//!
//! Unparsable values are ignored with a warning.

use crate::utils::log::{self, Level};
use crate::virtual_machine::memory::raw_buffer::DEFAULT_CAPACITY;
use crate::warn;

pub const ENV_INITIAL_CAPACITY: &str = "REGPACK_INITIAL_CAPACITY";
pub const ENV_REQUIRE_DEFINITIONS: &str = "REGPACK_REQUIRE_DEFINITIONS";
pub const ENV_LOG: &str = "REGPACK_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Starting capacity, in words, of the register files and the instruction buffer.
    pub initial_capacity: usize,
    /// When set, every top-level node has to be a definition.
    pub require_definitions: bool,
    pub log_level: Level,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            require_definitions: false,
            log_level: Level::Info,
        }
    }
}

impl CompilerConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from `lookup`, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_INITIAL_CAPACITY) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => config.initial_capacity = capacity,
                Err(e) => warn!("Ignoring {ENV_INITIAL_CAPACITY}={raw}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_REQUIRE_DEFINITIONS) {
            match parse_flag(&raw) {
                Some(flag) => config.require_definitions = flag,
                None => warn!("Ignoring {ENV_REQUIRE_DEFINITIONS}={raw}: expected a boolean"),
            }
        }
        if let Some(raw) = lookup(ENV_LOG) {
            match raw.parse::<Level>() {
                Ok(level) => config.log_level = level,
                Err(e) => warn!("Ignoring {ENV_LOG}: {e}"),
            }
        }

        config
    }

    /// Installs `log_level` as the global minimum log level.
    pub fn apply_logging(&self) {
        log::set_min_level(self.log_level);
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
