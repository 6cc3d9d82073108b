//! # hud35 - device maintenance tools
//!
//! Two independent tools share this crate:
//! - `migrate`: moves the legacy zlib/pickle play-count file into SQLite
//! - `wifi`: keeps the device on a client network, falling back to an
//!   open access point with a captive credentials form

pub mod config;
pub mod storage;
pub mod migrate;
pub mod wifi;
pub mod server;
pub mod ui;

// Re-exports for convenient access
pub use storage::SongStatsStore;
pub use migrate::{Migrator, MigrationReport};
pub use wifi::{DeviceMode, Orchestrator, RetryPolicy, ShutdownFlag};

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for hud35 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for hud35 operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`{program}` exited with {status}: {output}")]
    CommandFailed {
        program: String,
        status: String,
        output: String,
    },

    #[error("`{program}` timed out after {timeout:?}")]
    CommandTimeout { program: String, timeout: Duration },

    #[error("failed to launch `{program}`: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("shutdown in progress")]
    ShuttingDown,

    #[error("access point setup gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },
}

impl Error {
    /// Whether another attempt at the same sequence could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::CommandFailed { .. }
                | Error::CommandTimeout { .. }
                | Error::CommandSpawn { .. }
                | Error::ConfigWrite { .. }
                | Error::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        let failed = Error::CommandFailed {
            program: "nmcli".into(),
            status: "exit status: 4".into(),
            output: "no network".into(),
        };
        assert!(failed.is_retryable());
        assert!(!Error::ShuttingDown.is_retryable());
        assert!(!Error::Config("bad".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_message_carries_last_error() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(Error::CommandTimeout {
                program: "hostapd".into(),
                timeout: Duration::from_secs(15),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("hostapd"));
    }
}
