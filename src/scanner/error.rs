//! Errors raised by the individual probers.
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Why a single probe did not produce a positive result.
///
/// Probers return these instead of swallowing errors; only the orchestrator
/// folds them into "unreachable" or "no hit".
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The operation did not finish within the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The target actively rejected the TCP connection.
    #[error("connection refused")]
    Refused,

    /// Every UDP attempt went unanswered.
    #[error("no reply after {attempts} attempt(s)")]
    NoReply {
        /// Number of sends made before giving up.
        attempts: u8,
    },

    /// The reachability helper ran and reported no answer.
    #[error("host did not answer the reachability check")]
    Unanswered,

    /// The reachability helper could not be started.
    #[error("reachability helper could not be started: {0}")]
    Spawn(#[source] io::Error),

    /// Any other socket error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProbeError {
    /// True when the probe ran and the host simply did not respond, as
    /// opposed to the probe failing to run at all.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Refused | Self::NoReply { .. } | Self::Unanswered
        )
    }

    /// Classifies a socket error; an OS-level timeout reports `timeout`,
    /// the bound the failed operation ran under.
    pub(crate) fn from_io(err: io::Error, timeout: Duration) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::TimedOut => Self::Timeout(timeout),
            _ => Self::Io(err),
        }
    }
}
