//! Error types for bridge operations

use jbridge_target::IdCode;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while bridging the target
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Debug link transfer failed (target unresponsive, mapping gone, ...)
    #[error("Link failure: {reason}")]
    LinkFailed {
        /// Reason for failure
        reason: String,
    },

    /// Word access outside the region the link can reach
    #[error("Address {address:#010x} outside link range {begin:#010x}..{end:#010x}")]
    AddressOutOfRange {
        /// Requested address
        address: u32,
        /// First reachable address
        begin: u32,
        /// One past the last reachable address
        end: u32,
    },

    /// Target answered with the wrong debug port identity
    #[error("ERROR: IDCode {actual} (expected {expected:08X})")]
    IdentityMismatch {
        /// Identity the configuration requires
        expected: u32,
        /// Identity read from the target
        actual: IdCode,
    },

    /// Program image could not be loaded into the target
    #[error("Load failed: {reason}")]
    LoadFailed {
        /// Reason for failure
        reason: String,
    },

    /// Network transport failed definitively
    #[error("Network transport failed: {reason}")]
    TransportFailed {
        /// Reason for failure
        reason: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for failure
        reason: String,
    },

    /// The bridge stopped on a fatal condition
    #[error("Bridge halted: {reason}")]
    Halted {
        /// Diagnostic reported at halt time
        reason: String,
    },

    /// A role thread could not be started
    #[error("Failed to spawn {role} thread: {source}")]
    SpawnFailed {
        /// Role whose thread failed to start
        role: &'static str,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error from a console, socket or device file
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl BridgeError {
    /// Create a link failure error
    pub fn link_failed(reason: impl Into<String>) -> Self {
        Self::LinkFailed {
            reason: reason.into(),
        }
    }

    /// Create a program load error
    pub fn load_failed(reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            reason: reason.into(),
        }
    }

    /// Create a transport failure error
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        Self::TransportFailed {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a halted error
    pub fn halted(reason: impl Into<String>) -> Self {
        Self::Halted {
            reason: reason.into(),
        }
    }
}

/// Outcome of one worker cycle that did not end in an acknowledgment.
///
/// Only `Fatal` is an error in the usual sense. The other two kinds end the
/// cycle quietly: no ack word, no ack pulse, the worker goes back to waiting.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Nothing to move yet (an empty receive). No ack.
    #[error("nothing available yet")]
    Transient,

    /// The channel cannot run at all (transport never initialized). No ack.
    #[error("precondition unmet: {0}")]
    PreconditionUnmet(&'static str),

    /// Unrecoverable; the bridge halts.
    #[error(transparent)]
    Fatal(#[from] BridgeError),
}

impl From<std::io::Error> for ServiceError {
    fn from(source: std::io::Error) -> Self {
        Self::Fatal(BridgeError::from(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mismatch_message_names_both_codes() {
        let err = BridgeError::IdentityMismatch {
            expected: 0x4BA0_0477,
            actual: IdCode::new(0x1234_5679),
        };
        let msg = err.to_string();
        assert!(msg.contains("12345679"), "{msg}");
        assert!(msg.contains("4BA00477"), "{msg}");
    }

    #[test]
    fn bridge_errors_become_fatal_service_errors() {
        let err: ServiceError = BridgeError::transport_failed("send").into();
        assert!(matches!(err, ServiceError::Fatal(BridgeError::TransportFailed { .. })));
    }
}
