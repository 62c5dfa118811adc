// ── Core error types ──
//
// Failures surfaced by the registry and its collaborators. Identity and
// communication errors are caught where they happen and turned into
// "skip / retry on the next event"; only `Interrupted` is always re-raised.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Identity ─────────────────────────────────────────────────────
    #[error("Cannot resolve hardware identity of {serial}: {reason}")]
    IdentityResolution { serial: String, reason: String },

    #[error("Property {property} on {serial} not read within {timeout_ms}ms")]
    PropertyTimeout {
        serial: String,
        property: String,
        timeout_ms: u64,
    },

    // ── Device communication ─────────────────────────────────────────
    #[error("Device communication failed on {serial}: {message}")]
    DeviceCommunication { serial: String, message: String },

    #[error("Command timed out after {timeout_ms}ms: {command}")]
    CommandTimeout { command: String, timeout_ms: u64 },

    // ── Cancellation ─────────────────────────────────────────────────
    #[error("Operation interrupted")]
    Interrupted,

    // ── I/O ──────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Cancellation must propagate; callers use this to re-raise instead of
    /// logging and moving on.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// True for failures that mean "the device didn't answer in time".
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::PropertyTimeout { .. } | Self::CommandTimeout { .. }
        )
    }

    pub(crate) fn communication(serial: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceCommunication {
            serial: serial.into(),
            message: message.into(),
        }
    }
}
