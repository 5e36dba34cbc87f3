//! Error types for the surface subsystem
//!
//! Configuration and transport failures are typed so the engine can keep a
//! human-readable disabled reason. Loading and CLI code wraps them in
//! `anyhow` like everywhere else.

use thiserror::Error;

/// Errors raised at the device and transport seams
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// No MIDI port matched the configured pattern
    #[error("no {device} found (no port matching '{pattern}')")]
    DeviceNotFound { device: String, pattern: String },

    /// The MIDI backend could not be initialized or connected
    #[error("failed to initialize transport: {0}")]
    TransportInit(String),

    /// A message could not be written to the device
    #[error("failed to send to device: {0}")]
    Send(String),

    /// The transport is not connected
    #[error("device disconnected")]
    Disconnected,
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_not_found_message() {
        let err = SurfaceError::DeviceNotFound {
            device: "push 2".to_string(),
            pattern: "Ableton Push 2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no push 2 found (no port matching 'Ableton Push 2')"
        );
    }
}
