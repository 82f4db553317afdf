//! Error types for medialink
//!
//! Precondition failures (missing engine, released handles) are detected
//! before any native call is made. Engine failures carry the message read
//! from the engine's last-error slot for the same call.

use thiserror::Error;

/// Main error type for the binding layer
#[derive(Error, Debug)]
pub enum Error {
    /// No engine installed in the process-wide slot
    #[error("module must be initialized first")]
    NotInitialized,

    /// `init` called while an engine is already installed
    #[error("module is already initialized")]
    AlreadyInitialized,

    /// Operation on a released (or never initialized) media list
    #[error("media list must be initialized first")]
    MediaListReleased,

    /// Operation on a released (or never initialized) media
    #[error("media must be initialized first")]
    MediaReleased,

    /// Media and list were created by different engines
    #[error("media belongs to a different engine than the media list")]
    EngineMismatch,

    /// Failure reported by the engine's last-error slot
    #[error("engine error: {0}")]
    Engine(String),

    /// Engine returned a null handle without reporting an error
    #[error("engine could not allocate {0}")]
    AllocationFailed(&'static str),

    /// Non-zero status from add without an engine message
    #[error("could not add media to list")]
    AddFailed,

    /// Non-zero status from insert
    #[error("could not insert media at index {index}")]
    InsertFailed { index: usize },

    /// Non-zero status from remove (e.g. index out of bounds)
    #[error("could not remove from list at index {index}")]
    RemoveFailed { index: usize },

    /// Engine has no event manager for this list
    #[error("could not retrieve media list event manager")]
    EventManagerUnavailable,

    /// String argument cannot be passed to the engine
    #[error("invalid string argument: {0:?}")]
    InvalidString(String),

    /// Configured backend was not compiled in
    #[error("backend not available in this build: {0}")]
    BackendUnavailable(&'static str),

    /// Configuration loading error
    #[error(transparent)]
    Config(#[from] medialink_common::Error),
}

impl Error {
    /// Engine error if the slot held a message, `fallback` otherwise
    pub(crate) fn from_slot(message: Option<String>, fallback: Error) -> Error {
        match message {
            Some(message) => Error::Engine(message),
            None => fallback,
        }
    }
}

/// Convenience Result type using medialink Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_messages() {
        assert_eq!(
            Error::NotInitialized.to_string(),
            "module must be initialized first"
        );
        assert_eq!(
            Error::MediaListReleased.to_string(),
            "media list must be initialized first"
        );
        assert_eq!(
            Error::MediaReleased.to_string(),
            "media must be initialized first"
        );
    }

    #[test]
    fn test_from_slot_prefers_engine_message() {
        let err = Error::from_slot(Some("boom".to_string()), Error::AddFailed);
        assert!(matches!(err, Error::Engine(ref m) if m == "boom"));

        let err = Error::from_slot(None, Error::AddFailed);
        assert!(matches!(err, Error::AddFailed));
    }
}
