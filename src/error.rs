//! Error types for ar-frame-sync

/// Result type alias
pub type Result<T> = std::result::Result<T, ArError>;

/// Errors raised by the tracking engine boundary and the consolidation layer.
#[derive(Debug, thiserror::Error)]
pub enum ArError {
    /// Tracking engine missing, incompatible or outdated
    #[error("Tracking engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Camera could not be acquired for this frame
    #[error("Camera not available")]
    CameraUnavailable,

    /// Operation needs a tracked camera pose
    #[error("Camera is not tracking")]
    NotTracking,

    /// Marker slot index outside the image database
    #[error("Marker index {index} out of range (capacity {capacity})")]
    IndexOutOfRange {
        /// Index reported by the engine
        index: usize,
        /// Number of slots in the table
        capacity: usize,
    },

    /// No session has been attached yet
    #[error("Session not ready")]
    SessionNotReady,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Copyable classification of an [`ArError`], carried in tick outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EngineUnavailable,
    CameraUnavailable,
    NotTracking,
    IndexOutOfRange,
    SessionNotReady,
    Config,
    Io,
}

impl ArError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArError::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            ArError::CameraUnavailable => ErrorKind::CameraUnavailable,
            ArError::NotTracking => ErrorKind::NotTracking,
            ArError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            ArError::SessionNotReady => ErrorKind::SessionNotReady,
            ArError::Config(_) => ErrorKind::Config,
            ArError::Io(_) | ArError::Json(_) => ErrorKind::Io,
        }
    }

    /// Transient errors clear up on their own; the next tick simply tries again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ArError::CameraUnavailable | ArError::NotTracking | ArError::SessionNotReady
        )
    }
}

impl From<glob::PatternError> for ArError {
    fn from(e: glob::PatternError) -> Self {
        ArError::Config(e.to_string())
    }
}
