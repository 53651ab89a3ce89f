use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from host filesystem calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid path provided by the user or the session owner.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A request value outside what the current state allows.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The host runtime cannot perform the requested call.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An intent or event channel has been closed.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// No window registered under this label.
    #[error("Unknown window: {0}")]
    UnknownWindow(String),

    /// No tab registered under this key.
    #[error("Unknown tab: {0}")]
    UnknownTab(String),

    /// Directory watcher setup failed.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn unsupported_error_display() {
        let err = AppError::Unsupported("archive listing".into());
        assert_eq!(err.to_string(), "Unsupported: archive listing");
    }

    #[test]
    fn unknown_tab_error_display() {
        let err = AppError::UnknownTab("tab-3".into());
        assert_eq!(err.to_string(), "Unknown tab: tab-3");
    }
}
