//! Error types for the watchdog

use std::fmt;

pub type Result<T> = std::result::Result<T, WatchdogError>;

#[derive(Debug)]
pub enum WatchdogError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request failed
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Probe could not be built or connected
    Probe(String),

    /// Notification channel could not be built or failed to deliver
    Notify(String),

    /// Runner lifecycle misuse, e.g. asking twice for the stop handle
    Runner(String),
}

impl fmt::Display for WatchdogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchdogError::Io(err) => write!(f, "IO error: {}", err),
            WatchdogError::Http(err) => write!(f, "HTTP error: {}", err),
            WatchdogError::Json(err) => write!(f, "JSON error: {}", err),
            WatchdogError::Config(msg) => write!(f, "Configuration error: {}", msg),
            WatchdogError::Probe(msg) => write!(f, "Probe error: {}", msg),
            WatchdogError::Notify(msg) => write!(f, "Notification error: {}", msg),
            WatchdogError::Runner(msg) => write!(f, "Runner error: {}", msg),
        }
    }
}

impl std::error::Error for WatchdogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatchdogError::Io(err) => Some(err),
            WatchdogError::Http(err) => Some(err),
            WatchdogError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WatchdogError {
    fn from(err: std::io::Error) -> Self {
        WatchdogError::Io(err)
    }
}

impl From<reqwest::Error> for WatchdogError {
    fn from(err: reqwest::Error) -> Self {
        WatchdogError::Http(err)
    }
}

impl From<serde_json::Error> for WatchdogError {
    fn from(err: serde_json::Error) -> Self {
        WatchdogError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let err = WatchdogError::Config("interval must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: interval must be positive");

        let err = WatchdogError::Notify("discord returned 500".to_string());
        assert_eq!(err.to_string(), "Notification error: discord returned 500");

        let err = WatchdogError::Runner("stop handle already taken".to_string());
        assert_eq!(err.to_string(), "Runner error: stop handle already taken");
    }

    #[test]
    fn test_io_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: WatchdogError = io.into();
        assert!(err.source().is_some());
        assert!(WatchdogError::Runner("x".to_string()).source().is_none());
    }
}
