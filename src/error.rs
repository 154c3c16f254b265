#![allow(dead_code)]

use thiserror::Error;

/// Crate-level error type aggregating every component's failures.
#[derive(Error, Debug)]
pub enum GrabberError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Grabber error: {0}")]
    Grabber(#[from] GrabberRunError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },

    #[error("Graceful shutdown requested")]
    Shutdown,
}

/// Errors raised while opening or reading a byte source.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("invalid port {port}")]
    InvalidPort { port: i64 },

    #[error("no host configured")]
    NoHost,

    #[error("failed to resolve host {host}: {details}")]
    ResolveError { host: String, details: String },

    #[error("failed to connect to {host}:{port}: {details}")]
    ConnectError {
        host: String,
        port: u16,
        details: String,
    },

    #[error("write failed: {details}")]
    WriteError { details: String },

    #[error("failed to open file {path}: {details}")]
    FileOpenError { path: String, details: String },
}

/// Terminal and intermediate failures from the grabber state machine.
/// `Success`-adjacent terminal statuses live in
/// [`crate::core::grabber::GrabberStatus`]; this enum covers the error path only.
#[derive(Error, Debug, Clone)]
pub enum GrabberRunError {
    #[error("malformed or unsupported HTTP response: {details}")]
    CorruptHeader { details: String },

    #[error("read error: {details}")]
    ReadError { details: String },

    #[error("connection closed before the stream completed")]
    PrematureEof,

    #[error("no data received within the idle timeout")]
    Timeout,

    #[error("canceled")]
    Canceled,
}

/// Worker-level errors: failures outside the grabber's own run loop,
/// such as the source never opening.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("source failed to open: {0}")]
    SourceOpen(#[from] SourceError),

    #[error("grabber allocation failed")]
    AllocationFailed,
}

impl GrabberError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Check if this error is recoverable — i.e. whether a supervisor may
    /// reasonably retry the affected worker rather than give up.
    pub fn is_recoverable(&self) -> bool {
        match self {
            GrabberError::Source(_) => true,
            GrabberError::Grabber(GrabberRunError::Timeout) => true,
            GrabberError::Grabber(GrabberRunError::PrematureEof) => true,
            GrabberError::Grabber(GrabberRunError::ReadError { .. }) => true,
            GrabberError::Grabber(GrabberRunError::Canceled) => false,
            GrabberError::Io(_) => true,
            GrabberError::System { .. } => false,
            GrabberError::Shutdown => false,
            _ => false,
        }
    }

    pub fn component_name(&self) -> String {
        match self {
            GrabberError::Source(_) => "source".to_string(),
            GrabberError::Grabber(_) => "grabber".to_string(),
            GrabberError::Worker(_) => "worker".to_string(),
            GrabberError::Config(_) => "config".to_string(),
            GrabberError::Component { component, .. } => component.clone(),
            _ => "system".to_string(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GrabberError::Shutdown => ErrorSeverity::Info,
            GrabberError::Grabber(GrabberRunError::Canceled) => ErrorSeverity::Info,
            GrabberError::Config(_) => ErrorSeverity::Critical,
            _ if self.is_recoverable() => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Info => tracing::Level::INFO,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Critical => tracing::Level::ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, GrabberError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let source_error = GrabberError::Source(SourceError::InvalidPort { port: 70000 });
        assert_eq!(
            source_error.to_string(),
            "Source error: invalid port 70000"
        );

        let system_error = GrabberError::system("Test system error");
        assert_eq!(system_error.to_string(), "System error: Test system error");
    }

    #[test]
    fn test_error_source_chains() {
        use std::error::Error;

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = GrabberError::Io(io_error);

        assert!(err.source().is_some());
        assert_eq!(err.source().unwrap().to_string(), "File not found");
    }

    #[test]
    fn test_recoverable_error_classification() {
        assert!(GrabberError::Grabber(GrabberRunError::Timeout).is_recoverable());
        assert!(GrabberError::Grabber(GrabberRunError::PrematureEof).is_recoverable());
        assert!(GrabberError::Source(SourceError::NoHost).is_recoverable());

        assert!(!GrabberError::Grabber(GrabberRunError::Canceled).is_recoverable());
        assert!(!GrabberError::system("Critical error").is_recoverable());
        assert!(!GrabberError::Shutdown.is_recoverable());
    }

    #[test]
    fn test_component_name_extraction() {
        assert_eq!(
            GrabberError::Source(SourceError::NoHost).component_name(),
            "source"
        );
        assert_eq!(
            GrabberError::Grabber(GrabberRunError::Timeout).component_name(),
            "grabber"
        );
        assert_eq!(GrabberError::system("test").component_name(), "system");
        assert_eq!(
            GrabberError::component("custom", "test").component_name(),
            "custom"
        );
    }

    #[test]
    fn test_error_severity_levels() {
        use ErrorSeverity::*;

        assert_eq!(GrabberError::Shutdown.severity(), Info);
        assert_eq!(
            GrabberError::Grabber(GrabberRunError::Canceled).severity(),
            Info
        );
        assert_eq!(
            GrabberError::Grabber(GrabberRunError::Timeout).severity(),
            Warning
        );
        assert_eq!(GrabberError::system("error").severity(), Error);
    }

    #[test]
    fn test_error_severity_to_tracing_level() {
        use ErrorSeverity::*;

        assert_eq!(Info.to_tracing_level(), tracing::Level::INFO);
        assert_eq!(Warning.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(Critical.to_tracing_level(), tracing::Level::ERROR);
    }
}
