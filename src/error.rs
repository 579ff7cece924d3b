//! Application error types.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Application error carrying a kind and a small key/value payload.
#[derive(Debug)]
pub struct AppError {
    payload: HashMap<String, String>,
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Container runtime unreachable or its CLI is missing
    Environment,
    /// Image build failed
    Build,
    /// Container failed to start
    StartFailed,
    /// No container with the requested name exists
    ContainerNotFound,
    /// Host port is occupied
    PortOccupied,
    /// Settings or environment file error
    Config,
    /// File system error
    Io,
    /// Any other runtime command failure
    Runtime,
    /// Network error
    Network,
    /// General error
    Other,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::Environment => 1001,
            Self::Build => 1002,
            Self::StartFailed => 1003,
            Self::ContainerNotFound => 1004,
            Self::PortOccupied => 1005,
            Self::Config => 2001,
            Self::Io => 2002,
            Self::Runtime => 3001,
            Self::Network => 3002,
            Self::Other => 9999,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            Self::Environment => "container runtime is not available",
            Self::Build => "image build failed",
            Self::StartFailed => "container failed to start",
            Self::ContainerNotFound => "container not found",
            Self::PortOccupied => "host port is already in use",
            Self::Config => "configuration error",
            Self::Io => "file system error",
            Self::Runtime => "container runtime command failed",
            Self::Network => "network error",
            Self::Other => "error",
        }
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, payload: HashMap<String, String>) -> Self {
        Self { payload, kind }
    }

    /// Create an error with a single "detail" key from a non-empty string,
    /// or an empty payload if the string is empty.
    fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let payload = if detail.is_empty() {
            HashMap::new()
        } else {
            HashMap::from([("detail".to_string(), detail)])
        };
        Self::new(kind, payload)
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Environment, message)
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Build, message)
    }

    pub fn start_failed(name: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::StartFailed,
            HashMap::from([
                ("name".to_string(), name.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn container_not_found(name: &str) -> Self {
        Self::new(
            ErrorKind::ContainerNotFound,
            HashMap::from([("name".to_string(), name.to_string())]),
        )
    }

    pub fn port_occupied(port: u16) -> Self {
        Self::new(
            ErrorKind::PortOccupied,
            HashMap::from([("port".to_string(), port.to_string())]),
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Config, message)
    }

    pub fn config_path(path: &std::path::Path, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Config,
            HashMap::from([
                ("path".to_string(), path.display().to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Io, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Runtime, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Network, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Other, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> Option<&str> {
        self.payload.get("detail").map(String::as_str)
    }

    /// Suggested next step for the user, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind {
            ErrorKind::Environment => Some("make sure Docker is installed and the daemon is running"),
            ErrorKind::StartFailed => Some("inspect the container output with `dashctl logs`"),
            ErrorKind::ContainerNotFound => Some("start the dashboard with `dashctl run`"),
            ErrorKind::PortOccupied => Some("pick another port, e.g. `dashctl run 8502`"),
            ErrorKind::Build => Some("fix the build error above and run `dashctl build` again"),
            _ => None,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.summary())?;

        let mut keys: Vec<&String> = self.payload.keys().filter(|k| *k != "detail").collect();
        keys.sort();
        if !keys.is_empty() {
            let pairs: Vec<String> = keys
                .iter()
                .map(|k| format!("{}={}", k, self.payload[*k]))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }

        if let Some(detail) = self.detail() {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct as _;
        let mut s = serializer.serialize_struct("AppError", 4)?;
        s.serialize_field("code", &self.kind.code())?;
        s.serialize_field("kind", &self.kind)?;
        s.serialize_field("message", &self.to_string())?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::runtime(format!("unexpected runtime output: {}", err))
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
