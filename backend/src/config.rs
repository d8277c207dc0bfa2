//! Application configuration.
//!
//! Fixed constants live here alongside [`ServerConfig`], which is read from
//! the environment (after `.env` is loaded by the binary) and can be
//! overridden by CLI flags.

/// MIME type of CSV artifacts.
pub const CSV_MIME: &str = "text/csv";

/// MIME type of XLSX artifacts.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Number of rows shown in a file preview.
pub const PREVIEW_ROWS: usize = 5;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default upload limit, in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Excel worksheet grid limits.
pub const XLSX_MAX_ROWS: usize = 1_048_576;
pub const XLSX_MAX_COLS: usize = 16_384;

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Read `DATASWEEP_PORT` and `DATASWEEP_MAX_UPLOAD_MB`, falling back to
    /// defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("DATASWEEP_PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.port);

        let max_upload_bytes = lookup("DATASWEEP_MAX_UPLOAD_MB")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .unwrap_or(defaults.max_upload_bytes);

        Self { port, max_upload_bytes }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_env_values_parsed() {
        let config = ServerConfig::from_lookup(|key| match key {
            "DATASWEEP_PORT" => Some("8080".into()),
            "DATASWEEP_MAX_UPLOAD_MB" => Some(" 2 ".into()),
            _ => None,
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_garbage_falls_back() {
        let config = ServerConfig::from_lookup(|_| Some("lots".into()));
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_oversized_upload_limit_falls_back() {
        let config = ServerConfig::from_lookup(|key| match key {
            "DATASWEEP_MAX_UPLOAD_MB" => Some(usize::MAX.to_string()),
            _ => None,
        });
        assert_eq!(config.max_upload_bytes, ServerConfig::default().max_upload_bytes);
    }

    #[test]
    fn test_cli_override() {
        let config = ServerConfig::default().with_port(Some(9000));
        assert_eq!(config.port, 9000);
        assert_eq!(ServerConfig::default().with_port(None).port, 3000);
    }
}
