//! Background configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tab_context_router::Background;
//!
//! # fn example() -> tab_context_router::Result<()> {
//! let config = Background::builder()
//!     .persist_store_data(true)
//!     .data_dir("./state")
//!     .port(9222)
//!     .browser_connect_timeout(Duration::from_secs(10))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::DEFAULT_BIND_IP;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for the browser shim.
pub const DEFAULT_BROWSER_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// BackgroundConfig
// ============================================================================

/// Validated background settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundConfig {
    /// Persist store data and known tabs across restarts.
    pub persist_store_data: bool,
    /// Directory of the file-backed data store.
    pub data_dir: Option<PathBuf>,
    /// Surface server bind address.
    pub bind_ip: IpAddr,
    /// Surface server port, 0 for random.
    pub port: u16,
    /// Time to wait for the browser shim at startup.
    pub browser_connect_timeout: Duration,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            persist_store_data: false,
            data_dir: None,
            bind_ip: DEFAULT_BIND_IP,
            port: 0,
            browser_connect_timeout: DEFAULT_BROWSER_CONNECT_TIMEOUT,
        }
    }
}

// ============================================================================
// BackgroundBuilder
// ============================================================================

/// Builder for [`BackgroundConfig`].
#[derive(Debug, Default, Clone)]
pub struct BackgroundBuilder {
    persist_store_data: bool,
    data_dir: Option<PathBuf>,
    bind_ip: Option<IpAddr>,
    port: Option<u16>,
    browser_connect_timeout: Option<Duration>,
}

impl BackgroundBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables persistence.
    #[inline]
    #[must_use]
    pub fn persist_store_data(mut self, persist: bool) -> Self {
        self.persist_store_data = persist;
        self
    }

    /// Sets the data store directory.
    #[inline]
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = Some(ip);
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the browser shim connect timeout.
    #[inline]
    #[must_use]
    pub fn browser_connect_timeout(mut self, timeout: Duration) -> Self {
        self.browser_connect_timeout = Some(timeout);
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if persistence is enabled without a data directory
    /// - [`Error::Config`] if the connect timeout is zero
    pub fn build(self) -> Result<BackgroundConfig> {
        self.validate_persistence()?;
        let browser_connect_timeout = self.validate_timeout()?;

        Ok(BackgroundConfig {
            persist_store_data: self.persist_store_data,
            data_dir: self.data_dir,
            bind_ip: self.bind_ip.unwrap_or(DEFAULT_BIND_IP),
            port: self.port.unwrap_or(0),
            browser_connect_timeout,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BackgroundBuilder {
    fn validate_persistence(&self) -> Result<()> {
        if self.persist_store_data && self.data_dir.is_none() {
            return Err(Error::config(
                "A data directory is required when persisting store data. \
                 Use .data_dir() to set it.",
            ));
        }

        if let Some(dir) = &self.data_dir
            && dir.is_file()
        {
            return Err(Error::config(format!(
                "Data directory is a file: {}",
                dir.display()
            )));
        }

        Ok(())
    }

    fn validate_timeout(&self) -> Result<Duration> {
        let timeout = self
            .browser_connect_timeout
            .unwrap_or(DEFAULT_BROWSER_CONNECT_TIMEOUT);
        if timeout.is_zero() {
            return Err(Error::config("Browser connect timeout must be positive"));
        }
        Ok(timeout)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    #[test]
    fn test_defaults() {
        let config = BackgroundBuilder::new().build().expect("build");
        assert_eq!(config, BackgroundConfig::default());
        assert!(!config.persist_store_data);
        assert_eq!(config.port, 0);
    }

    #[test]
    fn test_settings_applied() {
        let config = BackgroundBuilder::new()
            .persist_store_data(true)
            .data_dir("/tmp/state")
            .bind_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .port(4000)
            .browser_connect_timeout(Duration::from_secs(5))
            .build()
            .expect("build");

        assert!(config.persist_store_data);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/state")));
        assert_eq!(config.port, 4000);
        assert_eq!(config.browser_connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_persistence_requires_data_dir() {
        let err = BackgroundBuilder::new()
            .persist_store_data(true)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("data directory"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = BackgroundBuilder::new()
            .browser_connect_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_data_dir_must_not_be_file() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let result = BackgroundBuilder::new().data_dir(file.path()).build();
        assert!(result.is_err());
    }
}
