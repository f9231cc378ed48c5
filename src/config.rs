//! Configuration for saorsa-autoupdate.

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest describing the latest release of a channel.
pub const MANIFEST_FILE_NAME: &str = "latest.json";

/// Application package configuration.
///
/// Owned by the caller and borrowed by the orchestrator for the duration of
/// a run. Nothing in here changes while an update is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Version of the running application.
    pub version: String,

    /// Base URL of the update feed.
    #[serde(alias = "autoupdate")]
    pub feed_url: String,

    /// Executable name of the application, also used for the temp folder.
    #[serde(alias = "executable-name")]
    pub executable_name: String,

    /// Target platform identifier as used by the feed (`darwin`, `win32`, `linux`).
    #[serde(default = "host_platform")]
    pub platform: String,

    /// Target architecture identifier as used by the feed (`x64`, `arm64`, ...).
    #[serde(default = "host_arch")]
    pub arch: String,

    /// Directory holding the bundled updater binaries, one subfolder per platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updater_dir: Option<PathBuf>,

    /// Override for the system temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_root: Option<PathBuf>,

    /// Base directory the install-directory computation starts from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_base: Option<PathBuf>,
}

/// The subset of an application's `package.json` the updater reads.
#[derive(Debug, Deserialize)]
struct PackageJson {
    version: String,
    autoupdate: String,
    #[serde(rename = "executable-name")]
    executable_name: String,
}

impl PackageConfig {
    /// Create a configuration for the running host platform and architecture.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        feed_url: impl Into<String>,
        executable_name: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            feed_url: feed_url.into(),
            executable_name: executable_name.into(),
            platform: host_platform(),
            arch: host_arch(),
            updater_dir: None,
            temp_root: None,
            install_base: None,
        }
    }

    /// Check the configuration and return the parsed current version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the version is malformed, or
    /// [`Error::Config`] if a required field is empty.
    pub fn validate(&self) -> Result<Version> {
        let version = Version::parse(&self.version)?;

        if self.feed_url.trim().is_empty() {
            return Err(Error::Config("feed_url must not be empty".to_string()));
        }
        if self.executable_name.trim().is_empty() {
            return Err(Error::Config("executable_name must not be empty".to_string()));
        }
        if self.platform.is_empty() || self.arch.is_empty() {
            return Err(Error::Config(
                "platform and arch must not be empty".to_string(),
            ));
        }

        Ok(version)
    }

    /// Feed URL of this platform/arch channel, without a trailing slash.
    #[must_use]
    pub fn channel_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.feed_url.trim_end_matches('/'),
            self.platform,
            self.arch
        )
    }

    /// URL of the manifest for this channel.
    #[must_use]
    pub fn manifest_url(&self) -> String {
        format!("{}/{MANIFEST_FILE_NAME}", self.channel_url())
    }

    /// URL of a payload given its manifest-relative path.
    #[must_use]
    pub fn payload_url(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.channel_url(),
            relative_path.trim_start_matches('/')
        )
    }

    /// Working folder for downloads and the staged updater.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(&self.executable_name)
    }

    /// Directory the bundled updater binaries are read from.
    ///
    /// Defaults to an `updater` folder next to the running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is configured and the location of the
    /// running executable cannot be determined.
    pub fn updater_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.updater_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe()?;
        exe.parent()
            .map(|dir| dir.join("updater"))
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot locate updater directory next to {}",
                    exe.display()
                ))
            })
    }

    /// Base directory for the install-directory computation.
    ///
    /// # Errors
    ///
    /// Returns an error if no base is configured and the current working
    /// directory cannot be read.
    pub fn install_base(&self) -> Result<PathBuf> {
        match self.install_base {
            Some(ref base) => Ok(base.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from an application `package.json`.
    ///
    /// Reads the `version`, `autoupdate` and `executable-name` fields;
    /// platform and architecture default to the running host.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks a required field.
    pub fn from_package_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let pkg: PackageJson = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Ok(Self::new(pkg.version, pkg.autoupdate, pkg.executable_name))
    }
}

/// Platform identifier of the running host, in update-feed naming.
#[must_use]
pub fn host_platform() -> String {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
    .to_string()
}

/// Architecture identifier of the running host, in update-feed naming.
#[must_use]
pub fn host_arch() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
    .to_string()
}
