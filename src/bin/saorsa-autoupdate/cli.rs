//! Command-line interface definition.

use clap::Parser;
use color_eyre::eyre::eyre;
use saorsa_autoupdate::PackageConfig;
use std::path::PathBuf;

/// Check for, download and hand over updates of a Saorsa desktop application.
#[derive(Parser, Debug)]
#[command(name = "saorsa-autoupdate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, short, env = "SAORSA_AUTOUPDATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the application's package.json.
    #[arg(long, conflicts_with = "config")]
    pub package_json: Option<PathBuf>,

    /// Version of the running application.
    #[arg(long, env = "SAORSA_APP_VERSION")]
    pub current_version: Option<String>,

    /// Base URL of the update feed.
    #[arg(long, env = "SAORSA_UPDATE_FEED")]
    pub feed_url: Option<String>,

    /// Executable name of the application.
    #[arg(long, env = "SAORSA_APP_NAME")]
    pub executable_name: Option<String>,

    /// Feed platform identifier (darwin, win32, linux).
    #[arg(long)]
    pub platform: Option<String>,

    /// Feed architecture identifier (x64, arm64, ia32).
    #[arg(long)]
    pub arch: Option<String>,

    /// Directory holding the bundled updater binaries.
    #[arg(long)]
    pub updater_dir: Option<PathBuf>,

    /// Override for the system temp directory.
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Base directory for the install-directory computation.
    #[arg(long)]
    pub install_base: Option<PathBuf>,

    /// Compare two versions, print -1, 0 or 1, and exit.
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    pub compare: Option<Vec<String>>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Convert CLI arguments into a PackageConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be loaded or a required field
    /// is missing everywhere.
    pub fn into_config(self) -> color_eyre::Result<PackageConfig> {
        let base = if let Some(ref path) = self.config {
            Some(PackageConfig::from_file(path)?)
        } else if let Some(ref path) = self.package_json {
            Some(PackageConfig::from_package_json(path)?)
        } else {
            match default_config_path() {
                Some(path) if path.is_file() => Some(PackageConfig::from_file(&path)?),
                _ => None,
            }
        };

        let mut config = match base {
            Some(config) => config,
            None => PackageConfig::new(
                self.current_version
                    .clone()
                    .ok_or_else(|| eyre!("--current-version is required without a config file"))?,
                self.feed_url
                    .clone()
                    .ok_or_else(|| eyre!("--feed-url is required without a config file"))?,
                self.executable_name
                    .clone()
                    .ok_or_else(|| eyre!("--executable-name is required without a config file"))?,
            ),
        };

        // Override with CLI arguments
        if let Some(version) = self.current_version {
            config.version = version;
        }
        if let Some(feed_url) = self.feed_url {
            config.feed_url = feed_url;
        }
        if let Some(name) = self.executable_name {
            config.executable_name = name;
        }
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(arch) = self.arch {
            config.arch = arch;
        }
        if self.updater_dir.is_some() {
            config.updater_dir = self.updater_dir;
        }
        if self.temp_dir.is_some() {
            config.temp_root = self.temp_dir;
        }
        if self.install_base.is_some() {
            config.install_base = self.install_base;
        }

        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "saorsa-autoupdate")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
