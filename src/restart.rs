//! Restart handoff to the platform updater binary.
//!
//! The updater is a separate executable shipped with the application. It is
//! copied into the update working folder (so it can replace the installation
//! it was bundled in), made executable, and spawned detached with the path of
//! the downloaded bundle. The updater waits for this process to exit before
//! touching any files, so the caller is expected to quit shortly after
//! [`RestartLauncher::prepare_restart`] returns.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Prefix of the bundled updater binary name; the architecture follows.
pub const UPDATER_BINARY_PREFIX: &str = "autoupdater";

/// Platform-specific behaviour of the restart handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformStrategy {
    /// Number of directory levels between the install base and the install dir.
    pub install_dir_ascent: usize,
    /// Suffix appended to executable names.
    pub executable_suffix: &'static str,
}

/// Strategies keyed by feed platform identifier.
const PLATFORM_STRATEGIES: &[(&str, PlatformStrategy)] = &[
    (
        // The running executable sits inside `App.app/Contents/...`.
        "darwin",
        PlatformStrategy {
            install_dir_ascent: 4,
            executable_suffix: "",
        },
    ),
    (
        "linux",
        PlatformStrategy {
            install_dir_ascent: 0,
            executable_suffix: "",
        },
    ),
    (
        "win32",
        PlatformStrategy {
            install_dir_ascent: 0,
            executable_suffix: ".exe",
        },
    ),
];

impl PlatformStrategy {
    /// Resolve the strategy for a feed platform identifier.
    ///
    /// Any identifier starting with `win` is treated as Windows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for platforms the updater does not ship for.
    pub fn for_platform(platform: &str) -> Result<Self> {
        let key = if platform.starts_with("win") {
            "win32"
        } else {
            platform
        };
        PLATFORM_STRATEGIES
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, strategy)| *strategy)
            .ok_or_else(|| Error::Config(format!("unsupported platform '{platform}'")))
    }

    /// File name of the updater binary for an architecture.
    #[must_use]
    pub fn updater_binary_name(&self, arch: &str) -> String {
        format!("{UPDATER_BINARY_PREFIX}-{arch}{}", self.executable_suffix)
    }

    /// Installation directory handed to the updater.
    #[must_use]
    pub fn install_dir(&self, base: &Path) -> PathBuf {
        let mut dir = base;
        for _ in 0..self.install_dir_ascent {
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        dir.to_path_buf()
    }
}

/// Details of a launched updater process.
#[derive(Debug, Clone)]
pub struct LaunchedUpdater {
    /// Process id of the detached updater.
    pub pid: u32,
    /// Staged updater binary that was started.
    pub binary: PathBuf,
    /// Installation directory passed to the updater.
    pub install_dir: PathBuf,
}

/// Stages and launches the platform updater.
#[derive(Debug, Clone)]
pub struct RestartLauncher {
    bundled_dir: PathBuf,
    strategy: PlatformStrategy,
    install_base: PathBuf,
}

impl RestartLauncher {
    /// Create a launcher.
    ///
    /// `bundled_dir` is the platform subfolder holding updater binaries and
    /// `install_base` the directory the install-dir ascent starts from.
    #[must_use]
    pub fn new(bundled_dir: PathBuf, strategy: PlatformStrategy, install_base: PathBuf) -> Self {
        Self {
            bundled_dir,
            strategy,
            install_base,
        }
    }

    /// Platform strategy in use.
    #[must_use]
    pub fn strategy(&self) -> PlatformStrategy {
        self.strategy
    }

    /// Copy the updater into `temp_folder`, make it executable and start it
    /// detached, pointed at `final_artifact`.
    ///
    /// Does not wait for the updater.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filesystem`] if the copy, permission change or spawn
    /// fails.
    pub async fn prepare_restart(
        &self,
        updater_binary_name: &str,
        temp_folder: &Path,
        final_artifact: &Path,
        executable_name: &str,
    ) -> Result<LaunchedUpdater> {
        let binary = self.stage_updater(updater_binary_name, temp_folder).await?;
        let install_dir = self.strategy.install_dir(&self.install_base);

        let args = updater_args(
            final_artifact,
            &install_dir,
            executable_name,
            std::process::id(),
        );
        debug!("Updater arguments: {args:?}");

        let pid = spawn_detached(&binary, &args, temp_folder)?;
        info!("Spawned updater {} (pid {pid})", binary.display());

        Ok(LaunchedUpdater {
            pid,
            binary,
            install_dir,
        })
    }

    /// Copy the bundled updater into `temp_folder` with owner-executable
    /// permissions, replacing any earlier copy.
    ///
    /// On Unix the copy is created with mode `0o755`, so the process umask
    /// applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filesystem`] if the source cannot be read or the copy
    /// cannot be written.
    pub async fn stage_updater(
        &self,
        updater_binary_name: &str,
        temp_folder: &Path,
    ) -> Result<PathBuf> {
        let source = self.bundled_dir.join(updater_binary_name);
        let dest = temp_folder.join(updater_binary_name);
        info!(
            "Copying updater {} to {}",
            source.display(),
            temp_folder.display()
        );

        match tokio::fs::remove_file(&dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::filesystem(&dest, e)),
        }

        copy_executable(&source, &dest).await?;
        Ok(dest)
    }
}

#[cfg(unix)]
async fn copy_executable(source: &Path, dest: &Path) -> Result<()> {
    let mut reader = tokio::fs::File::open(source)
        .await
        .map_err(|e| Error::filesystem(source, e))?;
    let mut writer = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o755)
        .open(dest)
        .await
        .map_err(|e| Error::filesystem(dest, e))?;
    tokio::io::copy(&mut reader, &mut writer)
        .await
        .map_err(|e| Error::filesystem(dest, e))?;
    writer
        .sync_all()
        .await
        .map_err(|e| Error::filesystem(dest, e))?;
    Ok(())
}

#[cfg(not(unix))]
async fn copy_executable(source: &Path, dest: &Path) -> Result<()> {
    tokio::fs::copy(source, dest)
        .await
        .map_err(|e| Error::filesystem(source, e))?;
    Ok(())
}

fn updater_args(
    final_artifact: &Path,
    install_dir: &Path,
    executable_name: &str,
    pid: u32,
) -> Vec<String> {
    vec![
        "--bundle".to_string(),
        final_artifact.display().to_string(),
        "--inst-dir".to_string(),
        install_dir.display().to_string(),
        "--app-name".to_string(),
        executable_name.to_string(),
        "--wait".to_string(),
        pid.to_string(),
    ]
}

/// Start `binary` in its own process group with no standard streams and
/// release the handle without waiting.
fn spawn_detached(binary: &Path, args: &[String], cwd: &Path) -> Result<u32> {
    let mut command = Command::new(binary);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // A new process group keeps the updater alive when the application's
    // group is signalled on exit. It stays in the caller's session: `setsid`
    // needs `pre_exec`, which is unsafe and forbidden in this crate.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = command
        .spawn()
        .map_err(|e| Error::filesystem(binary, e))?;
    let pid = child.id();
    // Dropping the handle neither kills nor waits on the child.
    drop(child);
    Ok(pid)
}
