//! Provisioner: install a discovered server and record it
//!
//! Installation runs through the external package manager, scoped to an
//! isolated install root. Failures surface as a [`ProvisionError`] to the
//! resolution engine, never as a panic, and never leave a half-written
//! directory: the directory is only appended to after the install succeeded.

use crate::directory::{DirectoryEntry, ServerDirectory};
use crate::models::ServerDescriptor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Installation of '{package}' failed: {reason}")]
    InstallFailed { package: String, reason: String },

    #[error("Installation of '{package}' timed out after {seconds}s")]
    Timeout { package: String, seconds: u64 },
}

/// Seam to the external package manager, so resolution tests can stub the
/// install step.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, package: &str, install_root: &Path) -> Result<(), ProvisionError>;
}

/// Shells out to `npm install <package> --prefix <root>`.
pub struct NpmInstaller {
    timeout: Duration,
}

impl NpmInstaller {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PackageInstaller for NpmInstaller {
    async fn install(&self, package: &str, install_root: &Path) -> Result<(), ProvisionError> {
        let fail = |reason: String| ProvisionError::InstallFailed {
            package: package.to_string(),
            reason,
        };

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("npm")
                .arg("install")
                .arg(package)
                .arg("--prefix")
                .arg(install_root)
                .output(),
        )
        .await
        .map_err(|_| ProvisionError::Timeout {
            package: package.to_string(),
            seconds: self.timeout.as_secs(),
        })?
        .map_err(|e| fail(format!("failed to spawn npm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("unknown error").trim();
            return Err(fail(format!(
                "npm exited with {}: {}",
                output.status, detail
            )));
        }
        Ok(())
    }
}

/// Installs a chosen server and durably records it in the server directory.
pub struct Provisioner {
    directory: Arc<ServerDirectory>,
    installer: Arc<dyn PackageInstaller>,
    install_root: PathBuf,
}

impl Provisioner {
    pub fn new(
        directory: Arc<ServerDirectory>,
        installer: Arc<dyn PackageInstaller>,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            directory,
            installer,
            install_root: install_root.into(),
        }
    }

    /// Idempotent: a server already present in the directory is a success
    /// with no side effect. A failed install leaves the directory unchanged.
    pub async fn install(&self, descriptor: &ServerDescriptor) -> Result<(), ProvisionError> {
        if self.directory.has(&descriptor.id).await {
            tracing::debug!("Server '{}' already installed, skipping", descriptor.id);
            return Ok(());
        }

        let package = descriptor.install_package();
        tracing::info!("Installing server '{}' (package '{}')", descriptor.id, package);
        self.installer.install(package, &self.install_root).await?;

        self.directory
            .append(&descriptor.id, DirectoryEntry::for_descriptor(descriptor))
            .await;
        Ok(())
    }
}
