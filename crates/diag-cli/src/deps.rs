//! Dependency resolution.
//!
//! Checks the executables the pipeline shells out to and, only with
//! explicit consent, installs the packages that provide missing ones.

use crate::config::{CredentialSource, DiagConfig};
use crate::runner::CommandRunner;
use async_trait::async_trait;
use tracing::{info, warn};
use znn_diag_common::{Error, Result};

/// Maps each required executable to the package that provides it.
///
/// `gpg` is only required when a credential bundle file is configured.
pub fn required_tools(config: &DiagConfig) -> Vec<(&'static str, &'static str)> {
    let mut tools = vec![
        ("systemctl", "systemd"),
        ("journalctl", "systemd"),
        ("ss", "iproute2"),
    ];
    if matches!(config.credential_source, CredentialSource::File(_)) {
        tools.push(("gpg", "gnupg"));
    }
    tools
}

/// Subset of tools not found on the search path.
pub fn missing_tools<F>(
    tools: &[(&'static str, &'static str)],
    available: F,
) -> Vec<(&'static str, &'static str)>
where
    F: Fn(&str) -> bool,
{
    tools
        .iter()
        .copied()
        .filter(|(binary, _)| !available(binary))
        .collect()
}

/// Package manager used to install missing packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    /// First match among the well-known managers.
    pub fn detect() -> Option<Self> {
        if which::which("apt-get").is_ok() {
            Some(PackageManager::Apt)
        } else if which::which("dnf").is_ok() {
            Some(PackageManager::Dnf)
        } else if which::which("yum").is_ok() {
            Some(PackageManager::Yum)
        } else {
            None
        }
    }

    pub fn install_command(&self, packages: &[String]) -> String {
        let list = packages.join(" ");
        match self {
            PackageManager::Apt => format!("apt-get install -y {list}"),
            PackageManager::Dnf => format!("dnf install -y {list}"),
            PackageManager::Yum => format!("yum install -y {list}"),
        }
    }
}

/// Capability for mutating host package state.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, packages: &[String]) -> Result<()>;
}

/// Installs through the detected package manager.
pub struct SystemInstaller<'a> {
    runner: &'a dyn CommandRunner,
    manager: PackageManager,
}

impl<'a> SystemInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner, manager: PackageManager) -> Self {
        Self { runner, manager }
    }
}

#[async_trait]
impl PackageInstaller for SystemInstaller<'_> {
    async fn install(&self, packages: &[String]) -> Result<()> {
        let cmd = self.manager.install_command(packages);
        info!("Installing packages: {}", packages.join(", "));

        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::CommandExecution {
                cmd,
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Resolve a missing-tool set.
///
/// Empty set is a no-op. A non-empty set is installed only when
/// `auto_install` was explicitly given and a manager was detected;
/// anything else is fatal and names the missing packages.
pub async fn resolve_missing(
    missing: &[(&'static str, &'static str)],
    auto_install: bool,
    installer: Option<&dyn PackageInstaller>,
) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }

    let packages = package_set(missing);
    if !auto_install {
        return Err(Error::MissingPackages(packages));
    }

    match installer {
        Some(installer) => installer.install(&packages).await,
        None => Err(Error::MissingPackages(packages)),
    }
}

/// Verify required tools, installing with consent. Idempotent when
/// nothing is missing.
pub async fn check(config: &DiagConfig, runner: &dyn CommandRunner) -> Result<()> {
    let tools = required_tools(config);
    let on_path = |binary: &str| which::which(binary).is_ok();

    let missing = missing_tools(&tools, on_path);
    if missing.is_empty() {
        return Ok(());
    }

    warn!(
        "Missing tools: {}",
        missing
            .iter()
            .map(|(binary, _)| *binary)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let installer = PackageManager::detect().map(|manager| SystemInstaller::new(runner, manager));
    resolve_missing(
        &missing,
        config.auto_install,
        installer.as_ref().map(|i| i as &dyn PackageInstaller),
    )
    .await?;

    // Packages must actually provide the tools they claim to.
    let still_missing = missing_tools(&tools, on_path);
    if !still_missing.is_empty() {
        return Err(Error::MissingPackages(package_set(&still_missing)));
    }
    Ok(())
}

fn package_set(missing: &[(&'static str, &'static str)]) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    for (_, package) in missing {
        if !packages.iter().any(|p| p == package) {
            packages.push((*package).to_string());
        }
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeInstaller {
        installed: Mutex<Vec<Vec<String>>>,
    }

    impl FakeInstaller {
        fn new() -> Self {
            Self {
                installed: Mutex::new(Vec::new()),
            }
        }

        fn install_calls(&self) -> Vec<Vec<String>> {
            self.installed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PackageInstaller for FakeInstaller {
        async fn install(&self, packages: &[String]) -> Result<()> {
            self.installed.lock().unwrap().push(packages.to_vec());
            Ok(())
        }
    }

    const MISSING: &[(&str, &str)] = &[("journalctl", "systemd"), ("ss", "iproute2")];

    #[tokio::test]
    async fn test_never_installs_without_confirmation() {
        let installer = FakeInstaller::new();

        let result = resolve_missing(MISSING, false, Some(&installer)).await;

        match result {
            Err(Error::MissingPackages(packages)) => {
                assert_eq!(packages, vec!["systemd", "iproute2"]);
            }
            other => panic!("expected MissingPackages, got {other:?}"),
        }
        assert!(installer.install_calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_missing_set_is_a_noop() {
        let installer = FakeInstaller::new();

        resolve_missing(&[], true, Some(&installer)).await.unwrap();
        resolve_missing(&[], false, Some(&installer)).await.unwrap();

        assert!(installer.install_calls().is_empty());
    }

    #[tokio::test]
    async fn test_installs_deduplicated_packages_with_consent() {
        let installer = FakeInstaller::new();
        let missing = &[
            ("systemctl", "systemd"),
            ("journalctl", "systemd"),
            ("gpg", "gnupg"),
        ];

        resolve_missing(missing, true, Some(&installer)).await.unwrap();

        assert_eq!(
            installer.install_calls(),
            vec![vec!["systemd".to_string(), "gnupg".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_no_manager_detected_is_fatal() {
        let result = resolve_missing(MISSING, true, None).await;
        assert!(matches!(result, Err(Error::MissingPackages(_))));
    }

    #[test]
    fn test_missing_tools_filters_by_lookup() {
        let tools = [("systemctl", "systemd"), ("ss", "iproute2")];
        let missing = missing_tools(&tools, |binary| binary == "systemctl");
        assert_eq!(missing, vec![("ss", "iproute2")]);
    }

    #[test]
    fn test_install_command_per_manager() {
        let packages = vec!["systemd".to_string(), "gnupg".to_string()];
        assert_eq!(
            PackageManager::Apt.install_command(&packages),
            "apt-get install -y systemd gnupg"
        );
        assert_eq!(
            PackageManager::Yum.install_command(&packages),
            "yum install -y systemd gnupg"
        );
    }

    #[test]
    fn test_gpg_required_only_with_bundle_file() {
        use crate::config::{CredentialSource, DiagConfig, DEFAULT_ENDPOINT};
        use std::path::PathBuf;

        let mut config = DiagConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            service: "znnd".to_string(),
            out_dir: PathBuf::from("."),
            auto_install: false,
            credential_source: CredentialSource::None,
            passphrase_var: "X".to_string(),
        };
        assert!(!required_tools(&config).iter().any(|(b, _)| *b == "gpg"));

        config.credential_source = CredentialSource::File(PathBuf::from("/root/creds.gpg"));
        assert!(required_tools(&config).iter().any(|(b, _)| *b == "gpg"));
    }
}
