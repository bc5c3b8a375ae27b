//! Linear diagnostic pipeline.
//!
//! Stages run strictly top to bottom. Bootstrap and dependency failures
//! abort the run; everything after that is soft and recorded.

use crate::archive::{self, NODE_LOG_PATHS};
use crate::config::DiagConfig;
use crate::credentials;
use crate::deliver::{Delivery, DeliveryStatus};
use crate::deps;
use crate::inspect;
use crate::report::ReportBuffer;
use crate::rpc::RpcProbe;
use crate::runner::{CommandRunner, LocalRunner};
use crate::service;
use std::fs;
use tracing::{info, warn};
use znn_diag_common::{Result, Timestamp};

/// Run one diagnostic pass on the local host.
pub async fn run(config: &DiagConfig) -> Result<()> {
    let runner = LocalRunner::new();
    run_with(config, &runner).await
}

/// Run the pipeline against an arbitrary command runner.
pub async fn run_with(config: &DiagConfig, runner: &dyn CommandRunner) -> Result<()> {
    let started = Timestamp::now();

    info!("Preparing output directory {}", config.out_dir.display());
    clear_previous_outputs(config)?;
    let credentials =
        credentials::resolve(&config.credential_source, &config.passphrase_var, runner).await?;

    info!("Checking required tools");
    deps::check(config, runner).await?;

    let mut report = ReportBuffer::new();
    report.line("znnd node diagnostic report");
    report.line(format!("generated: {started}"));
    report.line(format!("endpoint: {}", config.endpoint));

    info!("Inspecting system");
    inspect::run(runner, &mut report).await;

    info!("Checking service health: {}", config.service);
    service::run(runner, &config.service, &mut report).await;

    info!("Probing RPC endpoint {}", config.endpoint);
    let probe = RpcProbe::new(config.endpoint.clone())?;
    probe.run(&mut report).await;

    info!("Aggregating logs");
    let report_path = config.report_path();
    report.persist(&report_path)?;

    let summary = match archive::collect_and_archive(
        &report_path,
        &NODE_LOG_PATHS,
        &config.staging_dir(),
        &config.archive_path(),
    ) {
        Ok(summary) => summary,
        Err(e) => {
            // Soft by design: the report stays on disk for the operator.
            warn!(
                "archive creation failed: {e}; report kept at {}",
                report_path.display()
            );
            return Ok(());
        }
    };
    for path in &summary.missing {
        warn!("log file not found: {path}");
    }

    match credentials {
        Some(credentials) => {
            info!("Uploading report archive");
            match Delivery::new()?.send(&credentials, &summary.archive_path).await {
                Ok(DeliveryStatus::Delivered) => info!("Delivery confirmed"),
                Ok(DeliveryStatus::Rejected) => warn!(
                    "Upload rejected; archive kept at {}",
                    summary.archive_path.display()
                ),
                Err(e) => warn!(
                    "Upload failed: {e}; archive kept at {}",
                    summary.archive_path.display()
                ),
            }
            // credentials dropped and zeroed here
        }
        None => info!(
            "No delivery credentials configured; archive kept at {}",
            summary.archive_path.display()
        ),
    }

    info!(
        "Diagnostic pass finished in {}s",
        started.elapsed().num_seconds()
    );
    Ok(())
}

/// Create the output directory and remove stale outputs from a
/// previous run.
fn clear_previous_outputs(config: &DiagConfig) -> Result<()> {
    fs::create_dir_all(&config.out_dir)?;

    let report = config.report_path();
    if report.exists() {
        fs::remove_file(&report)?;
    }
    let staging = config.staging_dir();
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    let archive = config.archive_path();
    if archive.exists() {
        fs::remove_file(&archive)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialSource, DEFAULT_PASSPHRASE_VAR, DEFAULT_SERVICE};

    fn test_config(out_dir: std::path::PathBuf) -> DiagConfig {
        DiagConfig {
            // Nothing listens on port 1; RPC failures are expected and soft.
            endpoint: "http://127.0.0.1:1".to_string(),
            service: DEFAULT_SERVICE.to_string(),
            out_dir,
            auto_install: false,
            credential_source: CredentialSource::None,
            passphrase_var: DEFAULT_PASSPHRASE_VAR.to_string(),
        }
    }

    #[test]
    fn test_clear_previous_outputs_removes_stale_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());

        fs::write(config.report_path(), "old").unwrap();
        fs::create_dir_all(config.staging_dir()).unwrap();
        fs::write(config.staging_dir().join("stale.log"), "old").unwrap();
        fs::write(config.archive_path(), "old").unwrap();

        clear_previous_outputs(&config).unwrap();

        assert!(!config.report_path().exists());
        assert!(!config.staging_dir().exists());
        assert!(!config.archive_path().exists());
    }

    #[test]
    fn test_clear_previous_outputs_is_a_noop_on_clean_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        clear_previous_outputs(&config).unwrap();
    }
}
