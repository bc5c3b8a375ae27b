//! Run configuration.
//!
//! All run-time choices are fixed in a [`DiagConfig`] before the
//! pipeline starts; no stage reads ambient environment state.

use std::path::PathBuf;

/// Endpoint used when the operator supplies none.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:35997";

/// Systemd unit checked by default.
pub const DEFAULT_SERVICE: &str = "znnd";

/// Environment variable holding the bundle passphrase by default.
pub const DEFAULT_PASSPHRASE_VAR: &str = "ZNN_DIAG_PASSPHRASE";

const REPORT_FILE: &str = "znnd-diag-report.txt";
const STAGING_DIR: &str = "diag_logs";
const ARCHIVE_FILE: &str = "znnd-diag-report.tar.gz";

/// Where delivery credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// No source configured; delivery is skipped.
    None,
    /// gpg-encrypted KEY=VALUE bundle on disk.
    File(PathBuf),
    /// Plaintext environment variables.
    Env,
}

/// Explicit configuration for one diagnostic pass.
#[derive(Debug, Clone)]
pub struct DiagConfig {
    /// Normalized RPC endpoint URL.
    pub endpoint: String,
    /// Systemd unit of the node.
    pub service: String,
    /// Directory receiving the report and archive.
    pub out_dir: PathBuf,
    /// Install missing packages without asking.
    pub auto_install: bool,
    pub credential_source: CredentialSource,
    /// Name of the environment variable holding the bundle passphrase.
    pub passphrase_var: String,
}

impl DiagConfig {
    pub fn report_path(&self) -> PathBuf {
        self.out_dir.join(REPORT_FILE)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.out_dir.join(STAGING_DIR)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.out_dir.join(ARCHIVE_FILE)
    }
}

/// Normalize an operator-supplied endpoint into a schemed URL.
///
/// Empty input falls back to the local node default; a bare host:port
/// gets an `http://` prefix; anything already schemed is used verbatim.
pub fn normalize_endpoint(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return DEFAULT_ENDPOINT.to_string();
    }
    if trimmed.contains("://") {
        return trimmed.to_string();
    }
    format!("http://{trimmed}")
}
