//! Log aggregation, compression and verified cleanup.
//!
//! The staged report and log files are removed only after the archive
//! has been re-opened and every entry's checksum matched its source.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};
use tracing::info;
use znn_diag_common::{hash, Error, Result};

/// Node log files gathered into the archive when present.
pub const NODE_LOG_PATHS: [&str; 2] = ["/root/.znn/log/zenon.log", "/root/.znn/log/error.log"];

/// Result of the aggregation stage.
#[derive(Debug)]
pub struct ArchiveSummary {
    pub archive_path: PathBuf,
    /// Entry names the archive was verified to contain.
    pub entries: Vec<String>,
    /// Configured log files that were absent at collection time.
    pub missing: Vec<String>,
}

/// Stage the report and any present log files, compress them, verify
/// the archive, then remove the staged constituents.
pub fn collect_and_archive(
    report_path: &Path,
    log_paths: &[&str],
    staging_dir: &Path,
    archive_path: &Path,
) -> Result<ArchiveSummary> {
    fs::create_dir_all(staging_dir)?;

    let mut staged: Vec<PathBuf> = Vec::new();
    let mut missing: Vec<String> = Vec::new();

    let staged_report = staging_dir.join(file_name(report_path)?);
    fs::copy(report_path, &staged_report)?;
    staged.push(staged_report);

    for raw in log_paths {
        let source = Path::new(raw);
        if source.is_file() {
            let dest = staging_dir.join(file_name(source)?);
            fs::copy(source, &dest)?;
            staged.push(dest);
        } else {
            missing.push((*raw).to_string());
        }
    }

    write_archive(&staged, archive_path)?;
    verify_archive(&staged, archive_path)?;

    // The archive checked out; the constituents can go.
    let mut entries = Vec::new();
    for path in &staged {
        entries.push(file_name(path)?);
        fs::remove_file(path)?;
    }
    fs::remove_dir(staging_dir).ok();
    fs::remove_file(report_path)?;

    info!("Archive written to {}", archive_path.display());
    Ok(ArchiveSummary {
        archive_path: archive_path.to_path_buf(),
        entries,
        missing,
    })
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Archive(format!("invalid file name: {}", path.display())))
}

fn write_archive(staged: &[PathBuf], archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    for path in staged {
        let mut source = File::open(path)?;
        builder
            .append_file(file_name(path)?, &mut source)
            .map_err(|e| Error::Archive(e.to_string()))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| Error::Archive(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Archive(e.to_string()))?;
    Ok(())
}

/// Re-open the archive and compare its entries against the staged files.
fn verify_archive(staged: &[PathBuf], archive_path: &Path) -> Result<()> {
    let mut expected: BTreeMap<String, String> = BTreeMap::new();
    for path in staged {
        expected.insert(file_name(path)?, hash::sha256_file(path)?);
    }

    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut seen = 0usize;

    for entry in archive.entries().map_err(|e| Error::Archive(e.to_string()))? {
        let mut entry = entry.map_err(|e| Error::Archive(e.to_string()))?;
        let name = entry
            .path()
            .map_err(|e| Error::Archive(e.to_string()))?
            .to_string_lossy()
            .to_string();

        let Some(expected_hash) = expected.get(&name) else {
            return Err(Error::Archive(format!("unexpected archive entry: {name}")));
        };
        let actual = hash::sha256_reader(&mut entry)?;
        if &actual != expected_hash {
            return Err(Error::Archive(format!("checksum mismatch for {name}")));
        }
        seen += 1;
    }

    if seen != expected.len() {
        return Err(Error::Archive(format!(
            "archive holds {seen} of {} expected files",
            expected.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry_names(archive_path: &Path) -> Vec<String> {
        let file = File::open(archive_path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_archive_contains_report_and_present_logs_only() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("znnd-diag-report.txt");
        fs::write(&report, "report body\n").unwrap();
        let present_log = dir.path().join("zenon.log");
        fs::write(&present_log, "log body\n").unwrap();
        let absent_log = dir.path().join("error.log");

        let staging = dir.path().join("diag_logs");
        let archive_path = dir.path().join("znnd-diag-report.tar.gz");
        let logs = [
            present_log.to_str().unwrap().to_string(),
            absent_log.to_str().unwrap().to_string(),
        ];
        let log_refs: Vec<&str> = logs.iter().map(String::as_str).collect();

        let summary =
            collect_and_archive(&report, &log_refs, &staging, &archive_path).unwrap();

        assert_eq!(
            summary.entries,
            vec!["znnd-diag-report.txt".to_string(), "zenon.log".to_string()]
        );
        assert_eq!(summary.missing, vec![absent_log.to_str().unwrap().to_string()]);
        assert_eq!(entry_names(&archive_path).len(), 2);
    }

    #[test]
    fn test_constituents_removed_after_verification() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("znnd-diag-report.txt");
        fs::write(&report, "report body\n").unwrap();

        let staging = dir.path().join("diag_logs");
        let archive_path = dir.path().join("znnd-diag-report.tar.gz");

        collect_and_archive(&report, &[], &staging, &archive_path).unwrap();

        assert!(archive_path.is_file());
        assert!(!report.exists(), "working report removed after archiving");
        assert!(!staging.exists(), "staging dir removed after archiving");
    }

    #[test]
    fn test_archive_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("znnd-diag-report.txt");
        fs::write(&report, "exact report text\n").unwrap();

        let staging = dir.path().join("diag_logs");
        let archive_path = dir.path().join("znnd-diag-report.tar.gz");
        collect_and_archive(&report, &[], &staging, &archive_path).unwrap();

        let file = File::open(&archive_path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, "exact report text\n");
    }

    #[test]
    fn test_verification_failure_keeps_constituents() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("znnd-diag-report.txt");
        fs::write(&staged, "original\n").unwrap();
        let archive_path = dir.path().join("out.tar.gz");

        write_archive(&[staged.clone()], &archive_path).unwrap();

        // Staged file changes after the archive was written.
        fs::write(&staged, "tampered\n").unwrap();

        let result = verify_archive(&[staged.clone()], &archive_path);
        assert!(matches!(result, Err(Error::Archive(_))));
        assert!(staged.is_file(), "nothing deleted on verification failure");
    }

    #[test]
    fn test_verify_detects_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "a\n").unwrap();
        fs::write(&b, "b\n").unwrap();
        let archive_path = dir.path().join("out.tar.gz");

        // Archive only carries one of the two expected files.
        write_archive(&[a.clone()], &archive_path).unwrap();

        let result = verify_archive(&[a, b], &archive_path);
        assert!(matches!(result, Err(Error::Archive(_))));
    }
}
