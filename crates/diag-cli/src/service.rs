//! Service health check and liveness marker scan.

use crate::commands::NodeCommands;
use crate::report::ReportBuffer;
use crate::runner::CommandRunner;
use regex::Regex;
use std::sync::LazyLock;

/// Journal lines shown regardless of the unit's active state.
pub const JOURNAL_TAIL_LINES: u32 = 100;

/// Marker the node logs for each produced momentum; its presence in the
/// journal is the liveness signal.
static MOMENTUM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)momentum").unwrap());

/// Append service status, journal tail, and the last momentum marker.
pub async fn run(runner: &dyn CommandRunner, service: &str, report: &mut ReportBuffer) {
    let commands = NodeCommands::new();

    report.section(&format!("Service status: {service}"));
    let Some(cmd) = commands.service_is_active(service) else {
        report.warn(format!("invalid service name: {service}"));
        return;
    };
    match runner.run(&cmd).await {
        Ok(output) => {
            let state = output.stdout.trim();
            let state = if state.is_empty() { "unknown" } else { state };
            report.line(format!("{service} active: {} ({state})", state == "active"));
        }
        Err(e) => report.warn(format!("could not query {service} status: {e}")),
    }

    // Tail is printed whether or not the unit is active.
    report.section(&format!("Last {JOURNAL_TAIL_LINES} journal lines: {service}"));
    if let Some(cmd) = commands.journal_tail(service, JOURNAL_TAIL_LINES) {
        match runner.run(&cmd).await {
            Ok(output) if !output.tool_missing() => report.block(&output.stdout),
            _ => report.warn(format!("journal tail unavailable for {service}")),
        }
    }

    report.section("Last momentum");
    if let Some(cmd) = commands.journal_full(service) {
        match runner.run(&cmd).await {
            Ok(output) if !output.tool_missing() => {
                match last_momentum_line(&output.stdout) {
                    Some(line) => report.line(line.to_string()),
                    None => report.line("no momentum entry found in journal"),
                }
            }
            _ => report.warn(format!("journal history unavailable for {service}")),
        }
    }
}

/// Most recent journal line containing the momentum marker.
///
/// Last-match semantics: the scan walks the journal backwards.
pub fn last_momentum_line(journal: &str) -> Option<&str> {
    journal
        .lines()
        .rev()
        .find(|line| MOMENTUM_PATTERN.is_match(line))
}
