//! System inspection stage.
//!
//! A fixed, ordered list of read-only probes appended raw to the
//! report. Output is never parsed; individual failures become warnings.

use crate::commands::NodeCommands;
use crate::report::ReportBuffer;
use crate::runner::CommandRunner;

/// One labeled probe, optionally with a fallback command.
struct Probe {
    label: &'static str,
    command: String,
    fallback: Option<String>,
}

/// Append the inspection sections to the report. Never fails the run.
pub async fn run(runner: &dyn CommandRunner, report: &mut ReportBuffer) {
    let commands = NodeCommands::new();

    let probes = [
        Probe {
            label: "OS release",
            command: commands.os_release().to_string(),
            fallback: None,
        },
        Probe {
            label: "Listening node ports",
            command: commands.listening_ports(),
            fallback: Some(commands.listening_ports_fallback()),
        },
        Probe {
            label: "Running services",
            command: commands.running_services().to_string(),
            fallback: None,
        },
        Probe {
            label: "Firewall status",
            command: commands.firewall_status().to_string(),
            fallback: None,
        },
        Probe {
            label: "Disk usage",
            command: commands.disk_usage().to_string(),
            fallback: None,
        },
    ];

    for probe in probes {
        report.section(probe.label);
        match capture(runner, &probe).await {
            Some(output) if !output.trim().is_empty() => report.block(&output),
            Some(_) => report.line("(no output)"),
            None => report.warn(format!("{} could not be collected", probe.label)),
        }
    }
}

/// Run the probe, falling back when the tool itself is absent.
async fn capture(runner: &dyn CommandRunner, probe: &Probe) -> Option<String> {
    for command in std::iter::once(&probe.command).chain(probe.fallback.iter()) {
        match runner.run(command).await {
            Ok(output) if !output.tool_missing() => return Some(output.stdout),
            _ => continue,
        }
    }
    None
}
