//! Allowlisted diagnostic commands.
//!
//! Every command the pipeline can run on the host is defined here.
//! This is the single source of truth for what the tool executes.

use std::path::Path;

/// Well-known znnd ports: p2p, HTTP RPC, websocket RPC.
pub const NODE_PORTS: [u16; 3] = [35995, 35997, 35998];

/// Fixed command set for a Linux znnd host.
pub struct NodeCommands;

impl NodeCommands {
    pub fn new() -> Self {
        Self
    }

    pub fn os_release(&self) -> &str {
        "cat /etc/os-release 2>/dev/null || cat /etc/redhat-release 2>/dev/null || cat /etc/debian_version 2>/dev/null"
    }

    /// Listening sockets filtered to the node's well-known ports.
    pub fn listening_ports(&self) -> String {
        format!("ss -lntup 2>/dev/null | grep -E '{}'", port_filter())
    }

    /// Fallback for hosts without iproute2.
    pub fn listening_ports_fallback(&self) -> String {
        format!("netstat -lntup 2>/dev/null | grep -E '{}'", port_filter())
    }

    pub fn running_services(&self) -> &str {
        "systemctl list-units --type=service --state=running --no-pager --no-legend"
    }

    pub fn firewall_status(&self) -> &str {
        "ufw status verbose 2>/dev/null"
    }

    pub fn disk_usage(&self) -> &str {
        "df -h"
    }

    pub fn service_is_active(&self, unit: &str) -> Option<String> {
        if !is_safe_unit_name(unit) {
            return None;
        }
        Some(format!("systemctl is-active {unit}"))
    }

    pub fn journal_tail(&self, unit: &str, lines: u32) -> Option<String> {
        if !is_safe_unit_name(unit) {
            return None;
        }
        Some(format!("journalctl -u {unit} -n {lines} --no-pager"))
    }

    /// Full journal history for the unit, oldest first.
    pub fn journal_full(&self, unit: &str) -> Option<String> {
        if !is_safe_unit_name(unit) {
            return None;
        }
        Some(format!("journalctl -u {unit} --no-pager"))
    }

    /// Decrypt a credential bundle; the passphrase arrives on stdin.
    pub fn gpg_decrypt(&self, bundle: &Path) -> Option<String> {
        let path = bundle.to_str()?;
        if !is_safe_path(path) {
            return None;
        }
        Some(format!(
            "gpg --batch --quiet --pinentry-mode loopback --passphrase-fd 0 --decrypt '{path}'"
        ))
    }
}

impl Default for NodeCommands {
    fn default() -> Self {
        Self::new()
    }
}

fn port_filter() -> String {
    NODE_PORTS
        .iter()
        .map(|p| format!(":{p}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Validate that a systemd unit name is safe (no injection).
fn is_safe_unit_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '@')
        && !name.is_empty()
        && name.len() < 256
}

/// Validate that a path is safe to interpolate (no injection).
fn is_safe_path(path: &str) -> bool {
    !path.contains(';')
        && !path.contains('|')
        && !path.contains('&')
        && !path.contains('$')
        && !path.contains('`')
        && !path.contains('\'')
        && !path.contains('\n')
        && !path.contains('\r')
        && !path.is_empty()
        && path.len() < 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_safe_unit_name() {
        assert!(is_safe_unit_name("znnd"));
        assert!(is_safe_unit_name("znnd.service"));
        assert!(is_safe_unit_name("node@mainnet"));

        assert!(!is_safe_unit_name("znnd; rm -rf /"));
        assert!(!is_safe_unit_name("znnd | cat /etc/passwd"));
        assert!(!is_safe_unit_name(""));
    }

    #[test]
    fn test_unit_commands_reject_unsafe_names() {
        let cmds = NodeCommands::new();

        assert!(cmds.service_is_active("znnd").is_some());
        assert!(cmds.journal_tail("znnd", 100).is_some());
        assert!(cmds.service_is_active("znnd; reboot").is_none());
        assert!(cmds.journal_full("$(id)").is_none());
    }

    #[test]
    fn test_port_filter_covers_all_node_ports() {
        let cmd = NodeCommands::new().listening_ports();
        for port in NODE_PORTS {
            assert!(cmd.contains(&format!(":{port}")), "missing {port} in {cmd}");
        }
    }

    #[test]
    fn test_gpg_decrypt_rejects_injection() {
        let cmds = NodeCommands::new();

        assert!(cmds.gpg_decrypt(&PathBuf::from("/root/creds.gpg")).is_some());
        assert!(cmds.gpg_decrypt(&PathBuf::from("/x'; reboot; '")).is_none());
        assert!(cmds.gpg_decrypt(&PathBuf::from("/x | cat")).is_none());
    }

    #[test]
    fn test_journal_tail_includes_line_count() {
        let cmd = NodeCommands::new().journal_tail("znnd", 100).unwrap();
        assert!(cmd.contains("-n 100"));
        assert!(cmd.contains("--no-pager"));
    }
}
