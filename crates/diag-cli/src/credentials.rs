//! Delivery credential bundle.
//!
//! Credentials are resolved once during bootstrap, handed by reference
//! to the delivery stage only, and zeroed on drop. They never enter the
//! process environment.

use crate::commands::NodeCommands;
use crate::config::CredentialSource;
use crate::runner::CommandRunner;
use std::path::Path;
use zeroize::Zeroizing;
use znn_diag_common::{Error, Result};

/// Keys expected inside a decrypted bundle.
pub const BOT_TOKEN_KEY: &str = "BOT_TOKEN";
pub const CHAT_ID_KEY: &str = "CHAT_ID";

/// Environment variables read when the source is [`CredentialSource::Env`].
pub const BOT_TOKEN_ENV: &str = "ZNN_DIAG_BOT_TOKEN";
pub const CHAT_ID_ENV: &str = "ZNN_DIAG_CHAT_ID";

/// Bot token and chat id for report delivery.
pub struct Credentials {
    pub bot_token: Zeroizing<String>,
    pub chat_id: Zeroizing<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token: Zeroizing::new(bot_token),
            chat_id: Zeroizing::new(chat_id),
        }
    }

    /// Parse KEY=VALUE lines from a decrypted bundle.
    pub fn from_bundle_text(text: &str) -> Result<Self> {
        let mut bot_token = None;
        let mut chat_id = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    BOT_TOKEN_KEY => bot_token = Some(value.trim().to_string()),
                    CHAT_ID_KEY => chat_id = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        match (bot_token, chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Ok(Credentials::new(token, chat))
            }
            _ => Err(Error::Decryption(format!(
                "bundle is missing {BOT_TOKEN_KEY} or {CHAT_ID_KEY}"
            ))),
        }
    }
}

/// Resolve credentials from the configured source.
///
/// `Ok(None)` means delivery will be skipped; a configured but unusable
/// source is fatal.
pub async fn resolve(
    source: &CredentialSource,
    passphrase_var: &str,
    runner: &dyn CommandRunner,
) -> Result<Option<Credentials>> {
    match source {
        CredentialSource::None => Ok(None),
        CredentialSource::Env => {
            let bot_token = non_empty_var(BOT_TOKEN_ENV);
            let chat_id = non_empty_var(CHAT_ID_ENV);
            match (bot_token, chat_id) {
                (Some(token), Some(chat)) => Ok(Some(Credentials::new(token, chat))),
                _ => Err(Error::Config(format!(
                    "{BOT_TOKEN_ENV} and {CHAT_ID_ENV} must both be set"
                ))),
            }
        }
        CredentialSource::File(path) => decrypt_bundle(path, passphrase_var, runner)
            .await
            .map(Some),
    }
}

async fn decrypt_bundle(
    bundle: &Path,
    passphrase_var: &str,
    runner: &dyn CommandRunner,
) -> Result<Credentials> {
    if !bundle.is_file() {
        return Err(Error::Decryption(format!(
            "credential bundle not found: {}",
            bundle.display()
        )));
    }

    let passphrase = Zeroizing::new(std::env::var(passphrase_var).map_err(|_| {
        Error::Decryption(format!("passphrase variable {passphrase_var} is not set"))
    })?);

    let cmd = NodeCommands::new().gpg_decrypt(bundle).ok_or_else(|| {
        Error::Decryption(format!("unsafe bundle path: {}", bundle.display()))
    })?;

    let output = runner.run_with_stdin(&cmd, passphrase.as_bytes()).await?;
    if !output.success() {
        return Err(Error::Decryption(output.stderr.trim().to_string()));
    }

    let plaintext = Zeroizing::new(output.stdout);
    Credentials::from_bundle_text(&plaintext)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
