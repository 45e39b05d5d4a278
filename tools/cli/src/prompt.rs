//! Interactive password entry.

use std::io;

use anyhow::{Context, Result};

use aesgcm_common::Password;

/// Something that can read a secret line without echoing it.
pub trait PasswordSource {
    /// Show `prompt` and read one line with the line ending removed.
    ///
    /// Fails if no interactive terminal is available.
    fn read_secret(&mut self, prompt: &str) -> io::Result<Password>;
}

/// Reads from the controlling terminal with echo disabled.
pub struct TerminalPrompt;

impl PasswordSource for TerminalPrompt {
    fn read_secret(&mut self, prompt: &str) -> io::Result<Password> {
        let line = rpassword::prompt_password(prompt)?;
        Ok(Password::from(line).trim_line_ending())
    }
}

/// Ask for a password twice until both entries match.
///
/// Empty entries are ignored and asked for again.
pub fn ask_for_password<S: PasswordSource + ?Sized>(source: &mut S) -> Result<Password> {
    loop {
        let password = loop {
            let entry = source
                .read_secret("Password: ")
                .context("Failed to read password")?;
            if !entry.is_empty() {
                break entry;
            }
        };

        let verify = source
            .read_secret("Verify: ")
            .context("Failed to read password confirmation")?;

        if password == verify {
            return Ok(password);
        }

        eprintln!("Passwords do not match");
    }
}
