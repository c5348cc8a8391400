//! Masked terminal password entry.

use keepass_ansible_core::{Error, PasswordPrompt, Result};
use std::path::Path;

/// Prompts on the controlling terminal. Fails when there is none.
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt(&mut self, database: &Path) -> Result<String> {
        dialoguer::Password::new()
            .with_prompt(format!("Enter password for database {}", database.display()))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}
