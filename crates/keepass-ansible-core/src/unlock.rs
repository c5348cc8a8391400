//! Password handling for opening the database.
//!
//! Opening is a small state machine: a configured password is attempted
//! first, and every transient failure sends the machine back to prompting.
//! There is no retry limit; the loop ends when the store opens, the prompt
//! fails, or the open attempt fails in a way new credentials cannot fix.

use crate::database::{KeepassDatabase, OpenFailure};
use crate::error::{Error, Result};
use crate::vault::{reveal_password, VaultDecryptor};
use std::path::{Path, PathBuf};

/// Reads a password from the operator.
pub trait PasswordPrompt {
    /// Ask for the password of `database`. Input must be masked.
    fn prompt(&mut self, database: &Path) -> Result<String>;
}

/// States of the unlock machine.
#[derive(Debug)]
pub enum UnlockState<T> {
    AwaitingInput,
    Attempting(String),
    Opened(T),
    Failed(Error),
}

/// Drives [`UnlockState`] transitions for one database.
pub struct Unlocker<'a> {
    database: &'a Path,
    prompt: &'a mut dyn PasswordPrompt,
}

impl<'a> Unlocker<'a> {
    pub fn new(database: &'a Path, prompt: &'a mut dyn PasswordPrompt) -> Self {
        Self { database, prompt }
    }

    /// Run until the store opens or a fatal error occurs.
    pub fn run<T, F>(&mut self, initial: Option<String>, mut open: F) -> Result<T>
    where
        F: FnMut(&str) -> std::result::Result<T, OpenFailure>,
    {
        let mut state = match initial {
            Some(password) if !password.is_empty() => UnlockState::Attempting(password),
            _ => UnlockState::AwaitingInput,
        };

        loop {
            state = match state {
                UnlockState::AwaitingInput => match self.prompt.prompt(self.database) {
                    Ok(password) if password.is_empty() => UnlockState::AwaitingInput,
                    Ok(password) => UnlockState::Attempting(password),
                    Err(err) => UnlockState::Failed(err),
                },
                UnlockState::Attempting(password) => match open(&password) {
                    Ok(handle) => UnlockState::Opened(handle),
                    Err(OpenFailure::Transient(reason)) => {
                        tracing::warn!("{}", reason);
                        UnlockState::AwaitingInput
                    }
                    Err(OpenFailure::Fatal(err)) => UnlockState::Failed(err),
                },
                UnlockState::Opened(handle) => return Ok(handle),
                UnlockState::Failed(err) => return Err(err),
            };
        }
    }
}

/// Everything needed to open the store.
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    pub database: PathBuf,
    pub keyfile: Option<PathBuf>,
    /// Configured password, plain or vault-encrypted.
    pub password: Option<String>,
}

/// Open the store, decrypting a vaulted password and prompting as needed.
pub fn open_store(
    credentials: &StoreCredentials,
    vault: &dyn VaultDecryptor,
    prompt: &mut dyn PasswordPrompt,
) -> Result<KeepassDatabase> {
    let initial = credentials
        .password
        .as_deref()
        .map(|raw| reveal_password(raw, vault))
        .transpose()?;

    let keyfile = credentials.keyfile.as_deref();
    let database = credentials.database.as_path();
    Unlocker::new(database, prompt).run(initial, |password| {
        KeepassDatabase::open(database, password, keyfile)
    })
}
