//! KeePass database operations wrapper.

use crate::error::Error;
use crate::models::{Entry, Group};
use keepass::error::{BlockStreamError, DatabaseIntegrityError, DatabaseOpenError};
use keepass::{Database, DatabaseKey};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Fields handled by dedicated getters; everything else is a custom property.
const STANDARD_FIELDS: &[&str] = &["Title", "UserName", "Password", "URL", "Notes", "otp"];

/// A failed open attempt that is worth retrying with other credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientFailure {
    MissingFile,
    Io,
    BadCredentials,
    ChecksumMismatch,
}

impl fmt::Display for TransientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::MissingFile | Self::Io => "Could not open the database or keyfile.",
            Self::BadCredentials => "KeePass credentials not correct",
            Self::ChecksumMismatch => {
                "Could not open the database, as the checksum of the database is wrong. \
                 This could be caused by a corrupt database."
            }
        };
        f.write_str(message)
    }
}

/// Outcome of a single failed open attempt.
#[derive(Debug)]
pub enum OpenFailure {
    Transient(TransientFailure),
    Fatal(Error),
}

impl From<std::io::Error> for OpenFailure {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::Transient(TransientFailure::MissingFile)
        } else {
            Self::Transient(TransientFailure::Io)
        }
    }
}

/// Read-only view of an opened KeePass database.
#[derive(Debug, Clone)]
pub struct KeepassDatabase {
    root: Group,
}

impl KeepassDatabase {
    /// Open and unlock a KeePass database. Makes exactly one attempt.
    pub fn open(
        path: impl AsRef<Path>,
        password: &str,
        keyfile: Option<&Path>,
    ) -> Result<Self, OpenFailure> {
        let path = path.as_ref();

        let mut key = DatabaseKey::new().with_password(password);
        if let Some(keyfile) = keyfile {
            key = key
                .with_keyfile(&mut std::fs::File::open(keyfile)?)
                .map_err(|_| OpenFailure::Transient(TransientFailure::Io))?;
        }

        let db = Database::open(&mut std::fs::File::open(path)?, key)
            .map_err(|err| classify(path, err))?;

        tracing::debug!("Opened KeePass database {}", path.display());
        Ok(Self::from_database(&db))
    }

    /// Build the snapshot from an already decrypted database.
    pub fn from_database(db: &Database) -> Self {
        Self {
            root: convert_group(&db.root, &[], true),
        }
    }

    /// Wrap an already converted tree.
    pub fn from_root(root: Group) -> Self {
        Self { root }
    }

    /// Get the root group of the database.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Locate a group either by `/`-separated path below the root or by the
    /// first group with that exact name anywhere in the tree.
    pub fn find_group(&self, name: &str) -> Option<&Group> {
        if name.contains('/') {
            if let Some(group) = self.root.find_path(name) {
                return Some(group);
            }
        }
        self.root.find_group(name)
    }

    /// All entries in store iteration order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.root.iter_entries()
    }

    /// First entry whose title equals `title`.
    pub fn find_entry_by_title(&self, title: &str) -> Option<&Entry> {
        self.entries().find(|entry| entry.title == title)
    }

    /// First entry whose URL contains a match for `pattern`. A pattern that
    /// is not a valid regex is matched literally.
    pub fn find_entry_by_url(&self, pattern: &str) -> Option<&Entry> {
        let re = Regex::new(pattern).or_else(|err| {
            tracing::debug!("URL pattern {:?} is not a regex ({}), matching literally", pattern, err);
            Regex::new(&regex::escape(pattern))
        });
        let re = match re {
            Ok(re) => re,
            Err(err) => {
                tracing::warn!("Cannot build URL matcher for {:?}: {}", pattern, err);
                return None;
            }
        };
        self.entries().find(|entry| re.is_match(&entry.url))
    }
}

fn classify(path: &Path, err: DatabaseOpenError) -> OpenFailure {
    match err {
        DatabaseOpenError::Io(io) => io.into(),
        DatabaseOpenError::Key(_) => OpenFailure::Transient(TransientFailure::BadCredentials),
        DatabaseOpenError::DatabaseIntegrity(
            DatabaseIntegrityError::HeaderHashMismatch
            | DatabaseIntegrityError::BlockStream(BlockStreamError::BlockHashMismatch { .. }),
        ) => OpenFailure::Transient(TransientFailure::ChecksumMismatch),
        other => OpenFailure::Fatal(Error::Database {
            path: path.to_path_buf(),
            message: other.to_string(),
        }),
    }
}

fn segment(name: Option<&str>) -> Option<String> {
    name.filter(|name| !name.is_empty()).map(str::to_string)
}

/// Convert a keepass::Group to our Group model. `ancestors` holds the names
/// of the groups between the database root and `kg`.
fn convert_group(kg: &keepass::db::Group, ancestors: &[Option<String>], is_root: bool) -> Group {
    let mut path = ancestors.to_vec();
    if !is_root {
        path.push(segment(Some(&kg.name)));
    }

    let mut group = Group::new(kg.name.clone());
    for node in &kg.children {
        match node {
            keepass::db::Node::Group(g) => group.children.push(convert_group(g, &path, false)),
            keepass::db::Node::Entry(e) => group.entries.push(convert_entry(e, &path)),
        }
    }
    group
}

/// Convert a keepass::Entry to our Entry model.
fn convert_entry(ke: &keepass::db::Entry, ancestors: &[Option<String>]) -> Entry {
    let mut custom_properties = HashMap::new();
    for key in ke.fields.keys() {
        if STANDARD_FIELDS.contains(&key.as_str()) {
            continue;
        }
        // Binary fields have no string form and are skipped.
        if let Some(value) = ke.get(key) {
            custom_properties.insert(key.clone(), value.to_string());
        }
    }

    let mut path = ancestors.to_vec();
    path.push(segment(ke.get_title()));

    Entry {
        title: ke.get_title().unwrap_or_default().to_string(),
        username: ke.get_username().unwrap_or_default().to_string(),
        password: ke.get_password().unwrap_or_default().to_string(),
        url: ke.get_url().unwrap_or_default().to_string(),
        path,
        custom_properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepass::config::DatabaseConfig;
    use keepass::db::{Node, Value};

    fn keepass_entry(title: &str, url: &str, extra: &[(&str, &str)]) -> keepass::db::Entry {
        let mut entry = keepass::db::Entry::new();
        entry
            .fields
            .insert("Title".to_string(), Value::Unprotected(title.to_string()));
        entry
            .fields
            .insert("UserName".to_string(), Value::Unprotected("admin".to_string()));
        entry.fields.insert(
            "Password".to_string(),
            Value::Protected("secret".as_bytes().into()),
        );
        entry
            .fields
            .insert("URL".to_string(), Value::Unprotected(url.to_string()));
        entry
            .fields
            .insert("Notes".to_string(), Value::Unprotected("ignored".to_string()));
        for (key, value) in extra {
            entry
                .fields
                .insert(key.to_string(), Value::Unprotected(value.to_string()));
        }
        entry
    }

    fn sample() -> KeepassDatabase {
        let mut db = Database::new(DatabaseConfig::default());
        let mut ansible = keepass::db::Group::new("ansible");
        let mut web = keepass::db::Group::new("web");
        web.children.push(Node::Entry(keepass_entry(
            "srv1",
            "10.0.0.5:2222",
            &[("role", "frontend")],
        )));
        web.children
            .push(Node::Entry(keepass_entry("srv1", "10.0.0.6", &[])));
        ansible.children.push(Node::Group(web));
        ansible
            .children
            .push(Node::Entry(keepass_entry("db1", "winrm://db1.local:5986", &[])));
        db.root.children.push(Node::Group(ansible));
        KeepassDatabase::from_database(&db)
    }

    #[test]
    fn test_convert_entry_fields() {
        let db = sample();
        let entry = db.find_entry_by_title("srv1").unwrap();
        assert_eq!(entry.username, "admin");
        assert_eq!(entry.password, "secret");
        assert_eq!(entry.url, "10.0.0.5:2222");
        assert_eq!(entry.custom_properties.len(), 1);
        assert_eq!(entry.custom_properties["role"], "frontend");
    }

    #[test]
    fn test_entry_path_excludes_database_root() {
        let db = sample();
        let entry = db.find_entry_by_title("srv1").unwrap();
        assert_eq!(
            entry.path,
            vec![
                Some("ansible".to_string()),
                Some("web".to_string()),
                Some("srv1".to_string())
            ]
        );
    }

    #[test]
    fn test_find_entry_by_title_returns_first() {
        let db = sample();
        let entry = db.find_entry_by_title("srv1").unwrap();
        assert_eq!(entry.url, "10.0.0.5:2222");
        assert!(db.find_entry_by_title("missing").is_none());
    }

    #[test]
    fn test_find_entry_by_url_is_a_search() {
        let db = sample();
        let entry = db.find_entry_by_url("db1.local:5986").unwrap();
        assert_eq!(entry.title, "db1");
        let entry = db.find_entry_by_url("10.0.0.6").unwrap();
        assert_eq!(entry.url, "10.0.0.6");
    }

    #[test]
    fn test_find_entry_by_url_invalid_regex_is_literal() {
        let mut root = Group::new("Root");
        let mut entry = Entry::new("odd");
        entry.url = "host(1".to_string();
        root.entries.push(entry);
        let db = KeepassDatabase::from_root(root);
        assert_eq!(db.find_entry_by_url("host(1").unwrap().title, "odd");
    }

    #[test]
    fn test_find_group_by_name_and_path() {
        let db = sample();
        assert_eq!(db.find_group("web").unwrap().entries.len(), 2);
        assert_eq!(db.find_group("ansible/web").unwrap().name, "web");
        assert!(db.find_group("ansible/db").is_none());
    }

    #[test]
    fn test_find_group_with_slash_in_name() {
        let mut root = Group::new("Root");
        root.children.push(Group::new("prod/eu"));
        let db = KeepassDatabase::from_root(root);
        assert_eq!(db.find_group("prod/eu").unwrap().name, "prod/eu");
    }

    #[test]
    fn test_open_missing_keyfile_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let result = KeepassDatabase::open(
            dir.path().join("missing.kdbx"),
            "pw",
            Some(&dir.path().join("missing.key")),
        );
        assert!(matches!(
            result,
            Err(OpenFailure::Transient(TransientFailure::MissingFile))
        ));
    }

    #[test]
    fn test_open_missing_file_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let result = KeepassDatabase::open(dir.path().join("missing.kdbx"), "pw", None);
        assert!(matches!(
            result,
            Err(OpenFailure::Transient(TransientFailure::MissingFile))
        ));
    }
}
