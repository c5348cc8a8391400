//! End-to-end tests against real kdbx files written to a temporary directory.

use keepass::config::DatabaseConfig;
use keepass::db::{Node, Value};
use keepass::{Database, DatabaseKey};
use keepass_ansible_core::options::OptionSources;
use keepass_ansible_core::{
    Entity, Error, HostIdentity, Inventory, InventoryPlugin, KeepassDatabase, KeepassInventory,
    KeepassVars, NoVault, OpenFailure, PasswordPrompt, Result, TransientFailure, VarsPlugin,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PASSWORD: &str = "secret-db-pass";

struct Scripted(VecDeque<String>);

impl Scripted {
    fn boxed(answers: &[&str]) -> Box<Self> {
        Box::new(Self(answers.iter().map(|s| s.to_string()).collect()))
    }
}

impl PasswordPrompt for Scripted {
    fn prompt(&mut self, _database: &Path) -> Result<String> {
        self.0
            .pop_front()
            .ok_or_else(|| Error::Prompt("no more input".to_string()))
    }
}

fn entry(title: &str, url: &str, extra: &[(&str, &str)]) -> keepass::db::Entry {
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
    for (key, value) in extra {
        entry
            .fields
            .insert(key.to_string(), Value::Unprotected(value.to_string()));
    }
    entry
}

fn write_database(dir: &TempDir, keyfile: Option<&Path>) -> PathBuf {
    let mut db = Database::new(DatabaseConfig::default());
    let mut web = keepass::db::Group::new("web");
    web.children
        .push(Node::Entry(entry("srv1", "10.0.0.5:2222", &[])));
    web.children.push(Node::Entry(entry(
        "group_vars",
        "",
        &[("http_port", "8080")],
    )));
    let mut ansible = keepass::db::Group::new("ansible");
    ansible.children.push(Node::Group(web));
    ansible
        .children
        .push(Node::Entry(entry("bastion", "bastion.example.com", &[])));
    db.root.children.push(Node::Group(ansible));

    let mut other = keepass::db::Group::new("personal");
    other.children.push(Node::Entry(entry(
        "mail",
        "https://mail.example.com",
        &[("ansible_user", "override")],
    )));
    db.root.children.push(Node::Group(other));

    let mut key = DatabaseKey::new().with_password(PASSWORD);
    if let Some(keyfile) = keyfile {
        key = key
            .with_keyfile(&mut File::open(keyfile).unwrap())
            .unwrap();
    }
    let path = dir.path().join("test.kdbx");
    db.save(&mut File::create(&path).unwrap(), key).unwrap();
    path
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("inventory.keepass.yml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_inventory_from_database() {
    let dir = TempDir::new().unwrap();
    let db = write_database(&dir, None);
    let config = write_config(
        &dir,
        &format!(
            "plugin: keepass_inventory\nkeepass_database: {}\nkeepass_pass: {}\nkeepass_root: ansible\n",
            db.display(),
            PASSWORD
        ),
    );

    let mut plugin = KeepassInventory::new(Box::new(NoVault), Scripted::boxed(&[]));
    assert!(plugin.verify_file(&config));
    let mut inv = Inventory::new();
    plugin.parse(&config, &mut inv).unwrap();

    assert_eq!(
        inv.to_json(),
        json!({
            "all": { "hosts": ["bastion"], "children": ["web"] },
            "web": { "hosts": ["srv1"], "vars": { "http_port": "8080" } },
            "_meta": { "hostvars": {
                "srv1": {
                    "keepass_entry_path": "ansible/web/srv1",
                    "ansible_user": "admin",
                    "ansible_password": "secret",
                    "ansible_connection": "ssh",
                    "ansible_host": "10.0.0.5",
                    "ansible_port": 2222
                },
                "bastion": {
                    "keepass_entry_path": "ansible/bastion",
                    "ansible_user": "admin",
                    "ansible_password": "secret",
                    "ansible_connection": "ssh",
                    "ansible_host": "bastion.example.com"
                }
            } }
        })
    );
}

#[test]
fn test_wrong_password_is_retried_with_prompt() {
    let dir = TempDir::new().unwrap();
    let db = write_database(&dir, None);
    let config = write_config(
        &dir,
        &format!(
            "plugin: keepass_inventory\nkeepass_database: {}\nkeepass_pass: wrong\nkeepass_root: web\n",
            db.display()
        ),
    );

    let mut plugin =
        KeepassInventory::new(Box::new(NoVault), Scripted::boxed(&["also-wrong", PASSWORD]));
    let mut inv = Inventory::new();
    plugin.parse(&config, &mut inv).unwrap();
    assert!(inv.group("all").unwrap().hosts.contains("srv1"));
}

#[test]
fn test_missing_root_group_is_fatal() {
    let dir = TempDir::new().unwrap();
    let db = write_database(&dir, None);
    let config = write_config(
        &dir,
        &format!(
            "plugin: keepass_inventory\nkeepass_database: {}\nkeepass_pass: {}\nkeepass_root: nowhere\n",
            db.display(),
            PASSWORD
        ),
    );
    let mut plugin = KeepassInventory::new(Box::new(NoVault), Scripted::boxed(&[]));
    let err = plugin.parse(&config, &mut Inventory::new()).unwrap_err();
    assert!(matches!(err, Error::RootGroupNotFound(name) if name == "nowhere"));
}

#[test]
fn test_open_with_keyfile() {
    let dir = TempDir::new().unwrap();
    let keyfile = dir.path().join("test.key");
    std::fs::write(&keyfile, b"0123456789abcdef0123456789abcdef-keyfile").unwrap();
    let db = write_database(&dir, Some(&keyfile));

    assert!(matches!(
        KeepassDatabase::open(&db, PASSWORD, None),
        Err(OpenFailure::Transient(TransientFailure::BadCredentials))
    ));
    let opened = KeepassDatabase::open(&db, PASSWORD, Some(&keyfile)).unwrap();
    assert!(opened.find_entry_by_title("srv1").is_some());
}

#[test]
fn test_corrupt_database_is_transient_and_retried() {
    let dir = TempDir::new().unwrap();
    let db = write_database(&dir, None);
    let mut bytes = std::fs::read(&db).unwrap();
    // Inside the last payload block, before the empty terminating block.
    let index = bytes.len() - 40;
    bytes[index] ^= 0xff;
    std::fs::write(&db, &bytes).unwrap();

    assert!(matches!(
        KeepassDatabase::open(&db, PASSWORD, None),
        Err(OpenFailure::Transient(TransientFailure::ChecksumMismatch))
    ));

    let config = write_config(
        &dir,
        &format!(
            "plugin: keepass_inventory\nkeepass_database: {}\nkeepass_pass: {}\nkeepass_root: web\n",
            db.display(),
            PASSWORD
        ),
    );
    let mut plugin = KeepassInventory::new(Box::new(NoVault), Scripted::boxed(&[PASSWORD]));
    let err = plugin.parse(&config, &mut Inventory::new()).unwrap_err();
    // Both attempts fail the checksum; the loop ends only when input runs out.
    assert!(matches!(err, Error::Prompt(_)));
}

#[test]
fn test_vars_plugin_resolution() {
    let dir = TempDir::new().unwrap();
    let db = write_database(&dir, None);
    let db_path = db.display().to_string();
    let sources = OptionSources::new().with_env(move |name| match name {
        "ANSIBLE_KEEPASS_DATABASE" => Some(db_path.clone()),
        "ANSIBLE_KEEPASS_PASSWORD" => Some(PASSWORD.to_string()),
        _ => None,
    });
    let mut plugin = KeepassVars::new(Box::new(NoVault), Scripted::boxed(&[]), sources);

    let vars = plugin
        .get_vars(&[Entity::Host(
            HostIdentity::new("mailserver").with_var("ansible_host", "mail.example.com"),
        )])
        .unwrap();
    assert_eq!(vars["keepass_entry_path"], "personal/mail");
    assert_eq!(vars["ansible_connection"], "https");
    assert_eq!(vars["ansible_user"], "override");

    let vars = plugin
        .get_vars(&[Entity::Host(HostIdentity::new("srv1"))])
        .unwrap();
    assert_eq!(vars["ansible_port"], json!(2222));

    let vars = plugin
        .get_vars(&[Entity::Host(HostIdentity::new("nothing"))])
        .unwrap();
    assert!(vars.is_empty());
}
