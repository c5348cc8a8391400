use keepass::{config::DatabaseConfig, db::Node, db::Value, Database, DatabaseKey};
use std::fs::File;

fn entry(title: &str, url: &str, extra: &[(&str, &str)]) -> keepass::db::Entry {
    let mut entry = keepass::db::Entry::new();
    entry.fields.insert("Title".to_string(), Value::Unprotected(title.to_string()));
    entry.fields.insert("UserName".to_string(), Value::Unprotected("admin".to_string()));
    entry.fields.insert("Password".to_string(), Value::Protected("secret".as_bytes().into()));
    entry.fields.insert("URL".to_string(), Value::Unprotected(url.to_string()));
    for (key, value) in extra {
        entry.fields.insert(key.to_string(), Value::Unprotected(value.to_string()));
    }
    entry
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "test_db.kdbx".to_string());
    let password = args.next().unwrap_or_else(|| "password".to_string());

    let mut db = Database::new(DatabaseConfig::default());
    db.meta.database_name = Some("Ansible inventory".to_string());

    let mut web = keepass::db::Group::new("web");
    web.children.push(Node::Entry(entry("srv1", "10.0.0.5:2222", &[])));
    web.children.push(Node::Entry(entry("srv2", "winrm://10.0.0.6:5986", &[("ansible_winrm_transport", "ntlm")])));
    web.children.push(Node::Entry(entry("group_vars", "", &[("http_port", "8080")])));

    let mut ansible = keepass::db::Group::new("ansible");
    ansible.children.push(Node::Group(web));
    ansible.children.push(Node::Entry(entry("bastion", "bastion.example.com", &[])));
    db.root.children.push(Node::Group(ansible));

    let key = DatabaseKey::new().with_password(&password);
    let mut file = File::create(&path)?;
    db.save(&mut file, key)?;

    println!("Created {} with password '{}'", path, password);
    Ok(())
}
