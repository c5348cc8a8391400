//! Inventory sink and its in-memory implementation.

use crate::models::HostVars;
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Map, Value};

/// Name of the implicit top-level group.
pub const ALL_GROUP: &str = "all";

/// Receives the inventory graph built by the tree walker.
pub trait InventorySink {
    fn add_group(&mut self, name: &str);
    fn add_child(&mut self, parent: &str, child: &str);
    fn add_host(&mut self, name: &str, group: &str);
    fn set_host_variable(&mut self, host: &str, key: &str, value: Value);
    fn set_group_variable(&mut self, group: &str, key: &str, value: Value);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryGroup {
    pub hosts: IndexSet<String>,
    pub children: IndexSet<String>,
    pub vars: HostVars,
}

/// Inventory collected in memory, serialisable in the dynamic inventory
/// script format.
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    groups: IndexMap<String, InventoryGroup>,
    hosts: IndexMap<String, HostVars>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        let mut groups = IndexMap::new();
        groups.insert(ALL_GROUP.to_string(), InventoryGroup::default());
        Self {
            groups,
            hosts: IndexMap::new(),
        }
    }

    pub fn group(&self, name: &str) -> Option<&InventoryGroup> {
        self.groups.get(name)
    }

    pub fn host_vars(&self, name: &str) -> Option<&HostVars> {
        self.hosts.get(name)
    }

    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    fn is_child(&self, name: &str) -> bool {
        self.groups.values().any(|g| g.children.contains(name))
    }

    /// Render as the JSON document expected from `--list`.
    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        for (name, group) in &self.groups {
            let mut children: Vec<&str> = group.children.iter().map(String::as_str).collect();
            if name == ALL_GROUP {
                children.extend(
                    self.groups
                        .keys()
                        .map(String::as_str)
                        .filter(|g| *g != ALL_GROUP && !self.is_child(g)),
                );
            }
            let mut body = Map::new();
            if !group.hosts.is_empty() {
                body.insert("hosts".into(), json!(group.hosts));
            }
            if !children.is_empty() {
                body.insert("children".into(), json!(children));
            }
            if !group.vars.is_empty() {
                body.insert("vars".into(), json!(group.vars));
            }
            doc.insert(name.clone(), Value::Object(body));
        }
        doc.insert("_meta".into(), json!({ "hostvars": self.hosts }));
        Value::Object(doc)
    }
}

impl InventorySink for Inventory {
    fn add_group(&mut self, name: &str) {
        self.groups.entry(name.to_string()).or_default();
    }

    fn add_child(&mut self, parent: &str, child: &str) {
        self.add_group(child);
        self.groups
            .entry(parent.to_string())
            .or_default()
            .children
            .insert(child.to_string());
    }

    fn add_host(&mut self, name: &str, group: &str) {
        self.hosts.entry(name.to_string()).or_default();
        self.groups
            .entry(group.to_string())
            .or_default()
            .hosts
            .insert(name.to_string());
    }

    fn set_host_variable(&mut self, host: &str, key: &str, value: Value) {
        self.hosts
            .entry(host.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn set_group_variable(&mut self, group: &str, key: &str, value: Value) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .vars
            .insert(key.to_string(), value);
    }
}
