//! Builds inventory groups and hosts from a database subtree.

use crate::inventory::{InventorySink, ALL_GROUP};
use crate::mapper::to_variables;
use crate::models::{Entry, Group};
use serde_json::Value;

/// Entry title whose custom properties become group variables.
pub const GROUP_VARS_TITLE: &str = "group_vars";

/// Register everything below `root`. Subgroups of `root` become top-level
/// groups; entries directly under `root` land in `all`.
pub fn walk(root: &Group, sink: &mut dyn InventorySink) {
    for group in &root.children {
        add_group(group, None, sink);
    }
    for entry in &root.entries {
        add_host(entry, ALL_GROUP, sink);
    }
}

fn add_group(group: &Group, parent: Option<&str>, sink: &mut dyn InventorySink) {
    sink.add_group(&group.name);
    if let Some(parent) = parent {
        sink.add_child(parent, &group.name);
    }
    for sub_group in &group.children {
        add_group(sub_group, Some(&group.name), sink);
    }
    for entry in &group.entries {
        add_host(entry, &group.name, sink);
    }
}

fn add_host(entry: &Entry, group: &str, sink: &mut dyn InventorySink) {
    if entry.title == GROUP_VARS_TITLE && !entry.custom_properties.is_empty() {
        for (key, value) in &entry.custom_properties {
            sink.set_group_variable(group, key, Value::String(value.clone()));
        }
        return;
    }

    sink.add_host(&entry.title, group);
    for (key, value) in to_variables(entry) {
        sink.set_host_variable(&entry.title, &key, value);
    }
}
