//! Read-only snapshot of the database tree.

use indexmap::IndexMap;
use std::collections::HashMap;

/// Variables produced for one host or group.
pub type HostVars = IndexMap<String, serde_json::Value>;

/// Represents a group (folder) in the database tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub name: String,
    pub children: Vec<Group>,
    pub entries: Vec<Entry>,
}

/// Represents a credential entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    /// Group names below the database root, followed by the entry title.
    /// Unnamed segments are `None`.
    pub path: Vec<Option<String>>,
    pub custom_properties: HashMap<String, String>,
}

impl Entry {
    /// Create an entry with only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            path: vec![Some(title.clone())],
            title,
            ..Self::default()
        }
    }
}

impl Group {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Find the first group named `name`, searching this group and its
    /// descendants depth-first.
    pub fn find_group(&self, name: &str) -> Option<&Group> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_group(name))
    }

    /// Follow a `/`-separated path of child group names from this group.
    pub fn find_path(&self, path: &str) -> Option<&Group> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |group, segment| {
                group.children.iter().find(|child| child.name == segment)
            })
    }

    /// Iterate every entry below this group: a group's own entries first,
    /// then its subgroups depth-first.
    pub fn iter_entries(&self) -> Box<dyn Iterator<Item = &Entry> + '_> {
        Box::new(
            self.entries
                .iter()
                .chain(self.children.iter().flat_map(|child| child.iter_entries())),
        )
    }
}
