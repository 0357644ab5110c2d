//! Key-level diff between two versions of a product map.

use crate::audit::Status;
use crate::store::ProductConfig;

/// How a key changed across a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

impl ChangeKind {
    pub fn status(self) -> Status {
        match self {
            ChangeKind::Added => Status::Added,
            ChangeKind::Updated => Status::Updated,
            ChangeKind::Removed => Status::Removed,
        }
    }
}

/// One changed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub key: String,
    pub kind: ChangeKind,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Compare `old` against `new`, ordered by key.
///
/// Keys with identical values produce nothing. A missing `old` map means
/// every key in `new` was added.
pub fn diff(old: Option<&ProductConfig>, new: &ProductConfig) -> Vec<ConfigChange> {
    let mut changes = Vec::new();

    for (key, new_value) in new {
        match old.and_then(|old| old.get(key)) {
            None => changes.push(ConfigChange {
                key: key.clone(),
                kind: ChangeKind::Added,
                old_value: None,
                new_value: Some(new_value.clone()),
            }),
            Some(old_value) if old_value != new_value => changes.push(ConfigChange {
                key: key.clone(),
                kind: ChangeKind::Updated,
                old_value: Some(old_value.clone()),
                new_value: Some(new_value.clone()),
            }),
            Some(_) => {}
        }
    }

    if let Some(old) = old {
        for (key, old_value) in old {
            if !new.contains_key(key) {
                changes.push(ConfigChange {
                    key: key.clone(),
                    kind: ChangeKind::Removed,
                    old_value: Some(old_value.clone()),
                    new_value: None,
                });
            }
        }
    }

    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}
