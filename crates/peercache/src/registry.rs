// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::getter::Getter;
use crate::{ByteView, Group};

/// The groups known to a process, keyed by name.
///
/// The registry is what a peer transport serves from: an inbound request names a
/// group and a key, and [`serve`](Self::serve) answers it. Groups are never removed.
///
/// # Examples
///
/// ```
/// use peercache::{Error, GetterFn, Registry};
///
/// # futures_util::FutureExt::now_or_never(async {
/// let registry = Registry::new();
/// registry.new_group(
///     "scores",
///     2 << 10,
///     GetterFn::new(|_key: String| async { Ok::<_, std::io::Error>(b"630".to_vec()) }),
/// );
///
/// assert_eq!(registry.serve("scores", "Tom").await.unwrap(), "630");
/// assert!(matches!(registry.serve("users", "Tom").await, Err(Error::NoSuchGroup(_))));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group and registers it under its name.
    ///
    /// # Panics
    ///
    /// Panics if a group with the same name is already registered.
    pub fn new_group(&self, name: impl Into<String>, cache_bytes: usize, getter: impl Getter + 'static) -> Arc<Group> {
        self.register(Group::new(name, cache_bytes, getter))
    }

    /// Registers an existing group under its name.
    ///
    /// # Panics
    ///
    /// Panics if a group with the same name is already registered.
    pub fn register(&self, group: Group) -> Arc<Group> {
        let group = Arc::new(group);
        let mut groups = self.groups.write();
        assert!(
            !groups.contains_key(group.name()),
            "group {} is already registered",
            group.name()
        );
        groups.insert(group.name().to_owned(), Arc::clone(&group));
        drop(groups);

        tracing::info!(group = group.name(), "group registered");
        group
    }

    /// Returns the group registered under `name`.
    #[must_use]
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Answers a request for `key` of group `group` that arrived from another peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchGroup`] if no group is registered under `group`, and
    /// otherwise whatever [`Group::get`] returns.
    pub async fn serve(&self, group: &str, key: &str) -> Result<ByteView> {
        let Some(found) = self.get_group(group) else {
            return Err(Error::NoSuchGroup(group.to_owned()));
        };
        found.record_server_request();
        found.get(key).await
    }
}
