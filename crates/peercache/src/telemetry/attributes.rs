// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute keys attached to group metrics.

/// The name of the group an event belongs to.
pub(crate) const GROUP_NAME: &str = "peercache.group.name";

/// The kind of event, such as `group.cache_hit`.
pub(crate) const GROUP_EVENT: &str = "peercache.group.event";
