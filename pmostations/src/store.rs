//! Key-value store interface used to persist station lists
//!
//! A station list of group `G` is stored as:
//!
//! | Path | Value |
//! |---|---|
//! | `["<G>s", "<G>cout"]` | number of records |
//! | `["<G>s", "<G>", "<i>"]`, `i = 1..=count` | `[station_name, channel_name]` |
//!
//! `cout` is a historical misspelling of "count"; it is kept so that
//! existing settings files keep loading.

use serde_yaml::Value;
use std::sync::Arc;

/// Suffix of the count key
pub const COUNT_KEY_SUFFIX: &str = "cout";

/// Backend able to read, write and delete values addressed by a key path
///
/// Implementations report their own failures through `anyhow`; the station
/// list wraps them into [`crate::Error::StoreRead`] or
/// [`crate::Error::StoreWrite`].
pub trait StationStore {
    /// Value at `path`, `None` if absent
    fn read_value(&self, path: &[&str]) -> anyhow::Result<Option<Value>>;

    /// Sets the value at `path`
    fn write_value(&self, path: &[&str], value: Value) -> anyhow::Result<()>;

    /// Deletes the value at `path`, with everything below it
    ///
    /// Deleting an absent key is not an error.
    fn remove_value(&self, path: &[&str]) -> anyhow::Result<()>;

    /// Makes previous writes durable
    fn commit(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<T: StationStore + ?Sized> StationStore for Arc<T> {
    fn read_value(&self, path: &[&str]) -> anyhow::Result<Option<Value>> {
        (**self).read_value(path)
    }

    fn write_value(&self, path: &[&str], value: Value) -> anyhow::Result<()> {
        (**self).write_value(path, value)
    }

    fn remove_value(&self, path: &[&str]) -> anyhow::Result<()> {
        (**self).remove_value(path)
    }

    fn commit(&self) -> anyhow::Result<()> {
        (**self).commit()
    }
}

/// Owned key segments for one group
///
/// Paths are built as `String`s and borrowed as `&[&str]` when calling the
/// store.
#[derive(Debug, Clone)]
pub(crate) struct GroupKeys {
    section: String,
    group: String,
    count: String,
}

impl GroupKeys {
    pub(crate) fn new(group: &str) -> Self {
        Self {
            section: format!("{}s", group),
            group: group.to_string(),
            count: format!("{}{}", group, COUNT_KEY_SUFFIX),
        }
    }

    pub(crate) fn count_path(&self) -> [&str; 2] {
        [self.section.as_str(), self.count.as_str()]
    }

    /// Parent of every record of the group
    pub(crate) fn records_path(&self) -> [&str; 2] {
        [self.section.as_str(), self.group.as_str()]
    }

    pub(crate) fn record_path<'a>(&'a self, index: &'a str) -> [&'a str; 3] {
        [self.section.as_str(), self.group.as_str(), index]
    }
}

/// Path of the count key of a group
pub fn count_path(group: &str) -> Vec<String> {
    let keys = GroupKeys::new(group);
    keys.count_path().iter().map(|s| s.to_string()).collect()
}

/// Path of the record `index` (1-based) of a group
pub fn record_path(group: &str, index: usize) -> Vec<String> {
    let keys = GroupKeys::new(group);
    let index = index.to_string();
    keys.record_path(&index).iter().map(|s| s.to_string()).collect()
}
