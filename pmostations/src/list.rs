//! Station list: ordered registry of stations with settings persistence

use crate::entry::StationEntry;
use crate::error::{Error, Result};
use crate::store::{GroupKeys, StationStore};
use anyhow::anyhow;
use serde_yaml::Value;
use std::io::{Read, Write};
use tracing::{debug, info, warn};

/// Group of the list of known stations
pub const STATION_GROUP: &str = "Station";

/// Group of the list filled by channel scans
pub const SCAN_CACHE_GROUP: &str = "ScanCache";

/// Largest number of stations a list can persist
///
/// [`StationList::save`] refuses longer lists, and a bigger count found in
/// the settings file is treated as corruption and clamped on load.
pub const MAX_PERSISTED_STATIONS: usize = 10_000;

/// Why a persisted record was not loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The count announces the record but the key is absent
    Missing,
    /// The record is not a pair of strings
    Malformed(String),
}

/// A record ignored by [`StationList::load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// 1-based record number
    pub index: usize,
    pub reason: SkipReason,
}

/// Outcome of [`StationList::load`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Number of stations appended
    pub loaded: usize,
    /// Records that were announced but could not be used
    pub skipped: Vec<SkippedRecord>,
}

impl LoadSummary {
    /// True when every announced record was loaded
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Ordered list of stations, persisted under a settings group
///
/// The list owns its entries. Lookups (`find`, `contains`, `remove`) compare
/// names exactly, while [`StationList::sort`] orders them ignoring case.
/// Duplicates are accepted by [`StationList::append`]; callers wanting
/// uniqueness check [`StationList::contains`] first.
///
/// The list has no internal synchronization. Share it behind a `RwLock`
/// if several threads need it.
///
/// # Examples
///
/// ```
/// use pmostations::StationList;
///
/// let mut stations = StationList::new("Station");
/// stations.append("Radio1", "5A");
/// stations.append("BBC", "12C");
/// stations.sort();
///
/// assert_eq!(stations.at(0).unwrap().station_name(), "BBC");
/// assert!(stations.contains("Radio1", "5A"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationList {
    group: String,
    stations: Vec<StationEntry>,
}

impl StationList {
    /// Creates an empty list persisted under `group`
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stations: Vec::new(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Removes every station
    pub fn reset(&mut self) {
        self.stations.clear();
        debug!(group = %self.group, "Station list cleared");
    }

    pub fn count(&self) -> usize {
        self.stations.len()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Station at position `index`
    pub fn at(&self, index: usize) -> Result<&StationEntry> {
        self.stations.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.stations.len(),
        })
    }

    /// `[station_name, channel_name]` of the station at `index`
    pub fn station_at(&self, index: usize) -> Result<[String; 2]> {
        self.at(index).map(StationEntry::to_pair)
    }

    /// First station matching both names exactly
    ///
    /// An empty station name never matches.
    pub fn find(&self, station_name: &str, channel_name: &str) -> Option<&StationEntry> {
        if station_name.is_empty() {
            return None;
        }
        self.stations
            .iter()
            .find(|station| station.matches(station_name, channel_name))
    }

    pub fn contains(&self, station_name: &str, channel_name: &str) -> bool {
        self.find(station_name, channel_name).is_some()
    }

    /// First station whose name starts with `prefix`
    ///
    /// Used to pick a preferred station at startup. An empty prefix never
    /// matches.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&StationEntry> {
        if prefix.is_empty() {
            return None;
        }
        self.stations
            .iter()
            .find(|station| station.station_name().starts_with(prefix))
    }

    /// Appends a station at the end, duplicates included
    pub fn append(&mut self, station_name: impl Into<String>, channel_name: impl Into<String>) {
        self.stations
            .push(StationEntry::new(station_name, channel_name));
    }

    /// Removes the first station matching both names exactly
    ///
    /// Returns whether a station was removed. With duplicates, one call
    /// removes one entry.
    pub fn remove(&mut self, station_name: &str, channel_name: &str) -> bool {
        match self
            .stations
            .iter()
            .position(|station| station.matches(station_name, channel_name))
        {
            Some(pos) => {
                self.stations.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Read-only view of the stations in list order
    pub fn list(&self) -> &[StationEntry] {
        &self.stations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StationEntry> {
        self.stations.iter()
    }

    /// Sorts by station name then channel name, ignoring case
    ///
    /// The sort is stable: entries comparing equal keep their relative
    /// order. It is never triggered implicitly.
    pub fn sort(&mut self) {
        self.stations.sort_by(|a, b| a.cmp_display(b));
    }

    /// Appends the stations persisted under this list's group
    ///
    /// A missing count loads nothing. Missing or malformed records are
    /// skipped, logged and reported in the returned summary; only a failing
    /// store aborts the load.
    pub fn load<S: StationStore + ?Sized>(&mut self, store: &S) -> Result<LoadSummary> {
        let keys = GroupKeys::new(&self.group);
        let stored = self.read_count(store, &keys)?;
        let count = if stored > MAX_PERSISTED_STATIONS as u64 {
            warn!(
                group = %self.group,
                count = stored,
                max = MAX_PERSISTED_STATIONS,
                "Station count too large, clamping"
            );
            MAX_PERSISTED_STATIONS
        } else {
            stored as usize
        };
        let mut summary = LoadSummary::default();

        for index in 1..=count {
            let key = index.to_string();
            let path = keys.record_path(&key);
            let value = store
                .read_value(&path)
                .map_err(|e| Error::store_read(&path, e))?;

            let reason = match value {
                Some(value) => match StationEntry::from_record(index, &value) {
                    Ok(entry) => {
                        self.stations.push(entry);
                        summary.loaded += 1;
                        continue;
                    }
                    Err(Error::MalformedRecord { reason, .. }) => SkipReason::Malformed(reason),
                    Err(e) => SkipReason::Malformed(e.to_string()),
                },
                None => SkipReason::Missing,
            };

            warn!(group = %self.group, index, reason = ?reason, "Skipping station record");
            summary.skipped.push(SkippedRecord { index, reason });
        }

        info!(group = %self.group, "Loaded {} stations from settings", summary.loaded);
        Ok(summary)
    }

    /// Replaces the stations persisted under this list's group
    ///
    /// The records of the previous save are deleted first so that a shorter
    /// list leaves no stale records behind, then the count and the current
    /// records are written and the store is committed. With
    /// `pmosettings::Settings` nothing reaches the disk before the commit,
    /// which replaces the file atomically.
    ///
    /// Returns the number of records written. A list longer than
    /// [`MAX_PERSISTED_STATIONS`] is refused with [`Error::StoreWrite`]
    /// before anything is written, since it could not be loaded back whole.
    pub fn save<S: StationStore + ?Sized>(&self, store: &S) -> Result<usize> {
        let keys = GroupKeys::new(&self.group);
        let count_path = keys.count_path();

        if self.stations.len() > MAX_PERSISTED_STATIONS {
            return Err(Error::store_write(
                &count_path,
                anyhow!(
                    "{} stations exceed the limit of {}",
                    self.stations.len(),
                    MAX_PERSISTED_STATIONS
                ),
            ));
        }

        // Remove the records of the previous save...
        let previous = self.read_count(store, &keys)?;
        if previous > MAX_PERSISTED_STATIONS as u64 {
            // Too many to enumerate: drop the whole record section
            let path = keys.records_path();
            store
                .remove_value(&path)
                .map_err(|e| Error::store_write(&path, e))?;
        } else {
            for index in 1..=previous {
                let key = index.to_string();
                let path = keys.record_path(&key);
                store
                    .remove_value(&path)
                    .map_err(|e| Error::store_write(&path, e))?;
            }
        }

        // ...and write the current set
        store
            .write_value(&count_path, Value::from(self.stations.len() as u64))
            .map_err(|e| Error::store_write(&count_path, e))?;

        for (i, station) in self.stations.iter().enumerate() {
            let key = (i + 1).to_string();
            let path = keys.record_path(&key);
            store
                .write_value(&path, station.to_record())
                .map_err(|e| Error::store_write(&path, e))?;
        }

        store
            .commit()
            .map_err(|e| Error::store_write(&count_path[..1], e))?;

        info!(group = %self.group, "Saved {} stations to settings", self.stations.len());
        Ok(self.stations.len())
    }

    /// Reads the persisted record count, tolerating bad values
    ///
    /// The count is returned as stored; callers apply the limit.
    fn read_count<S: StationStore + ?Sized>(&self, store: &S, keys: &GroupKeys) -> Result<u64> {
        let path = keys.count_path();
        let value = store
            .read_value(&path)
            .map_err(|e| Error::store_read(&path, e))?;

        let Some(value) = value else {
            return Ok(0);
        };

        // Older files store the count as text
        let count = match &value {
            Value::Number(n) => n.as_u64().map(Ok).or_else(|| n.as_i64().map(Err)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .map(Ok)
                    .ok()
                    .or_else(|| s.parse::<i64>().ok().map(Err))
            }
            _ => None,
        };

        match count {
            Some(Ok(n)) => Ok(n),
            Some(Err(n)) => {
                warn!(group = %self.group, count = n, "Negative station count, ignoring");
                Ok(0)
            }
            None => {
                warn!(group = %self.group, value = ?value, "Station count is not a number, ignoring");
                Ok(0)
            }
        }
    }

    /// Writes the list to a binary stream
    ///
    /// Layout: big-endian `u32` entry count, then each entry as written by
    /// [`StationEntry::write_to`].
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let count = u32::try_from(self.stations.len())
            .map_err(|_| Error::codec("too many stations for a stream"))?;
        out.write_all(&count.to_be_bytes())?;
        for station in &self.stations {
            station.write_to(out)?;
        }
        Ok(())
    }

    /// Reads a list written by [`StationList::write_to`]
    pub fn read_from<R: Read>(group: impl Into<String>, input: &mut R) -> Result<Self> {
        let mut count_bytes = [0u8; 4];
        input.read_exact(&mut count_bytes)?;
        let count = u32::from_be_bytes(count_bytes) as usize;

        let mut list = Self::new(group);
        list.stations.reserve(count.min(MAX_PERSISTED_STATIONS));
        for _ in 0..count {
            list.stations.push(StationEntry::read_from(input)?);
        }
        Ok(list)
    }
}

impl<'a> IntoIterator for &'a StationList {
    type Item = &'a StationEntry;
    type IntoIter = std::slice::Iter<'a, StationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.iter()
    }
}

impl Extend<StationEntry> for StationList {
    fn extend<I: IntoIterator<Item = StationEntry>>(&mut self, iter: I) {
        self.stations.extend(iter);
    }
}
