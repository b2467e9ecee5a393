//! # pmostations - Registry of discovered broadcast stations
//!
//! A [`StationList`] keeps the (station name, channel name) pairs found by a
//! channel scan, in insertion order until it is sorted, and persists them in a
//! key-value settings store under a group name. Several lists can share one
//! store by using different groups (e.g. [`STATION_GROUP`] and
//! [`SCAN_CACHE_GROUP`]).
//!
//! # Architecture
//!
//! - **StationEntry** : immutable station/channel pair
//! - **StationList** : owning, ordered collection with lookup, sort, load and save
//! - **StationStore** : key-value backend used by `load`/`save`, implemented for
//!   `pmosettings::Settings` (feature `pmosettings`)
//!
//! # Example
//!
//! ```
//! use pmosettings::Settings;
//! use pmostations::{StationList, STATION_GROUP};
//!
//! # fn main() -> pmostations::Result<()> {
//! let store = Settings::in_memory();
//!
//! let mut stations = StationList::new(STATION_GROUP);
//! stations.append("Radio1", "5A");
//! stations.append("BBC", "12C");
//! stations.save(&store)?;
//!
//! let mut restored = StationList::new(STATION_GROUP);
//! let summary = restored.load(&store)?;
//! assert_eq!(summary.loaded, 2);
//! assert_eq!(restored.station_at(1)?, ["BBC".to_string(), "12C".to_string()]);
//! # Ok(())
//! # }
//! ```

mod entry;
mod error;
mod list;
pub mod store;

#[cfg(feature = "pmosettings")]
mod settings_ext;

pub use entry::StationEntry;
pub use error::{Error, Result};
pub use list::{
    LoadSummary, SkipReason, SkippedRecord, StationList, MAX_PERSISTED_STATIONS,
    SCAN_CACHE_GROUP, STATION_GROUP,
};
pub use store::StationStore;

#[cfg(feature = "pmosettings")]
pub use settings_ext::open_store;
