//! Persistence of station lists in `pmosettings`
//!
//! Implements [`StationStore`] for [`pmosettings::Settings`] so that a list
//! can be loaded and saved directly from the settings file:
//!
//! ```no_run
//! use pmostations::{open_store, StationList, STATION_GROUP};
//!
//! # fn main() -> pmostations::Result<()> {
//! let store = open_store("")?;
//!
//! let mut stations = StationList::new(STATION_GROUP);
//! stations.load(&store)?;
//! stations.append("Radio1", "5A");
//! stations.save(&store)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::store::StationStore;
use pmosettings::Settings;
use serde_yaml::Value;

impl StationStore for Settings {
    fn read_value(&self, path: &[&str]) -> anyhow::Result<Option<Value>> {
        self.value(path)
    }

    fn write_value(&self, path: &[&str], value: Value) -> anyhow::Result<()> {
        self.set_value(path, value)
    }

    fn remove_value(&self, path: &[&str]) -> anyhow::Result<()> {
        Settings::remove_value(self, path).map(|_| ())
    }

    fn commit(&self) -> anyhow::Result<()> {
        self.sync()
    }
}

/// Opens the settings file of `directory` (empty for the default location)
pub fn open_store(directory: &str) -> Result<Settings> {
    Settings::open(directory).map_err(|e| Error::StoreUnavailable(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StationList;

    #[test]
    fn test_settings_layout() {
        let settings = Settings::in_memory();
        let mut list = StationList::new("Station");
        list.append("Radio1", "5A");
        list.save(&settings).unwrap();

        assert_eq!(
            settings.get_value(&["Stations", "Stationcout"]).unwrap(),
            Value::from(1u64)
        );
        assert_eq!(
            settings.get_value(&["Stations", "Station", "1"]).unwrap(),
            Value::Sequence(vec![Value::from("Radio1"), Value::from("5A")])
        );
    }

    #[test]
    fn test_open_store_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot be a settings directory
        let result = open_store(file.path().to_str().unwrap());
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    }
}
