//! # PMOSettings
//!
//! Hierarchical key-value settings store, persisted as a single YAML file.
//!
//! - Values live in a tree of YAML mappings addressed by a path of keys
//!   (e.g. `&["Stations", "Station", "1"]`)
//! - Writes only touch the in-memory tree; [`Settings::sync`] commits the
//!   whole tree to disk by writing a temporary file and renaming it
//! - Environment variables prefixed with `PMOSETTINGS__` override values at
//!   load time; overrides are kept in a separate layer and never written back
//! - A store can also live purely in memory ([`Settings::in_memory`])
//!
//! ## Usage
//!
//! ```no_run
//! use pmosettings::Settings;
//! use serde_yaml::Value;
//!
//! let settings = Settings::open("")?;
//! settings.set_value(&["player", "volume"], Value::from(80))?;
//! let volume = settings.value(&["player", "volume"])?;
//! settings.sync()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info};

const ENV_SETTINGS_DIR: &str = "PMOSETTINGS_DIR";
const ENV_PREFIX: &str = "PMOSETTINGS__";

/// Directory name used under the platform configuration directory
pub const APP_DIR_NAME: &str = "pmoradio";

/// File name of the settings file inside the settings directory
pub const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug)]
struct Tree {
    data: Value,
    /// Environment overrides, read-only and never synced
    overrides: Value,
    dirty: bool,
}

impl Tree {
    fn new(data: Value, overrides: Value) -> Self {
        Self {
            data,
            overrides,
            dirty: false,
        }
    }
}

/// Settings store
///
/// The tree is guarded by a mutex so that a single handle can be shared by
/// several owners (for example two station lists persisted under different
/// groups).
///
/// # Examples
///
/// ```
/// use pmosettings::Settings;
/// use serde_yaml::Value;
///
/// let settings = Settings::in_memory();
/// settings.set_value(&["a", "b"], Value::from("c")).unwrap();
/// assert_eq!(settings.get_value(&["a", "b"]).unwrap(), Value::from("c"));
/// ```
#[derive(Debug)]
pub struct Settings {
    path: Option<PathBuf>,
    tree: Mutex<Tree>,
}

// Clone manuel : le Mutex n'est pas Clone
impl Clone for Settings {
    fn clone(&self) -> Self {
        let tree = self.lock();
        Self {
            path: self.path.clone(),
            tree: Mutex::new(Tree {
                data: tree.data.clone(),
                overrides: tree.overrides.clone(),
                dirty: tree.dirty,
            }),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Settings {
    /// Creates an empty store with no backing file
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tree: Mutex::new(Tree::new(
                Value::Mapping(Mapping::new()),
                Value::Mapping(Mapping::new()),
            )),
        }
    }

    /// Finds the settings directory by trying different locations in order
    fn find_settings_dir(directory: &str) -> PathBuf {
        // 1. Explicit directory
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        // 2. Environment variable
        if let Ok(env_path) = env::var(ENV_SETTINGS_DIR) {
            info!(env_var = ENV_SETTINGS_DIR, path = %env_path, "Using settings directory from env");
            return PathBuf::from(env_path);
        }

        // 3. Platform configuration directory
        if let Some(config) = dirs::config_dir() {
            return config.join(APP_DIR_NAME);
        }

        // Default fallback
        PathBuf::from(format!(".{}", APP_DIR_NAME))
    }

    /// Creates the directory if needed and checks that it is a directory
    fn validate_settings_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Cannot create settings directory {}", path.display()))?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        Ok(())
    }

    /// Resolves and validates the settings directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOSETTINGS_DIR` environment variable
    /// 3. `pmoradio` under the platform configuration directory
    ///
    /// The directory is created if it doesn't exist.
    pub fn settings_dir(directory: &str) -> Result<PathBuf> {
        let dir = Self::find_settings_dir(directory);
        Self::validate_settings_dir(&dir)?;
        Ok(dir)
    }

    /// Opens the `settings.yaml` file of the resolved settings directory
    pub fn open(directory: &str) -> Result<Self> {
        let dir = Self::settings_dir(directory)?;
        info!(settings_dir = %dir.display(), "Using settings directory");
        Self::load_from(dir.join(SETTINGS_FILE))
    }

    /// Loads the settings from a YAML file
    ///
    /// A missing or empty file yields an empty tree. Environment overrides
    /// are layered on top of the file content: reads see them, but
    /// [`Settings::sync`] only writes what came from the file or from
    /// [`Settings::set_value`]. The path is remembered and used by
    /// [`Settings::sync`].
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut data = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Value::Mapping(Mapping::new()),
            Ok(content) => {
                info!(settings_file = %path.display(), "Loaded settings file");
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(settings_file = %path.display(), "Settings file not found, starting empty");
                Value::Mapping(Mapping::new())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        if data.is_null() {
            data = Value::Mapping(Mapping::new());
        } else if !data.is_mapping() {
            return Err(anyhow!(
                "{}: top level of a settings file must be a mapping",
                path.display()
            ));
        }

        Ok(Self::with_overrides(Some(path.to_path_buf()), data, env::vars()))
    }

    fn with_overrides<I>(path: Option<PathBuf>, data: Value, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides = Value::Mapping(Mapping::new());
        apply_overrides(&mut overrides, vars);
        Self {
            path,
            tree: Mutex::new(Tree::new(data, overrides)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the backing file, `None` for an in-memory store
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the tree changed since the last load or sync
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Gets the value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        self.value(path)?
            .ok_or_else(|| anyhow!("Path {} does not exist", path.join(".")))
    }

    /// Gets the value at the specified path, `None` if it doesn't exist
    ///
    /// Environment overrides take precedence over stored values. Fails only
    /// when an intermediate node is not a mapping.
    pub fn value(&self, path: &[&str]) -> Result<Option<Value>> {
        let tree = self.lock();
        let overridden = walk(&tree.overrides, path).ok().flatten();
        let stored = match walk(&tree.data, path) {
            Ok(stored) => stored,
            Err(_) if overridden.is_some() => None,
            Err(e) => return Err(e),
        };

        Ok(match (stored, overridden) {
            (Some(stored), Some(overridden)) => {
                let mut merged = stored.clone();
                merge_values(&mut merged, overridden);
                Some(merged)
            }
            (stored, overridden) => overridden.or(stored).cloned(),
        })
    }

    /// Whether a value exists at the specified path
    pub fn contains(&self, path: &[&str]) -> bool {
        matches!(self.value(path), Ok(Some(_)))
    }

    /// Keys of the mapping at the specified path
    ///
    /// A missing path yields an empty list.
    pub fn child_keys(&self, path: &[&str]) -> Result<Vec<String>> {
        match self.value(path)? {
            Some(Value::Mapping(map)) => Ok(map.keys().filter_map(key_to_string).collect()),
            Some(_) => Err(anyhow!("Path {} is not a mapping", path.join("."))),
            None => Ok(Vec::new()),
        }
    }

    /// Sets a value at the specified path
    ///
    /// Intermediate mappings are created as needed. The change stays in
    /// memory until [`Settings::sync`].
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut tree = self.lock();
        set_value_internal(&mut tree.data, path, value)?;
        tree.dirty = true;
        Ok(())
    }

    /// Removes the value (leaf or subtree) at the specified path
    ///
    /// Parent mappings left empty by the removal are pruned. Returns whether
    /// something was removed.
    pub fn remove_value(&self, path: &[&str]) -> Result<bool> {
        let mut tree = self.lock();
        let removed = if path.is_empty() {
            let had_content = !matches!(&tree.data, Value::Mapping(m) if m.is_empty());
            tree.data = Value::Mapping(Mapping::new());
            had_content
        } else {
            remove_value_internal(&mut tree.data, path)?
        };
        if removed {
            tree.dirty = true;
        }
        Ok(removed)
    }

    /// Writes the tree to the backing file if it changed
    ///
    /// Environment overrides are not part of the written tree.
    ///
    /// The file is replaced atomically: the content goes to a temporary file
    /// next to it which is then renamed over the old one. For an in-memory
    /// store this only clears the dirty flag.
    pub fn sync(&self) -> Result<()> {
        let mut tree = self.lock();
        if !tree.dirty {
            return Ok(());
        }

        if let Some(path) = &self.path {
            let yaml = serde_yaml::to_string(&tree.data).context("Failed to serialize settings")?;
            write_atomically(path, &yaml)?;
            debug!(settings_file = %path.display(), "Settings synced");
        }

        tree.dirty = false;
        Ok(())
    }
}

/// Follows `path` from `root`
fn walk<'a>(root: &'a Value, path: &[&str]) -> Result<Option<&'a Value>> {
    let mut current = root;
    for (i, key) in path.iter().enumerate() {
        match current {
            Value::Mapping(map) => match lookup(map, key) {
                Some(next) => current = next,
                None => return Ok(None),
            },
            _ => {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
    }
    Ok(Some(current))
}

/// Lays `top` over `base`, mapping by mapping
fn merge_values(base: &mut Value, top: &Value) {
    match (base, top) {
        (Value::Mapping(base), Value::Mapping(top)) => {
            for (key, value) in top {
                let existing = match key.as_str() {
                    Some(k) => lookup_key(base, k),
                    None => Some(key.clone()).filter(|k| base.contains_key(k)),
                };
                match existing {
                    Some(k) => {
                        if let Some(slot) = base.get_mut(&k) {
                            merge_values(slot, value);
                        }
                    }
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, top) => *base = top.clone(),
    }
}

/// Actual key under which `key` is stored in `map`, numeric keys included
fn lookup_key(map: &Mapping, key: &str) -> Option<Value> {
    if map.contains_key(key) {
        return Some(Value::from(key));
    }
    numeric_key(key).filter(|k| map.contains_key(k))
}

/// Looks a key up in a mapping
///
/// Keys are written as strings, but a hand-edited file may contain numeric
/// keys (`1: [...]`); those are matched too.
fn lookup<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    numeric_key(key).and_then(|k| map.get(&k))
}

fn numeric_key(key: &str) -> Option<Value> {
    key.parse::<i64>().ok().map(Value::from)
}

fn key_to_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        // Une clé numérique saisie à la main est remplacée par sa forme texte
        if let Some(k) = numeric_key(path[0]) {
            if map.contains_key(&k) && !map.contains_key(path[0]) {
                if let Some(old) = map.remove(&k) {
                    map.insert(Value::from(path[0]), old);
                }
            }
        }
        let key = Value::from(path[0]);
        if path.len() == 1 {
            map.insert(key, value);
        } else {
            let entry = map
                .entry(key)
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if entry.is_null() {
                *entry = Value::Mapping(Mapping::new());
            }
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Cannot set {}: current node is not a mapping", path.join(".")))
    }
}

fn remove_value_internal(data: &mut Value, path: &[&str]) -> Result<bool> {
    let Value::Mapping(map) = data else {
        return Ok(false);
    };

    let key = if map.contains_key(path[0]) {
        Value::from(path[0])
    } else {
        match numeric_key(path[0]) {
            Some(k) if map.contains_key(&k) => k,
            _ => return Ok(false),
        }
    };

    if path.len() == 1 {
        return Ok(map.remove(&key).is_some());
    }

    let removed = match map.get_mut(&key) {
        Some(child) => remove_value_internal(child, &path[1..])?,
        None => false,
    };

    // Élaguer les groupes devenus vides
    if removed && matches!(map.get(&key), Some(Value::Mapping(m)) if m.is_empty()) {
        map.remove(&key);
    }

    Ok(removed)
}

/// Applies `PMOSETTINGS__A__B=value` style overrides to a tree
///
/// The value is parsed as YAML, falling back to a plain string.
fn apply_overrides<I>(data: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path: Vec<&str> = rest.split("__").filter(|k| !k.is_empty()).collect();
        if key_path.is_empty() {
            continue;
        }
        let yaml_value = convert_env_value(&value);
        if let Err(e) = set_value_internal(data, &key_path, yaml_value) {
            tracing::warn!(env_var = %key, error = %e, "Ignoring settings override");
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
        return parsed;
    }
    Value::String(value.to_string())
}

fn write_atomically(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory {}", parent.display()))?;
        }
    }

    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| {
        format!("Failed to replace {} with {}", path.display(), tmp.display())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_nested() {
        let settings = Settings::in_memory();
        settings
            .set_value(&["Stations", "Station", "1"], Value::from("x"))
            .unwrap();

        assert_eq!(
            settings.get_value(&["Stations", "Station", "1"]).unwrap(),
            Value::from("x")
        );
        assert!(settings.contains(&["Stations", "Station"]));
        assert!(settings.is_dirty());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let settings = Settings::in_memory();
        settings.set_value(&["Group"], Value::from(1)).unwrap();
        settings.set_value(&["group"], Value::from(2)).unwrap();

        assert_eq!(settings.get_value(&["Group"]).unwrap(), Value::from(1));
        assert_eq!(settings.get_value(&["group"]).unwrap(), Value::from(2));
    }

    #[test]
    fn test_missing_path() {
        let settings = Settings::in_memory();
        assert!(settings.get_value(&["nope"]).is_err());
        assert_eq!(settings.value(&["nope", "deeper"]).unwrap(), None);
    }

    #[test]
    fn test_path_through_scalar_is_an_error() {
        let settings = Settings::in_memory();
        settings.set_value(&["leaf"], Value::from(3)).unwrap();

        assert!(settings.value(&["leaf", "child"]).is_err());
        assert!(settings.set_value(&["leaf", "child"], Value::from(1)).is_err());
    }

    #[test]
    fn test_remove_prunes_empty_groups() {
        let settings = Settings::in_memory();
        settings.set_value(&["g", "sub", "1"], Value::from("a")).unwrap();
        settings.set_value(&["g", "count"], Value::from(1)).unwrap();

        assert!(settings.remove_value(&["g", "sub", "1"]).unwrap());
        assert!(!settings.contains(&["g", "sub"]));
        assert!(settings.contains(&["g", "count"]));

        assert!(!settings.remove_value(&["g", "sub", "1"]).unwrap());
    }

    #[test]
    fn test_numeric_keys_are_matched() {
        let settings = Settings::in_memory();
        let mut inner = Mapping::new();
        inner.insert(Value::from(1), Value::from("one"));
        settings
            .set_value(&["list"], Value::Mapping(inner))
            .unwrap();

        assert_eq!(settings.get_value(&["list", "1"]).unwrap(), Value::from("one"));
        assert_eq!(settings.child_keys(&["list"]).unwrap(), vec!["1".to_string()]);

        settings.set_value(&["list", "1"], Value::from("uno")).unwrap();
        assert_eq!(settings.get_value(&["list", "1"]).unwrap(), Value::from("uno"));
        assert_eq!(settings.child_keys(&["list"]).unwrap().len(), 1);

        assert!(settings.remove_value(&["list", "1"]).unwrap());
        assert!(!settings.contains(&["list"]));
    }

    #[test]
    fn test_overrides() {
        let mut data = Value::Mapping(Mapping::new());
        apply_overrides(
            &mut data,
            vec![
                ("PMOSETTINGS__Stations__Stationcout".to_string(), "2".to_string()),
                ("PMOSETTINGS__player__name".to_string(), "kitchen".to_string()),
                ("OTHER__ignored".to_string(), "1".to_string()),
            ],
        );

        let settings = Settings {
            path: None,
            tree: Mutex::new(Tree::new(data, Value::Mapping(Mapping::new()))),
        };
        assert_eq!(
            settings.get_value(&["Stations", "Stationcout"]).unwrap(),
            Value::from(2)
        );
        assert_eq!(
            settings.get_value(&["player", "name"]).unwrap(),
            Value::from("kitchen")
        );
        assert!(!settings.contains(&["OTHER__ignored"]));
    }

    #[test]
    fn test_overrides_are_not_synced() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "Stations:\n  Stationcout: 1\n  Station:\n    1: [Radio1, 5A]\n")?;

        let data = serde_yaml::from_str(&fs::read_to_string(&path)?)?;
        let settings = Settings::with_overrides(
            Some(path.clone()),
            data,
            vec![("PMOSETTINGS__Stations__Stationcout".to_string(), "0".to_string())],
        );

        // Reads see the override, merged with the stored subtree
        assert_eq!(settings.get_value(&["Stations", "Stationcout"])?, Value::from(0));
        let section = settings.get_value(&["Stations"])?;
        assert_eq!(section["Stationcout"], Value::from(0));
        assert!(section.get("Station").is_some());

        settings.set_value(&["player", "volume"], Value::from(80))?;
        settings.sync()?;

        let reloaded = Settings::load_from(&path)?;
        assert_eq!(reloaded.get_value(&["Stations", "Stationcout"])?, Value::from(1));
        assert_eq!(reloaded.get_value(&["player", "volume"])?, Value::from(80));
        Ok(())
    }

    #[test]
    fn test_sync_in_memory_clears_dirty() {
        let settings = Settings::in_memory();
        settings.set_value(&["a"], Value::from(true)).unwrap();
        settings.sync().unwrap();
        assert!(!settings.is_dirty());
    }
}
