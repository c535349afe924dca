//! Live threshold profile store.
//!
//! ```toml
//! [profiles.default.gates.triggers]
//! call_harmonizers_below = 0.62
//! early_severance_below = 0.25
//!
//! [profiles.default.meta_gate.coherence]
//! warn_below = 0.60
//! ```
//!
//! Edits go through `toml_edit` so comments and layout survive a rewrite, and
//! the whole document is replaced atomically on save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tidegate_types::{KeyPath, ThresholdProfile};
use tidegate_utils::{AtomicWriteOptions, PersistMode, atomic_write_with_options, recover_bak_file};
use toml_edit::{DocumentMut, Item, TableLike, Value};

use crate::{ConfigError, read_required};

const WHAT: &str = "threshold profile store";
const PROFILES: &str = "profiles";

#[derive(Debug, Default, Deserialize)]
struct StoreSnapshot {
    #[serde(default)]
    profiles: BTreeMap<String, ThresholdProfile>,
}

/// In-memory copy of the profile store document.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    doc: DocumentMut,
}

impl ProfileStore {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        recover_bak_file(path);
        let content = read_required(WHAT, path)?;
        let doc = content
            .parse::<DocumentMut>()
            .map_err(|err| Self::malformed(path, err.to_string()))?;
        if let Some(item) = doc.get(PROFILES)
            && item.as_table_like().is_none()
        {
            let message = "`profiles` must be a table".to_string();
            return Err(Self::malformed(path, message));
        }
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    fn malformed(path: &Path, message: String) -> ConfigError {
        tracing::warn!(path = %path.display(), "Failed to parse {WHAT}: {message}");
        ConfigError::Malformed {
            what: WHAT,
            path: path.to_path_buf(),
            message,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles_table()
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, item)| item.is_table_like())
                    .map(|(name, _)| name.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Immutable snapshot of every profile.
    pub fn snapshot(&self) -> Result<BTreeMap<String, ThresholdProfile>, ConfigError> {
        toml::from_str::<StoreSnapshot>(&self.doc.to_string())
            .map(|snapshot| snapshot.profiles)
            .map_err(|err| Self::malformed(&self.path, err.to_string()))
    }

    /// Numeric value at `path` within `profile`.
    #[must_use]
    pub fn number(&self, profile: &str, path: &KeyPath) -> Option<f64> {
        let table = self.profiles_table()?.get(profile)?.as_table_like()?;
        find(table, path.segments()).and_then(as_number)
    }

    /// Overwrite an existing numeric value, keeping its surrounding decoration.
    ///
    /// Returns `false` (and changes nothing) when the path is absent or not numeric.
    pub fn set_number(&mut self, profile: &str, path: &KeyPath, new: f64) -> bool {
        let Some(table) = self
            .doc
            .get_mut(PROFILES)
            .and_then(Item::as_table_like_mut)
            .and_then(|profiles| profiles.get_mut(profile))
            .and_then(Item::as_table_like_mut)
        else {
            return false;
        };
        let Some(item) = find_mut(table, path.segments()) else {
            return false;
        };
        if as_number(item).is_none() {
            return false;
        }
        let Some(value) = item.as_value_mut() else {
            return false;
        };
        let decor = value.decor().clone();
        *value = Value::from(new);
        *value.decor_mut() = decor;
        true
    }

    /// Write the whole document back atomically, keeping the file's mode.
    pub fn save(&self) -> Result<(), ConfigError> {
        let options = AtomicWriteOptions {
            mode: PersistMode::preserve_existing(&self.path),
            ..AtomicWriteOptions::default()
        };
        let text = self.doc.to_string();
        if let Err(source) = atomic_write_with_options(&self.path, text.as_bytes(), options) {
            tracing::warn!(path = %self.path.display(), "Failed to write {WHAT}: {source}");
            return Err(ConfigError::Write {
                what: WHAT,
                path: self.path.clone(),
                source,
            });
        }
        tracing::info!(path = %self.path.display(), "Profile store saved");
        Ok(())
    }

    fn profiles_table(&self) -> Option<&dyn TableLike> {
        self.doc.get(PROFILES)?.as_table_like()
    }
}

fn find<'a>(table: &'a dyn TableLike, segments: &[String]) -> Option<&'a Item> {
    let (first, rest) = segments.split_first()?;
    let item = table.get(first)?;
    if rest.is_empty() {
        Some(item)
    } else {
        find(item.as_table_like()?, rest)
    }
}

fn find_mut<'a>(table: &'a mut dyn TableLike, segments: &[String]) -> Option<&'a mut Item> {
    let (first, rest) = segments.split_first()?;
    let item = table.get_mut(first)?;
    if rest.is_empty() {
        Some(item)
    } else {
        find_mut(item.as_table_like_mut()?, rest)
    }
}

fn as_number(item: &Item) -> Option<f64> {
    item.as_float()
        .or_else(|| item.as_integer().map(|value| value as f64))
}
