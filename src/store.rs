//! Persistence collaborators and an in-memory implementation.
//!
//! The pipeline only talks to [`EntryStore`] and [`LocaleDirectory`].
//! [`MemoryStore`] implements both over a [`Snapshot`] that can be loaded
//! from and written back to a JSON file.

use crate::entry::{Entry, EntryDraft, EntryId, LocalizationRef};
use crate::error::{LocalizeError, Result};
use crate::path::FieldPath;
use crate::schema::Schema;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub type MarkerId = i64;

/// Pending record of a source entry whose translatable content changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMarker {
    pub id: MarkerId,
    /// `-`-joined ids of the localization group; the first is the source
    pub group_id: String,
    pub content_type: String,
}

impl ChangeMarker {
    /// Entry ids of the group, source first. Unparsable parts are skipped.
    pub fn entry_ids(&self) -> Vec<EntryId> {
        self.group_id
            .split('-')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    }

    pub fn source_id(&self) -> Option<EntryId> {
        self.entry_ids().first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locale {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Locale {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            is_default: false,
        }
    }
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn find_entry(&self, content_type: &str, id: EntryId) -> Result<Option<Entry>>;

    /// Persist a new entry and return it with its assigned id.
    async fn create_entry(&self, content_type: &str, draft: EntryDraft) -> Result<Entry>;

    /// Overwrite the given paths of an existing entry, leaving everything
    /// else untouched.
    async fn update_fields(
        &self,
        content_type: &str,
        id: EntryId,
        updates: Vec<(FieldPath, Value)>,
    ) -> Result<Entry>;

    async fn set_localizations(
        &self,
        content_type: &str,
        id: EntryId,
        localizations: Vec<LocalizationRef>,
    ) -> Result<()>;

    /// Whether any entry of the content type other than `except` already
    /// uses `value` for the uid `attribute`.
    async fn uid_taken(
        &self,
        content_type: &str,
        attribute: &str,
        value: &str,
        except: Option<EntryId>,
    ) -> Result<bool>;

    async fn find_change_marker(&self, id: MarkerId) -> Result<Option<ChangeMarker>>;

    async fn delete_change_marker(&self, id: MarkerId) -> Result<()>;
}

#[async_trait]
pub trait LocaleDirectory: Send + Sync {
    /// Configured locales in display order.
    async fn find(&self) -> Result<Vec<Locale>>;
}

/// Serializable store contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub schema: Schema,
    #[serde(default)]
    pub locales: Vec<Locale>,
    /// Entries per content type
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<Entry>>,
    #[serde(default)]
    pub markers: Vec<ChangeMarker>,
}

pub struct MemoryStore {
    state: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        debug!(
            "Loaded snapshot with {} content types, {} locales, {} markers",
            snapshot.entries.len(),
            snapshot.locales.len(),
            snapshot.markers.len()
        );
        Ok(Self::new(snapshot))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&*self.lock())
            .context("Failed to serialize snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    pub fn schema(&self) -> Schema {
        self.lock().schema.clone()
    }

    pub fn entries(&self, content_type: &str) -> Vec<Entry> {
        self.lock()
            .entries
            .get(content_type)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn entry_mut<'a>(
    snapshot: &'a mut Snapshot,
    content_type: &str,
    id: EntryId,
) -> Result<&'a mut Entry> {
    snapshot
        .entries
        .get_mut(content_type)
        .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
        .ok_or_else(|| LocalizeError::EntryNotFound {
            content_type: content_type.to_string(),
            id,
        })
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn find_entry(&self, content_type: &str, id: EntryId) -> Result<Option<Entry>> {
        Ok(self
            .lock()
            .entries
            .get(content_type)
            .and_then(|entries| entries.iter().find(|e| e.id == id))
            .cloned())
    }

    async fn create_entry(&self, content_type: &str, draft: EntryDraft) -> Result<Entry> {
        let mut state = self.lock();
        let id = state
            .entries
            .values()
            .flatten()
            .map(|e| e.id)
            .max()
            .unwrap_or(0)
            + 1;
        let entry = Entry {
            id,
            locale: draft.locale,
            published_at: draft.published_at,
            localizations: Vec::new(),
            fields: draft.fields,
        };
        state
            .entries
            .entry(content_type.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn update_fields(
        &self,
        content_type: &str,
        id: EntryId,
        updates: Vec<(FieldPath, Value)>,
    ) -> Result<Entry> {
        let mut state = self.lock();
        let entry = entry_mut(&mut state, content_type, id)?;
        for (path, value) in updates {
            entry.set(&path, value);
        }
        Ok(entry.clone())
    }

    async fn set_localizations(
        &self,
        content_type: &str,
        id: EntryId,
        localizations: Vec<LocalizationRef>,
    ) -> Result<()> {
        let mut state = self.lock();
        entry_mut(&mut state, content_type, id)?.localizations = localizations;
        Ok(())
    }

    async fn uid_taken(
        &self,
        content_type: &str,
        attribute: &str,
        value: &str,
        except: Option<EntryId>,
    ) -> Result<bool> {
        Ok(self.lock().entries.get(content_type).is_some_and(|entries| {
            entries.iter().any(|e| {
                Some(e.id) != except && e.fields.get(attribute).and_then(Value::as_str) == Some(value)
            })
        }))
    }

    async fn find_change_marker(&self, id: MarkerId) -> Result<Option<ChangeMarker>> {
        Ok(self.lock().markers.iter().find(|m| m.id == id).cloned())
    }

    async fn delete_change_marker(&self, id: MarkerId) -> Result<()> {
        self.lock().markers.retain(|m| m.id != id);
        Ok(())
    }
}

#[async_trait]
impl LocaleDirectory for MemoryStore {
    async fn find(&self) -> Result<Vec<Locale>> {
        Ok(self.lock().locales.clone())
    }
}
