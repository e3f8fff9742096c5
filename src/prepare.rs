//! Preparation of translated data before it is written to a sibling entry:
//! relation remapping and uid regeneration, followed by the schema filters.

use crate::entry::{Entry, EntryId};
use crate::error::Result;
use crate::path::FieldPath;
use crate::schema::Schema;
use crate::store::EntryStore;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::debug;

static SLUG_SEPARATOR: OnceLock<Regex> = OnceLock::new();

/// Lower-case `text` and join its runs of letters and digits with `-`.
pub fn slugify(text: &str) -> String {
    let separator = SLUG_SEPARATOR.get_or_init(|| {
        Regex::new(r"[^\p{L}\p{N}]+").expect("Invalid slug separator regex")
    });
    separator
        .replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

pub struct Preparer {
    store: Arc<dyn EntryStore>,
    schema: Arc<Schema>,
    regenerate_uids: bool,
}

impl Preparer {
    pub fn new(store: Arc<dyn EntryStore>, schema: Arc<Schema>, regenerate_uids: bool) -> Self {
        Self {
            store,
            schema,
            regenerate_uids,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Data for a new `target_locale` sibling created from `translated`.
    pub async fn prepare_new(
        &self,
        content_type: &str,
        translated: &Entry,
        target_locale: &str,
    ) -> Result<Map<String, Value>> {
        let mut fields = translated.fields.clone();
        self.remap_relations(content_type, &mut fields, target_locale)
            .await?;
        self.update_uids(content_type, &mut fields, None).await?;
        self.schema.remove_deleted_fields(content_type, &mut fields)?;
        self.schema.sanitize(content_type, &mut fields)?;
        Ok(fields)
    }

    /// Point relations at the `target_locale` versions of the related
    /// entries. Relations to non-localized content types are kept; related
    /// entries without a `target_locale` version are dropped.
    pub async fn remap_relations(
        &self,
        content_type: &str,
        fields: &mut Map<String, Value>,
        target_locale: &str,
    ) -> Result<()> {
        for relation in self.schema.relation_fields(content_type, fields)? {
            if !self.schema.is_localized(&relation.target) {
                continue;
            }
            let Some(value) = relation.path.get(fields).cloned() else {
                continue;
            };
            let remapped = match value {
                Value::Array(items) => {
                    let mut kept = Vec::with_capacity(items.len());
                    for item in items {
                        if let Some(item) =
                            self.remap_one(&relation.target, item, target_locale).await?
                        {
                            kept.push(item);
                        }
                    }
                    Value::Array(kept)
                }
                single => self
                    .remap_one(&relation.target, single, target_locale)
                    .await?
                    .unwrap_or(Value::Null),
            };
            relation.path.set(fields, remapped);
        }
        Ok(())
    }

    /// `item` is either a bare id or an object carrying an `id`.
    async fn remap_one(
        &self,
        target: &str,
        item: Value,
        target_locale: &str,
    ) -> Result<Option<Value>> {
        let id = match &item {
            Value::Number(n) => n.as_i64(),
            Value::Object(map) => map.get("id").and_then(Value::as_i64),
            _ => None,
        };
        let Some(id) = id else {
            return Ok(None);
        };
        let Some(related) = self.store.find_entry(target, id).await? else {
            debug!("Dropping relation to missing {} entry {}", target, id);
            return Ok(None);
        };

        let localized_id = if related.locale == target_locale {
            Some(related.id)
        } else {
            related.localization_for(target_locale).map(|l| l.id)
        };
        Ok(localized_id.map(|new_id| match item {
            Value::Object(_) => json!({ "id": new_id }),
            _ => json!(new_id),
        }))
    }

    /// Regenerate every uid attribute as a unique slug of its target field,
    /// or strip it when regeneration is disabled. Returns the paths that now
    /// hold a regenerated value.
    pub async fn update_uids(
        &self,
        content_type: &str,
        fields: &mut Map<String, Value>,
        except: Option<EntryId>,
    ) -> Result<Vec<FieldPath>> {
        let mut regenerated = Vec::new();
        for uid in self.schema.uid_attributes(content_type)? {
            if !self.regenerate_uids {
                fields.remove(&uid.name);
                continue;
            }

            let source_text = uid
                .target_field
                .as_ref()
                .and_then(|target| fields.get(target))
                .and_then(Value::as_str)
                .or_else(|| fields.get(&uid.name).and_then(Value::as_str))
                .unwrap_or_default();
            let base = slugify(source_text);
            if base.is_empty() {
                fields.remove(&uid.name);
                continue;
            }

            let value = self
                .unique_uid(content_type, &uid.name, &base, except)
                .await?;
            fields.insert(uid.name.clone(), Value::String(value));
            regenerated.push(FieldPath::key(uid.name));
        }
        Ok(regenerated)
    }

    async fn unique_uid(
        &self,
        content_type: &str,
        attribute: &str,
        base: &str,
        except: Option<EntryId>,
    ) -> Result<String> {
        let mut candidate = base.to_string();
        let mut n = 1;
        while self
            .store
            .uid_taken(content_type, attribute, &candidate, except)
            .await?
        {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LocalizationRef;
    use crate::store::{MemoryStore, Snapshot};
    use std::collections::BTreeMap;

    const CT: &str = "api::article.article";

    fn schema() -> Schema {
        Schema::from_json(
            r#"{
                "contentTypes": {
                    "api::article.article": {
                        "attributes": {
                            "title": {"type": "string"},
                            "slug": {"type": "uid", "targetField": "title"},
                            "note": {"type": "text", "translate": "delete"},
                            "category": {"type": "relation", "target": "api::category.category"},
                            "tags": {"type": "relation", "target": "api::tag.tag"},
                            "author": {"type": "relation", "target": "api::author.author"}
                        }
                    },
                    "api::category.category": {"attributes": {"name": {"type": "string"}}},
                    "api::tag.tag": {"attributes": {"name": {"type": "string"}}},
                    "api::author.author": {"localized": false, "attributes": {"name": {"type": "string"}}}
                }
            }"#,
        )
        .unwrap()
    }

    fn localized(id: EntryId, locale: &str, sibling: Option<(EntryId, &str)>) -> Entry {
        let mut entry = Entry::new(id, locale);
        if let Some((sibling_id, sibling_locale)) = sibling {
            entry.localizations.push(LocalizationRef {
                id: sibling_id,
                locale: sibling_locale.to_string(),
            });
        }
        entry
    }

    fn preparer(regenerate_uids: bool) -> Preparer {
        let schema = schema();
        let store = MemoryStore::new(Snapshot {
            schema: schema.clone(),
            locales: Vec::new(),
            entries: BTreeMap::from([
                (
                    CT.to_string(),
                    vec![Entry::new(1, "en")
                        .with_field("title", serde_json::json!("Hallo Welt"))
                        .with_field("slug", serde_json::json!("hallo-welt"))],
                ),
                (
                    "api::category.category".to_string(),
                    vec![
                        localized(10, "en", Some((11, "de"))),
                        localized(11, "de", Some((10, "en"))),
                    ],
                ),
                (
                    "api::tag.tag".to_string(),
                    vec![
                        localized(20, "en", Some((21, "de"))),
                        localized(21, "de", Some((20, "en"))),
                        localized(22, "en", None),
                    ],
                ),
            ]),
            markers: Vec::new(),
        });
        Preparer::new(Arc::new(store), Arc::new(schema), regenerate_uids)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World!"), "hello-world");
        assert_eq!(slugify("  Grüße aus Köln "), "grüße-aus-köln");
        assert_eq!(slugify("---"), "");
    }

    #[tokio::test]
    async fn test_remap_relations() {
        let mut fields = json!({
            "category": {"id": 10},
            "tags": [20, 22],
            "author": 5
        })
        .as_object()
        .cloned()
        .unwrap();

        preparer(false)
            .remap_relations(CT, &mut fields, "de")
            .await
            .unwrap();

        assert_eq!(fields["category"], json!({"id": 11}));
        assert_eq!(fields["tags"], json!([21]));
        // non-localized targets are shared across locales
        assert_eq!(fields["author"], json!(5));
    }

    #[tokio::test]
    async fn test_relation_without_counterpart_dropped() {
        let mut fields = json!({"category": 99}).as_object().cloned().unwrap();
        preparer(false)
            .remap_relations(CT, &mut fields, "de")
            .await
            .unwrap();
        assert_eq!(fields["category"], Value::Null);
    }

    #[tokio::test]
    async fn test_update_uids_regenerates_unique_slug() {
        let mut fields = json!({"title": "Hallo Welt", "slug": "hello-world"})
            .as_object()
            .cloned()
            .unwrap();

        let paths = preparer(true)
            .update_uids(CT, &mut fields, None)
            .await
            .unwrap();

        assert_eq!(fields["slug"], json!("hallo-welt-1"));
        assert_eq!(paths, vec![FieldPath::key("slug")]);
    }

    #[tokio::test]
    async fn test_update_uids_ignores_own_entry() {
        let mut fields = json!({"title": "Hallo Welt"}).as_object().cloned().unwrap();
        preparer(true)
            .update_uids(CT, &mut fields, Some(1))
            .await
            .unwrap();
        assert_eq!(fields["slug"], json!("hallo-welt"));
    }

    #[tokio::test]
    async fn test_update_uids_strips_when_disabled() {
        let mut fields = json!({"title": "Hallo", "slug": "hello"})
            .as_object()
            .cloned()
            .unwrap();
        let paths = preparer(false)
            .update_uids(CT, &mut fields, None)
            .await
            .unwrap();
        assert!(!fields.contains_key("slug"));
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_new_applies_all_filters() {
        let translated = Entry::new(1, "en")
            .with_field("title", json!("Neu"))
            .with_field("slug", json!("new"))
            .with_field("note", json!("internal"))
            .with_field("createdBy", json!(3))
            .with_field("category", json!(10));

        let fields = preparer(true)
            .prepare_new(CT, &translated, "de")
            .await
            .unwrap();

        assert_eq!(
            Value::Object(fields),
            json!({"title": "Neu", "slug": "neu", "category": 11})
        );
    }
}
