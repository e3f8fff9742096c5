//! Content-type metadata: which attributes exist, which are localized, and
//! how each one is treated when an entry is translated.

use crate::entry::{FieldFormat, TranslatableField};
use crate::error::{LocalizeError, Result};
use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key naming the component of a dynamic-zone item
pub const COMPONENT_KEY: &str = "__component";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub content_types: BTreeMap<String, Model>,
    #[serde(default)]
    pub components: BTreeMap<String, Model>,
}

/// Attribute set of a content type or component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Content types that are not localized exist once for all locales.
    #[serde(default = "default_true")]
    pub localized: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(flatten)]
    pub kind: AttributeKind,
    /// Non-localized attributes are shared across the localization group.
    #[serde(default = "default_true")]
    pub localized: bool,
    #[serde(default)]
    pub translate: TranslateMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Text,
    Richtext,
    Blocks,
    Html,
    Uid {
        #[serde(rename = "targetField", default)]
        target_field: Option<String>,
    },
    Relation {
        target: String,
        #[serde(default)]
        relation: Option<String>,
    },
    Component {
        component: String,
        #[serde(default)]
        repeatable: bool,
    },
    Dynamiczone {
        #[serde(default)]
        components: Vec<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslateMode {
    #[default]
    Translate,
    /// Copied verbatim into new localizations
    Copy,
    /// Left out of new localizations
    Delete,
}

fn default_true() -> bool {
    true
}

impl Attribute {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            localized: true,
            translate: TranslateMode::Translate,
        }
    }

    /// Format the attribute travels in, for text-like attributes.
    pub fn text_format(&self) -> Option<FieldFormat> {
        match self.kind {
            AttributeKind::String | AttributeKind::Text => Some(FieldFormat::Plain),
            AttributeKind::Richtext => Some(FieldFormat::Markdown),
            AttributeKind::Blocks => Some(FieldFormat::Blocks),
            AttributeKind::Html => Some(FieldFormat::Html),
            _ => None,
        }
    }

    fn is_translated(&self) -> bool {
        self.localized && self.translate == TranslateMode::Translate
    }
}

/// A relation found in entry data.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationField {
    pub path: FieldPath,
    /// Content type of the related entries
    pub target: String,
}

/// A uid attribute and the attribute its value is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct UidAttribute {
    pub name: String,
    pub target_field: Option<String>,
}

impl Schema {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LocalizeError::Store(format!("invalid schema: {}", e)))
    }

    pub fn content_type(&self, uid: &str) -> Result<&Model> {
        self.content_types
            .get(uid)
            .ok_or_else(|| LocalizeError::UnknownContentType(uid.to_string()))
    }

    pub fn is_localized(&self, uid: &str) -> bool {
        self.content_types.get(uid).is_some_and(|m| m.localized)
    }

    /// Every translatable field holding a value in `fields`, including
    /// fields inside components and dynamic zones.
    pub fn translatable_fields(
        &self,
        content_type: &str,
        fields: &Map<String, Value>,
    ) -> Result<Vec<TranslatableField>> {
        let model = self.content_type(content_type)?;
        let mut found = Vec::new();
        let mut visit = |path: &FieldPath, attribute: &Attribute, value: &Value| {
            if let Some(format) = attribute.text_format() {
                if !value.is_null() {
                    found.push(TranslatableField::new(path.clone(), format));
                }
            }
        };
        self.walk(
            model,
            fields,
            &FieldPath::default(),
            &Attribute::is_translated,
            &mut visit,
        );
        Ok(found)
    }

    /// Every relation holding a value in `fields`.
    pub fn relation_fields(
        &self,
        content_type: &str,
        fields: &Map<String, Value>,
    ) -> Result<Vec<RelationField>> {
        let model = self.content_type(content_type)?;
        let mut found = Vec::new();
        let mut visit = |path: &FieldPath, attribute: &Attribute, value: &Value| {
            if let AttributeKind::Relation { target, .. } = &attribute.kind {
                if !value.is_null() {
                    found.push(RelationField {
                        path: path.clone(),
                        target: target.clone(),
                    });
                }
            }
        };
        self.walk(model, fields, &FieldPath::default(), &|_| true, &mut visit);
        Ok(found)
    }

    pub fn uid_attributes(&self, content_type: &str) -> Result<Vec<UidAttribute>> {
        let model = self.content_type(content_type)?;
        Ok(model
            .attributes
            .iter()
            .filter_map(|(name, attribute)| match &attribute.kind {
                AttributeKind::Uid { target_field } => Some(UidAttribute {
                    name: name.clone(),
                    target_field: target_field.clone(),
                }),
                _ => None,
            })
            .collect())
    }

    /// Top-level attributes shared by every entry of a localization group.
    pub fn non_localized_attributes(&self, content_type: &str) -> Result<Vec<String>> {
        let model = self.content_type(content_type)?;
        Ok(model
            .attributes
            .iter()
            .filter(|(_, attribute)| !attribute.localized)
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// Drop attributes marked `translate: delete`, recursing into components.
    pub fn remove_deleted_fields(
        &self,
        content_type: &str,
        fields: &mut Map<String, Value>,
    ) -> Result<()> {
        let model = self.content_type(content_type)?;
        self.remove_deleted_in(model, fields);
        Ok(())
    }

    /// Keep only attributes the schema knows. Component ids are dropped so
    /// the store creates fresh component rows.
    pub fn sanitize(&self, content_type: &str, fields: &mut Map<String, Value>) -> Result<()> {
        let model = self.content_type(content_type)?;
        self.sanitize_in(model, fields, false);
        Ok(())
    }

    fn walk(
        &self,
        model: &Model,
        fields: &Map<String, Value>,
        base: &FieldPath,
        enter: &dyn Fn(&Attribute) -> bool,
        visit: &mut dyn FnMut(&FieldPath, &Attribute, &Value),
    ) {
        for (name, attribute) in &model.attributes {
            let Some(value) = fields.get(name) else {
                continue;
            };
            if !enter(attribute) {
                continue;
            }
            let path = if base.is_empty() {
                FieldPath::key(name.as_str())
            } else {
                base.child(name.as_str())
            };
            match &attribute.kind {
                AttributeKind::Component {
                    component,
                    repeatable,
                } => {
                    let Some(inner) = self.components.get(component) else {
                        continue;
                    };
                    match (value, *repeatable) {
                        (Value::Array(items), true) => {
                            for (i, item) in items.iter().enumerate() {
                                if let Value::Object(map) = item {
                                    self.walk(inner, map, &path.index(i), enter, visit);
                                }
                            }
                        }
                        (Value::Object(map), false) => self.walk(inner, map, &path, enter, visit),
                        _ => {}
                    }
                }
                AttributeKind::Dynamiczone { .. } => {
                    let Value::Array(items) = value else {
                        continue;
                    };
                    for (i, item) in items.iter().enumerate() {
                        let Value::Object(map) = item else {
                            continue;
                        };
                        let inner = map
                            .get(COMPONENT_KEY)
                            .and_then(Value::as_str)
                            .and_then(|uid| self.components.get(uid));
                        if let Some(inner) = inner {
                            self.walk(inner, map, &path.index(i), enter, visit);
                        }
                    }
                }
                _ => visit(&path, attribute, value),
            }
        }
    }

    fn remove_deleted_in(&self, model: &Model, fields: &mut Map<String, Value>) {
        for (name, attribute) in &model.attributes {
            if attribute.translate == TranslateMode::Delete {
                fields.remove(name);
                continue;
            }
            let Some(value) = fields.get_mut(name) else {
                continue;
            };
            self.for_each_component(attribute, value, &mut |inner, map| {
                self.remove_deleted_in(inner, map)
            });
        }
    }

    fn sanitize_in(&self, model: &Model, fields: &mut Map<String, Value>, in_component: bool) {
        fields.retain(|name, _| {
            model.attributes.contains_key(name) || (in_component && name == COMPONENT_KEY)
        });
        for (name, attribute) in &model.attributes {
            let Some(value) = fields.get_mut(name) else {
                continue;
            };
            self.for_each_component(attribute, value, &mut |inner, map| {
                self.sanitize_in(inner, map, true)
            });
        }
    }

    /// Call `f` on every component object held by a component or
    /// dynamic-zone attribute value.
    fn for_each_component(
        &self,
        attribute: &Attribute,
        value: &mut Value,
        f: &mut dyn FnMut(&Model, &mut Map<String, Value>),
    ) {
        match (&attribute.kind, value) {
            (AttributeKind::Component { component, .. }, value) => {
                let Some(inner) = self.components.get(component) else {
                    return;
                };
                match value {
                    Value::Object(map) => f(inner, map),
                    Value::Array(items) => {
                        for item in items {
                            if let Value::Object(map) = item {
                                f(inner, map);
                            }
                        }
                    }
                    _ => {}
                }
            }
            (AttributeKind::Dynamiczone { .. }, Value::Array(items)) => {
                for item in items {
                    let Value::Object(map) = item else {
                        continue;
                    };
                    let inner = map
                        .get(COMPONENT_KEY)
                        .and_then(Value::as_str)
                        .and_then(|uid| self.components.get(uid));
                    if let Some(inner) = inner {
                        f(inner, map);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{
                "contentTypes": {
                    "api::article.article": {
                        "attributes": {
                            "title": {"type": "string"},
                            "slug": {"type": "uid", "targetField": "title"},
                            "body": {"type": "richtext"},
                            "content": {"type": "blocks"},
                            "internalNote": {"type": "text", "translate": "delete"},
                            "code": {"type": "string", "translate": "copy"},
                            "views": {"type": "integer", "localized": false},
                            "category": {"type": "relation", "target": "api::category.category", "relation": "manyToOne"},
                            "seo": {"type": "component", "component": "shared.seo"},
                            "sections": {"type": "dynamiczone", "components": ["shared.quote", "shared.seo"]}
                        }
                    },
                    "api::category.category": {
                        "attributes": {"name": {"type": "string"}}
                    },
                    "api::author.author": {
                        "localized": false,
                        "attributes": {"name": {"type": "string"}}
                    }
                },
                "components": {
                    "shared.seo": {
                        "attributes": {
                            "metaTitle": {"type": "string"},
                            "keywords": {"type": "text", "translate": "delete"}
                        }
                    },
                    "shared.quote": {
                        "attributes": {
                            "text": {"type": "html"},
                            "author": {"type": "relation", "target": "api::author.author"}
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn article() -> Map<String, Value> {
        json!({
            "title": "Hello",
            "slug": "hello",
            "body": "**Hi**",
            "content": null,
            "internalNote": "secret",
            "code": "A-1",
            "views": 3,
            "category": {"id": 4},
            "createdBy": 1,
            "seo": {"id": 9, "metaTitle": "Meta", "keywords": "k"},
            "sections": [
                {"__component": "shared.quote", "id": 11, "text": "<p>Q</p>", "author": 2},
                {"__component": "shared.seo", "id": 12, "metaTitle": "Inner"}
            ]
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn paths(fields: &[TranslatableField]) -> Vec<(String, FieldFormat)> {
        fields
            .iter()
            .map(|f| (f.path.to_string(), f.format))
            .collect()
    }

    #[test]
    fn test_attribute_parsing() {
        let schema = schema();
        let model = schema.content_type("api::article.article").unwrap();
        assert_eq!(
            model.attributes["slug"].kind,
            AttributeKind::Uid {
                target_field: Some("title".to_string())
            }
        );
        assert_eq!(model.attributes["views"].kind, AttributeKind::Other);
        assert!(!model.attributes["views"].localized);
        assert_eq!(model.attributes["internalNote"].translate, TranslateMode::Delete);
        assert!(!schema.is_localized("api::author.author"));
        assert!(schema.is_localized("api::category.category"));
    }

    #[test]
    fn test_unknown_content_type() {
        let err = schema().content_type("api::nope.nope").unwrap_err();
        assert!(matches!(err, LocalizeError::UnknownContentType(_)));
    }

    #[test]
    fn test_translatable_fields_walk_components_and_zones() {
        let fields = schema()
            .translatable_fields("api::article.article", &article())
            .unwrap();
        assert_eq!(
            paths(&fields),
            vec![
                ("body".to_string(), FieldFormat::Markdown),
                ("sections.0.text".to_string(), FieldFormat::Html),
                ("sections.1.metaTitle".to_string(), FieldFormat::Plain),
                ("seo.metaTitle".to_string(), FieldFormat::Plain),
                ("title".to_string(), FieldFormat::Plain),
            ]
        );
    }

    #[test]
    fn test_relation_fields() {
        let relations = schema()
            .relation_fields("api::article.article", &article())
            .unwrap();
        let found: Vec<(String, String)> = relations
            .iter()
            .map(|r| (r.path.to_string(), r.target.clone()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("category".to_string(), "api::category.category".to_string()),
                ("sections.0.author".to_string(), "api::author.author".to_string()),
            ]
        );
    }

    #[test]
    fn test_uid_and_non_localized_attributes() {
        let schema = schema();
        assert_eq!(
            schema.uid_attributes("api::article.article").unwrap(),
            vec![UidAttribute {
                name: "slug".to_string(),
                target_field: Some("title".to_string())
            }]
        );
        assert_eq!(
            schema.non_localized_attributes("api::article.article").unwrap(),
            vec!["views".to_string()]
        );
    }

    #[test]
    fn test_remove_deleted_fields_recurses() {
        let mut fields = article();
        schema()
            .remove_deleted_fields("api::article.article", &mut fields)
            .unwrap();
        assert!(!fields.contains_key("internalNote"));
        assert!(fields.contains_key("code"));
        assert_eq!(fields["seo"], json!({"id": 9, "metaTitle": "Meta"}));
    }

    #[test]
    fn test_sanitize_keeps_schema_attributes() {
        let mut fields = article();
        schema()
            .sanitize("api::article.article", &mut fields)
            .unwrap();
        assert!(!fields.contains_key("createdBy"));
        assert_eq!(fields["seo"], json!({"metaTitle": "Meta", "keywords": "k"}));
        assert_eq!(
            fields["sections"][0],
            json!({"__component": "shared.quote", "text": "<p>Q</p>", "author": 2})
        );
    }
}
