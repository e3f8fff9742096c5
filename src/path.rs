//! Structured addressing of values inside an entry.
//!
//! A [`FieldPath`] is a sequence of object keys and array indexes, parsed
//! once from the dotted form used in schemas and configuration
//! (`seo.metaTitle`, `sections.0.heading` or `sections[0].heading`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Path to a top-level attribute.
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Key(name.into())],
        }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(name.into()));
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get<'a>(&self, fields: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = match first {
            Segment::Key(key) => fields.get(key)?,
            Segment::Index(_) => return None,
        };
        for segment in rest {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, creating intermediate objects and arrays
    /// the way the next segment requires. Existing scalars in the way are
    /// replaced.
    pub fn set(&self, fields: &mut Map<String, Value>, value: Value) {
        let Some((Segment::Key(first), rest)) = self.segments.split_first() else {
            return;
        };
        if rest.is_empty() {
            fields.insert(first.clone(), value);
            return;
        }
        let slot = fields
            .entry(first.clone())
            .or_insert_with(|| container_for(&rest[0]));
        set_in(slot, rest, value);
    }

    /// Remove the value at this path. Array elements are replaced by null so
    /// sibling indexes stay stable.
    pub fn remove(&self, fields: &mut Map<String, Value>) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        if parents.is_empty() {
            return match last {
                Segment::Key(key) => fields.remove(key),
                Segment::Index(_) => None,
            };
        }
        let parent = FieldPath {
            segments: parents.to_vec(),
        };
        match parent.get_mut(fields)? {
            Value::Object(map) => match last {
                Segment::Key(key) => map.remove(key),
                Segment::Index(_) => None,
            },
            Value::Array(items) => match last {
                Segment::Index(i) if *i < items.len() => Some(std::mem::take(&mut items[*i])),
                _ => None,
            },
            _ => None,
        }
    }

    fn get_mut<'a>(&self, fields: &'a mut Map<String, Value>) -> Option<&'a mut Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = match first {
            Segment::Key(key) => fields.get_mut(key)?,
            Segment::Index(_) => return None,
        };
        for segment in rest {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
                (Segment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn container_for(segment: &Segment) -> Value {
    match segment {
        Segment::Key(_) => Value::Object(Map::new()),
        Segment::Index(_) => Value::Array(Vec::new()),
    }
}

fn set_in(slot: &mut Value, segments: &[Segment], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };
    match segment {
        Segment::Key(key) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                let next = match rest.first() {
                    Some(next) => map.entry(key.clone()).or_insert_with(|| container_for(next)),
                    None => map.entry(key.clone()).or_insert(Value::Null),
                };
                set_in(next, rest, value);
            }
        }
        Segment::Index(i) => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                if items.len() <= *i {
                    items.resize(*i + 1, Value::Null);
                }
                if let Some(next) = rest.first() {
                    if items[*i].is_null() {
                        items[*i] = container_for(next);
                    }
                }
                set_in(&mut items[*i], rest, value);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePathError(String);

impl fmt::Display for ParsePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid field path '{}'", self.0)
    }
}

impl std::error::Error for ParsePathError {}

impl FromStr for FieldPath {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        for part in s.split('.') {
            // `items[2]` is accepted as shorthand for `items.2`
            let (name, brackets) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if name.is_empty() && brackets.is_empty() {
                return Err(ParsePathError(s.to_string()));
            }
            if !name.is_empty() {
                segments.push(match name.parse::<usize>() {
                    Ok(i) if !segments.is_empty() => Segment::Index(i),
                    _ => Segment::Key(name.to_string()),
                });
            }
            let mut rest = brackets;
            while !rest.is_empty() {
                let inner = rest
                    .strip_prefix('[')
                    .and_then(|r| r.split_once(']'))
                    .ok_or_else(|| ParsePathError(s.to_string()))?;
                let index = inner
                    .0
                    .parse::<usize>()
                    .map_err(|_| ParsePathError(s.to_string()))?;
                segments.push(Segment::Index(index));
                rest = inner.1;
            }
        }
        if !matches!(segments.first(), Some(Segment::Key(_))) {
            return Err(ParsePathError(s.to_string()));
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Key(key) => f.write_str(key)?,
                Segment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
