//! Relationship links
//!
//! The API delivers relationships under the reserved `_links` key as
//! `relation -> {href}`. Records hold them under `links`; [`decode_links`]
//! and [`encode_links`] convert at every validation boundary.

use super::ResourceId;
use crate::error::ValidationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Key used on the wire
pub const WIRE_KEY: &str = "_links";
/// Key used inside records
pub const FIELD_KEY: &str = "links";

/// Base for resolving relative hrefs; only the path is ever inspected
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Rename `_links` to `links` on an inbound payload
pub fn decode_links(
    kind: &'static str,
    mut object: Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    if let Some(links) = object.remove(WIRE_KEY) {
        if object.contains_key(FIELD_KEY) {
            return Err(ValidationError::new(
                kind,
                FIELD_KEY,
                "conflicts with `_links`",
            ));
        }
        object.insert(FIELD_KEY.to_string(), links);
    }
    Ok(object)
}

/// Rename `links` back to `_links` on an outbound payload
pub fn encode_links(mut object: Map<String, Value>) -> Map<String, Value> {
    if let Some(links) = object.remove(FIELD_KEY) {
        object.insert(WIRE_KEY.to_string(), links);
    }
    object
}

/// One relationship: a locator plus any other HAL link members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            extra: Map::new(),
        }
    }

    /// Id of the target, read from an href ending in `/<collection>/<id>`
    ///
    /// The href is parsed into path segments; substring matches elsewhere
    /// in the URL do not count.
    pub fn target_id(&self, collection: &str) -> Result<ResourceId, String> {
        let url = match Url::parse(&self.href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(RELATIVE_BASE)
                .and_then(|base| base.join(&self.href))
                .map_err(|e| format!("has an unparseable href {:?}: {e}", self.href))?,
            Err(e) => return Err(format!("has an unparseable href {:?}: {e}", self.href)),
        };

        let mut segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
        if segments.last() == Some(&"") {
            segments.pop();
        }

        match segments.as_slice() {
            [.., parent, id] if *parent == collection && !id.is_empty() => {
                let id = urlencoding::decode(id).map_err(|e| e.to_string())?;
                Ok(ResourceId::parse(&id))
            }
            _ => Err(format!(
                "href {:?} does not end in /{collection}/<id>",
                self.href
            )),
        }
    }
}

/// Ordered relation name -> link map, in wire order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relationships(IndexMap<String, Link>);

impl Relationships {
    /// Validate a decoded `links` value, naming the bad relation on failure
    pub fn from_value(kind: &'static str, value: Value) -> Result<Self, ValidationError> {
        let Value::Object(object) = value else {
            return Err(ValidationError::new(kind, WIRE_KEY, "must be an object"));
        };

        let mut links = IndexMap::with_capacity(object.len());
        for (relation, link) in object {
            let link: Link = serde_json::from_value(link).map_err(|e| {
                ValidationError::new(kind, format!("{WIRE_KEY}.{relation}"), e.to_string())
            })?;
            links.insert(relation, link);
        }
        Ok(Self(links))
    }

    pub fn get(&self, relation: &str) -> Option<&Link> {
        self.0.get(relation)
    }

    pub fn insert(&mut self, relation: impl Into<String>, link: Link) {
        self.0.insert(relation.into(), link);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Link)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Id behind a relation that must be present
    pub fn id_of(
        &self,
        kind: &'static str,
        relation: &str,
        collection: &str,
    ) -> Result<ResourceId, ValidationError> {
        self.optional_id_of(kind, relation, collection)?.ok_or_else(|| {
            ValidationError::new(kind, format!("{WIRE_KEY}.{relation}"), "is missing")
        })
    }

    /// Id behind an optional relation; a present but malformed href is an error
    pub fn optional_id_of(
        &self,
        kind: &'static str,
        relation: &str,
        collection: &str,
    ) -> Result<Option<ResourceId>, ValidationError> {
        let Some(link) = self.get(relation) else {
            return Ok(None);
        };
        link.target_id(collection)
            .map(Some)
            .map_err(|reason| ValidationError::new(kind, format!("{WIRE_KEY}.{relation}"), reason))
    }
}
