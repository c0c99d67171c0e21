//! Stacks

use super::fields::Fields;
use super::links::Relationships;
use super::{FromFields, Record, Resource, ResourceId, ResourceKind, Unsupported};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stack; its `name` doubles as its handle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stack {
    pub id: ResourceId,
    pub name: String,
    pub region: String,
    /// Shared stacks are public
    pub public: bool,
    /// Owning organization of a dedicated stack
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Relationships,
}

impl Stack {
    pub fn is_dedicated(&self) -> bool {
        self.organization_id.is_some()
    }
}

impl FromFields for Stack {
    fn from_fields(fields: &mut Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            name: fields.required("name")?,
            region: fields.required("region")?,
            public: fields.required("public")?,
            organization_id: fields.optional("organization_id")?,
            created_at: fields.required("created_at")?,
            updated_at: fields.required("updated_at")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for Stack {
    const NAME: &'static str = "stack";
    const COLLECTION: &'static str = "stacks";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }
}

impl Resource for Stack {
    const KIND: ResourceKind = ResourceKind::Stack;

    type Create = Unsupported;
    type Update = Unsupported;

    fn handle(&self) -> Option<&str> {
        Some(&self.name)
    }
}
