//! Resource abstraction layer
//!
//! Every remote resource kind is a typed record validated from the API's
//! HAL+JSON payloads, and a single generic [`Manager`] runs CRUD for all of
//! them.
//!
//! # Architecture
//!
//! - [`links`] - `_links` <-> `links` transform and href id extraction
//! - [`fields`] - field-by-field validation of decoded payloads
//! - [`manager`] - generic CRUD engine plus handle disambiguation
//! - [`waiter`] - operation records and the polling state machine
//! - [`account`], [`app`], [`database`], [`stack`], [`vhost`], [`service`] -
//!   per-kind records, inputs and extensions
//!
//! # Example
//!
//! ```ignore
//! use aptible_mcp::resource::{App, Manager, WaitConfig};
//!
//! async fn list_apps(client: aptible_mcp::api::ApiClient) -> aptible_mcp::Result<()> {
//!     let apps: Manager<App> = Manager::new(client, WaitConfig::default());
//!     for app in apps.list().await? {
//!         println!("{} in account {}", app.handle, app.account_id()?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod app;
pub mod database;
pub mod fields;
pub mod links;
pub mod manager;
pub mod service;
pub mod stack;
pub mod vhost;
pub mod waiter;

pub use account::{Account, AccountCreate, AccountRequest, AccountType};
pub use app::{App, AppCreate};
pub use database::{Database, DatabaseCreate, DatabaseImage, DatabaseRequest};
pub use fields::Fields;
pub use links::{decode_links, encode_links, Link, Relationships};
pub use manager::{list_records, Manager};
pub use service::Service;
pub use stack::Stack;
pub use vhost::{Vhost, VhostCreate};
pub use waiter::{
    operation_logs, Operation, OperationRef, OperationWaiter, Outcome, WaitConfig, WaitState,
};

use crate::error::ValidationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Identifier assigned by the remote service.
///
/// Most Aptible ids are integers; some endpoints use opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Text(String),
}

impl ResourceId {
    /// Interpret a path segment, preferring the integer form
    pub fn parse(segment: &str) -> Self {
        segment
            .parse::<i64>()
            .map(ResourceId::Int)
            .unwrap_or_else(|_| ResourceId::Text(segment.to_string()))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(id) => write!(f, "{id}"),
            ResourceId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        ResourceId::Int(id)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId::parse(id)
    }
}

/// The closed set of resource kinds exposed as tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Accounts, also called environments
    Account,
    App,
    Database,
    Stack,
    /// Virtual hosts, also called endpoints
    Vhost,
    /// App services (one per process type)
    Service,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Account,
        ResourceKind::App,
        ResourceKind::Database,
        ResourceKind::Stack,
        ResourceKind::Vhost,
        ResourceKind::Service,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Account => "account",
            ResourceKind::App => "app",
            ResourceKind::Database => "database",
            ResourceKind::Stack => "stack",
            ResourceKind::Vhost => "vhost",
            ResourceKind::Service => "service",
        }
    }

    /// Collection name, used both in URLs and under `_embedded`
    pub const fn collection(self) -> &'static str {
        match self {
            ResourceKind::Account => "accounts",
            ResourceKind::App => "apps",
            ResourceKind::Database => "databases",
            ResourceKind::Stack => "stacks",
            ResourceKind::Vhost => "vhosts",
            ResourceKind::Service => "services",
        }
    }

    pub const fn base_path(self) -> &'static str {
        match self {
            ResourceKind::Account => "/accounts",
            ResourceKind::App => "/apps",
            ResourceKind::Database => "/databases",
            ResourceKind::Stack => "/stacks",
            ResourceKind::Vhost => "/vhosts",
            ResourceKind::Service => "/services",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "account" | "accounts" | "environment" | "environments" => Ok(ResourceKind::Account),
            "app" | "apps" => Ok(ResourceKind::App),
            "database" | "databases" => Ok(ResourceKind::Database),
            "stack" | "stacks" => Ok(ResourceKind::Stack),
            "vhost" | "vhosts" | "endpoint" | "endpoints" => Ok(ResourceKind::Vhost),
            "service" | "services" => Ok(ResourceKind::Service),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Build a value from a validated field set
pub trait FromFields: Sized {
    fn from_fields(fields: &mut Fields) -> Result<Self, ValidationError>;
}

/// A schema-validated record decoded from an API payload
pub trait Record: FromFields + Serialize {
    /// Name used in validation errors
    const NAME: &'static str;
    /// Collection key under `_embedded` in list responses
    const COLLECTION: &'static str;

    fn id(&self) -> &ResourceId;

    fn links(&self) -> &Relationships;

    /// Kind-specific checks run after the fields are decoded
    fn post_validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Values computed from other fields, appended when rendering
    fn derived(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    /// Validate a raw API payload into a record
    fn validate(payload: Value) -> Result<Self, ValidationError> {
        let mut fields = Fields::from_payload(Self::NAME, payload)?;
        let record = Self::from_fields(&mut fields)?;
        record.post_validate()?;
        Ok(record)
    }

    /// Render back to the wire shape (`_links`) plus derived fields
    fn to_value(&self) -> Result<Value, ValidationError> {
        let value = serde_json::to_value(self)
            .map_err(|e| ValidationError::new(Self::NAME, "<root>", e.to_string()))?;
        let Value::Object(object) = value else {
            return Ok(value);
        };
        let mut object = encode_links(object);
        for (name, derived) in self.derived() {
            object.insert(name.to_string(), derived);
        }
        Ok(Value::Object(object))
    }
}

/// Parent relationship that scopes a kind's handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub kind: ResourceKind,
    /// Relation name under `_links`
    pub relation: &'static str,
}

/// A record that is one of the managed resource kinds
pub trait Resource: Record {
    const KIND: ResourceKind;
    /// Owning parent; handles are only unique within it
    const SCOPE: Option<Scope> = None;
    /// Whether creation starts asynchronous provisioning that must be awaited
    const PROVISIONS: bool = false;

    /// Plain input shape for create requests
    type Create: CreateInput;
    /// Plain input shape for update requests
    type Update: UpdateInput;

    /// Human readable label; not globally unique
    fn handle(&self) -> Option<&str>;

    /// Id of the owning parent, re-derived from `links` on every call
    fn scope_id(&self) -> Result<Option<ResourceId>, ValidationError> {
        match Self::SCOPE {
            Some(scope) => self.links().optional_id_of(
                Self::NAME,
                scope.relation,
                scope.kind.collection(),
            ),
            None => Ok(None),
        }
    }
}

/// Request body for create; never a record
pub trait CreateInput: FromFields + Serialize {
    const NAME: &'static str;

    /// Path to POST to, given the kind's base path
    fn path(&self, base: &str) -> String {
        base.to_string()
    }
}

/// Request body for update
pub trait UpdateInput: FromFields + Serialize {
    const NAME: &'static str;
}

/// Input for operations a kind does not offer; it cannot be constructed.
#[derive(Debug, Serialize)]
pub enum Unsupported {}

impl FromFields for Unsupported {
    fn from_fields(fields: &mut Fields) -> Result<Self, ValidationError> {
        Err(ValidationError::new(
            fields.kind(),
            "<root>",
            "cannot be supplied for this resource kind",
        ))
    }
}

impl CreateInput for Unsupported {
    const NAME: &'static str = "unsupported";
}

impl UpdateInput for Unsupported {
    const NAME: &'static str = "unsupported";
}

/// Rename a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleUpdate {
    pub handle: String,
}

impl FromFields for HandleUpdate {
    fn from_fields(fields: &mut Fields) -> Result<Self, ValidationError> {
        Ok(Self {
            handle: fields.required_text("handle")?,
        })
    }
}

impl UpdateInput for HandleUpdate {
    const NAME: &'static str = "handle_update";
}
