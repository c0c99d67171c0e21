//! Accounts (also called environments)

use super::fields::Fields;
use super::links::Relationships;
use super::manager::Manager;
use super::stack::Stack;
use super::{
    CreateInput, FromFields, HandleUpdate, Record, Resource, ResourceId, ResourceKind, Scope,
};
use crate::error::{Result, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: ResourceId,
    pub handle: String,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Relationships,
}

impl Account {
    /// Stack the account lives on, from `_links.stack`
    pub fn stack_id(&self) -> std::result::Result<Option<ResourceId>, ValidationError> {
        self.links.optional_id_of(Self::NAME, "stack", "stacks")
    }
}

impl FromFields for Account {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            handle: fields.required("handle")?,
            account_type: fields.optional("type")?,
            created_at: fields.required("created_at")?,
            updated_at: fields.required("updated_at")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for Account {
    const NAME: &'static str = "account";
    const COLLECTION: &'static str = "accounts";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }

    fn post_validate(&self) -> std::result::Result<(), ValidationError> {
        self.stack_id().map(|_| ())
    }

    fn derived(&self) -> Vec<(&'static str, Value)> {
        vec![("stack_id", json!(self.stack_id().ok().flatten()))]
    }
}

impl Resource for Account {
    const KIND: ResourceKind = ResourceKind::Account;
    const SCOPE: Option<Scope> = Some(Scope {
        kind: ResourceKind::Stack,
        relation: "stack",
    });

    type Create = AccountCreate;
    type Update = HandleUpdate;

    fn handle(&self) -> Option<&str> {
        Some(&self.handle)
    }
}

/// Environment tier, derived from the stack it is created on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Development,
    Production,
}

impl AccountType {
    /// Dedicated stacks (owned by an organization) host production accounts
    pub fn for_stack(stack: &Stack) -> Self {
        if stack.is_dedicated() {
            AccountType::Production
        } else {
            AccountType::Development
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountCreate {
    pub handle: String,
    pub stack_id: ResourceId,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub organization_id: String,
}

impl AccountType {
    fn parse(kind: &'static str, raw: &str) -> std::result::Result<Self, ValidationError> {
        match raw {
            "development" => Ok(AccountType::Development),
            "production" => Ok(AccountType::Production),
            other => Err(ValidationError::new(
                kind,
                "type",
                format!("must be development or production, got {other:?}"),
            )),
        }
    }
}

impl FromFields for AccountCreate {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        let raw_type: String = fields.required("type")?;
        let account_type = AccountType::parse(fields.kind(), &raw_type)?;
        Ok(Self {
            handle: fields.required_text("handle")?,
            stack_id: fields.required("stack_id")?,
            account_type,
            organization_id: fields.required_text("organization_id")?,
        })
    }
}

/// Caller input for a kind-tagged account create.
///
/// The type is decided by the stack; a supplied type must agree with it.
/// Without an organization id the caller's organization is used.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRequest {
    pub handle: String,
    pub stack_id: ResourceId,
    pub account_type: Option<AccountType>,
    pub organization_id: Option<String>,
}

impl FromFields for AccountRequest {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        let account_type = match fields.optional::<String>("type")? {
            Some(raw) => Some(AccountType::parse(fields.kind(), &raw)?),
            None => None,
        };
        Ok(Self {
            handle: fields.required_text("handle")?,
            stack_id: fields.required("stack_id")?,
            account_type,
            organization_id: fields.optional("organization_id")?,
        })
    }
}

impl AccountRequest {
    /// Build the create body for `stack`, which must be the requested stack
    pub fn for_stack(
        self,
        stack: &Stack,
        organization_id: &str,
    ) -> std::result::Result<AccountCreate, ValidationError> {
        if stack.id != self.stack_id {
            return Err(ValidationError::new(
                AccountCreate::NAME,
                "stack_id",
                format!("is {} but stack {} was resolved", self.stack_id, stack.id),
            ));
        }
        let derived = AccountType::for_stack(stack);
        if let Some(requested) = self.account_type.filter(|requested| *requested != derived) {
            return Err(ValidationError::new(
                AccountCreate::NAME,
                "type",
                format!(
                    "{requested:?} does not match stack {}, which hosts {derived:?} accounts",
                    stack.name
                ),
            ));
        }
        Ok(AccountCreate {
            handle: self.handle,
            stack_id: stack.id.clone(),
            account_type: derived,
            organization_id: self.organization_id.unwrap_or_else(|| organization_id.to_string()),
        })
    }
}

impl CreateInput for AccountCreate {
    const NAME: &'static str = "account_create";
}

impl Manager<Account> {
    /// Accounts living on `stack_id`
    pub async fn by_stack(&self, stack_id: &ResourceId) -> Result<Vec<Account>> {
        self.in_scope(stack_id).await
    }

    /// Create an account on `stack` for `organization_id`
    pub async fn create_on_stack(
        &self,
        handle: &str,
        stack: &Stack,
        organization_id: &str,
    ) -> Result<Account> {
        let request = AccountRequest {
            handle: handle.to_string(),
            stack_id: stack.id.clone(),
            account_type: None,
            organization_id: None,
        };
        self.create(&request.for_stack(stack, organization_id)?).await
    }
}
