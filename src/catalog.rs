//! Catalog
//!
//! Owns one manager per resource kind. Offers a kind-tagged JSON interface
//! over the generic managers plus the handle-based workflows the tool layer
//! exposes.

use crate::api::{auth, ApiClient};
use crate::error::{Error, Result};
use crate::resource::{
    operation_logs, Account, AccountCreate, AccountRequest, App, AppCreate, CreateInput, Database,
    DatabaseCreate, DatabaseImage, DatabaseRequest, Fields, FromFields, Manager, Record, Resource,
    ResourceId, ResourceKind, Service, Stack, UpdateInput, Vhost, WaitConfig,
};
use indexmap::IndexMap;
use serde_json::Value;

/// Run `$body` with `$manager` bound to the manager for `$kind`
macro_rules! with_manager {
    ($catalog:expr, $kind:expr, |$manager:ident| $body:expr) => {
        match $kind {
            ResourceKind::Account => {
                let $manager = &$catalog.accounts;
                $body
            }
            ResourceKind::App => {
                let $manager = &$catalog.apps;
                $body
            }
            ResourceKind::Database => {
                let $manager = &$catalog.databases;
                $body
            }
            ResourceKind::Stack => {
                let $manager = &$catalog.stacks;
                $body
            }
            ResourceKind::Vhost => {
                let $manager = &$catalog.vhosts;
                $body
            }
            ResourceKind::Service => {
                let $manager = &$catalog.services;
                $body
            }
        }
    };
}

fn render<R: Record>(record: &R) -> Result<Value> {
    Ok(record.to_value()?)
}

fn render_all<R: Record>(records: &[R]) -> Result<Vec<Value>> {
    records.iter().map(render).collect()
}

/// Validate caller JSON into a plain input shape, rejecting unknown fields
fn parse_input<T: FromFields>(name: &'static str, input: Value) -> Result<T> {
    let mut fields = Fields::from_payload(name, input)?;
    let parsed = T::from_fields(&mut fields)?;
    fields.deny_unknown()?;
    Ok(parsed)
}

/// Whether a kind accepts create requests
pub fn supports_create(kind: ResourceKind) -> bool {
    !matches!(kind, ResourceKind::Stack | ResourceKind::Service)
}

/// Whether a kind accepts update requests
pub fn supports_update(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::Account | ResourceKind::App | ResourceKind::Database
    )
}

async fn create_with<R: Resource>(manager: &Manager<R>, input: Value) -> Result<Value> {
    let input: R::Create = parse_input(<R::Create as CreateInput>::NAME, input)?;
    render(&manager.create(&input).await?)
}

async fn update_with<R: Resource>(
    manager: &Manager<R>,
    id: &ResourceId,
    input: Value,
) -> Result<Value> {
    let input: R::Update = parse_input(<R::Update as UpdateInput>::NAME, input)?;
    render(&manager.update(id, &input).await?)
}

/// Every resource manager, sharing one client and wait configuration
#[derive(Clone)]
pub struct Catalog {
    client: ApiClient,
    pub accounts: Manager<Account>,
    pub apps: Manager<App>,
    pub databases: Manager<Database>,
    pub stacks: Manager<Stack>,
    pub vhosts: Manager<Vhost>,
    pub services: Manager<Service>,
}

impl Catalog {
    pub fn new(client: ApiClient, wait: WaitConfig) -> Self {
        Self {
            accounts: Manager::new(client.clone(), wait),
            apps: Manager::new(client.clone(), wait),
            databases: Manager::new(client.clone(), wait),
            stacks: Manager::new(client.clone(), wait),
            vhosts: Manager::new(client.clone(), wait),
            services: Manager::new(client.clone(), wait),
            client,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    // ---- kind-tagged interface ----

    /// Validate a raw payload as `kind` and render it back
    pub fn validate(&self, kind: ResourceKind, payload: Value) -> Result<Value> {
        match kind {
            ResourceKind::Account => render(&Account::validate(payload)?),
            ResourceKind::App => render(&App::validate(payload)?),
            ResourceKind::Database => render(&Database::validate(payload)?),
            ResourceKind::Stack => render(&Stack::validate(payload)?),
            ResourceKind::Vhost => render(&Vhost::validate(payload)?),
            ResourceKind::Service => render(&Service::validate(payload)?),
        }
    }

    pub async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        with_manager!(self, kind, |manager| render_all(&manager.list().await?))
    }

    pub async fn get(&self, kind: ResourceKind, id: &ResourceId) -> Result<Value> {
        with_manager!(self, kind, |manager| render(&manager.get(id).await?))
    }

    pub async fn create(&self, kind: ResourceKind, input: Value) -> Result<Value> {
        if !supports_create(kind) {
            return Err(Error::Unsupported {
                kind,
                operation: "create",
            });
        }
        match kind {
            ResourceKind::Account => {
                let request: AccountRequest = parse_input(AccountCreate::NAME, input)?;
                render(&self.create_account_from(request).await?)
            }
            ResourceKind::Database => {
                let request: DatabaseRequest = parse_input(DatabaseCreate::NAME, input)?;
                render(&self.databases.create_requested(request).await?)
            }
            _ => with_manager!(self, kind, |manager| create_with(manager, input).await),
        }
    }

    pub async fn update(&self, kind: ResourceKind, id: &ResourceId, input: Value) -> Result<Value> {
        if !supports_update(kind) {
            return Err(Error::Unsupported {
                kind,
                operation: "update",
            });
        }
        with_manager!(self, kind, |manager| update_with(manager, id, input).await)
    }

    /// Recent operations run against a record
    pub async fn operations(&self, kind: ResourceKind, id: &ResourceId) -> Result<Vec<Value>> {
        with_manager!(self, kind, |manager| render_all(&manager.operations(id).await?))
    }

    /// Log output of an operation, if any was recorded
    pub async fn operation_logs(&self, id: &ResourceId) -> Result<Option<String>> {
        operation_logs(&self.client, id).await
    }

    /// Delete by id; provisioned kinds are torn down through an operation
    pub async fn delete(&self, kind: ResourceKind, id: &ResourceId) -> Result<()> {
        match kind {
            ResourceKind::App => self.apps.deprovision(id).await,
            ResourceKind::Database => self.databases.deprovision(id).await,
            ResourceKind::Vhost => self.vhosts.deprovision(id).await,
            ResourceKind::Service => self.services.deprovision(id).await,
            ResourceKind::Account => self.accounts.delete(id).await,
            ResourceKind::Stack => Err(Error::Unsupported {
                kind,
                operation: "delete",
            }),
        }
    }

    // ---- accounts and stacks ----

    pub async fn find_stack(&self, name: &str) -> Result<Stack> {
        self.stacks.resolve(name, None).await
    }

    /// First account carrying `handle`
    pub async fn find_account(&self, handle: &str) -> Result<Account> {
        self.accounts
            .find_by_handle(handle)
            .await?
            .ok_or_else(|| Error::NoMatch {
                kind: ResourceKind::Account,
                handle: handle.to_string(),
                scope: None,
            })
    }

    pub async fn accounts_by_stack_name(&self, stack_name: &str) -> Result<Vec<Account>> {
        let stack = self.find_stack(stack_name).await?;
        self.accounts.by_stack(&stack.id).await
    }

    /// Create an account on a stack, owned by the caller's organization
    pub async fn create_account(&self, handle: &str, stack_name: &str) -> Result<Account> {
        let stack = self.find_stack(stack_name).await?;
        let organization_id = auth::organization_id(&self.client).await?;
        self.accounts
            .create_on_stack(handle, &stack, &organization_id)
            .await
    }

    /// Create an account on the requested stack; the stack decides its type
    async fn create_account_from(&self, request: AccountRequest) -> Result<Account> {
        let stack = self.stacks.get(&request.stack_id).await?;
        let organization_id = match &request.organization_id {
            Some(id) => id.clone(),
            None => auth::organization_id(&self.client).await?,
        };
        let input = request.for_stack(&stack, &organization_id)?;
        self.accounts.create(&input).await
    }

    async fn account_scope(&self, account_handle: Option<&str>) -> Result<Option<ResourceId>> {
        match account_handle {
            Some(handle) => Ok(Some(self.find_account(handle).await?.id)),
            None => Ok(None),
        }
    }

    // ---- apps ----

    /// Resolve an app handle, using the account to break collisions
    pub async fn find_app(&self, handle: &str, account_handle: Option<&str>) -> Result<App> {
        let scope = self.account_scope(account_handle).await?;
        self.apps.resolve(handle, scope.as_ref()).await
    }

    pub async fn create_app(
        &self,
        handle: &str,
        account_handle: &str,
        docker_image: Option<&str>,
    ) -> Result<App> {
        let account = self.find_account(account_handle).await?;
        let input = AppCreate {
            handle: handle.to_string(),
            account_id: account.id,
        };
        self.apps.create_with_image(&input, docker_image).await
    }

    pub async fn configure_app(
        &self,
        handle: &str,
        account_handle: Option<&str>,
        env: &IndexMap<String, String>,
    ) -> Result<App> {
        let app = self.find_app(handle, account_handle).await?;
        self.apps.configure(&app.id, env).await?;
        self.apps.get(&app.id).await
    }

    pub async fn delete_app(&self, handle: &str, account_handle: Option<&str>) -> Result<()> {
        let app = self.find_app(handle, account_handle).await?;
        self.apps.deprovision(&app.id).await
    }

    // ---- databases ----

    pub async fn database_types(&self) -> Result<Vec<DatabaseImage>> {
        self.databases.list_available_types().await
    }

    pub async fn find_database(
        &self,
        handle: &str,
        account_handle: Option<&str>,
    ) -> Result<Database> {
        let scope = self.account_scope(account_handle).await?;
        self.databases.resolve(handle, scope.as_ref()).await
    }

    pub async fn create_database(
        &self,
        handle: &str,
        account_handle: &str,
        image_id: &ResourceId,
    ) -> Result<Database> {
        let account = self.find_account(account_handle).await?;
        self.databases
            .create_from_image(handle, account.id, image_id)
            .await
    }

    pub async fn delete_database(&self, handle: &str, account_handle: Option<&str>) -> Result<()> {
        let database = self.find_database(handle, account_handle).await?;
        self.databases.deprovision(&database.id).await
    }

    // ---- services ----

    pub async fn services_of_app(
        &self,
        app_handle: &str,
        account_handle: Option<&str>,
    ) -> Result<Vec<Service>> {
        let app = self.find_app(app_handle, account_handle).await?;
        self.services.list_for_app(&app.id).await
    }

    pub async fn find_service(
        &self,
        app_handle: &str,
        service_handle: &str,
        account_handle: Option<&str>,
    ) -> Result<Service> {
        let app = self.find_app(app_handle, account_handle).await?;
        self.services
            .find_in_app(&app.id, service_handle)
            .await?
            .ok_or_else(|| Error::NoMatch {
                kind: ResourceKind::Service,
                handle: service_handle.to_string(),
                scope: Some(format!("app {app_handle}")),
            })
    }

    pub async fn scale_service(
        &self,
        app_handle: &str,
        service_handle: &str,
        account_handle: Option<&str>,
        container_count: Option<u32>,
        container_memory_limit_mb: Option<u32>,
    ) -> Result<Service> {
        // reject an empty scale before any lookups
        crate::resource::service::scale_body(container_count, container_memory_limit_mb)?;
        let service = self
            .find_service(app_handle, service_handle, account_handle)
            .await?;
        self.services
            .scale(&service.id, container_count, container_memory_limit_mb)
            .await
    }

    // ---- vhosts ----

    /// Create the default endpoint for an app's service
    pub async fn create_vhost(
        &self,
        app_handle: &str,
        service_handle: &str,
        account_handle: Option<&str>,
    ) -> Result<Vhost> {
        let service = self
            .find_service(app_handle, service_handle, account_handle)
            .await?;
        self.vhosts.create_for_service(service.id).await
    }

    pub async fn delete_vhost(&self, id: &ResourceId) -> Result<()> {
        let vhost = self.vhosts.get(id).await?;
        self.vhosts.deprovision(&vhost.id).await
    }

    pub async fn service_vhosts(
        &self,
        app_handle: &str,
        service_handle: &str,
        account_handle: Option<&str>,
    ) -> Result<Vec<Vhost>> {
        let service = self
            .find_service(app_handle, service_handle, account_handle)
            .await?;
        self.vhosts.list_for_service(&service.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> Catalog {
        let client = ApiClient::new("http://127.0.0.1:9", "http://127.0.0.1:9", "token").unwrap();
        Catalog::new(client, WaitConfig::default())
    }

    #[test]
    fn test_capabilities() {
        assert!(!supports_create(ResourceKind::Stack));
        assert!(!supports_create(ResourceKind::Service));
        assert!(supports_create(ResourceKind::Vhost));
        assert!(!supports_update(ResourceKind::Vhost));
        assert!(supports_update(ResourceKind::App));
    }

    #[test]
    fn test_validate_renders_wire_shape() {
        let value = catalog()
            .validate(
                ResourceKind::App,
                json!({
                    "id": 123,
                    "handle": "test-app",
                    "created_at": "2023-01-01T12:00:00Z",
                    "updated_at": "2023-01-01T12:00:00Z",
                    "_links": {"account": {"href": "/accounts/456"}}
                }),
            )
            .unwrap();
        assert_eq!(value["_links"]["account"]["href"], json!("/accounts/456"));
        assert_eq!(value["account_id"], json!(456));
    }

    #[test]
    fn test_parse_input_rejects_unknown_fields() {
        let err = parse_input::<AppCreate>(
            "app_create",
            json!({"handle": "web", "account_id": 4, "size": 2}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("`size`"));
    }

    #[tokio::test]
    async fn test_stack_create_is_unsupported() {
        let err = catalog()
            .create(ResourceKind::Stack, json!({"name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported {
                kind: ResourceKind::Stack,
                operation: "create"
            }
        ));
    }
}
