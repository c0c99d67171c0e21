//! Aptible MCP Server
//!
//! Exposes the catalog workflows as MCP tools over the stdio transport.
//! Every tool answers with pretty-printed JSON, or a single-line error.

use crate::catalog::Catalog;
use crate::error::{describe_error, Error};
use crate::resource::{Record, ResourceId, ResourceKind};
use anyhow::Result;
use indexmap::IndexMap;
use rmcp::{
    handler::server::{tool::ToolCallContext, tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_router, ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::error;

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AccountParam {
    /// Account (environment) handle
    pub account_handle: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StackParam {
    /// Stack name, e.g. shared-us-west-1
    pub stack_name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateAccountParam {
    /// Handle of the new account
    pub account_name: String,
    /// Stack to create it on
    pub stack_name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AppParam {
    pub app_handle: String,
    /// Account handle; needed when several accounts have an app with this handle
    pub account_handle: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateAppParam {
    pub app_handle: String,
    pub account_handle: String,
    /// Docker image to deploy once the app exists
    pub docker_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConfigureAppParam {
    pub app_handle: String,
    pub account_handle: Option<String>,
    /// Environment variables to set, applied in the order given
    pub env: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DatabaseParam {
    pub database_handle: String,
    pub account_handle: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateDatabaseParam {
    pub database_handle: String,
    pub account_handle: String,
    /// Image id from list_available_database_types
    pub image_id: i64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct VhostIdParam {
    pub vhost_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ServiceParam {
    pub app_handle: String,
    /// Service handle; matches the process type of the app's Procfile
    pub service_handle: String,
    pub account_handle: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScaleServiceParam {
    pub app_handle: String,
    pub service_handle: String,
    pub container_count: Option<u32>,
    pub container_memory_limit_mb: Option<u32>,
    pub account_handle: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OperationIdParam {
    pub operation_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct KindParam {
    /// Resource kind
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct KindIdParam {
    pub kind: ResourceKind,
    /// Resource id
    pub id: String,
}

// ============================================================================
// Rendering
// ============================================================================

fn tool_error(err: Error) -> String {
    error!("Tool call failed: {}", err);
    describe_error(&err)
}

fn pretty<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to render result: {e}"))
}

fn record<R: Record>(record: &R) -> Result<String, String> {
    let value = record.to_value().map_err(|e| tool_error(e.into()))?;
    pretty(&value)
}

fn records<R: Record>(records: &[R]) -> Result<String, String> {
    let values = records
        .iter()
        .map(Record::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| tool_error(e.into()))?;
    pretty(&values)
}

fn done(message: String) -> Result<String, String> {
    pretty(&serde_json::json!({ "status": "ok", "message": message }))
}

// ============================================================================
// MCP server
// ============================================================================

#[derive(Clone)]
pub struct AptibleServer {
    catalog: Catalog,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl AptibleServer {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            tool_router: Self::tool_router(),
        }
    }

    // ---- accounts ----

    #[tool(description = "List all accounts (environments).")]
    async fn list_accounts(&self) -> Result<String, String> {
        let accounts = self.catalog.accounts.list().await.map_err(tool_error)?;
        records(&accounts)
    }

    #[tool(description = "Get an account (environment) by handle.")]
    async fn get_account(&self, params: Parameters<AccountParam>) -> Result<String, String> {
        let account = self
            .catalog
            .find_account(&params.0.account_handle)
            .await
            .map_err(tool_error)?;
        record(&account)
    }

    #[tool(description = "List the accounts (environments) on a stack, by stack name.")]
    async fn get_accounts_by_stack(
        &self,
        params: Parameters<StackParam>,
    ) -> Result<String, String> {
        let accounts = self
            .catalog
            .accounts_by_stack_name(&params.0.stack_name)
            .await
            .map_err(tool_error)?;
        records(&accounts)
    }

    #[tool(
        description = "Create an account (environment) on a stack. Dedicated stacks get production accounts, shared stacks development ones."
    )]
    async fn create_account(
        &self,
        params: Parameters<CreateAccountParam>,
    ) -> Result<String, String> {
        let params = params.0;
        let account = self
            .catalog
            .create_account(&params.account_name, &params.stack_name)
            .await
            .map_err(tool_error)?;
        record(&account)
    }

    // ---- apps ----

    #[tool(description = "List all apps.")]
    async fn list_apps(&self) -> Result<String, String> {
        let apps = self.catalog.apps.list().await.map_err(tool_error)?;
        records(&apps)
    }

    #[tool(
        description = "Get an app by handle. App handles are only unique within an account, so an account handle can be given to disambiguate."
    )]
    async fn get_app(&self, params: Parameters<AppParam>) -> Result<String, String> {
        let params = params.0;
        let app = self
            .catalog
            .find_app(&params.app_handle, params.account_handle.as_deref())
            .await
            .map_err(tool_error)?;
        record(&app)
    }

    #[tool(
        description = "Create an app in an account. When a docker image is given, the app is configured with it and deployed."
    )]
    async fn create_app(&self, params: Parameters<CreateAppParam>) -> Result<String, String> {
        let params = params.0;
        let app = self
            .catalog
            .create_app(
                &params.app_handle,
                &params.account_handle,
                params.docker_image.as_deref(),
            )
            .await
            .map_err(tool_error)?;
        record(&app)
    }

    #[tool(description = "Set environment variables on an app.")]
    async fn configure_app(&self, params: Parameters<ConfigureAppParam>) -> Result<String, String> {
        let params = params.0;
        let app = self
            .catalog
            .configure_app(&params.app_handle, params.account_handle.as_deref(), &params.env)
            .await
            .map_err(tool_error)?;
        record(&app)
    }

    #[tool(description = "Deprovision and delete an app.")]
    async fn delete_app(&self, params: Parameters<AppParam>) -> Result<String, String> {
        let params = params.0;
        self.catalog
            .delete_app(&params.app_handle, params.account_handle.as_deref())
            .await
            .map_err(tool_error)?;
        done(format!("app {} deleted", params.app_handle))
    }

    // ---- databases ----

    #[tool(
        description = "List the database images (engine and version) databases can be created from. create_database needs the image id."
    )]
    async fn list_available_database_types(&self) -> Result<String, String> {
        let images = self.catalog.database_types().await.map_err(tool_error)?;
        records(&images)
    }

    #[tool(description = "List all databases.")]
    async fn list_databases(&self) -> Result<String, String> {
        let databases = self.catalog.databases.list().await.map_err(tool_error)?;
        records(&databases)
    }

    #[tool(description = "Get a database by handle, optionally within an account.")]
    async fn get_database(&self, params: Parameters<DatabaseParam>) -> Result<String, String> {
        let params = params.0;
        let database = self
            .catalog
            .find_database(&params.database_handle, params.account_handle.as_deref())
            .await
            .map_err(tool_error)?;
        record(&database)
    }

    #[tool(
        description = "Create and provision a database from an image id found via list_available_database_types."
    )]
    async fn create_database(
        &self,
        params: Parameters<CreateDatabaseParam>,
    ) -> Result<String, String> {
        let params = params.0;
        let database = self
            .catalog
            .create_database(
                &params.database_handle,
                &params.account_handle,
                &ResourceId::Int(params.image_id),
            )
            .await
            .map_err(tool_error)?;
        record(&database)
    }

    #[tool(description = "Deprovision and delete a database.")]
    async fn delete_database(&self, params: Parameters<DatabaseParam>) -> Result<String, String> {
        let params = params.0;
        self.catalog
            .delete_database(&params.database_handle, params.account_handle.as_deref())
            .await
            .map_err(tool_error)?;
        done(format!("database {} deleted", params.database_handle))
    }

    // ---- stacks ----

    #[tool(description = "List all stacks.")]
    async fn list_stacks(&self) -> Result<String, String> {
        let stacks = self.catalog.stacks.list().await.map_err(tool_error)?;
        records(&stacks)
    }

    #[tool(description = "Get a stack by name.")]
    async fn get_stack(&self, params: Parameters<StackParam>) -> Result<String, String> {
        let stack = self
            .catalog
            .find_stack(&params.0.stack_name)
            .await
            .map_err(tool_error)?;
        record(&stack)
    }

    // ---- vhosts ----

    #[tool(description = "List all vhosts (endpoints).")]
    async fn list_vhosts(&self) -> Result<String, String> {
        let vhosts = self.catalog.vhosts.list().await.map_err(tool_error)?;
        records(&vhosts)
    }

    #[tool(description = "Get a vhost (endpoint) by id.")]
    async fn get_vhost(&self, params: Parameters<VhostIdParam>) -> Result<String, String> {
        let id = ResourceId::parse(params.0.vhost_id.trim());
        let vhost = self.catalog.vhosts.get(&id).await.map_err(tool_error)?;
        record(&vhost)
    }

    #[tool(
        description = "Create the default HTTPS endpoint (on-aptible.com domain) for an app service."
    )]
    async fn create_vhost(&self, params: Parameters<ServiceParam>) -> Result<String, String> {
        let params = params.0;
        let vhost = self
            .catalog
            .create_vhost(
                &params.app_handle,
                &params.service_handle,
                params.account_handle.as_deref(),
            )
            .await
            .map_err(tool_error)?;
        record(&vhost)
    }

    #[tool(description = "Deprovision and delete a vhost (endpoint) by id.")]
    async fn delete_vhost(&self, params: Parameters<VhostIdParam>) -> Result<String, String> {
        let id = ResourceId::parse(params.0.vhost_id.trim());
        self.catalog.delete_vhost(&id).await.map_err(tool_error)?;
        done(format!("vhost {id} deleted"))
    }

    // ---- services ----

    #[tool(description = "List the services of an app.")]
    async fn list_services(&self, params: Parameters<AppParam>) -> Result<String, String> {
        let params = params.0;
        let services = self
            .catalog
            .services_of_app(&params.app_handle, params.account_handle.as_deref())
            .await
            .map_err(tool_error)?;
        records(&services)
    }

    #[tool(description = "Get a service of an app by its handle.")]
    async fn get_service(&self, params: Parameters<ServiceParam>) -> Result<String, String> {
        let params = params.0;
        let service = self
            .catalog
            .find_service(
                &params.app_handle,
                &params.service_handle,
                params.account_handle.as_deref(),
            )
            .await
            .map_err(tool_error)?;
        record(&service)
    }

    #[tool(
        description = "Scale a service by container count and/or container memory in MB. At least one must be given."
    )]
    async fn scale_service(&self, params: Parameters<ScaleServiceParam>) -> Result<String, String> {
        let params = params.0;
        let service = self
            .catalog
            .scale_service(
                &params.app_handle,
                &params.service_handle,
                params.account_handle.as_deref(),
                params.container_count,
                params.container_memory_limit_mb,
            )
            .await
            .map_err(tool_error)?;
        record(&service)
    }

    #[tool(description = "List the vhosts (endpoints) of an app service.")]
    async fn list_service_vhosts(
        &self,
        params: Parameters<ServiceParam>,
    ) -> Result<String, String> {
        let params = params.0;
        let vhosts = self
            .catalog
            .service_vhosts(
                &params.app_handle,
                &params.service_handle,
                params.account_handle.as_deref(),
            )
            .await
            .map_err(tool_error)?;
        records(&vhosts)
    }

    // ---- any kind ----

    #[tool(description = "List every resource of one kind.")]
    async fn list_resources(&self, params: Parameters<KindParam>) -> Result<String, String> {
        let values = self.catalog.list(params.0.kind).await.map_err(tool_error)?;
        pretty(&values)
    }

    #[tool(description = "Get one resource of any kind by id.")]
    async fn get_resource(&self, params: Parameters<KindIdParam>) -> Result<String, String> {
        let params = params.0;
        let id = ResourceId::parse(params.id.trim());
        let value = self
            .catalog
            .get(params.kind, &id)
            .await
            .map_err(tool_error)?;
        pretty(&value)
    }

    #[tool(
        description = "Delete one resource of any kind by id. Apps, databases, vhosts and services are deprovisioned."
    )]
    async fn delete_resource(&self, params: Parameters<KindIdParam>) -> Result<String, String> {
        let params = params.0;
        let id = ResourceId::parse(params.id.trim());
        self.catalog
            .delete(params.kind, &id)
            .await
            .map_err(tool_error)?;
        done(format!("{} {id} deleted", params.kind))
    }

    // ---- operations ----

    #[tool(description = "List recent operations run against one resource.")]
    async fn list_operations(&self, params: Parameters<KindIdParam>) -> Result<String, String> {
        let params = params.0;
        let id = ResourceId::parse(params.id.trim());
        let operations = self
            .catalog
            .operations(params.kind, &id)
            .await
            .map_err(tool_error)?;
        pretty(&operations)
    }

    #[tool(description = "Get the log output of an operation by id.")]
    async fn get_operation_logs(
        &self,
        params: Parameters<OperationIdParam>,
    ) -> Result<String, String> {
        let id = ResourceId::parse(params.0.operation_id.trim());
        let logs = self.catalog.operation_logs(&id).await.map_err(tool_error)?;
        Ok(logs.unwrap_or_else(|| format!("No logs available for operation {id}")))
    }
}

impl ServerHandler for AptibleServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::default().with_instructions(
            "Aptible MCP server. Manages accounts (environments), apps, databases, stacks, services and vhosts (endpoints).",
        )
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_context = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_context).await
    }
}

/// Serve the tools over stdio until the client disconnects
pub async fn run_server(catalog: Catalog) -> Result<()> {
    let server = AptibleServer::new(catalog);
    let transport = (tokio::io::stdin(), tokio::io::stdout());

    let service = server.serve(transport).await.map_err(|e| {
        error!("MCP server initialization failed: {}", e);
        anyhow::anyhow!("MCP server initialization failed: {}", e)
    })?;

    service.waiting().await.map_err(|e| {
        error!("MCP server error: {}", e);
        anyhow::anyhow!("MCP server error: {}", e)
    })?;

    Ok(())
}
