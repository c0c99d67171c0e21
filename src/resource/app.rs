//! Apps

use super::fields::Fields;
use super::links::Relationships;
use super::manager::Manager;
use super::waiter::Outcome;
use super::{
    CreateInput, FromFields, HandleUpdate, Record, Resource, ResourceId, ResourceKind, Scope,
};
use crate::error::{Result, ValidationError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

/// Env var the platform reads the deployed image from
pub const DOCKER_IMAGE_ENV: &str = "APTIBLE_DOCKER_IMAGE";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct App {
    pub id: ResourceId,
    pub handle: String,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Relationships,
}

impl App {
    /// Owning account, from `_links.account`
    pub fn account_id(&self) -> std::result::Result<ResourceId, ValidationError> {
        self.links.id_of(Self::NAME, "account", "accounts")
    }
}

impl FromFields for App {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            handle: fields.required("handle")?,
            status: fields.optional("status")?,
            created_at: fields.required("created_at")?,
            updated_at: fields.required("updated_at")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for App {
    const NAME: &'static str = "app";
    const COLLECTION: &'static str = "apps";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }

    fn post_validate(&self) -> std::result::Result<(), ValidationError> {
        self.account_id().map(|_| ())
    }

    fn derived(&self) -> Vec<(&'static str, Value)> {
        vec![("account_id", json!(self.account_id().ok()))]
    }
}

impl Resource for App {
    const KIND: ResourceKind = ResourceKind::App;
    const SCOPE: Option<Scope> = Some(Scope {
        kind: ResourceKind::Account,
        relation: "account",
    });

    type Create = AppCreate;
    type Update = HandleUpdate;

    fn handle(&self) -> Option<&str> {
        Some(&self.handle)
    }
}

/// Apps are created under their account: `POST /accounts/{id}/apps`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppCreate {
    pub handle: String,
    #[serde(skip)]
    pub account_id: ResourceId,
}

impl FromFields for AppCreate {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            handle: fields.required_text("handle")?,
            account_id: fields.required("account_id")?,
        })
    }
}

impl CreateInput for AppCreate {
    const NAME: &'static str = "app_create";

    fn path(&self, _base: &str) -> String {
        format!(
            "/accounts/{}/apps",
            urlencoding::encode(&self.account_id.to_string())
        )
    }
}

/// Environment for deploying a prebuilt Docker image
pub fn docker_image_env(image: &str) -> IndexMap<String, String> {
    let mut env = IndexMap::new();
    env.insert("FORCE_SSL".to_string(), "1".to_string());
    env.insert(DOCKER_IMAGE_ENV.to_string(), image.to_string());
    env
}

impl Manager<App> {
    /// Set configuration variables; takes effect on the next deploy
    pub async fn configure(
        &self,
        id: &ResourceId,
        env: &IndexMap<String, String>,
    ) -> Result<Outcome> {
        self.run_operation(id, &json!({ "type": "configure", "env": env }))
            .await
    }

    pub async fn deploy(&self, id: &ResourceId) -> Result<Outcome> {
        self.run_operation(id, &json!({ "type": "deploy" })).await
    }

    /// Create an app and, given an image, configure and deploy it
    pub async fn create_with_image(
        &self,
        input: &AppCreate,
        docker_image: Option<&str>,
    ) -> Result<App> {
        let app = self.create(input).await?;
        let Some(image) = docker_image else {
            return Ok(app);
        };

        tracing::info!("Deploying {} to app {}", image, app.handle);
        self.configure(&app.id, &docker_image_env(image)).await?;
        self.deploy(&app.id).await?;
        self.get(&app.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "id": 123,
            "handle": "test-app",
            "status": "provisioned",
            "created_at": "2023-01-01T12:00:00Z",
            "updated_at": "2023-01-01T12:00:00Z",
            "_links": {
                "self": {"href": "https://api.aptible.com/apps/123"},
                "account": {"href": "https://api.aptible.com/accounts/456"}
            }
        })
    }

    #[test]
    fn test_app_validates() {
        let app = App::validate(sample()).unwrap();
        assert_eq!(app.id, ResourceId::Int(123));
        assert_eq!(app.account_id().unwrap(), ResourceId::Int(456));
        assert_eq!(app.scope_id().unwrap(), Some(ResourceId::Int(456)));
    }

    #[test]
    fn test_app_requires_account_link() {
        let mut payload = sample();
        payload["_links"].as_object_mut().unwrap().remove("account");
        let err = App::validate(payload).unwrap_err();
        assert_eq!(err.field, "_links.account");
        assert_eq!(err.reason, "is missing");
    }

    #[test]
    fn test_app_rejects_bad_timestamp() {
        let mut payload = sample();
        payload["created_at"] = json!("yesterday");
        let err = App::validate(payload).unwrap_err();
        assert_eq!(err.field, "created_at");
    }

    #[test]
    fn test_create_posts_under_account_without_account_field() {
        let input = AppCreate {
            handle: "web".to_string(),
            account_id: ResourceId::Int(456),
        };
        assert_eq!(input.path("/apps"), "/accounts/456/apps");
        assert_eq!(serde_json::to_value(&input).unwrap(), json!({"handle": "web"}));
    }

    #[test]
    fn test_docker_image_env() {
        let env = docker_image_env("nginx:latest");
        assert_eq!(env.get("FORCE_SSL").map(String::as_str), Some("1"));
        assert_eq!(env.get(DOCKER_IMAGE_ENV).map(String::as_str), Some("nginx:latest"));
    }
}
