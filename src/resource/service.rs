//! App services, one per process type

use super::fields::Fields;
use super::links::Relationships;
use super::manager::Manager;
use super::{FromFields, Record, Resource, ResourceId, ResourceKind, Scope, Unsupported};
use crate::error::{Result, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub id: ResourceId,
    pub handle: String,
    pub process_type: String,
    pub command: Option<String>,
    pub container_count: u32,
    pub container_memory_limit_mb: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Relationships,
}

impl Service {
    pub fn app_id(&self) -> std::result::Result<ResourceId, ValidationError> {
        self.links.id_of(Self::NAME, "app", "apps")
    }
}

impl FromFields for Service {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            handle: fields.required("handle")?,
            process_type: fields.required("process_type")?,
            command: fields.optional("command")?,
            container_count: fields.required("container_count")?,
            container_memory_limit_mb: fields.required("container_memory_limit_mb")?,
            created_at: fields.required("created_at")?,
            updated_at: fields.required("updated_at")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for Service {
    const NAME: &'static str = "service";
    const COLLECTION: &'static str = "services";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }

    fn post_validate(&self) -> std::result::Result<(), ValidationError> {
        self.app_id().map(|_| ())
    }

    fn derived(&self) -> Vec<(&'static str, Value)> {
        vec![("app_id", json!(self.app_id().ok()))]
    }
}

impl Resource for Service {
    const KIND: ResourceKind = ResourceKind::Service;
    const SCOPE: Option<Scope> = Some(Scope {
        kind: ResourceKind::App,
        relation: "app",
    });

    // services come from deploys
    type Create = Unsupported;
    type Update = Unsupported;

    fn handle(&self) -> Option<&str> {
        Some(&self.handle)
    }
}

/// Body of a scale operation; at least one dimension must be set
pub fn scale_body(
    container_count: Option<u32>,
    container_memory_limit_mb: Option<u32>,
) -> std::result::Result<Value, ValidationError> {
    if container_count.is_none() && container_memory_limit_mb.is_none() {
        return Err(ValidationError::new(
            "scale",
            "container_count",
            "or container_memory_limit_mb must be provided",
        ));
    }

    let mut body = Map::new();
    body.insert("type".to_string(), json!("scale"));
    if let Some(count) = container_count {
        body.insert("container_count".to_string(), json!(count));
    }
    if let Some(size) = container_memory_limit_mb {
        body.insert("container_size".to_string(), json!(size));
    }
    Ok(Value::Object(body))
}

impl Manager<Service> {
    pub async fn list_for_app(&self, app_id: &ResourceId) -> Result<Vec<Service>> {
        let path = format!("/apps/{}/services", urlencoding::encode(&app_id.to_string()));
        self.list_at(&path).await
    }

    /// Service named `handle` within one app
    pub async fn find_in_app(&self, app_id: &ResourceId, handle: &str) -> Result<Option<Service>> {
        Ok(self
            .list_for_app(app_id)
            .await?
            .into_iter()
            .find(|service| service.handle == handle))
    }

    /// Run a scale operation and return the service as it is afterwards
    pub async fn scale(
        &self,
        id: &ResourceId,
        container_count: Option<u32>,
        container_memory_limit_mb: Option<u32>,
    ) -> Result<Service> {
        let body = scale_body(container_count, container_memory_limit_mb)?;
        self.run_operation(id, &body).await?;
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_validates() {
        let service = Service::validate(json!({
            "id": 55,
            "handle": "web",
            "process_type": "web",
            "command": null,
            "container_count": 2,
            "container_memory_limit_mb": 1024,
            "created_at": "2023-01-01T12:00:00Z",
            "updated_at": "2023-01-01T12:00:00Z",
            "_links": {"app": {"href": "https://api.aptible.com/apps/123"}}
        }))
        .unwrap();
        assert_eq!(service.app_id().unwrap(), ResourceId::Int(123));
        assert_eq!(service.container_count, 2);
    }

    #[test]
    fn test_scale_body_requires_a_dimension() {
        let err = scale_body(None, None).unwrap_err();
        assert_eq!(err.field, "container_count");
    }

    #[test]
    fn test_scale_body_maps_memory_to_container_size() {
        assert_eq!(
            scale_body(Some(3), Some(2048)).unwrap(),
            json!({"type": "scale", "container_count": 3, "container_size": 2048})
        );
        assert_eq!(
            scale_body(None, Some(512)).unwrap(),
            json!({"type": "scale", "container_size": 512})
        );
    }
}
