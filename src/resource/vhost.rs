//! Vhosts (endpoints) in front of app services

use super::fields::Fields;
use super::links::Relationships;
use super::manager::Manager;
use super::{
    CreateInput, FromFields, Record, Resource, ResourceId, ResourceKind, Scope, Unsupported,
};
use crate::error::{Result, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vhost {
    pub id: ResourceId,
    pub virtual_domain: Option<String>,
    pub external_host: Option<String>,
    pub status: String,
    pub acme_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Relationships,
}

impl Vhost {
    pub fn service_id(&self) -> std::result::Result<ResourceId, ValidationError> {
        self.links.id_of(Self::NAME, "service", "services")
    }

    /// Public name of the endpoint, once one has been assigned
    pub fn hostname(&self) -> Option<&str> {
        self.virtual_domain
            .as_deref()
            .or(self.external_host.as_deref())
            .filter(|host| !host.is_empty())
    }
}

impl FromFields for Vhost {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            virtual_domain: fields.optional("virtual_domain")?,
            external_host: fields.optional("external_host")?,
            status: fields.required("status")?,
            acme_status: fields.optional("acme_status")?,
            created_at: fields.required("created_at")?,
            updated_at: fields.required("updated_at")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for Vhost {
    const NAME: &'static str = "vhost";
    const COLLECTION: &'static str = "vhosts";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }

    fn post_validate(&self) -> std::result::Result<(), ValidationError> {
        self.service_id().map(|_| ())
    }

    fn derived(&self) -> Vec<(&'static str, Value)> {
        vec![("service_id", json!(self.service_id().ok()))]
    }
}

impl Resource for Vhost {
    const KIND: ResourceKind = ResourceKind::Vhost;
    const SCOPE: Option<Scope> = Some(Scope {
        kind: ResourceKind::Service,
        relation: "service",
    });
    const PROVISIONS: bool = true;

    type Create = VhostCreate;
    type Update = Unsupported;

    fn handle(&self) -> Option<&str> {
        self.hostname()
    }
}

/// Body for a default HTTPS endpoint on a service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VhostCreate {
    pub service_id: ResourceId,
    #[serde(rename = "type")]
    pub vhost_type: String,
    pub platform: String,
    pub load_balancing_algorithm_type: String,
    /// Use the platform-assigned default domain
    pub default: bool,
    pub acme: bool,
    pub internal: bool,
}

impl VhostCreate {
    pub fn for_service(service_id: ResourceId) -> Self {
        Self {
            service_id,
            vhost_type: "http".to_string(),
            platform: "alb".to_string(),
            load_balancing_algorithm_type: "round_robin".to_string(),
            default: true,
            acme: false,
            internal: false,
        }
    }
}

impl FromFields for VhostCreate {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        let defaults = Self::for_service(fields.required("service_id")?);
        Ok(Self {
            vhost_type: fields.optional("type")?.unwrap_or(defaults.vhost_type),
            platform: fields.optional("platform")?.unwrap_or(defaults.platform),
            load_balancing_algorithm_type: fields
                .optional("load_balancing_algorithm_type")?
                .unwrap_or(defaults.load_balancing_algorithm_type),
            default: fields.optional("default")?.unwrap_or(defaults.default),
            acme: fields.optional("acme")?.unwrap_or(defaults.acme),
            internal: fields.optional("internal")?.unwrap_or(defaults.internal),
            service_id: defaults.service_id,
        })
    }
}

impl CreateInput for VhostCreate {
    const NAME: &'static str = "vhost_create";

    fn path(&self, _base: &str) -> String {
        format!(
            "/services/{}/vhosts",
            urlencoding::encode(&self.service_id.to_string())
        )
    }
}

impl Manager<Vhost> {
    /// Endpoints of one service, read from the service's own collection
    pub async fn list_for_service(&self, service_id: &ResourceId) -> Result<Vec<Vhost>> {
        let path = format!(
            "/services/{}/vhosts",
            urlencoding::encode(&service_id.to_string())
        );
        self.list_at(&path).await
    }

    /// Create and provision a default endpoint for a service
    pub async fn create_for_service(&self, service_id: ResourceId) -> Result<Vhost> {
        self.create(&VhostCreate::for_service(service_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "id": 789,
            "virtual_domain": "app-123.on-aptible.com",
            "external_host": "elb-123.aptible.in",
            "status": "provisioned",
            "acme_status": null,
            "created_at": "2023-01-01T12:00:00Z",
            "updated_at": "2023-01-01T12:00:00Z",
            "_links": {"service": {"href": "https://api.aptible.com/services/55"}}
        })
    }

    #[test]
    fn test_vhost_validates() {
        let vhost = Vhost::validate(sample()).unwrap();
        assert_eq!(vhost.service_id().unwrap(), ResourceId::Int(55));
        assert_eq!(vhost.handle(), Some("app-123.on-aptible.com"));
    }

    #[test]
    fn test_hostname_falls_back_to_external_host() {
        let mut payload = sample();
        payload["virtual_domain"] = Value::Null;
        let vhost = Vhost::validate(payload).unwrap();
        assert_eq!(vhost.hostname(), Some("elb-123.aptible.in"));
    }

    #[test]
    fn test_vhost_requires_service_link() {
        let mut payload = sample();
        payload["_links"] = json!({});
        assert_eq!(Vhost::validate(payload).unwrap_err().field, "_links.service");
    }

    #[test]
    fn test_default_create_body() {
        let input = VhostCreate::for_service(ResourceId::Int(55));
        assert_eq!(input.path("/vhosts"), "/services/55/vhosts");
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "service_id": 55,
                "type": "http",
                "platform": "alb",
                "load_balancing_algorithm_type": "round_robin",
                "default": true,
                "acme": false,
                "internal": false
            })
        );
    }

    #[test]
    fn test_create_input_fills_defaults() {
        let mut fields = Fields::from_payload(
            "vhost_create",
            json!({"service_id": 55, "internal": true}),
        )
        .unwrap();
        let input = VhostCreate::from_fields(&mut fields).unwrap();
        assert!(input.internal);
        assert_eq!(input.platform, "alb");
    }
}
