//! Managed databases and the images they are created from

use super::fields::Fields;
use super::links::Relationships;
use super::manager::{list_records, Manager};
use super::{
    CreateInput, FromFields, HandleUpdate, Record, Resource, ResourceId, ResourceKind, Scope,
};
use crate::error::{Result, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

const IMAGES_PATH: &str = "/database_images";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Database {
    pub id: ResourceId,
    pub handle: String,
    /// Engine, e.g. `postgresql` or `redis`
    #[serde(rename = "type")]
    pub engine: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Relationships,
}

impl Database {
    pub fn account_id(&self) -> std::result::Result<Option<ResourceId>, ValidationError> {
        self.links.optional_id_of(Self::NAME, "account", "accounts")
    }

    pub fn database_image_id(&self) -> std::result::Result<Option<ResourceId>, ValidationError> {
        self.links
            .optional_id_of(Self::NAME, "database_image", "database_images")
    }
}

impl FromFields for Database {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            handle: fields.required("handle")?,
            engine: fields.required("type")?,
            status: fields.required("status")?,
            created_at: fields.required("created_at")?,
            updated_at: fields.required("updated_at")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for Database {
    const NAME: &'static str = "database";
    const COLLECTION: &'static str = "databases";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }

    fn post_validate(&self) -> std::result::Result<(), ValidationError> {
        self.account_id()?;
        self.database_image_id()?;
        Ok(())
    }

    fn derived(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("account_id", json!(self.account_id().ok().flatten())),
            (
                "database_image_id",
                json!(self.database_image_id().ok().flatten()),
            ),
        ]
    }
}

impl Resource for Database {
    const KIND: ResourceKind = ResourceKind::Database;
    const SCOPE: Option<Scope> = Some(Scope {
        kind: ResourceKind::Account,
        relation: "account",
    });
    const PROVISIONS: bool = true;

    type Create = DatabaseCreate;
    type Update = HandleUpdate;

    fn handle(&self) -> Option<&str> {
        Some(&self.handle)
    }
}

/// An engine/version pair databases can be created from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseImage {
    pub id: ResourceId,
    #[serde(rename = "type")]
    pub engine: String,
    pub version: String,
    pub description: String,
    pub links: Relationships,
}

impl FromFields for DatabaseImage {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            engine: fields.required("type")?,
            version: fields.required("version")?,
            description: fields.required("description")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for DatabaseImage {
    const NAME: &'static str = "database_image";
    const COLLECTION: &'static str = "database_images";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }
}

/// Databases are created under their account: `POST /accounts/{id}/databases`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseCreate {
    pub handle: String,
    pub database_image_id: ResourceId,
    /// Engine of the chosen image
    #[serde(rename = "type")]
    pub engine: String,
    #[serde(skip)]
    pub account_id: ResourceId,
}

impl DatabaseCreate {
    pub fn from_image(handle: &str, account_id: ResourceId, image: &DatabaseImage) -> Self {
        Self {
            handle: handle.to_string(),
            database_image_id: image.id.clone(),
            engine: image.engine.clone(),
            account_id,
        }
    }
}

impl FromFields for DatabaseCreate {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            handle: fields.required_text("handle")?,
            database_image_id: fields.required("database_image_id")?,
            engine: fields.required_text("type")?,
            account_id: fields.required("account_id")?,
        })
    }
}

/// Caller input for a database create, checked against the image list.
///
/// The engine always comes from the image; a supplied `type` must agree.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRequest {
    pub handle: String,
    pub account_id: ResourceId,
    pub database_image_id: ResourceId,
    pub engine: Option<String>,
}

impl FromFields for DatabaseRequest {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            handle: fields.required_text("handle")?,
            account_id: fields.required("account_id")?,
            database_image_id: fields.required("database_image_id")?,
            engine: fields.optional("type")?,
        })
    }
}

impl DatabaseRequest {
    fn for_image(
        self,
        image: &DatabaseImage,
    ) -> std::result::Result<DatabaseCreate, ValidationError> {
        let requested = self.engine.as_deref();
        if let Some(engine) = requested.filter(|engine| *engine != image.engine) {
            return Err(ValidationError::new(
                DatabaseCreate::NAME,
                "type",
                format!("{engine:?} does not match image {} ({})", image.id, image.engine),
            ));
        }
        Ok(DatabaseCreate::from_image(&self.handle, self.account_id, image))
    }
}

impl CreateInput for DatabaseCreate {
    const NAME: &'static str = "database_create";

    fn path(&self, _base: &str) -> String {
        format!(
            "/accounts/{}/databases",
            urlencoding::encode(&self.account_id.to_string())
        )
    }
}

impl Manager<Database> {
    /// Images databases can be created from
    pub async fn list_available_types(&self) -> Result<Vec<DatabaseImage>> {
        list_records(self.client(), IMAGES_PATH).await
    }

    /// Look an image up by id in the image list
    pub async fn image(&self, image_id: &ResourceId) -> Result<DatabaseImage> {
        self.list_available_types()
            .await?
            .into_iter()
            .find(|image| &image.id == image_id)
            .ok_or_else(|| {
                ValidationError::new(
                    "database_create",
                    "database_image_id",
                    format!("no database image with id {image_id}"),
                )
                .into()
            })
    }

    /// Create and provision a database from an image id
    pub async fn create_from_image(
        &self,
        handle: &str,
        account_id: ResourceId,
        image_id: &ResourceId,
    ) -> Result<Database> {
        self.create_requested(DatabaseRequest {
            handle: handle.to_string(),
            account_id,
            database_image_id: image_id.clone(),
            engine: None,
        })
        .await
    }

    /// Validate the request's image against the image list, then create
    pub async fn create_requested(&self, request: DatabaseRequest) -> Result<Database> {
        let image = self.image(&request.database_image_id).await?;
        tracing::info!(
            "Creating {} {} database {}",
            image.engine,
            image.version,
            request.handle
        );
        let input = request.for_image(&image)?;
        self.create(&input).await
    }
}
