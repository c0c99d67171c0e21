//! Generic resource manager
//!
//! One CRUD skeleton for every kind. Kinds customise only the request path
//! of create ([`CreateInput::path`]) and the post-validation hook
//! ([`Record::post_validate`]); kind-specific operations are added as
//! `impl Manager<Kind>` blocks next to each record.

use super::waiter::{Operation, OperationRef, OperationWaiter, Outcome, WaitConfig};
use super::{CreateInput, Record, Resource, ResourceId, UpdateInput};
use crate::api::ApiClient;
use crate::error::{Error, Result, ValidationError};
use serde_json::{json, Value};
use std::marker::PhantomData;

/// Query used on every collection request.
///
/// `per_page=5000` avoids pagination and `no_embed=true` skips embedded
/// data these records do not read.
const LIST_PARAMS: &str = "per_page=5000&no_embed=true";

fn with_list_params(path: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{LIST_PARAMS}")
}

/// Fetch a collection and validate every element, keeping response order
pub async fn list_records<T: Record>(client: &ApiClient, path: &str) -> Result<Vec<T>> {
    let mut response = client.get(&with_list_params(path)).await?;

    let items = response
        .get_mut("_embedded")
        .and_then(|embedded| embedded.get_mut(T::COLLECTION))
        .map(Value::take);

    let Some(Value::Array(items)) = items else {
        return Err(ValidationError::new(
            T::NAME,
            format!("_embedded.{}", T::COLLECTION),
            "is missing from the collection response",
        )
        .into());
    };

    let records = items
        .into_iter()
        .map(T::validate)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    tracing::debug!("Fetched {} {} from {}", records.len(), T::COLLECTION, path);
    Ok(records)
}

/// Operation a create response points at under `_links.operation`
fn embedded_operation<R: Record>(
    record: &R,
) -> std::result::Result<Option<OperationRef>, ValidationError> {
    let Some(link) = record.links().get("operation") else {
        return Ok(None);
    };
    let id = link
        .target_id("operations")
        .map_err(|reason| ValidationError::new(R::NAME, "_links.operation", reason))?;
    Ok(Some(OperationRef {
        id,
        locator: link.href.clone(),
    }))
}

/// CRUD engine for one resource kind
pub struct Manager<R> {
    client: ApiClient,
    wait: WaitConfig,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Manager<R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            wait: self.wait,
            _record: PhantomData,
        }
    }
}

impl<R: Resource> Manager<R> {
    pub fn new(client: ApiClient, wait: WaitConfig) -> Self {
        Self {
            client,
            wait,
            _record: PhantomData,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn wait_config(&self) -> WaitConfig {
        self.wait
    }

    pub fn waiter(&self) -> OperationWaiter<'_> {
        OperationWaiter::new(&self.client, self.wait)
    }

    fn item_path(&self, id: &ResourceId) -> String {
        format!(
            "{}/{}",
            R::KIND.base_path(),
            urlencoding::encode(&id.to_string())
        )
    }

    /// All records of this kind, in the order the API returned them
    pub async fn list(&self) -> Result<Vec<R>> {
        list_records(&self.client, R::KIND.base_path()).await
    }

    /// Records from a nested collection such as `/apps/{id}/services`
    pub async fn list_at(&self, path: &str) -> Result<Vec<R>> {
        list_records(&self.client, path).await
    }

    /// Fetch one record by id; a 404 surfaces as `Error::NotFound`
    pub async fn get(&self, id: &ResourceId) -> Result<R> {
        let payload = self.client.get(&self.item_path(id)).await?;
        Ok(R::validate(payload)?)
    }

    /// First record carrying `handle`
    pub async fn find_by_handle(&self, handle: &str) -> Result<Option<R>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|record| record.handle() == Some(handle)))
    }

    /// Resolve a handle, using the owning scope to break collisions
    ///
    /// Filters the full listing client-side; the API offers no lookup by
    /// handle.
    pub async fn resolve(&self, handle: &str, scope: Option<&ResourceId>) -> Result<R> {
        let mut matches: Vec<R> = self
            .list()
            .await?
            .into_iter()
            .filter(|record| record.handle() == Some(handle))
            .collect();

        let no_match = |scope: Option<String>| Error::NoMatch {
            kind: R::KIND,
            handle: handle.to_string(),
            scope,
        };

        match scope {
            None if matches.len() == 1 => Ok(matches.remove(0)),
            None if matches.is_empty() => Err(no_match(None)),
            None => Err(Error::Ambiguous {
                kind: R::KIND,
                handle: handle.to_string(),
                matches: matches.len(),
                scope: R::SCOPE.map(|scope| scope.kind),
            }),
            Some(scope_id) => {
                for record in matches {
                    if record.scope_id()?.as_ref() == Some(scope_id) {
                        return Ok(record);
                    }
                }
                let scope_name = R::SCOPE
                    .map(|scope| format!("{} {}", scope.kind, scope_id))
                    .unwrap_or_else(|| scope_id.to_string());
                Err(no_match(Some(scope_name)))
            }
        }
    }

    /// All records whose owning scope is `scope_id`
    pub async fn in_scope(&self, scope_id: &ResourceId) -> Result<Vec<R>> {
        let mut scoped = Vec::new();
        for record in self.list().await? {
            if record.scope_id()?.as_ref() == Some(scope_id) {
                scoped.push(record);
            }
        }
        Ok(scoped)
    }

    /// Create a record; provisioning kinds return only once provisioned
    pub async fn create(&self, input: &R::Create) -> Result<R> {
        let body = serde_json::to_value(input).map_err(|e| {
            ValidationError::new(<R::Create as CreateInput>::NAME, "<root>", e.to_string())
        })?;
        let path = input.path(R::KIND.base_path());

        let payload = self.client.post(&path, &body).await?;
        let record = R::validate(payload)?;
        tracing::info!("Created {} {}", R::KIND, record.id());

        if !R::PROVISIONS {
            return Ok(record);
        }

        match embedded_operation(&record)? {
            Some(reference) => self.waiter().wait(&reference).await?,
            None => {
                self.run_operation(record.id(), &json!({ "type": "provision" }))
                    .await?
            }
        };
        self.get(record.id()).await
    }

    /// Replace fields of a record; updates are synchronous
    pub async fn update(&self, id: &ResourceId, input: &R::Update) -> Result<R> {
        let body = serde_json::to_value(input).map_err(|e| {
            ValidationError::new(<R::Update as UpdateInput>::NAME, "<root>", e.to_string())
        })?;
        let payload = self.client.put(&self.item_path(id), &body).await?;
        Ok(R::validate(payload)?)
    }

    /// Delete a record; dependents are guarded by the API, not here
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.client.delete(&self.item_path(id)).await?;
        tracing::info!("Deleted {} {}", R::KIND, id);
        Ok(())
    }

    /// Follow a relationship href and validate what it points at
    pub async fn related<T: Record>(&self, record: &R, relation: &str) -> Result<T> {
        let link = record.links().get(relation).ok_or_else(|| {
            ValidationError::new(R::NAME, format!("_links.{relation}"), "is missing")
        })?;
        let payload = self.client.get(&link.href).await?;
        Ok(T::validate(payload)?)
    }

    /// Start an operation on a record without waiting for it
    pub async fn start_operation(&self, id: &ResourceId, body: &Value) -> Result<Operation> {
        let path = format!("{}/operations", self.item_path(id));
        let payload = self.client.post(&path, body).await?;
        let operation = Operation::validate(payload)?;
        tracing::info!(
            "Started {} operation {} on {} {}",
            operation.operation_type,
            operation.id,
            R::KIND,
            id
        );
        Ok(operation)
    }

    /// Start an operation and block until it is terminal
    pub async fn run_operation(&self, id: &ResourceId, body: &Value) -> Result<Outcome> {
        let operation = self.start_operation(id, body).await?;
        self.waiter().wait(&operation.reference()).await
    }

    /// Tear a record down through a deprovision operation
    pub async fn deprovision(&self, id: &ResourceId) -> Result<()> {
        self.run_operation(id, &json!({ "type": "deprovision" }))
            .await?;
        Ok(())
    }

    /// Recent operations run against a record
    pub async fn operations(&self, id: &ResourceId) -> Result<Vec<Operation>> {
        list_records(&self.client, &format!("{}/operations", self.item_path(id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_operation_from_links() {
        let vhost = crate::resource::Vhost::validate(json!({
            "id": 789,
            "status": "pending",
            "created_at": "2023-01-01T12:00:00Z",
            "updated_at": "2023-01-01T12:00:00Z",
            "_links": {
                "service": {"href": "/services/55"},
                "operation": {"href": "https://api.aptible.com/operations/91"}
            }
        }))
        .unwrap();
        let reference = embedded_operation(&vhost).unwrap().unwrap();
        assert_eq!(reference.id, ResourceId::Int(91));
        assert_eq!(reference.locator, "https://api.aptible.com/operations/91");
    }

    #[test]
    fn test_list_params_appended() {
        assert_eq!(with_list_params("/apps"), "/apps?per_page=5000&no_embed=true");
        assert_eq!(
            with_list_params("/apps?q=1"),
            "/apps?q=1&per_page=5000&no_embed=true"
        );
    }
}
