//! Operation waiter
//!
//! State-changing calls start an operation on the API and poll it until it
//! reaches a terminal status. The loop is a small explicit state machine so
//! terminal detection and attempt exhaustion can be tested on their own.

use super::fields::Fields;
use super::links::Relationships;
use super::{FromFields, Record, ResourceId};
use crate::api::ApiClient;
use crate::error::{Error, Result, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;

/// Polling configuration; defaults live here and nowhere else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl WaitConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    /// 30 minutes at the default interval
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 900;
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// An asynchronous action on the API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub id: ResourceId,
    pub status: String,
    #[serde(rename = "type")]
    pub operation_type: String,
    pub resource_id: Option<ResourceId>,
    pub resource_type: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub links: Relationships,
}

impl FromFields for Operation {
    fn from_fields(fields: &mut Fields) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            id: fields.required("id")?,
            status: fields.required("status")?,
            operation_type: fields.required("type")?,
            resource_id: fields.optional("resource_id")?,
            resource_type: fields.optional("resource_type")?,
            message: fields.optional("message")?,
            created_at: fields.optional("created_at")?,
            links: fields.relationships()?,
        })
    }
}

impl Record for Operation {
    const NAME: &'static str = "operation";
    const COLLECTION: &'static str = "operations";

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn links(&self) -> &Relationships {
        &self.links
    }
}

impl Operation {
    /// Where to poll this operation
    pub fn reference(&self) -> OperationRef {
        match self.links.get("self") {
            Some(link) => OperationRef {
                id: self.id.clone(),
                locator: link.href.clone(),
            },
            None => OperationRef::new(self.id.clone()),
        }
    }
}

/// Identifier plus status-check locator of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRef {
    pub id: ResourceId,
    pub locator: String,
}

impl OperationRef {
    pub fn new(id: ResourceId) -> Self {
        let locator = format!("/operations/{id}");
        Self { id, locator }
    }
}

/// How a reported status moves the waiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Succeeded,
    Failed,
    Pending,
}

pub fn classify(status: &str) -> StatusClass {
    match status.to_ascii_lowercase().as_str() {
        "succeeded" | "completed" => StatusClass::Succeeded,
        "failed" | "errored" => StatusClass::Failed,
        _ => StatusClass::Pending,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitState {
    /// `attempt` polls have been made so far
    Polling { attempt: u32 },
    Succeeded(Operation),
    Failed { reason: String },
    TimedOut { attempts: u32 },
}

impl WaitState {
    pub fn start() -> Self {
        WaitState::Polling { attempt: 0 }
    }

    /// Apply one poll result; terminal states are absorbing
    pub fn advance(self, operation: Operation) -> Self {
        match self {
            WaitState::Polling { attempt } => match classify(&operation.status) {
                StatusClass::Succeeded => WaitState::Succeeded(operation),
                StatusClass::Failed => WaitState::Failed {
                    reason: operation
                        .message
                        .unwrap_or_else(|| "no failure reason reported".to_string()),
                },
                StatusClass::Pending => WaitState::Polling {
                    attempt: attempt + 1,
                },
            },
            terminal => terminal,
        }
    }

    /// Stop polling once the budget is spent
    pub fn exhaust(self, max_attempts: u32) -> Self {
        match self {
            WaitState::Polling { attempt } if attempt >= max_attempts => {
                WaitState::TimedOut { attempts: attempt }
            }
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitState::Polling { .. })
    }
}

/// Terminal success of a wait
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Operation),
    /// The operation vanished (404) together with the resource it deprovisioned
    Removed,
}

/// Polls operations until they reach a terminal state
pub struct OperationWaiter<'a> {
    client: &'a ApiClient,
    config: WaitConfig,
}

impl<'a> OperationWaiter<'a> {
    pub fn new(client: &'a ApiClient, config: WaitConfig) -> Self {
        Self { client, config }
    }

    async fn poll(&self, reference: &OperationRef) -> Result<Operation> {
        let payload = self.client.get(&reference.locator).await?;
        Ok(Operation::validate(payload)?)
    }

    /// Block until the operation succeeds, fails or runs out of attempts
    pub async fn wait(&self, reference: &OperationRef) -> Result<Outcome> {
        let mut state = WaitState::start().exhaust(self.config.max_attempts);

        loop {
            match state {
                WaitState::Polling { attempt } => {
                    if attempt > 0 {
                        sleep(self.config.poll_interval).await;
                    }

                    let operation = match self.poll(reference).await {
                        Ok(operation) => operation,
                        Err(err) if err.is_not_found() => {
                            tracing::info!(
                                "Operation {} no longer exists, treating as done",
                                reference.id
                            );
                            return Ok(Outcome::Removed);
                        }
                        Err(err) => return Err(err),
                    };

                    tracing::debug!(
                        "Operation {} poll {}: {}",
                        reference.id,
                        attempt + 1,
                        operation.status
                    );
                    state = WaitState::Polling { attempt }
                        .advance(operation)
                        .exhaust(self.config.max_attempts);
                }
                WaitState::Succeeded(operation) => {
                    tracing::info!("Operation {} succeeded", reference.id);
                    return Ok(Outcome::Completed(operation));
                }
                WaitState::Failed { reason } => {
                    tracing::warn!("Operation {} failed: {}", reference.id, reason);
                    return Err(Error::OperationFailed {
                        operation: reference.id.to_string(),
                        reason,
                    });
                }
                WaitState::TimedOut { attempts } => {
                    tracing::warn!(
                        "Operation {} timed out after {} polls",
                        reference.id,
                        attempts
                    );
                    return Err(Error::OperationTimeout {
                        operation: reference.id.to_string(),
                        attempts,
                    });
                }
            }
        }
    }
}

/// Log output of an operation.
///
/// The API answers `/operations/{id}/logs` with a presigned URL to the log
/// content. An empty answer at either step means no logs were recorded.
pub async fn operation_logs(client: &ApiClient, id: &ResourceId) -> Result<Option<String>> {
    let path = format!("/operations/{}/logs", urlencoding::encode(&id.to_string()));
    let location = client.get_text(&path).await?;
    let location = location.trim();
    if location.is_empty() {
        tracing::info!("Operation {} has no log location", id);
        return Ok(None);
    }

    let logs = client.fetch_presigned(location).await?;
    if logs.is_empty() {
        tracing::info!("Operation {} has an empty log", id);
        return Ok(None);
    }
    Ok(Some(logs))
}
