//! Aptible API interaction module
//!
//! # Module Structure
//!
//! - [`auth`] - Token resolution and organization lookup
//! - [`client`] - Main client holding the credential and API base URL
//! - [`http`] - HTTP utilities and status-to-error mapping
//!
//! # Example
//!
//! ```ignore
//! use aptible_mcp::api::{auth, ApiClient};
//!
//! async fn example() -> aptible_mcp::Result<()> {
//!     let token = auth::resolve_token("https://auth.aptible.com")?;
//!     let client = ApiClient::new("https://api.aptible.com", "https://auth.aptible.com", &token)?;
//!     let stacks = client.get("/stacks").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

pub use client::ApiClient;
