//! Aptible MCP
//!
//! Exposes the Aptible infrastructure API (accounts, apps, databases,
//! stacks, services and vhosts) as MCP tools.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod mcp;
pub mod resource;

pub use error::{Error, Result};
