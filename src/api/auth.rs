//! Aptible Authentication
//!
//! Resolves the bearer token used for every API call: the `APTIBLE_TOKEN`
//! environment variable first, then the token file written by the Aptible CLI.

use super::client::ApiClient;
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable holding a bearer token
pub const TOKEN_ENV: &str = "APTIBLE_TOKEN";

/// Location of the Aptible CLI token file (`~/.aptible/tokens.json`)
pub fn token_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".aptible").join("tokens.json"))
}

/// Resolve the bearer token for `auth_url`
pub fn resolve_token(auth_url: &str) -> Result<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            tracing::debug!("Using token from {}", TOKEN_ENV);
            return Ok(token.trim().to_string());
        }
        tracing::warn!("{} is set but empty, falling back to token file", TOKEN_ENV);
    }

    let path = token_file_path()
        .ok_or_else(|| Error::Credentials("cannot locate home directory".to_string()))?;
    read_token_file(&path, auth_url)
}

/// Read the token stored for `auth_url` in a CLI token file
///
/// The file maps auth service URLs to tokens.
pub fn read_token_file(path: &Path, auth_url: &str) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|_| {
        Error::Credentials(
            "authentication token not found. Please login to Aptible CLI first.".to_string(),
        )
    })?;

    let tokens: HashMap<String, String> = serde_json::from_str(&content)
        .map_err(|e| Error::Credentials(format!("malformed token file: {e}")))?;

    let key = auth_url.trim_end_matches('/');
    tokens
        .get(key)
        .or_else(|| tokens.get(&format!("{key}/")))
        .filter(|token| !token.trim().is_empty())
        .cloned()
        .ok_or_else(|| Error::Credentials("you are not logged in".to_string()))
}

/// Organization of the logged in user.
///
/// Users may belong to several organizations; the first one is used.
pub async fn organization_id(client: &ApiClient) -> Result<String> {
    let response = client.get(&client.auth_endpoint("/organizations")).await?;

    let first = response
        .pointer("/_embedded/organizations/0/id")
        .ok_or_else(|| {
            Error::Credentials("logged in user is not a member of any organizations".to_string())
        })?;

    match first {
        Value::String(id) => Ok(id.clone()),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(Error::Credentials(format!(
            "unexpected organization id: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tokens(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "aptible-mcp-auth-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tokens.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_token_file_by_auth_url() {
        let path = write_tokens(
            "lookup",
            r#"{"https://auth.aptible.com": "abc", "https://auth.other.com": "def"}"#,
        );
        assert_eq!(read_token_file(&path, "https://auth.aptible.com").unwrap(), "abc");
        assert_eq!(read_token_file(&path, "https://auth.other.com/").unwrap(), "def");
    }

    #[test]
    fn test_read_token_file_missing_entry() {
        let path = write_tokens("missing", r#"{"https://auth.other.com": "def"}"#);
        let err = read_token_file(&path, "https://auth.aptible.com").unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn test_read_token_file_absent() {
        let err = read_token_file(Path::new("/nonexistent/tokens.json"), "x").unwrap_err();
        assert!(err.to_string().contains("login"));
    }
}
