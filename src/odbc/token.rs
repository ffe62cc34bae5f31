//! Cloud-identity access tokens.

use std::fmt;
use std::io::ErrorKind;
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use super::credentials::Secret;
use crate::error::{AdapterError, Result};

/// Scope of the Azure SQL Database resource.
pub const AZURE_SQL_SCOPE: &str = "https://database.windows.net//.default";

#[cfg(windows)]
const AZ_PROGRAM: &str = "az.cmd";
#[cfg(not(windows))]
const AZ_PROGRAM: &str = "az";

#[derive(Clone)]
pub struct AccessToken {
    token: Secret,
    expires_on: Option<String>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: Option<String>) -> Self {
        Self {
            token: Secret::new(token),
            expires_on,
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn expires_on(&self) -> Option<&str> {
        self.expires_on.as_deref()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"***")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of access tokens for token-based authentication.
pub trait TokenProvider {
    fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

impl<T: TokenProvider + ?Sized> TokenProvider for &T {
    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        (**self).get_token(scope)
    }
}

/// Asks the Azure CLI for a token of the signed-in account.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
    tenant_id: Option<String>,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: AZ_PROGRAM.to_string(),
            tenant_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Overrides the executable, e.g. a full path to `az`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl TokenProvider for AzureCliCredential {
    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let resource = scope_to_resource(scope);
        let mut command = Command::new(&self.program);
        command.args(["account", "get-access-token", "--output", "json", "--resource", resource]);
        if let Some(tenant_id) = &self.tenant_id {
            command.args(["--tenant", tenant_id.as_str()]);
        }

        debug!(resource, "Requesting access token from Azure CLI");
        let output = command.output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AdapterError::authentication_failed("Azure CLI not found on PATH", e)
            } else {
                AdapterError::authentication_failed("failed to run Azure CLI", e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdapterError::authentication(format!(
                "Azure CLI exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_cli_output(&output.stdout)
    }
}

/// The CLI takes a resource, not a scope.
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

/// Parses the JSON printed by `az account get-access-token`.
pub fn parse_cli_output(stdout: &[u8]) -> Result<AccessToken> {
    let parsed: CliToken = serde_json::from_slice(stdout)
        .map_err(|e| AdapterError::authentication_failed("unexpected Azure CLI output", e))?;

    if parsed.access_token.is_empty() {
        return Err(AdapterError::authentication("Azure CLI returned an empty token"));
    }

    Ok(AccessToken::new(parsed.access_token, parsed.expires_on))
}
