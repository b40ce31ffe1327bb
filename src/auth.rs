//! Token acquisition via the OAuth client-credentials grant.
//!
//! The token is acquired once per run and reused verbatim as the
//! `Authorization` header value of every subsequent remote call. There is no
//! caching or refresh.

use std::collections::HashMap;

use tracing::{error, info};

use crate::error::ProvisionError;

const TOKEN_SCOPE: &str = "code:all";

/// Exchanges client credentials for a bearer token usable as an
/// Authorization header value.
pub async fn acquire_token(
    client: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, ProvisionError> {
    let url = format!("{base_url}/authentication/v1/authenticate");
    let form = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("grant_type", "client_credentials"),
        ("scope", TOKEN_SCOPE),
    ];

    let response = client.post(&url).form(&form).send().await.map_err(|e| {
        error!(error = %e, "Token request failed to send");
        ProvisionError::Authentication(format!("token request failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        error!(status = %status, "Token endpoint returned non-success status");
        return Err(ProvisionError::Authentication(format!(
            "token endpoint returned {status}"
        )));
    }

    let fields: HashMap<String, String> = response.json().await.map_err(|e| {
        error!(error = %e, "Token response body was not a flat key/value map");
        ProvisionError::Authentication(format!("malformed token response: {e}"))
    })?;

    let token = bearer_token(&fields)?;
    info!("Access token acquired");
    Ok(token)
}

/// Builds the `"{token_type} {access_token}"` header value from the token
/// response fields.
fn bearer_token(fields: &HashMap<String, String>) -> Result<String, ProvisionError> {
    let token_type = fields
        .get("token_type")
        .ok_or_else(|| ProvisionError::Authentication("response missing token_type".into()))?;
    let access_token = fields
        .get("access_token")
        .ok_or_else(|| ProvisionError::Authentication("response missing access_token".into()))?;
    Ok(format!("{token_type} {access_token}"))
}
