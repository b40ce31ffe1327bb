use std::path::PathBuf;
use tracing::{error, info};

use crate::error::ProvisionError;

pub const DEFAULT_BASE_URL: &str = "https://developer.api.autodesk.com";

const CLIENT_ID_VAR: &str = "FORGE_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "FORGE_CLIENT_SECRET";

/// Client credentials read from the environment. Their absence is a fatal
/// startup condition; no remote call is attempted without them.
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ProvisionError> {
        let client_id = require_var(CLIENT_ID_VAR)?;
        let client_secret = require_var(CLIENT_SECRET_VAR)?;
        info!("Credentials loaded from environment");
        Ok(Credentials {
            client_id,
            client_secret,
        })
    }
}

fn require_var(name: &str) -> Result<String, ProvisionError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => {
            error!(var = name, "Required environment variable not set");
            Err(ProvisionError::Configuration(format!(
                "environment variable {name} is not set"
            )))
        }
    }
}

/// Fixed provisioning settings for the DWG query deployment. Everything here
/// is part of the deployment contract rather than operator input, so the
/// values are constants apart from the base URL override.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub package_name: String,
    pub activity_name: String,
    pub script: String,
    pub required_engine_version: String,
    pub archive_path: PathBuf,
}

impl Settings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Settings {
            base_url: base_url.into(),
            package_name: "QueryDWGPackage".to_string(),
            activity_name: "QueryDWGActivity".to_string(),
            script: "_querydwg params.json\n".to_string(),
            required_engine_version: "21.0".to_string(),
            archive_path: PathBuf::from("package.zip"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(DEFAULT_BASE_URL)
    }
}
