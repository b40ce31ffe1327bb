//! Design Automation resource API client.
//!
//! [`DesignAutomation`] is the seam the upsert state machine drives; the
//! production implementation is a thin reqwest client. Mutations are staged
//! locally and only issued by [`DesignAutomation::commit`], mirroring the
//! remote API's model where pending changes become durable on an explicit
//! save.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ProvisionError;
use crate::models::{Activity, AppPackage, UploadedBundle};

/// Every outbound call gets the same deadline; a hung remote call fails the
/// run instead of hanging it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_PATH: &str = "/autocad.io/us-east/v2";

/// Remote operations over the `AppPackages` and `Activities` collections.
///
/// Lookups distinguish confirmed absence (`Ok(None)`, drives the create
/// path) from transport or server errors (`Err`, aborts the run). Staging
/// methods record mutations locally; `commit` makes them durable.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DesignAutomation: Send + Sync {
    /// Fetch an app package by key. `Ok(None)` means the remote confirmed it
    /// does not exist.
    async fn find_package(&self, name: &str) -> Result<Option<AppPackage>, ProvisionError>;

    /// Fetch an activity by key. `Ok(None)` means confirmed absence.
    async fn find_activity(&self, name: &str) -> Result<Option<Activity>, ProvisionError>;

    /// Request a destination URL for uploading bundle content.
    async fn upload_url(&self) -> Result<String, ProvisionError>;

    /// Upload the bundle archive to the issued URL. Returns proof of the
    /// confirmed upload; package registration consumes it.
    async fn upload_bundle(
        &self,
        url: &str,
        archive: &Path,
    ) -> Result<UploadedBundle, ProvisionError>;

    fn stage_create_package(&self, package: AppPackage);
    fn stage_update_package(&self, package: AppPackage);
    fn stage_delete_package(&self, name: &str);
    fn stage_create_activity(&self, activity: Activity);
    fn stage_delete_activity(&self, name: &str);

    /// Issue all staged mutations against the remote API, in staging order.
    /// Fails with the name of the resource whose call was rejected.
    async fn commit(&self) -> Result<(), ProvisionError>;
}

#[derive(Debug)]
enum PendingChange {
    CreatePackage(AppPackage),
    UpdatePackage(AppPackage),
    DeletePackage(String),
    CreateActivity(Activity),
    DeleteActivity(String),
}

impl PendingChange {
    fn resource(&self) -> &str {
        match self {
            PendingChange::CreatePackage(p) | PendingChange::UpdatePackage(p) => &p.id,
            PendingChange::DeletePackage(name) | PendingChange::DeleteActivity(name) => name,
            PendingChange::CreateActivity(a) => &a.id,
        }
    }
}

/// Plain HTTP client with the uniform request deadline, used for the token
/// request before any Authorization header exists.
pub fn http_client() -> Result<reqwest::Client, ProvisionError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProvisionError::Configuration(format!("cannot build HTTP client: {e}")))
}

/// Production client. The bearer token is injected as a default header, so
/// every outbound call is signed uniformly.
#[derive(Debug)]
pub struct DesignAutomationClient {
    http: reqwest::Client,
    api_root: String,
    pending: Mutex<Vec<PendingChange>>,
}

impl DesignAutomationClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ProvisionError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(token).map_err(|e| {
            ProvisionError::Authentication(format!("token is not a valid header value: {e}"))
        })?;
        headers.insert(AUTHORIZATION, value);
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| ProvisionError::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(DesignAutomationClient {
            http,
            api_root: format!("{base_url}{API_PATH}"),
            pending: Mutex::new(Vec::new()),
        })
    }

    fn stage(&self, change: PendingChange) {
        debug!(change = ?change, "Staging remote mutation");
        self.pending
            .lock()
            .expect("pending-changes lock poisoned")
            .push(change);
    }

    /// Key-addressed entity lookup with the three-valued outcome: entity,
    /// confirmed absence, or error.
    async fn fetch_entity<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        name: &str,
    ) -> Result<Option<T>, ProvisionError> {
        let url = format!("{}/{}('{}')", self.api_root, collection, name);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ProvisionError::remote(name, e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let entity = response
                    .json::<T>()
                    .await
                    .map_err(|e| ProvisionError::remote(name, e))?;
                Ok(Some(entity))
            }
            status => Err(ProvisionError::remote(
                name,
                format!("lookup returned {status}"),
            )),
        }
    }
}

#[derive(Deserialize)]
struct ODataValue {
    value: String,
}

#[async_trait]
impl DesignAutomation for DesignAutomationClient {
    async fn find_package(&self, name: &str) -> Result<Option<AppPackage>, ProvisionError> {
        self.fetch_entity("AppPackages", name).await
    }

    async fn find_activity(&self, name: &str) -> Result<Option<Activity>, ProvisionError> {
        self.fetch_entity("Activities", name).await
    }

    async fn upload_url(&self) -> Result<String, ProvisionError> {
        let url = format!("{}/AppPackages/Operations.GetUploadUrl", self.api_root);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ProvisionError::remote("AppPackages upload URL", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::remote(
                "AppPackages upload URL",
                format!("request returned {status}"),
            ));
        }
        let body: ODataValue = response
            .json()
            .await
            .map_err(|e| ProvisionError::remote("AppPackages upload URL", e))?;
        Ok(body.value)
    }

    async fn upload_bundle(
        &self,
        url: &str,
        archive: &Path,
    ) -> Result<UploadedBundle, ProvisionError> {
        let bytes = std::fs::read(archive)
            .map_err(|e| ProvisionError::Packaging(format!("cannot read bundle archive: {e}")))?;
        info!(bytes = bytes.len(), "Uploading bundle content");
        let response = self
            .http
            .put(url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProvisionError::remote("bundle upload", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::remote(
                "bundle upload",
                format!("upload returned {status}"),
            ));
        }
        info!("Bundle upload confirmed");
        Ok(UploadedBundle {
            url: url.to_string(),
        })
    }

    fn stage_create_package(&self, package: AppPackage) {
        self.stage(PendingChange::CreatePackage(package));
    }

    fn stage_update_package(&self, package: AppPackage) {
        self.stage(PendingChange::UpdatePackage(package));
    }

    fn stage_delete_package(&self, name: &str) {
        self.stage(PendingChange::DeletePackage(name.to_string()));
    }

    fn stage_create_activity(&self, activity: Activity) {
        self.stage(PendingChange::CreateActivity(activity));
    }

    fn stage_delete_activity(&self, name: &str) {
        self.stage(PendingChange::DeleteActivity(name.to_string()));
    }

    async fn commit(&self) -> Result<(), ProvisionError> {
        // Drain before awaiting; the lock must not be held across awaits.
        let staged: Vec<PendingChange> = self
            .pending
            .lock()
            .expect("pending-changes lock poisoned")
            .drain(..)
            .collect();
        for change in staged {
            let resource = change.resource().to_string();
            let request = match &change {
                PendingChange::CreatePackage(pkg) => self
                    .http
                    .post(format!("{}/AppPackages", self.api_root))
                    .json(pkg),
                PendingChange::UpdatePackage(pkg) => self
                    .http
                    .patch(format!("{}/AppPackages('{}')", self.api_root, pkg.id))
                    .json(pkg),
                PendingChange::DeletePackage(name) => self
                    .http
                    .delete(format!("{}/AppPackages('{}')", self.api_root, name)),
                PendingChange::CreateActivity(activity) => self
                    .http
                    .post(format!("{}/Activities", self.api_root))
                    .json(activity),
                PendingChange::DeleteActivity(name) => self
                    .http
                    .delete(format!("{}/Activities('{}')", self.api_root, name)),
            };
            let response = request
                .send()
                .await
                .map_err(|e| ProvisionError::remote(&resource, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ProvisionError::remote(
                    &resource,
                    format!("save returned {status}"),
                ));
            }
            info!(resource = %resource, change = ?change, "Staged change committed");
        }
        Ok(())
    }
}
