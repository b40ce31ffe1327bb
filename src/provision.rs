//! Idempotent upsert of the remote app package and activity.
//!
//! Each resource walks the same shape: look it up by key, ask the operator
//! how to handle a conflict, then create, update or leave it. Deletions are
//! committed before anything new is created, and package content goes
//! through an explicit upload phase before the entity referencing it is
//! registered, so the package never points at unconfirmed content.

use tracing::{debug, info};

use crate::bundle::BundleBuilder;
use crate::client::DesignAutomation;
use crate::config::Settings;
use crate::error::ProvisionError;
use crate::models::{Activity, AppPackage};
use crate::prompt::Prompter;

/// Lifecycle states a resource moves through during an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Absent,
    Present,
    PendingDelete,
    Created,
    Updated,
    Left,
}

/// Terminal outcome of one resource's upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOutcome {
    Created,
    Updated,
    Left,
}

/// A resource together with how the run resolved it.
#[derive(Debug)]
pub struct Provisioned<T> {
    pub entity: T,
    pub outcome: ResourceOutcome,
}

#[derive(Debug)]
pub struct ProvisionReport {
    pub package: Provisioned<AppPackage>,
    pub activity: Provisioned<Activity>,
}

/// Operator decision for an already-existing package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageDecision {
    Recreate,
    Update,
    Leave,
}

impl PackageDecision {
    fn from_keyword(keyword: &str) -> Result<Self, ProvisionError> {
        match keyword {
            "Recreate" => Ok(PackageDecision::Recreate),
            "Update" => Ok(PackageDecision::Update),
            "Leave" => Ok(PackageDecision::Leave),
            other => Err(ProvisionError::Input(format!(
                "unexpected package decision keyword '{other}'"
            ))),
        }
    }
}

/// Provisions both resources in order: the package first, then the activity
/// that references it. Strictly sequential and fail-fast; the activity is
/// only attempted once the package has resolved, so it can never be created
/// against a package that does not exist remotely.
pub async fn provision<A, B, P>(
    api: &A,
    builder: &B,
    prompter: &P,
    settings: &Settings,
) -> Result<ProvisionReport, ProvisionError>
where
    A: DesignAutomation + ?Sized,
    B: BundleBuilder + ?Sized,
    P: Prompter + ?Sized,
{
    let package = provision_package(api, builder, prompter, settings).await?;
    let activity = provision_activity(api, prompter, settings).await?;
    Ok(ProvisionReport { package, activity })
}

/// Upserts the app package.
///
/// Present packages are resolved by operator prompt: `Leave` returns the
/// existing entity untouched, `Recreate` deletes and commits before taking
/// the create path, `Update` retains the entity and refreshes only its
/// `Resource` field. Both the create and update paths rebuild the bundle and
/// upload it before any registration is staged.
pub async fn provision_package<A, B, P>(
    api: &A,
    builder: &B,
    prompter: &P,
    settings: &Settings,
) -> Result<Provisioned<AppPackage>, ProvisionError>
where
    A: DesignAutomation + ?Sized,
    B: BundleBuilder + ?Sized,
    P: Prompter + ?Sized,
{
    let name = &settings.package_name;
    info!(package = %name, "Resolving app package");
    let found = api.find_package(name).await?;
    let mut state = if found.is_some() {
        ResourceState::Present
    } else {
        ResourceState::Absent
    };
    debug!(?state, package = %name, "Package lookup complete");

    let retained = match found {
        None => None,
        Some(package) => {
            let prompt = format!(
                "AppPackage '{name}' already exists. What do you want to do? \
                 [Recreate/Update/Leave]<Update>"
            );
            match PackageDecision::from_keyword(&prompter.resolve(&prompt)?)? {
                PackageDecision::Leave => {
                    state = ResourceState::Left;
                    info!(package = %name, ?state, "Leaving existing app package untouched");
                    return Ok(Provisioned {
                        entity: package,
                        outcome: ResourceOutcome::Left,
                    });
                }
                PackageDecision::Recreate => {
                    state = ResourceState::PendingDelete;
                    debug!(?state, package = %name, "Deleting app package before recreation");
                    api.stage_delete_package(name);
                    api.commit().await?;
                    state = ResourceState::Absent;
                    debug!(?state, package = %name, "App package deleted");
                    None
                }
                PackageDecision::Update => Some(package),
            }
        }
    };

    // Two-phase content handling: the bundle is built and its upload
    // confirmed before any entity references the URL.
    let archive = builder.build()?;
    let upload_url = api.upload_url().await?;
    debug!(phase = "Uploading", package = %name, "Uploading bundle");
    let uploaded = api.upload_bundle(&upload_url, &archive).await?;
    debug!(phase = "Uploaded", package = %name, "Bundle content confirmed");

    debug!(phase = "Registering", package = %name, "Registering app package entity");
    let provisioned = match retained {
        None => {
            let package = AppPackage::registered(settings, uploaded);
            api.stage_create_package(package.clone());
            api.commit().await?;
            state = ResourceState::Created;
            Provisioned {
                entity: package,
                outcome: ResourceOutcome::Created,
            }
        }
        Some(mut package) => {
            // Narrow update: only the content URL is refreshed.
            package.resource = uploaded.url;
            api.stage_update_package(package.clone());
            api.commit().await?;
            state = ResourceState::Updated;
            Provisioned {
                entity: package,
                outcome: ResourceOutcome::Updated,
            }
        }
    };
    info!(package = %name, ?state, phase = "Registered", "App package resolved");
    Ok(provisioned)
}

/// Upserts the activity. No content upload is involved; the fixed definition
/// is staged and committed directly. A present activity is either left alone
/// or deleted (with commit) and recreated, per operator choice.
pub async fn provision_activity<A, P>(
    api: &A,
    prompter: &P,
    settings: &Settings,
) -> Result<Provisioned<Activity>, ProvisionError>
where
    A: DesignAutomation + ?Sized,
    P: Prompter + ?Sized,
{
    let name = &settings.activity_name;
    info!(activity = %name, "Resolving activity");
    let found = api.find_activity(name).await?;
    let mut state = if found.is_some() {
        ResourceState::Present
    } else {
        ResourceState::Absent
    };
    debug!(?state, activity = %name, "Activity lookup complete");

    if let Some(activity) = found {
        let prompt =
            format!("Activity '{name}' already exists. Do you want to recreate it? [Yes/No]<No>");
        if prompter.resolve(&prompt)? != "Yes" {
            state = ResourceState::Left;
            info!(activity = %name, ?state, "Leaving existing activity untouched");
            return Ok(Provisioned {
                entity: activity,
                outcome: ResourceOutcome::Left,
            });
        }
        state = ResourceState::PendingDelete;
        debug!(?state, activity = %name, "Deleting activity before recreation");
        api.stage_delete_activity(name);
        api.commit().await?;
        state = ResourceState::Absent;
        debug!(?state, activity = %name, "Activity deleted");
    }

    let activity = Activity::definition(settings);
    api.stage_create_activity(activity.clone());
    api.commit().await?;
    state = ResourceState::Created;
    info!(activity = %name, ?state, "Activity resolved");
    Ok(Provisioned {
        entity: activity,
        outcome: ResourceOutcome::Created,
    })
}
