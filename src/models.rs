//! Wire models for the Design Automation resource API.
//!
//! Field names are PascalCase on the wire, matching the remote entity model.

use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// A named, versioned remote registration of an uploaded plugin bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppPackage {
    pub id: String,
    pub required_engine_version: String,
    /// URL of the uploaded bundle content. Must only ever point at content
    /// confirmed uploaded; see [`UploadedBundle`].
    pub resource: String,
}

impl AppPackage {
    /// Constructs the package entity from a confirmed upload. Taking
    /// [`UploadedBundle`] by value keeps unconfirmed URLs out of the entity.
    pub fn registered(settings: &Settings, uploaded: UploadedBundle) -> Self {
        AppPackage {
            id: settings.package_name.clone(),
            required_engine_version: settings.required_engine_version.clone(),
            resource: uploaded.url,
        }
    }
}

/// Proof that bundle content was uploaded successfully. Produced only by the
/// upload call after a success response, and consumed by package
/// registration.
#[derive(Debug, Clone)]
pub struct UploadedBundle {
    pub url: String,
}

/// A named remote task definition referencing an app package, a script and a
/// fixed input/output parameter contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Activity {
    pub id: String,
    pub instruction: Instruction,
    pub parameters: Parameters,
    pub required_engine_version: String,
    pub app_packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instruction {
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameters {
    pub input_parameters: Vec<Parameter>,
    pub output_parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub name: String,
    pub local_file_name: String,
}

impl Activity {
    /// The fixed DWG-query activity definition: host drawing and parameter
    /// file in, results file out, associated with the one app package.
    pub fn definition(settings: &Settings) -> Self {
        Activity {
            id: settings.activity_name.clone(),
            instruction: Instruction {
                script: settings.script.clone(),
            },
            parameters: Parameters {
                input_parameters: vec![
                    Parameter {
                        name: "HostDwg".to_string(),
                        local_file_name: "$(HostDwg)".to_string(),
                    },
                    Parameter {
                        name: "Params".to_string(),
                        local_file_name: "params.json".to_string(),
                    },
                ],
                output_parameters: vec![Parameter {
                    name: "Results".to_string(),
                    local_file_name: "results.json".to_string(),
                }],
            },
            required_engine_version: settings.required_engine_version.clone(),
            app_packages: vec![settings.package_name.clone()],
        }
    }
}
