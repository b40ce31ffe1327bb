//! Autoloader bundle assembly.
//!
//! The bundle is a zip archive with a fixed three-entry manifest laid out
//! under `<PackageName>.bundle/`. The native plugin artifact must already be
//! built; its absence is a precondition failure of the run, reported
//! distinctly from packaging I/O errors.

use std::fs::File;
use std::path::{Path, PathBuf};

use mockall::automock;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::ProvisionError;

const PACKAGE_CONTENTS: &str = "PackageContents.xml";
const PLUGIN_ARTIFACT: &str = "ArxApp.dll";
const JSON_DEPENDENCY: &str = "Newtonsoft.Json.dll";

/// Seam for bundle assembly so the upsert state machine can be exercised
/// without touching the filesystem.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait BundleBuilder: Send + Sync {
    /// Assemble the bundle archive, returning its path.
    fn build(&self) -> Result<PathBuf, ProvisionError>;
}

/// Builds the autoloader bundle from a fixed manifest:
///
/// | source (dir)                    | archive path                              |
/// |---------------------------------|-------------------------------------------|
/// | `PackageContents.xml` (plugin)  | `<pkg>.bundle/PackageContents.xml`        |
/// | `ArxApp.dll` (plugin)           | `<pkg>.bundle/Contents/ArxApp.dll`        |
/// | `Newtonsoft.Json.dll` (dep dir) | `<pkg>.bundle/Contents/Newtonsoft.Json.dll` |
pub struct AutoloaderBundle {
    package_name: String,
    /// Directory holding the plugin build outputs; the executable's own
    /// directory in production.
    plugin_dir: PathBuf,
    /// Directory holding the JSON dependency artifact; the working directory
    /// in production.
    dependency_dir: PathBuf,
    archive_path: PathBuf,
}

impl AutoloaderBundle {
    pub fn new(
        package_name: impl Into<String>,
        plugin_dir: impl Into<PathBuf>,
        dependency_dir: impl Into<PathBuf>,
        archive_path: impl Into<PathBuf>,
    ) -> Self {
        AutoloaderBundle {
            package_name: package_name.into(),
            plugin_dir: plugin_dir.into(),
            dependency_dir: dependency_dir.into(),
            archive_path: archive_path.into(),
        }
    }

    /// Production wiring: plugin artifacts next to the running executable,
    /// dependency artifact and output archive in the working directory.
    pub fn from_executable_dir(
        package_name: impl Into<String>,
        archive_path: impl Into<PathBuf>,
    ) -> Result<Self, ProvisionError> {
        let exe = std::env::current_exe()
            .map_err(|e| ProvisionError::Packaging(format!("cannot locate executable: {e}")))?;
        let plugin_dir = exe
            .parent()
            .ok_or_else(|| {
                ProvisionError::Packaging("executable path has no parent directory".into())
            })?
            .to_path_buf();
        Ok(AutoloaderBundle::new(
            package_name,
            plugin_dir,
            PathBuf::from("."),
            archive_path,
        ))
    }

    /// The fixed `(source path, archive path)` manifest.
    fn manifest(&self) -> Vec<(PathBuf, String)> {
        let bundle_dir = format!("{}.bundle", self.package_name);
        vec![
            (
                self.plugin_dir.join(PACKAGE_CONTENTS),
                format!("{bundle_dir}/{PACKAGE_CONTENTS}"),
            ),
            (
                self.plugin_dir.join(PLUGIN_ARTIFACT),
                format!("{bundle_dir}/Contents/{PLUGIN_ARTIFACT}"),
            ),
            (
                self.dependency_dir.join(JSON_DEPENDENCY),
                format!("{bundle_dir}/Contents/{JSON_DEPENDENCY}"),
            ),
        ]
    }
}

impl BundleBuilder for AutoloaderBundle {
    fn build(&self) -> Result<PathBuf, ProvisionError> {
        // Preconditions first: nothing is written until every source exists.
        let plugin_artifact = self.plugin_dir.join(PLUGIN_ARTIFACT);
        if !plugin_artifact.exists() {
            return Err(ProvisionError::Precondition {
                resource: self.package_name.clone(),
                path: plugin_artifact,
            });
        }
        let manifest = self.manifest();
        for (source, _) in &manifest {
            if !source.exists() {
                return Err(ProvisionError::Packaging(format!(
                    "bundle source missing: {}",
                    source.display()
                )));
            }
        }

        if self.archive_path.exists() {
            std::fs::remove_file(&self.archive_path).map_err(|e| {
                ProvisionError::Packaging(format!(
                    "cannot replace existing archive {}: {e}",
                    self.archive_path.display()
                ))
            })?;
        }

        info!(archive = %self.archive_path.display(), "Generating autoloader bundle archive");
        let file = File::create(&self.archive_path)
            .map_err(|e| ProvisionError::Packaging(format!("cannot create archive: {e}")))?;
        let mut archive = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (source, entry_name) in &manifest {
            archive
                .start_file(entry_name.clone(), options)
                .map_err(|e| ProvisionError::Packaging(format!("zip write error: {e}")))?;
            let mut src = File::open(source)
                .map_err(|e| ProvisionError::Packaging(format!("cannot read bundle source: {e}")))?;
            std::io::copy(&mut src, &mut archive)
                .map_err(|e| ProvisionError::Packaging(format!("zip write error: {e}")))?;
        }
        archive
            .finish()
            .map_err(|e| ProvisionError::Packaging(format!("zip finalise error: {e}")))?;

        info!(archive = %self.archive_path.display(), "Bundle archive created");
        Ok(self.archive_path.clone())
    }
}
