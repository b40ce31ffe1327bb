pub mod auth;
pub mod bundle;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod prompt;
pub mod provision;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::bundle::AutoloaderBundle;
use crate::client::DesignAutomationClient;
use crate::config::{Credentials, Settings};
use crate::prompt::ConsolePrompter;
use crate::provision::provision;

/// CLI for dwg-provision: register the DWG query app package and activity.
#[derive(Parser)]
#[clap(
    name = "dwg-provision",
    version,
    about = "Provision the Design Automation app package and activity for remote DWG query jobs"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate, upload the plugin bundle and register both resources
    Provision {
        /// Override the remote API base URL
        #[clap(long)]
        base_url: Option<String>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Provision { base_url } => {
            let settings = match base_url {
                Some(url) => Settings::new(url),
                None => Settings::default(),
            };
            let credentials = Credentials::from_env()?;

            let token = auth::acquire_token(
                &client::http_client()?,
                &settings.base_url,
                &credentials.client_id,
                &credentials.client_secret,
            )
            .await?;

            let api = DesignAutomationClient::new(&settings.base_url, &token)?;
            let builder = AutoloaderBundle::from_executable_dir(
                settings.package_name.clone(),
                settings.archive_path.clone(),
            )?;
            let prompter = ConsolePrompter;

            println!("Provisioning starting...");
            let report = provision(&api, &builder, &prompter, &settings).await?;
            println!("Provisioning complete.\nReport:");
            println!("{report:#?}");
            Ok(())
        }
    }
}
