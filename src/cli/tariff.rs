//! Code related to CLI interface for tariff files
use super::{init_logging, load_settings};
use crate::settings::Settings;
use crate::tariff::Tariff;
use anyhow::{Context, Result};
use clap::Subcommand;
use log::info;
use std::path::{Path, PathBuf};

/// Subcommands for tariff files
#[derive(Subcommand)]
pub enum TariffSubcommands {
    /// Write a tariff file describing the built-in tariff to the console
    DumpDefault,
    /// Check that a tariff file can be used
    Validate {
        /// The path to the tariff file.
        file: PathBuf,
    },
}

impl TariffSubcommands {
    /// Execute the supplied tariff subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::DumpDefault => print!("{}", Tariff::default_file_contents()),
            Self::Validate { file } => handle_validate_command(&file, None)?,
        }

        Ok(())
    }
}

/// Handle the `validate` command.
pub fn handle_validate_command(file_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;
    init_logging(&settings)?;

    Tariff::from_path(file_path).context("Failed to validate tariff.")?;
    info!("Tariff validation successful!");

    Ok(())
}
