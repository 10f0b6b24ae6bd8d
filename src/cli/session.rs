//! Code related to CLI interface for the saved simulator session.
//!
//! The session's answers are kept in a [`FileStore`] in the program's configuration directory,
//! so that they carry over from one invocation to the next.
use super::{describe_quote, ensure_valid, prepare};
use crate::get_solenna_config_dir;
use crate::settings::Settings;
use crate::simulator::{Field, Simulator};
use crate::store::FileStore;
use anyhow::{Context, Result, ensure};
use clap::Subcommand;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// The name of the directory, within the configuration directory, where sessions are saved
const SESSION_DIRECTORY_NAME: &str = "session";

/// Get the directory the session is saved in
pub fn get_session_dir() -> PathBuf {
    get_solenna_config_dir().join(SESSION_DIRECTORY_NAME)
}

/// Subcommands for the saved session
#[derive(Subcommand)]
pub enum SessionSubcommands {
    /// Show the saved answers and their quote
    Show,
    /// Change one of the saved answers
    Set {
        /// The answer to change: income, familyStatus or pathology
        field: Field,
        /// The new value
        value: String,
    },
    /// Restore the default answers and erase the saved session
    Reset,
    /// Write a snapshot of the session as JSON
    Export {
        /// File to write to (the console if not given)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the session with a snapshot previously exported
    Import {
        /// The snapshot file
        file: PathBuf,
    },
}

impl SessionSubcommands {
    /// Execute the supplied session subcommand
    pub fn execute(self) -> Result<()> {
        handle_session_command(self, &get_session_dir(), None)
    }
}

/// Open the session saved in `session_dir`
fn open_session(session_dir: &Path, settings: Option<Settings>) -> Result<Simulator<FileStore>> {
    let (settings, tariff) = prepare(settings, None)?;
    let mut options = settings.simulator_options();
    if !options.persist_state {
        info!("Saving the session even though persist_state is disabled in the settings");
        options.persist_state = true;
    }

    let store = FileStore::new(session_dir);
    Ok(Simulator::new(tariff, store, options))
}

/// Handle a session subcommand, using the session saved in `session_dir`
pub fn handle_session_command(
    subcommand: SessionSubcommands,
    session_dir: &Path,
    settings: Option<Settings>,
) -> Result<()> {
    let mut simulator = open_session(session_dir, settings)?;

    match subcommand {
        SessionSubcommands::Show => {
            simulator.flush();
            print!("{}", describe_quote(&simulator));
        }
        SessionSubcommands::Set { field, value } => {
            simulator.update_field_str(field, &value);
            ensure_valid(&simulator)?;
            simulator.flush();
            print!("{}", describe_quote(&simulator));
        }
        SessionSubcommands::Reset => {
            simulator.reset();
            info!("Session reset");
        }
        SessionSubcommands::Export { output } => {
            simulator.flush();
            let snapshot = simulator.export_snapshot();
            match output {
                Some(path) => fs::write(&path, snapshot)
                    .with_context(|| format!("Could not write file: {}", path.display()))?,
                None => println!("{snapshot}"),
            }
        }
        SessionSubcommands::Import { file } => {
            let serialised = fs::read_to_string(&file)
                .with_context(|| format!("Could not read file: {}", file.display()))?;
            ensure!(
                simulator.import_snapshot(&serialised),
                "Invalid snapshot file: {}",
                file.display()
            );
            simulator.flush();
            print!("{}", describe_quote(&simulator));
        }
    }

    Ok(())
}
