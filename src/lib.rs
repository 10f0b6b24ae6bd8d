//! Premium simulator for the Solenna health-insurance offer.
//!
//! The heart of the crate is the [`simulator::Simulator`] engine, which holds a user's answers
//! (monthly income, household and chronic pathology), validates them and derives a premium quote
//! from a [`tariff::Tariff`]. The rest of the crate provides configuration, storage, logging and
//! a command-line front end around it.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod input;
pub mod log;
pub mod output;
pub mod settings;
pub mod simulator;
pub mod store;
pub mod tariff;
pub mod tier;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory where Solenna's configuration and session files live.
///
/// Falls back to the current directory if the platform has no configuration directory.
pub fn get_solenna_config_dir() -> PathBuf {
    let Some(mut dir) = dirs::config_dir() else {
        return PathBuf::from(".solenna");
    };
    dir.push("solenna");

    dir
}
