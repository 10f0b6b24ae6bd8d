//! The module responsible for writing the premium grid to disk.
use crate::simulator::{FamilyStatus, Pathology, SimulatorInput, calculate};
use crate::tariff::Tariff;
use crate::tier::{Tier, recommended_tier};
use crate::units::{Income, Money};
use anyhow::{Context, Result};
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::Path;
use strum::IntoEnumIterator;

/// The file name conventionally used for the premium grid
pub const PREMIUM_GRID_FILE_NAME: &str = "premium_grid.csv";

/// One quote in the premium grid
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PremiumGridRow {
    income: Income,
    family_status: FamilyStatus,
    pathology: Pathology,
    tier: Tier,
    base_premium: Money,
    family_supplement: Money,
    pathology_supplement: Money,
    total_monthly_premium: Money,
    annual_premium: Money,
    coverage_ceiling: Money,
    net_annual_savings: Money,
}

impl PremiumGridRow {
    fn new(tariff: &Tariff, input: &SimulatorInput) -> Self {
        let result = calculate(tariff, input);
        Self {
            income: input.income,
            family_status: input.family_status,
            pathology: input.pathology,
            tier: recommended_tier(&tariff.tier_thresholds, input.income),
            base_premium: result.base_premium,
            family_supplement: result.family_supplement,
            pathology_supplement: result.pathology_supplement,
            total_monthly_premium: result.total_monthly_premium,
            annual_premium: result.annual_premium,
            coverage_ceiling: result.potential_annual_savings,
            net_annual_savings: result.net_annual_savings(),
        }
    }
}

/// The lowest quotable income in each of the tariff's income brackets.
///
/// Brackets lying wholly outside the tariff's income limits are skipped.
pub fn bracket_incomes(tariff: &Tariff) -> Vec<Money> {
    let limits = &tariff.income_limits;
    let mut lower = limits.min;
    let mut incomes = Vec::new();
    for bracket in &tariff.income_brackets {
        if bracket.below.is_none_or(|below| below > lower) && limits.contains(lower.into()) {
            incomes.push(lower);
        }
        if let Some(below) = bracket.below {
            lower = lower.max(below);
        }
    }

    incomes
}

/// Create the parent directory for `file_path`, if it doesn't exist
fn create_parent_directory(file_path: &Path) -> Result<()> {
    let Some(dir) = file_path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// An object for writing the premium grid to a CSV file
pub struct GridWriter {
    writer: csv::Writer<File>,
}

impl GridWriter {
    /// Open a CSV file to write the grid to, creating its directory if needed
    pub fn create(file_path: &Path) -> Result<Self> {
        create_parent_directory(file_path)?;
        let writer = csv::Writer::from_path(file_path)
            .with_context(|| format!("Could not create file: {}", file_path.display()))?;

        Ok(Self { writer })
    }

    /// Write a quote for every combination of income bracket, household and pathology.
    ///
    /// # Returns
    ///
    /// The number of rows written
    pub fn write_grid(&mut self, tariff: &Tariff) -> Result<usize> {
        let mut count = 0;
        for (income, family_status, pathology) in iproduct!(
            bracket_incomes(tariff),
            FamilyStatus::iter(),
            Pathology::iter()
        ) {
            let input = SimulatorInput {
                income: income.into(),
                family_status,
                pathology,
            };
            self.writer.serialize(PremiumGridRow::new(tariff, &input))?;
            count += 1;
        }

        Ok(count)
    }

    /// Flush the underlying stream
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;

        Ok(())
    }
}

/// Write the premium grid for `tariff` to `file_path`
pub fn write_premium_grid(tariff: &Tariff, file_path: &Path) -> Result<usize> {
    let mut writer = GridWriter::create(file_path)?;
    let count = writer.write_grid(tariff)?;
    writer.flush()?;

    Ok(count)
}
