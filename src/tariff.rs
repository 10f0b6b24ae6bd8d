//! The tariff: the pricing tables quotes are computed from.
//!
//! A tariff is immutable configuration handed to the simulator when it is created. The built-in
//! tariff can be overridden, in whole or in part, by a `tariff.toml` file.
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml, with_header};
use crate::simulator::{FamilyStatus, Pathology};
use crate::tier::TierThresholds;
use crate::units::{Income, Money};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::IntoEnumIterator;

/// The file name conventionally used for tariff files
pub const TARIFF_FILE_NAME: &str = "tariff.toml";

const DEFAULT_TARIFF_FILE_HEADER: &str = "# This file contains the Solenna tariff.
# Any section left out takes its built-in value.
";

/// The range of monthly incomes which can be quoted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncomeLimits {
    /// The lowest income accepted
    pub min: Money,
    /// The highest income accepted
    pub max: Money,
}

impl Default for IncomeLimits {
    fn default() -> Self {
        Self {
            min: Money(500),
            max: Money(15000),
        }
    }
}

impl IncomeLimits {
    /// Whether `income` lies within the limits (inclusive)
    pub fn contains(&self, income: Income) -> bool {
        (self.min..=self.max).contains(&income)
    }
}

/// A step of the base premium scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncomeBracket {
    /// Incomes strictly below this fall in the bracket. The last bracket is open-ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<Money>,
    /// The monthly base premium for the bracket
    pub base_premium: Money,
}

/// The wording of the items listed as covered by a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageWording {
    /// Items included in every quote
    pub base: Vec<String>,
    /// Item added when a chronic pathology is selected
    pub chronic: String,
    /// Item added when a partner or children are covered
    pub family: String,
}

impl Default for CoverageWording {
    fn default() -> Self {
        Self {
            base: vec![
                "Comprehensive cover (GP, dental, optical)".to_string(),
                "24/7 teleconsultation included".to_string(),
                "Direct billing with partner practitioners".to_string(),
            ],
            chronic: "Specialised chronic pathology pack".to_string(),
            family: "Family cover included".to_string(),
        }
    }
}

/// The pricing tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tariff {
    /// Flat monthly surcharge for the chronic pathology pack
    pub chronic_supplement: Money,
    /// The incomes which can be quoted
    pub income_limits: IncomeLimits,
    /// The incomes at which the recommended tier changes
    pub tier_thresholds: TierThresholds,
    /// Flat monthly supplement per household type
    pub family_supplements: IndexMap<FamilyStatus, Money>,
    /// Illustrative annual coverage ceiling per pathology
    pub coverage_ceilings: IndexMap<Pathology, Money>,
    /// Wording of the coverage items
    pub coverage_wording: CoverageWording,
    /// The base premium scale, in increasing order of income
    pub income_brackets: Vec<IncomeBracket>,
}

impl Default for Tariff {
    fn default() -> Self {
        let bracket = |below: Option<i64>, base_premium: i64| IncomeBracket {
            below: below.map(Money),
            base_premium: Money(base_premium),
        };

        Self {
            chronic_supplement: Money(25),
            income_limits: IncomeLimits::default(),
            tier_thresholds: TierThresholds::default(),
            family_supplements: IndexMap::from([
                (FamilyStatus::Single, Money(0)),
                (FamilyStatus::Couple, Money(40)),
                (FamilyStatus::Family, Money(65)),
            ]),
            coverage_ceilings: IndexMap::from([
                (Pathology::Endometriosis, Money(15000)),
                (Pathology::Cardiovascular, Money(12000)),
                (Pathology::Diabetes, Money(8000)),
                (Pathology::Cancer, Money(20000)),
                (Pathology::MentalHealth, Money(6000)),
                (Pathology::Other, Money(10000)),
            ]),
            coverage_wording: CoverageWording::default(),
            income_brackets: vec![
                bracket(Some(1500), 60),
                bracket(Some(3000), 95),
                bracket(Some(5000), 130),
                bracket(None, 165),
            ],
        }
    }
}

/// Check that the income brackets form a well-ordered scale ending in an open bracket
fn check_income_brackets(brackets: &[IncomeBracket]) -> Result<()> {
    let Some((last, rest)) = brackets.split_last() else {
        bail!("`income_brackets` is empty");
    };

    ensure!(
        last.below.is_none(),
        "The last income bracket must not have an upper bound"
    );
    ensure!(
        rest.iter().all(|b| b.below.is_some()),
        "Only the last income bracket may be open-ended"
    );
    ensure!(
        is_sorted_and_unique(rest.iter().map(|b| b.below)),
        "Income bracket bounds must be strictly increasing"
    );
    ensure!(
        brackets.iter().all(|b| b.base_premium >= Money::ZERO),
        "Base premiums cannot be negative"
    );

    Ok(())
}

/// Check that every household type has a non-negative supplement
fn check_family_supplements(supplements: &IndexMap<FamilyStatus, Money>) -> Result<()> {
    for status in FamilyStatus::iter() {
        let supplement = supplements
            .get(&status)
            .with_context(|| format!("Missing family supplement for {status}"))?;
        ensure!(
            *supplement >= Money::ZERO,
            "Family supplement for {status} cannot be negative"
        );
    }

    Ok(())
}

/// Check the coverage ceilings, warning about chronic pathologies without one
fn check_coverage_ceilings(ceilings: &IndexMap<Pathology, Money>) -> Result<()> {
    ensure!(
        !ceilings.contains_key(&Pathology::None),
        "A coverage ceiling cannot be given for pathology `none`"
    );
    ensure!(
        ceilings.values().all(|ceiling| *ceiling >= Money::ZERO),
        "Coverage ceilings cannot be negative"
    );

    for pathology in Pathology::iter().filter(|p| p.is_chronic()) {
        if !ceilings.contains_key(&pathology) {
            warn!("No coverage ceiling given for {pathology}; savings will be shown as zero");
        }
    }

    Ok(())
}

impl Tariff {
    /// Read a tariff file.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the TOML file
    ///
    /// # Returns
    ///
    /// The tariff, with missing sections taking their built-in values, or an error if the file
    /// cannot be read or describes an invalid tariff.
    pub fn from_path(file_path: &Path) -> Result<Tariff> {
        let tariff: Tariff = read_toml(file_path)?;
        tariff
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(tariff)
    }

    /// Read the tariff file at `file_path` if given, otherwise use the built-in tariff
    pub fn load(file_path: Option<&Path>) -> Result<Tariff> {
        file_path.map_or_else(|| Ok(Tariff::default()), Tariff::from_path)
    }

    /// Check that the tariff is consistent
    pub fn validate(&self) -> Result<()> {
        check_income_brackets(&self.income_brackets)?;
        check_family_supplements(&self.family_supplements)?;
        check_coverage_ceilings(&self.coverage_ceilings)?;

        ensure!(
            self.chronic_supplement >= Money::ZERO,
            "chronic_supplement cannot be negative"
        );
        ensure!(
            self.income_limits.min <= self.income_limits.max,
            "income_limits.min cannot exceed income_limits.max"
        );
        ensure!(
            self.tier_thresholds.essential_below < self.tier_thresholds.premium_from,
            "tier_thresholds.essential_below must be less than tier_thresholds.premium_from"
        );

        Ok(())
    }

    /// The monthly base premium for an income
    pub fn base_premium(&self, income: Income) -> Money {
        self.income_brackets
            .iter()
            .find(|bracket| bracket.below.is_none_or(|below| income < below))
            .or(self.income_brackets.last())
            .map_or(Money::ZERO, |bracket| bracket.base_premium)
    }

    /// The monthly supplement for a household type
    pub fn family_supplement(&self, status: FamilyStatus) -> Money {
        self.family_supplements
            .get(&status)
            .copied()
            .unwrap_or(Money::ZERO)
    }

    /// The annual coverage ceiling for a pathology (zero for none, or if not configured)
    pub fn coverage_ceiling(&self, pathology: Pathology) -> Money {
        if !pathology.is_chronic() {
            return Money::ZERO;
        }

        self.coverage_ceilings
            .get(&pathology)
            .copied()
            .unwrap_or(Money::ZERO)
    }

    /// The contents of a tariff file describing the built-in tariff
    pub fn default_file_contents() -> String {
        let body =
            toml::to_string(&Tariff::default()).expect("Could not convert tariff to TOML");
        with_header(DEFAULT_TARIFF_FILE_HEADER, &body)
    }
}
