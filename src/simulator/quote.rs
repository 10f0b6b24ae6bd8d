//! Derivation of a premium quote from the simulator's answers.
use super::{FamilyStatus, Pathology, SimulatorInput};
use crate::tariff::Tariff;
use crate::units::{Income, Money};
use serde::{Deserialize, Serialize};

/// A premium quote derived from one set of answers.
///
/// Quotes are never edited or merged: new answers produce a new quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorResult {
    /// Monthly premium for the income bracket alone
    pub base_premium: Money,
    /// Monthly supplement for the household covered
    pub family_supplement: Money,
    /// Monthly supplement for the chronic pathology pack
    pub pathology_supplement: Money,
    /// Sum of the base premium and supplements
    pub total_monthly_premium: Money,
    /// Twelve times the total monthly premium
    pub annual_premium: Money,
    /// The annual coverage ceiling for the selected pathology (zero if none is selected).
    ///
    /// This is the gross figure: the premium paid is not deducted.
    pub potential_annual_savings: Money,
    /// What the quote covers, in display order
    pub coverage_description: Vec<String>,
}

impl SimulatorResult {
    /// The coverage ceiling net of the annual premium, floored at zero
    pub fn net_annual_savings(&self) -> Money {
        self.potential_annual_savings
            .saturating_sub_floor(self.annual_premium)
    }
}

/// Compute a quote for `input`.
///
/// This is a pure function of the tariff and the answers; it does not check that the answers
/// are valid.
pub fn calculate(tariff: &Tariff, input: &SimulatorInput) -> SimulatorResult {
    let base_premium = tariff.base_premium(input.income);
    let family_supplement = tariff.family_supplement(input.family_status);
    let pathology_supplement = if input.has_chronic_condition() {
        tariff.chronic_supplement
    } else {
        Money::ZERO
    };

    let total_monthly_premium = base_premium + family_supplement + pathology_supplement;

    SimulatorResult {
        base_premium,
        family_supplement,
        pathology_supplement,
        total_monthly_premium,
        annual_premium: total_monthly_premium.annualised(),
        potential_annual_savings: tariff.coverage_ceiling(input.pathology),
        coverage_description: coverage_description(tariff, input),
    }
}

/// Assemble the list of what a quote covers
fn coverage_description(tariff: &Tariff, input: &SimulatorInput) -> Vec<String> {
    let wording = &tariff.coverage_wording;
    let mut items = wording.base.clone();
    if input.has_chronic_condition() {
        items.push(wording.chronic.clone());
    }
    if input.family_status != FamilyStatus::Single {
        items.push(wording.family.clone());
    }

    items
}

/// The savings a policyholder with a chronic pathology can expect, ignoring family supplements
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsBreakdown {
    /// Monthly premium for the income bracket, including the chronic pathology pack
    pub monthly_premium: Money,
    /// Twelve times the monthly premium
    pub annual_premium: Money,
    /// The annual coverage ceiling for the pathology
    pub potential_savings: Money,
    /// The coverage ceiling net of the annual premium, floored at zero
    pub net_savings: Money,
    /// Net savings as a percentage of the ceiling (zero if there is no ceiling).
    ///
    /// Unlike `net_savings` this is not floored, so it is negative when the premium exceeds
    /// the ceiling.
    pub savings_ratio: f64,
}

/// Compute the savings breakdown for a pathology at the given income
#[allow(clippy::cast_precision_loss)]
pub fn savings_breakdown(
    tariff: &Tariff,
    pathology: Pathology,
    income: Income,
) -> SavingsBreakdown {
    let monthly_premium = tariff.base_premium(income) + tariff.chronic_supplement;
    let annual_premium = monthly_premium.annualised();
    let potential_savings = tariff.coverage_ceiling(pathology);
    let difference = potential_savings - annual_premium;
    let savings_ratio = if potential_savings > Money::ZERO {
        difference.value() as f64 / potential_savings.value() as f64 * 100.0
    } else {
        0.0
    };

    SavingsBreakdown {
        monthly_premium,
        annual_premium,
        potential_savings,
        net_savings: difference.max(Money::ZERO),
        savings_ratio,
    }
}
