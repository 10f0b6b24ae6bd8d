//! The pricing tiers offered and the recommendation of a tier from income.
use crate::units::{Income, Money};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A named pricing plan
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Tier {
    /// Entry-level cover
    Essential,
    /// The standard plan
    Comfort,
    /// Full cover
    Premium,
}

impl Tier {
    /// The advertised monthly starting price
    pub fn base_price(self) -> Money {
        match self {
            Self::Essential => Money(60),
            Self::Comfort => Money(95),
            Self::Premium => Money(165),
        }
    }

    /// Whether the tier is highlighted as the recommended choice on the pricing page
    pub fn is_highlighted(self) -> bool {
        self == Self::Comfort
    }

    /// What the tier includes
    pub fn features(self) -> &'static [&'static str] {
        match self {
            Self::Essential => &[
                "Comprehensive cover (GP, dental, optical)",
                "24/7 teleconsultation",
                "Direct billing with partner practitioners",
                "Mobile app",
                "Chat with health advisers",
            ],
            Self::Comfort => &[
                "Everything in Essential",
                "One chronic pathology pack of your choice",
                "Alternative medicine (500€/year)",
                "Private hospital room",
                "Personal support",
            ],
            Self::Premium => &[
                "Everything in Comfort",
                "All pathology packs",
                "Unlimited excess fees covered",
                "Health concierge",
                "Nutrition and fitness coaching",
            ],
        }
    }
}

/// The incomes at which the recommended tier changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Incomes below this are recommended the essential tier
    pub essential_below: Money,
    /// Incomes from this upwards are recommended the premium tier
    pub premium_from: Money,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            essential_below: Money(1500),
            premium_from: Money(5000),
        }
    }
}

impl TierThresholds {
    /// The incomes `tier` is recommended for, as an inclusive lower and exclusive upper bound.
    ///
    /// `None` means the range is open at that end.
    pub fn income_range(&self, tier: Tier) -> (Option<Money>, Option<Money>) {
        match tier {
            Tier::Essential => (None, Some(self.essential_below)),
            Tier::Comfort => (Some(self.essential_below), Some(self.premium_from)),
            Tier::Premium => (Some(self.premium_from), None),
        }
    }
}

/// The tier recommended for a monthly income.
///
/// This depends on income alone, not on household or pathology.
pub fn recommended_tier(thresholds: &TierThresholds, income: Income) -> Tier {
    if income < thresholds.essential_below {
        Tier::Essential
    } else if income < thresholds.premium_from {
        Tier::Comfort
    } else {
        Tier::Premium
    }
}
