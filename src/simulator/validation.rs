//! Validation of the simulator's answers.
use super::{FamilyStatus, Field, FieldValue, Pathology, SimulatorInput};
use crate::tariff::Tariff;
use crate::units::{Income, Money};
use indexmap::IndexMap;
use std::str::FromStr;
use strum::IntoEnumIterator;
use thiserror::Error;

/// Validation errors for the current answers, keyed by field
pub type ErrorSet = IndexMap<Field, ValidationError>;

/// Why the income lies outside the accepted range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeViolation {
    /// Below the minimum, which is given
    #[error("Income must be at least {0}/month")]
    BelowMinimum(Money),
    /// Above the maximum, which is given
    #[error("Income cannot exceed {0}/month")]
    AboveMaximum(Money),
}

/// A problem with one of the simulator's answers.
///
/// These are reported through the simulator's error set rather than returned as failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A numeric answer lies outside its accepted range
    #[error(transparent)]
    OutOfRange(#[from] RangeViolation),
    /// Text given for a numeric answer which is not a number
    #[error("Income must be a number: {value}")]
    NotANumber {
        /// The rejected text
        value: String,
    },
    /// A value which is not one of the field's allowed values
    #[error("Invalid {}: {value}", .field.description())]
    InvalidEnum {
        /// The field the value was given for
        field: Field,
        /// The rejected value
        value: String,
    },
}

impl Field {
    /// How the field is named in messages
    pub fn description(self) -> &'static str {
        match self {
            Field::Income => "monthly income",
            Field::FamilyStatus => "family status",
            Field::Pathology => "pathology",
        }
    }
}

/// Check that an income lies within the tariff's accepted range
fn check_income(tariff: &Tariff, income: Income) -> Result<(), RangeViolation> {
    let limits = &tariff.income_limits;
    if income < limits.min {
        return Err(RangeViolation::BelowMinimum(limits.min));
    }
    if income > limits.max {
        return Err(RangeViolation::AboveMaximum(limits.max));
    }

    Ok(())
}

/// Validate a single field of `input`.
///
/// The enumerated fields are typed, so a stored value is always one of the allowed values;
/// textual values are checked when they are parsed (see [`parse_field_value`]).
pub fn validate_field(
    tariff: &Tariff,
    input: &SimulatorInput,
    field: Field,
) -> Option<ValidationError> {
    match field {
        Field::Income => check_income(tariff, input.income).err().map(Into::into),
        Field::FamilyStatus | Field::Pathology => None,
    }
}

/// Validate every field of `input`
pub fn validate_all(tariff: &Tariff, input: &SimulatorInput) -> ErrorSet {
    Field::iter()
        .filter_map(|field| Some((field, validate_field(tariff, input, field)?)))
        .collect()
}

/// Parse the textual form of a value for `field`.
///
/// Incomes may be given with a fractional part (e.g. `2500.50`) and are rounded to the cent.
/// Whether the value lies in range is left to [`validate_field`].
pub fn parse_field_value(field: Field, raw: &str) -> Result<FieldValue, ValidationError> {
    let raw = raw.trim();
    let invalid_enum = || ValidationError::InvalidEnum {
        field,
        value: raw.to_string(),
    };

    match field {
        Field::Income => raw
            .parse()
            .ok()
            .and_then(Income::from_decimal)
            .map(FieldValue::Income)
            .ok_or_else(|| ValidationError::NotANumber {
                value: raw.to_string(),
            }),
        Field::FamilyStatus => FamilyStatus::from_str(raw)
            .map(FieldValue::FamilyStatus)
            .map_err(|_| invalid_enum()),
        Field::Pathology => Pathology::from_str(raw)
            .map(FieldValue::Pathology)
            .map_err(|_| invalid_enum()),
    }
}
