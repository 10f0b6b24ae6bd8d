//! The premium simulator: the user's answers, validation of those answers and the stateful
//! engine which derives a quote from them.
use crate::store::{KeyValueStore, MemoryStore, Persistence};
use crate::tariff::Tariff;
use crate::tier::{Tier, recommended_tier};
use crate::units::{Income, Millis, Money};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub mod quote;
pub use quote::{SimulatorResult, calculate};
pub mod schedule;
use schedule::{Clock, Scheduler, Step, SystemClock};
pub mod snapshot;
use snapshot::Snapshot;
pub mod validation;
pub use validation::{ErrorSet, ValidationError, parse_field_value, validate_field};

/// The household covered by the policy
#[derive(
    Debug,
    Default,
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
pub enum FamilyStatus {
    /// The policyholder alone
    #[default]
    Single,
    /// The policyholder and a partner
    Couple,
    /// The policyholder, a partner and children
    Family,
}

/// A chronic condition the policyholder wants specialised cover for
#[derive(
    Debug,
    Default,
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
pub enum Pathology {
    /// No chronic condition
    #[default]
    None,
    /// Endometriosis
    Endometriosis,
    /// Cardiovascular disease
    Cardiovascular,
    /// Diabetes
    Diabetes,
    /// Cancer
    Cancer,
    /// A long-term mental health condition
    MentalHealth,
    /// Any other chronic condition
    Other,
}

impl Pathology {
    /// Whether this is a chronic pathology, i.e. anything other than [`Pathology::None`]
    pub fn is_chronic(self) -> bool {
        self != Pathology::None
    }
}

/// The answers given to the simulator.
///
/// Whether the user has a chronic condition is not stored: it is always derived from
/// `pathology`, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "InputRecord", from = "InputRecord")]
pub struct SimulatorInput {
    /// Monthly income in euros
    pub income: Income,
    /// Household covered
    pub family_status: FamilyStatus,
    /// Chronic pathology, if any
    pub pathology: Pathology,
}

/// The income a fresh session starts with
pub const DEFAULT_INCOME: Income = Income::euros(2500);

impl Default for SimulatorInput {
    fn default() -> Self {
        Self {
            income: DEFAULT_INCOME,
            family_status: FamilyStatus::Single,
            pathology: Pathology::None,
        }
    }
}

impl SimulatorInput {
    /// Whether a chronic pathology has been selected
    pub fn has_chronic_condition(&self) -> bool {
        self.pathology.is_chronic()
    }

    /// Replace a single field
    pub fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::Income(income) => self.income = income,
            FieldValue::FamilyStatus(status) => self.family_status = status,
            FieldValue::Pathology(pathology) => self.pathology = pathology,
        }
    }

    /// Merge saved answers over the defaults, one field at a time.
    ///
    /// Unknown keys are ignored. A field whose saved value cannot be read keeps its default, so
    /// one bad value does not lose the others.
    pub fn merge_saved(saved: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut input = Self::default();
        for field in Field::iter() {
            let Some(value) = saved.get(&field.to_string()) else {
                continue;
            };

            match FieldValue::from_json(field, value) {
                Ok(value) => input.set(value),
                Err(err) => warn!("Ignoring saved {}: {err}", field.description()),
            }
        }

        input
    }
}

/// The serialised shape of [`SimulatorInput`].
///
/// Missing fields take their default values and unknown fields are ignored. The derived
/// `hasChronicCondition` flag is written out for readers of the stored data but is ignored on
/// the way in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InputRecord {
    income: Income,
    family_status: FamilyStatus,
    pathology: Pathology,
    has_chronic_condition: bool,
}

impl Default for InputRecord {
    fn default() -> Self {
        SimulatorInput::default().into()
    }
}

impl From<SimulatorInput> for InputRecord {
    fn from(input: SimulatorInput) -> Self {
        Self {
            income: input.income,
            family_status: input.family_status,
            pathology: input.pathology,
            has_chronic_condition: input.has_chronic_condition(),
        }
    }
}

impl From<InputRecord> for SimulatorInput {
    fn from(record: InputRecord) -> Self {
        Self {
            income: record.income,
            family_status: record.family_status,
            pathology: record.pathology,
        }
    }
}

/// The fields of [`SimulatorInput`] that can be edited
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Field {
    /// Monthly income, also accepted as `monthlyIncome`
    #[strum(to_string = "income", serialize = "monthlyIncome")]
    Income,
    /// Household covered
    FamilyStatus,
    /// Chronic pathology
    Pathology,
}

/// A new value for one field of [`SimulatorInput`], carrying the field's own type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// A new monthly income
    Income(Income),
    /// A new household
    FamilyStatus(FamilyStatus),
    /// A new chronic pathology, which also decides whether there is a chronic condition
    Pathology(Pathology),
}

impl FieldValue {
    /// Read a value for `field` from its JSON form
    pub fn from_json(field: Field, value: &serde_json::Value) -> serde_json::Result<Self> {
        Ok(match field {
            Field::Income => Self::Income(Income::deserialize(value)?),
            Field::FamilyStatus => Self::FamilyStatus(FamilyStatus::deserialize(value)?),
            Field::Pathology => Self::Pathology(Pathology::deserialize(value)?),
        })
    }

    /// The field this value belongs to
    pub fn field(&self) -> Field {
        match self {
            Self::Income(_) => Field::Income,
            Self::FamilyStatus(_) => Field::FamilyStatus,
            Self::Pathology(_) => Field::Pathology,
        }
    }
}

/// Options controlling how a [`Simulator`] schedules work and persists its state
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorOptions {
    /// Whether to recompute the quote automatically once edits have settled
    pub auto_calculate: bool,
    /// Quiet period after the last edit before the quote is recomputed
    pub debounce: Millis,
    /// Delay before a started calculation is delivered
    pub latency: Millis,
    /// Whether to save the answers to the key-value store
    pub persist_state: bool,
    /// The key the answers are stored under
    pub storage_key: String,
}

/// The key answers are stored under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "solena-simulator";

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            auto_calculate: true,
            debounce: Millis(300),
            latency: Millis(300),
            persist_state: true,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// The premium simulator engine.
///
/// Owns the current answers, the validation errors for them and the most recent quote. Edits
/// are serialised by the caller; the quote is recomputed once edits have settled, which the
/// caller drives by calling [`Simulator::poll`] from its event loop.
pub struct Simulator<S: KeyValueStore = MemoryStore> {
    tariff: Tariff,
    input: SimulatorInput,
    result: Option<SimulatorResult>,
    errors: ErrorSet,
    options: SimulatorOptions,
    scheduler: Scheduler,
    clock: Box<dyn Clock>,
    persistence: Option<Persistence<S>>,
}

impl<S: KeyValueStore + fmt::Debug> fmt::Debug for Simulator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("input", &self.input)
            .field("result", &self.result)
            .field("errors", &self.errors)
            .field("options", &self.options)
            .field("scheduler", &self.scheduler)
            .field("now", &self.clock.now())
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> Simulator<S> {
    /// Create a new simulator using the system clock.
    ///
    /// If persistence is enabled, answers saved by a previous session are restored, falling
    /// back to the defaults if they cannot be read.
    pub fn new(tariff: Tariff, store: S, options: SimulatorOptions) -> Self {
        Self::with_clock(tariff, store, options, Box::new(SystemClock::new()))
    }

    /// Create a new simulator driven by the given clock
    pub fn with_clock(
        tariff: Tariff,
        store: S,
        options: SimulatorOptions,
        clock: Box<dyn Clock>,
    ) -> Self {
        let persistence = options
            .persist_state
            .then(|| Persistence::new(store, &options.storage_key));
        let input = persistence
            .as_ref()
            .and_then(Persistence::load)
            .unwrap_or_default();

        let mut simulator = Self {
            tariff,
            input,
            result: None,
            errors: ErrorSet::new(),
            scheduler: Scheduler::new(options.debounce, options.latency),
            options,
            clock,
            persistence,
        };
        simulator.validate_all();
        simulator.schedule();

        simulator
    }

    /// The tariff quotes are computed with
    pub fn tariff(&self) -> &Tariff {
        &self.tariff
    }

    /// The current answers
    pub fn input(&self) -> &SimulatorInput {
        &self.input
    }

    /// The most recently computed quote, if any
    pub fn result(&self) -> Option<&SimulatorResult> {
        self.result.as_ref()
    }

    /// The current validation errors, keyed by field
    pub fn errors(&self) -> &ErrorSet {
        &self.errors
    }

    /// The options the simulator was created with
    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    /// The underlying store, if persistence is enabled
    pub fn store(&self) -> Option<&S> {
        self.persistence.as_ref().map(Persistence::store)
    }

    /// Whether a calculation has been started but not yet delivered
    pub fn is_calculating(&self) -> bool {
        self.scheduler.is_calculating()
    }

    /// Whether the answers can be quoted.
    ///
    /// The income range is checked directly so that this is correct even if only a single
    /// field has been validated since the last edit.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.tariff.income_limits.contains(self.input.income)
    }

    /// Replace one field of the answers and revalidate it.
    ///
    /// The chronic-condition flag is derived from the pathology, so it changes in the same step.
    /// Any pending recomputation is rescheduled from now.
    pub fn update_field(&mut self, value: FieldValue) {
        self.input.set(value);
        let field = value.field();
        match self.validate_field(field) {
            Some(err) => self.errors.insert(field, err),
            None => self.errors.shift_remove(&field),
        };
        self.schedule();
    }

    /// Replace one field of the answers from its textual form.
    ///
    /// Text which does not describe a value of the field's type is recorded as a validation
    /// error for that field and leaves the answers unchanged.
    pub fn update_field_str(&mut self, field: Field, raw: &str) {
        match parse_field_value(field, raw) {
            Ok(value) => self.update_field(value),
            Err(err) => {
                self.errors.insert(field, err);
            }
        }
    }

    /// Validate a single field of the current answers
    pub fn validate_field(&self, field: Field) -> Option<ValidationError> {
        validate_field(&self.tariff, &self.input, field)
    }

    /// Revalidate every field, replacing the error set. Returns whether there are no errors.
    pub fn validate_all(&mut self) -> bool {
        self.errors = validation::validate_all(&self.tariff, &self.input);
        self.errors.is_empty()
    }

    /// Compute a quote for the current answers immediately and keep it as the current result
    pub fn calculate(&mut self) -> SimulatorResult {
        let result = calculate(&self.tariff, &self.input);
        self.result = Some(result.clone());
        result
    }

    /// Restore the default answers, clear the quote and errors and erase the saved answers.
    ///
    /// Pending and in-flight calculations are cancelled.
    pub fn reset(&mut self) {
        self.cancel();
        self.input = SimulatorInput::default();
        self.result = None;
        self.errors.clear();

        if let Some(persistence) = self.persistence.as_mut() {
            persistence.erase();
        }
    }

    /// Cancel any pending or in-flight calculation without touching the answers.
    ///
    /// The answers are not saved either, as that happens when edits settle.
    pub fn cancel(&mut self) {
        if self.scheduler.is_calculating() {
            debug!("Cancelling calculation in flight");
        }
        self.scheduler.cancel();
    }

    /// The tier recommended for the current income
    pub fn recommended_tier(&self) -> Tier {
        recommended_tier(&self.tariff.tier_thresholds, self.input.income)
    }

    /// The annual coverage ceiling for the selected pathology, net of the annual premium of the
    /// last computed quote.
    ///
    /// Zero if no chronic pathology is selected or no quote has been computed yet.
    pub fn estimated_savings(&self) -> Money {
        if !self.input.has_chronic_condition() {
            return Money::ZERO;
        }

        let Some(result) = self.result.as_ref() else {
            return Money::ZERO;
        };

        self.tariff
            .coverage_ceiling(self.input.pathology)
            .saturating_sub_floor(result.annual_premium)
    }

    /// Serialise the answers and the current quote
    pub fn export_snapshot(&self) -> String {
        Snapshot::new(self.input, self.result.clone()).to_json()
    }

    /// Restore answers (and a quote, if present) from a serialised snapshot.
    ///
    /// Returns `false` and leaves the simulator untouched if the snapshot is malformed.
    pub fn import_snapshot(&mut self, serialised: &str) -> bool {
        let snapshot = match Snapshot::from_json(serialised) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Ignoring snapshot: {err}");
                return false;
            }
        };

        self.input = snapshot.data;
        self.result = snapshot.result;
        self.validate_all();
        self.schedule();

        true
    }

    /// Advance the simulator to the current time, settling edits whose quiet period has elapsed
    /// and delivering calculations whose latency has elapsed.
    ///
    /// Returns whether a new quote was delivered.
    pub fn poll(&mut self) -> bool {
        let now = self.clock.now();
        let mut delivered = false;
        while let Some(step) = self.scheduler.next_step(now) {
            delivered |= self.apply_step(step);
        }

        delivered
    }

    /// Settle any pending edits and deliver any calculation immediately, ignoring the debounce
    /// and latency timers.
    ///
    /// Returns whether a new quote was delivered.
    pub fn flush(&mut self) -> bool {
        let now = self.clock.now();
        let mut delivered = false;
        while let Some(step) = self.scheduler.force_step(now) {
            delivered |= self.apply_step(step);
        }

        delivered
    }

    /// Register an edit with the scheduler
    fn schedule(&mut self) {
        let now = self.clock.now();
        self.scheduler.touch(now);
    }

    /// Act on a step produced by the scheduler. Returns whether a new quote was delivered.
    fn apply_step(&mut self, step: Step) -> bool {
        match step {
            Step::Settle { seq, at } => {
                if let Some(persistence) = self.persistence.as_mut() {
                    persistence.save(&self.input);
                }

                if self.options.auto_calculate && self.is_valid() {
                    debug!("Edits settled at {at}; starting calculation #{seq}");
                    self.scheduler.start(seq, at, self.input);
                }

                false
            }
            Step::Complete { seq, input } => {
                if !self.scheduler.is_current(seq) {
                    debug!("Discarding stale calculation #{seq}");
                    return false;
                }

                self.result = Some(calculate(&self.tariff, &input));
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{manual_clock, simulator};
    use crate::simulator::schedule::ManualClock;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_input_default() {
        let input = SimulatorInput::default();
        assert_eq!(input.income, Money(2500));
        assert_eq!(input.family_status, FamilyStatus::Single);
        assert_eq!(input.pathology, Pathology::None);
        assert!(!input.has_chronic_condition());
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(Pathology::MentalHealth.to_string(), "mentalHealth");
        assert_eq!(
            Pathology::from_str("mentalHealth").unwrap(),
            Pathology::MentalHealth
        );
        assert_eq!(FamilyStatus::from_str("couple").unwrap(), FamilyStatus::Couple);
        assert!(FamilyStatus::from_str("divorced").is_err());
        assert_eq!(Field::from_str("monthlyIncome").unwrap(), Field::Income);
        assert_eq!(Field::Income.to_string(), "income");
    }

    #[test]
    fn test_input_serialised_shape() {
        let input = SimulatorInput {
            income: Income::euros(2000),
            family_status: FamilyStatus::Couple,
            pathology: Pathology::Endometriosis,
        };
        let value = serde_json::to_value(input).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "income": 2000,
                "familyStatus": "couple",
                "pathology": "endometriosis",
                "hasChronicCondition": true
            })
        );
    }

    #[test]
    fn test_input_deserialise_merges_over_defaults() {
        let input: SimulatorInput =
            serde_json::from_str(r#"{"pathology": "cancer", "hasChronicCondition": false, "x": 1}"#)
                .unwrap();
        assert_eq!(
            input,
            SimulatorInput {
                pathology: Pathology::Cancer,
                ..SimulatorInput::default()
            }
        );

        // The stored flag is ignored in favour of the pathology
        assert!(input.has_chronic_condition());
    }

    #[rstest]
    #[case(Pathology::None, false)]
    #[case(Pathology::Endometriosis, true)]
    #[case(Pathology::Cardiovascular, true)]
    #[case(Pathology::Diabetes, true)]
    #[case(Pathology::Cancer, true)]
    #[case(Pathology::MentalHealth, true)]
    #[case(Pathology::Other, true)]
    fn test_update_pathology_sets_chronic_flag(
        mut simulator: Simulator,
        #[case] pathology: Pathology,
        #[case] chronic: bool,
    ) {
        simulator.update_field(FieldValue::Pathology(Pathology::Cancer));
        simulator.update_field(FieldValue::Pathology(pathology));
        assert_eq!(simulator.input().has_chronic_condition(), chronic);
    }

    #[rstest]
    fn test_update_field_validates_changed_field(mut simulator: Simulator) {
        simulator.update_field(FieldValue::Income(Income::euros(499)));
        assert!(matches!(
            simulator.errors().get(&Field::Income),
            Some(ValidationError::OutOfRange(_))
        ));
        assert!(!simulator.is_valid());

        // Editing another field leaves the income error in place
        simulator.update_field(FieldValue::FamilyStatus(FamilyStatus::Couple));
        assert!(simulator.errors().contains_key(&Field::Income));

        simulator.update_field(FieldValue::Income(Income::euros(500)));
        assert!(simulator.errors().is_empty());
        assert!(simulator.is_valid());
    }

    #[rstest]
    fn test_update_field_str_invalid_enum(mut simulator: Simulator) {
        simulator.update_field_str(Field::FamilyStatus, "divorced");
        assert_eq!(
            simulator.errors().get(&Field::FamilyStatus),
            Some(&ValidationError::InvalidEnum {
                field: Field::FamilyStatus,
                value: "divorced".to_string()
            })
        );
        assert_eq!(simulator.input().family_status, FamilyStatus::Single);
        assert!(!simulator.is_valid());

        // Further edits are still accepted
        simulator.update_field_str(Field::FamilyStatus, "family");
        assert_eq!(simulator.input().family_status, FamilyStatus::Family);
        assert!(simulator.is_valid());
    }

    #[rstest]
    fn test_update_field_str_decimal_income(mut simulator: Simulator) {
        simulator.update_field_str(Field::Income, "2500.50");
        assert_eq!(simulator.input().income, Income::from_decimal(2500.5).unwrap());
        assert!(simulator.errors().is_empty());
        assert!(simulator.is_valid());

        simulator.update_field_str(Field::Income, "499.99");
        assert_eq!(
            simulator.errors()[&Field::Income].to_string(),
            "Income must be at least 500€/month"
        );
    }

    #[rstest]
    fn test_update_field_str_not_a_number(mut simulator: Simulator) {
        simulator.update_field_str(Field::Income, "abc");
        assert_eq!(
            simulator.errors().get(&Field::Income),
            Some(&ValidationError::NotANumber {
                value: "abc".to_string()
            })
        );
        assert_eq!(
            simulator.errors()[&Field::Income].to_string(),
            "Income must be a number: abc"
        );
        assert_eq!(simulator.input().income, DEFAULT_INCOME);
        assert!(!simulator.is_valid());

        simulator.update_field_str(Field::Income, "3000");
        assert!(simulator.is_valid());
    }

    #[rstest]
    fn test_is_valid_checks_income_without_full_validation(mut simulator: Simulator) {
        // Bypass field validation to show that the range is still checked
        simulator.input.income = Income::euros(20000);
        assert!(simulator.errors().is_empty());
        assert!(!simulator.is_valid());
        assert!(!simulator.validate_all());
        assert!(simulator.errors().contains_key(&Field::Income));
    }

    #[rstest]
    fn test_calculate_stores_result(mut simulator: Simulator) {
        assert!(simulator.result().is_none());
        let result = simulator.calculate();
        assert_eq!(simulator.result(), Some(&result));
        assert_eq!(result, simulator.calculate());
    }

    #[rstest]
    fn test_debounce_fires_once_with_last_input(manual_clock: ManualClock) {
        let mut simulator = Simulator::with_clock(
            Tariff::default(),
            MemoryStore::default(),
            SimulatorOptions {
                latency: Millis(0),
                ..SimulatorOptions::default()
            },
            Box::new(manual_clock.clone()),
        );
        simulator.flush();
        simulator.reset();

        for (t, income) in [(0, 1200), (100, 2000), (200, 6000)] {
            manual_clock.set(Millis(t));
            simulator.update_field(FieldValue::Income(Income::euros(income)));
            assert!(!simulator.poll());
        }

        manual_clock.set(Millis(499));
        assert!(!simulator.poll());
        assert!(simulator.result().is_none());

        manual_clock.set(Millis(500));
        assert!(simulator.poll());
        assert_eq!(simulator.result().unwrap().base_premium, Money(165));

        // Nothing more fires
        manual_clock.set(Millis(5000));
        assert!(!simulator.poll());
    }

    #[rstest]
    fn test_stale_calculation_is_discarded(manual_clock: ManualClock) {
        let mut simulator = Simulator::with_clock(
            Tariff::default(),
            MemoryStore::default(),
            SimulatorOptions::default(),
            Box::new(manual_clock.clone()),
        );
        simulator.reset();

        manual_clock.set(Millis(0));
        simulator.update_field(FieldValue::Income(Income::euros(1200)));

        // Settles at 300 and the calculation is delivered at 600...
        manual_clock.set(Millis(300));
        simulator.poll();
        assert!(simulator.is_calculating());

        // ...but a newer edit arrives while it is in flight
        manual_clock.set(Millis(400));
        simulator.update_field(FieldValue::Income(Income::euros(6000)));
        manual_clock.set(Millis(600));
        assert!(!simulator.poll());
        assert!(simulator.result().is_none());

        // The newer edit settles at 700 and is delivered at 1000
        manual_clock.set(Millis(1000));
        assert!(simulator.poll());
        assert_eq!(simulator.result().unwrap().base_premium, Money(165));
        assert!(!simulator.is_calculating());
    }

    #[rstest]
    fn test_invalid_input_is_not_calculated(mut simulator: Simulator) {
        simulator.update_field(FieldValue::Income(Income::euros(100)));
        assert!(!simulator.flush());
        assert!(simulator.result().is_none());
    }

    #[test]
    fn test_auto_calculate_disabled() {
        let mut simulator: Simulator = Simulator::new(
            Tariff::default(),
            MemoryStore::default(),
            SimulatorOptions {
                auto_calculate: false,
                ..SimulatorOptions::default()
            },
        );
        assert!(!simulator.flush());
        assert!(simulator.result().is_none());
    }

    #[rstest]
    fn test_reset(mut simulator: Simulator) {
        simulator.update_field(FieldValue::Income(Income::euros(99_999)));
        simulator.update_field(FieldValue::Pathology(Pathology::Diabetes));
        simulator.update_field(FieldValue::FamilyStatus(FamilyStatus::Family));
        simulator.calculate();
        simulator.flush();
        assert!(simulator.store().unwrap().contains_key(DEFAULT_STORAGE_KEY));

        simulator.update_field(FieldValue::Income(Income::euros(3000)));
        simulator.reset();
        assert_eq!(simulator.input(), &SimulatorInput::default());
        assert!(!simulator.input().has_chronic_condition());
        assert!(simulator.errors().is_empty());
        assert!(simulator.result().is_none());
        assert!(!simulator.store().unwrap().contains_key(DEFAULT_STORAGE_KEY));

        // The edit made before the reset never fires
        assert!(!simulator.flush());
        assert!(simulator.result().is_none());
    }

    #[rstest]
    fn test_cancel_keeps_answers(manual_clock: ManualClock) {
        let mut simulator = Simulator::with_clock(
            Tariff::default(),
            MemoryStore::default(),
            SimulatorOptions::default(),
            Box::new(manual_clock.clone()),
        );
        simulator.update_field(FieldValue::Income(Income::euros(6000)));
        simulator.cancel();
        assert!(!simulator.flush());
        assert!(simulator.result().is_none());
        assert_eq!(simulator.input().income, Income::euros(6000));

        // Cancelling a calculation in flight discards it
        simulator.update_field(FieldValue::Income(Income::euros(1200)));
        manual_clock.set(Millis(300));
        assert!(!simulator.poll());
        assert!(simulator.is_calculating());
        simulator.cancel();
        assert!(!simulator.is_calculating());
        manual_clock.set(Millis(10_000));
        assert!(!simulator.poll());
        assert!(simulator.result().is_none());
        assert_eq!(simulator.input().income, Income::euros(1200));
    }

    #[rstest]
    fn test_debug(simulator: Simulator) {
        let debug = format!("{simulator:?}");
        assert!(debug.starts_with("Simulator {"));
        assert!(debug.contains("income: Income(250000)"));
    }

    #[rstest]
    fn test_recommended_tier(mut simulator: Simulator) {
        simulator.update_field(FieldValue::Income(Income::euros(1499)));
        assert_eq!(simulator.recommended_tier(), Tier::Essential);
        simulator.update_field(FieldValue::Income(Income::euros(1500)));
        assert_eq!(simulator.recommended_tier(), Tier::Comfort);
        simulator.update_field(FieldValue::Income(Income::euros(5000)));
        assert_eq!(simulator.recommended_tier(), Tier::Premium);
    }

    #[rstest]
    fn test_estimated_savings(mut simulator: Simulator) {
        simulator.update_field(FieldValue::Income(Income::euros(6000)));
        simulator.update_field(FieldValue::FamilyStatus(FamilyStatus::Family));
        simulator.update_field(FieldValue::Pathology(Pathology::Cancer));

        // No quote yet
        assert_eq!(simulator.estimated_savings(), Money::ZERO);

        simulator.calculate();
        assert_eq!(simulator.estimated_savings(), Money(16940));

        simulator.update_field(FieldValue::Pathology(Pathology::None));
        assert_eq!(simulator.estimated_savings(), Money::ZERO);
    }

    #[rstest]
    fn test_snapshot_round_trip(mut simulator: Simulator) {
        simulator.update_field(FieldValue::Income(Income::euros(2000)));
        simulator.update_field(FieldValue::Pathology(Pathology::MentalHealth));
        simulator.calculate();
        let exported = simulator.export_snapshot();

        let mut other: Simulator = Simulator::new(
            Tariff::default(),
            MemoryStore::default(),
            SimulatorOptions::default(),
        );
        assert!(other.import_snapshot(&exported));
        assert_eq!(other.input(), simulator.input());
        assert_eq!(other.result(), simulator.result());
    }

    #[rstest]
    fn test_import_snapshot_decimal_income(mut simulator: Simulator) {
        assert!(simulator.import_snapshot(
            r#"{"data": {"income": 1800.75, "familyStatus": "couple", "pathology": "none"}}"#
        ));
        assert_eq!(simulator.input().income, Income::from_decimal(1800.75).unwrap());
        assert!(simulator.is_valid());
        assert!(simulator.flush());
        assert_eq!(simulator.result().unwrap().base_premium, Money(95));
    }

    #[rstest]
    #[case("")]
    #[case("not json")]
    #[case("[]")]
    #[case(r#"{"result": null}"#)]
    #[case(r#"{"data": 5}"#)]
    #[case(r#"{"data": {"familyStatus": "divorced"}}"#)]
    fn test_import_malformed_snapshot(mut simulator: Simulator, #[case] serialised: &str) {
        simulator.update_field(FieldValue::Income(Income::euros(4000)));
        let before = *simulator.input();
        assert!(!simulator.import_snapshot(serialised));
        assert_eq!(simulator.input(), &before);
    }

    #[test]
    fn test_restores_persisted_input() {
        let mut store = MemoryStore::default();
        store
            .set(
                DEFAULT_STORAGE_KEY,
                r#"{"income": 6000, "pathology": "diabetes", "colour": "pink"}"#,
            )
            .unwrap();

        let simulator = Simulator::new(Tariff::default(), store, SimulatorOptions::default());
        assert_eq!(
            simulator.input(),
            &SimulatorInput {
                income: Income::euros(6000),
                family_status: FamilyStatus::Single,
                pathology: Pathology::Diabetes,
            }
        );
    }

    #[test]
    fn test_restores_valid_fields_of_persisted_input() {
        let mut store = MemoryStore::default();
        store
            .set(
                DEFAULT_STORAGE_KEY,
                r#"{"income": 3200.5, "familyStatus": "divorced", "pathology": "cancer"}"#,
            )
            .unwrap();

        let simulator = Simulator::new(Tariff::default(), store, SimulatorOptions::default());
        assert_eq!(
            simulator.input(),
            &SimulatorInput {
                income: Income::from_decimal(3200.5).unwrap(),
                family_status: FamilyStatus::Single,
                pathology: Pathology::Cancer,
            }
        );
        assert!(simulator.is_valid());
    }

    #[test]
    fn test_malformed_persisted_input_falls_back_to_defaults() {
        let mut store = MemoryStore::default();
        store.set(DEFAULT_STORAGE_KEY, "{{{").unwrap();

        let simulator = Simulator::new(Tariff::default(), store, SimulatorOptions::default());
        assert_eq!(simulator.input(), &SimulatorInput::default());
    }

    #[test]
    fn test_unavailable_store_is_not_fatal() {
        let mut simulator = Simulator::new(
            Tariff::default(),
            MemoryStore::unavailable(),
            SimulatorOptions::default(),
        );
        simulator.update_field(FieldValue::Income(Income::euros(1200)));
        assert!(simulator.flush());
        simulator.reset();
        assert_eq!(simulator.input(), &SimulatorInput::default());
    }

    #[test]
    fn test_persist_state_disabled() {
        let mut store = MemoryStore::default();
        store.set(DEFAULT_STORAGE_KEY, r#"{"income": 6000}"#).unwrap();

        let mut simulator = Simulator::new(
            Tariff::default(),
            store,
            SimulatorOptions {
                persist_state: false,
                ..SimulatorOptions::default()
            },
        );
        assert_eq!(simulator.input(), &SimulatorInput::default());
        assert!(simulator.store().is_none());
        simulator.flush();
    }
}
