//! Fixtures for tests
use crate::simulator::schedule::ManualClock;
use crate::simulator::{Simulator, SimulatorOptions};
use crate::store::MemoryStore;
use crate::tariff::Tariff;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn tariff() -> Tariff {
    Tariff::default()
}

#[fixture]
pub fn manual_clock() -> ManualClock {
    ManualClock::default()
}

/// A simulator with default options, an empty in-memory store and a clock stopped at zero
#[fixture]
pub fn simulator(tariff: Tariff, manual_clock: ManualClock) -> Simulator {
    Simulator::with_clock(
        tariff,
        MemoryStore::default(),
        SimulatorOptions::default(),
        Box::new(manual_clock),
    )
}
