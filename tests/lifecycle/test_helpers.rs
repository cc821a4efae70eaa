//! Shared fixtures for lifecycle BDD scenarios.

use purefa::StateRecord;
use purefa::test_support::MemoryArray;
use rstest::fixture;

/// One gibibyte.
pub const GIB: u64 = 1 << 30;

#[derive(Clone, Debug)]
pub enum Outcome {
    Applied(StateRecord),
    Failed {
        message: String,
        confirmed: Option<StateRecord>,
    },
}

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub array: MemoryArray,
    pub type_name: &'static str,
    pub record: Option<StateRecord>,
    pub outcome: Option<Outcome>,
    pub refreshed: Option<Option<StateRecord>>,
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext {
        array: MemoryArray::new(),
        type_name: "purefa_volume",
        record: None,
        outcome: None,
        refreshed: None,
    }
}

impl LifecycleContext {
    pub fn tracked(&self) -> StateRecord {
        self.record
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a tracked object"))
    }

    pub fn confirmed(&self) -> Option<&StateRecord> {
        match &self.outcome {
            Some(Outcome::Failed { confirmed, .. }) => confirmed.as_ref(),
            _ => None,
        }
    }
}
