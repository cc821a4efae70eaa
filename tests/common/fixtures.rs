//! Shared fixtures for lifecycle tests.

use purefa::Provider;
use purefa::test_support::MemoryArray;
use rstest::fixture;

/// One gibibyte.
pub const GIB: u64 = 1 << 30;

/// Empty in-memory array.
#[fixture]
pub fn array() -> MemoryArray {
    MemoryArray::new()
}

/// Provider with every resource registered.
#[fixture]
pub fn provider() -> Provider {
    Provider::new()
}
