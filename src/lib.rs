//! Core library for the Pure Storage FlashArray provider.
//!
//! The crate exposes declarative resources (volumes, hosts, host groups,
//! protection groups, volume groups, DNS settings and alert recipients) and
//! the `purefa_flasharray` data source. Each resource validates its block
//! against a [`Schema`], then drives the array through the
//! [`FlashArrayApi`] client abstraction; [`RestClient`] implements it over
//! the array's REST 1.x API.

pub mod backend;
pub mod config;
pub mod connections;
pub mod flasharray;
pub mod janitor;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod test_support;

pub use backend::{ApiError, FlashArrayApi};
pub use config::{ConfigError, ConnectionSettings, Credentials, ProviderConfig, ProviderOptions};
pub use flasharray::RestClient;
pub use janitor::{
    DEFAULT_TEST_PREFIX, Janitor, JanitorConfig, JanitorError, SweepSummary, TEST_PREFIX_ENV,
};
pub use provider::{PlanAction, Provider, ProviderError, ProviderSchema, configure};
pub use resources::{ResourceError, StateRecord};
pub use schema::{Schema, ValidationError, ValidationErrors};
