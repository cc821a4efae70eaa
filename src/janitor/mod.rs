//! Acceptance-test janitor.
//!
//! Deleting a volume, volume group or protection group only destroys it; the
//! array keeps the object (and its name) until it is eradicated. Acceptance
//! runs create objects whose names start with a run prefix, so the janitor
//! eradicates destroyed objects carrying that prefix and fails if any remain
//! afterwards.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{ApiError, FlashArrayApi};

/// Environment variable used by test harnesses to choose the name prefix.
pub const TEST_PREFIX_ENV: &str = "PURE_TEST_PREFIX";

/// Prefix used when the harness does not choose one.
pub const DEFAULT_TEST_PREFIX: &str = "tfacc-";

/// Configuration for a janitor sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JanitorConfig {
    /// Prefix identifying objects created by tests.
    pub prefix: String,
}

impl JanitorConfig {
    /// Constructs a config, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::InvalidConfig`] when the prefix is blank.
    pub fn new(prefix: impl Into<String>) -> Result<Self, JanitorError> {
        let trimmed = prefix.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("prefix"),
            });
        }
        Ok(Self { prefix: trimmed })
    }

    /// Builds a unique object name for a test, e.g. `tfacc-volume-1f0c…`.
    #[must_use]
    pub fn test_name(&self, kind: &str) -> String {
        format!("{}{kind}-{}", self.prefix, Uuid::new_v4().simple())
    }

    /// Returns true when `name` (or its volume group) carries the prefix.
    #[must_use]
    pub fn owns(&self, name: &str) -> bool {
        name.split('/').any(|part| part.starts_with(&self.prefix))
    }
}

/// Summary of janitor work.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepSummary {
    /// Destroyed volumes eradicated during the sweep.
    pub eradicated_volumes: usize,
    /// Destroyed protection groups eradicated during the sweep.
    pub eradicated_pgroups: usize,
    /// Destroyed volume groups eradicated during the sweep.
    pub eradicated_vgroups: usize,
}

/// Errors returned by the janitor.
#[derive(Debug, Error)]
pub enum JanitorError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}")]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
    /// Raised when an array call fails.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Raised when destroyed objects remain after the sweep.
    #[error("objects remain after janitor sweep: {message}")]
    NotClean {
        /// Human-readable description of what remains.
        message: String,
    },
}

/// Eradicates destroyed test objects through an array client.
#[derive(Clone, Debug)]
pub struct Janitor<A: FlashArrayApi> {
    config: JanitorConfig,
    api: A,
}

impl<A: FlashArrayApi> Janitor<A> {
    /// Creates a new janitor using the provided configuration and client.
    #[must_use]
    pub const fn new(config: JanitorConfig, api: A) -> Self {
        Self { config, api }
    }

    /// Performs a sweep and returns how many objects were eradicated.
    ///
    /// Volumes go first so their volume groups can be eradicated afterwards.
    /// The sweep fails if any prefixed destroyed object remains at the end.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError`] when an array call fails or objects remain
    /// after eradication.
    pub async fn sweep(&self) -> Result<SweepSummary, JanitorError> {
        let mut summary = SweepSummary::default();

        for name in self.pending_volumes().await? {
            debug!(volume = %name, "eradicating volume");
            self.api.eradicate_volume(&name).await?;
            summary.eradicated_volumes += 1;
        }
        for name in self.pending_pgroups().await? {
            debug!(pgroup = %name, "eradicating protection group");
            self.api.eradicate_pgroup(&name).await?;
            summary.eradicated_pgroups += 1;
        }
        for name in self.pending_vgroups().await? {
            debug!(vgroup = %name, "eradicating volume group");
            self.api.eradicate_vgroup(&name).await?;
            summary.eradicated_vgroups += 1;
        }

        let remaining_volumes = self.pending_volumes().await?;
        let remaining_pgroups = self.pending_pgroups().await?;
        let remaining_vgroups = self.pending_vgroups().await?;
        if !remaining_volumes.is_empty()
            || !remaining_pgroups.is_empty()
            || !remaining_vgroups.is_empty()
        {
            let message = format!(
                "volumes remaining: {}, protection groups remaining: {}, volume groups remaining: {}",
                remaining_volumes.len(),
                remaining_pgroups.len(),
                remaining_vgroups.len()
            );
            return Err(JanitorError::NotClean { message });
        }

        info!(
            volumes = summary.eradicated_volumes,
            pgroups = summary.eradicated_pgroups,
            vgroups = summary.eradicated_vgroups,
            "janitor sweep complete"
        );
        Ok(summary)
    }

    async fn pending_volumes(&self) -> Result<Vec<String>, JanitorError> {
        let volumes = self.api.list_volumes(true).await?;
        Ok(self.owned(volumes.into_iter().map(|volume| volume.name)))
    }

    async fn pending_pgroups(&self) -> Result<Vec<String>, JanitorError> {
        let groups = self.api.list_pgroups(true).await?;
        Ok(self.owned(groups.into_iter().map(|group| group.name)))
    }

    async fn pending_vgroups(&self) -> Result<Vec<String>, JanitorError> {
        let groups = self.api.list_vgroups(true).await?;
        Ok(self.owned(groups.into_iter().map(|group| group.name)))
    }

    fn owned(&self, names: impl Iterator<Item = String>) -> Vec<String> {
        names.filter(|name| self.config.owns(name)).collect()
    }
}

#[cfg(test)]
mod tests;
