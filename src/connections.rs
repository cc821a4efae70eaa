//! Volume connection sets for hosts and host groups.
//!
//! [`diff`] compares the prior and desired connection sets and produces two
//! disjoint, sorted lists. Disconnects are applied before connects so a
//! volume moving to a different LUN never collides with its old mapping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{ApiError, Connection, FlashArrayApi, OptionalExt};

/// A volume mapped to a host or host group. LUN 0 lets the array choose.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VolumeConnection {
    /// Volume name.
    pub vol: String,
    /// Logical unit number; 0 means "any".
    #[serde(default)]
    pub lun: u32,
}

impl VolumeConnection {
    /// Creates a connection entry.
    #[must_use]
    pub fn new(vol: impl Into<String>, lun: u32) -> Self {
        Self {
            vol: vol.into(),
            lun,
        }
    }

    /// Returns true when `desired` is satisfied by this existing connection.
    fn satisfies(&self, desired: &Self) -> bool {
        self.vol == desired.vol && (desired.lun == 0 || desired.lun == self.lun)
    }

    const fn requested_lun(&self) -> Option<u32> {
        if self.lun == 0 { None } else { Some(self.lun) }
    }
}

/// Connections to remove and to add.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectionDiff {
    /// Existing connections no longer desired.
    pub disconnect: Vec<VolumeConnection>,
    /// Desired connections not yet present.
    pub connect: Vec<VolumeConnection>,
}

impl ConnectionDiff {
    /// Returns true when nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disconnect.is_empty() && self.connect.is_empty()
    }
}

/// Compares prior and desired connection sets.
///
/// An existing entry is kept when some desired entry names the same volume
/// with the same LUN or with LUN 0. Both output lists are sorted and free of
/// duplicates.
#[must_use]
pub fn diff(old: &[VolumeConnection], new: &[VolumeConnection]) -> ConnectionDiff {
    let old: BTreeSet<&VolumeConnection> = old.iter().collect();
    let new: BTreeSet<&VolumeConnection> = new.iter().collect();

    let disconnect = old
        .iter()
        .filter(|existing| !new.iter().any(|desired| existing.satisfies(desired)))
        .map(|existing| (*existing).clone())
        .collect();
    let connect = new
        .iter()
        .filter(|desired| !old.iter().any(|existing| existing.satisfies(desired)))
        .map(|desired| (*desired).clone())
        .collect();

    ConnectionDiff {
        disconnect,
        connect,
    }
}

/// Converts connections reported by the array into state entries. Entries
/// the configuration left at LUN 0 stay at 0 so the array's choice does not
/// show up as drift.
#[must_use]
pub fn reconcile(prior: &[VolumeConnection], actual: Vec<Connection>) -> Vec<VolumeConnection> {
    let mut entries: Vec<VolumeConnection> = actual
        .into_iter()
        .map(|connection| {
            let auto = prior
                .iter()
                .any(|entry| entry.vol == connection.vol && entry.lun == 0);
            VolumeConnection::new(connection.vol, if auto { 0 } else { connection.lun })
        })
        .collect();
    entries.sort();
    entries.dedup();
    entries
}

/// Object that volumes are connected to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Attachment<'a> {
    /// A host (private connections).
    Host(&'a str),
    /// A host group (shared connections).
    Hostgroup(&'a str),
}

impl Attachment<'_> {
    /// Lists the current connections of the object.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiError`] from the array.
    pub async fn current(self, api: &dyn FlashArrayApi) -> Result<Vec<Connection>, ApiError> {
        match self {
            Self::Host(name) => api.list_host_connections(name).await,
            Self::Hostgroup(name) => api.list_hostgroup_connections(name).await,
        }
    }

    /// Connects one volume.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiError`] from the array.
    pub async fn connect(
        self,
        api: &dyn FlashArrayApi,
        entry: &VolumeConnection,
    ) -> Result<Connection, ApiError> {
        debug!(attachment = ?self, volume = %entry.vol, lun = entry.lun, "connecting volume");
        match self {
            Self::Host(name) => api.connect_host(name, &entry.vol, entry.requested_lun()).await,
            Self::Hostgroup(name) => {
                api.connect_hostgroup(name, &entry.vol, entry.requested_lun())
                    .await
            }
        }
    }

    /// Disconnects one volume.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiError`] from the array.
    pub async fn disconnect(self, api: &dyn FlashArrayApi, volume: &str) -> Result<(), ApiError> {
        debug!(attachment = ?self, volume, "disconnecting volume");
        match self {
            Self::Host(name) => api.disconnect_host(name, volume).await,
            Self::Hostgroup(name) => api.disconnect_hostgroup(name, volume).await,
        }
    }

    /// Applies a diff: every disconnect, then every connect.
    ///
    /// # Errors
    ///
    /// Stops at the first failing call and propagates its [`ApiError`].
    pub async fn apply(self, api: &dyn FlashArrayApi, changes: &ConnectionDiff) -> Result<(), ApiError> {
        for entry in &changes.disconnect {
            self.disconnect(api, &entry.vol).await?;
        }
        for entry in &changes.connect {
            self.connect(api, entry).await?;
        }
        Ok(())
    }

    /// Disconnects everything the array currently reports. A connection
    /// that disappears in the meantime is skipped.
    ///
    /// # Errors
    ///
    /// Propagates [`ApiError`] from the array.
    pub async fn disconnect_all(self, api: &dyn FlashArrayApi) -> Result<(), ApiError> {
        for connection in self.current(api).await? {
            self.disconnect(api, &connection.vol).await.optional()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn set(entries: &[(&str, u32)]) -> Vec<VolumeConnection> {
        entries
            .iter()
            .map(|(vol, lun)| VolumeConnection::new(*vol, *lun))
            .collect()
    }

    #[test]
    fn unchanged_sets_produce_empty_diff() {
        let old = set(&[("v1", 1), ("v2", 2)]);
        let new = set(&[("v2", 2), ("v1", 1)]);
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn lun_change_disconnects_then_reconnects() {
        let changes = diff(&set(&[("v1", 1)]), &set(&[("v1", 5)]));
        assert_eq!(changes.disconnect, set(&[("v1", 1)]));
        assert_eq!(changes.connect, set(&[("v1", 5)]));
    }

    #[test]
    fn auto_lun_matches_any_existing_lun() {
        assert!(diff(&set(&[("v1", 7)]), &set(&[("v1", 0)])).is_empty());
    }

    #[rstest]
    #[case(&[("a", 1), ("b", 2)], &[("b", 2), ("c", 3)])]
    #[case(&[], &[("c", 0), ("a", 1)])]
    #[case(&[("c", 3), ("a", 1)], &[])]
    #[case(&[("a", 1), ("b", 2), ("c", 3)], &[("c", 3), ("d", 4), ("a", 9)])]
    fn applying_diff_yields_desired_set(
        #[case] old: &[(&str, u32)],
        #[case] new: &[(&str, u32)],
    ) {
        let before = set(old);
        let after = set(new);
        let changes = diff(&before, &after);

        let mut result: BTreeSet<VolumeConnection> = before.into_iter().collect();
        for entry in &changes.disconnect {
            result.remove(entry);
        }
        result.extend(changes.connect.iter().cloned());

        let expected: BTreeSet<VolumeConnection> = after.into_iter().collect();
        assert_eq!(result, expected);
        assert!(changes.disconnect.windows(2).all(|pair| pair.first() < pair.last()));
        assert!(changes.connect.windows(2).all(|pair| pair.first() < pair.last()));
    }

    #[test]
    fn reconcile_keeps_auto_luns() {
        let prior = set(&[("v1", 0), ("v2", 4)]);
        let actual = vec![
            Connection {
                name: String::from("h"),
                vol: String::from("v2"),
                lun: 4,
            },
            Connection {
                name: String::from("h"),
                vol: String::from("v1"),
                lun: 9,
            },
        ];
        assert_eq!(reconcile(&prior, actual), set(&[("v1", 0), ("v2", 4)]));
    }
}
