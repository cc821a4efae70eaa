//! Objects returned by the array and the typed payloads sent to it.
//!
//! Responses mirror the array's REST 1.x field names. Request payloads are
//! explicit structs whose `Option` fields are skipped when unset, so a
//! partial update only carries the fields the caller changed.

use serde::{Deserialize, Serialize};

/// Array identity reported by `GET array`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct ArrayInfo {
    /// Array identifier.
    pub id: String,
    /// Array name.
    pub array_name: String,
    /// Purity version.
    pub version: String,
    /// Purity revision.
    pub revision: String,
}

/// Volume or snapshot.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Volume {
    /// Full name, including the volume group prefix when present.
    pub name: String,
    /// Provisioned size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Array serial number.
    #[serde(default)]
    pub serial: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created: String,
    /// Volume this one was copied from, if any.
    #[serde(default)]
    pub source: Option<String>,
    /// Seconds left before eradication for destroyed volumes.
    #[serde(default)]
    pub time_remaining: Option<u64>,
}

impl Volume {
    /// Splits the full name into its volume group and short name.
    #[must_use]
    pub fn split_name(&self) -> (Option<&str>, &str) {
        match self.name.split_once('/') {
            Some((group, short)) => (Some(group), short),
            None => (None, self.name.as_str()),
        }
    }
}

/// Host object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Host {
    /// Host name.
    pub name: String,
    /// Fibre Channel WWNs.
    #[serde(default)]
    pub wwn: Vec<String>,
    /// iSCSI IQNs.
    #[serde(default)]
    pub iqn: Vec<String>,
    /// Host group the host belongs to.
    #[serde(default)]
    pub hgroup: Option<String>,
}

/// Host personality view (`GET host/{name}?personality=true`).
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct HostPersonality {
    /// Host name.
    pub name: String,
    /// Configured personality; `None` or empty when unset.
    #[serde(default)]
    pub personality: Option<String>,
}

/// Host CHAP view (`GET host/{name}?chap=true`). Passwords come back masked.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct HostChap {
    /// Host name.
    pub name: String,
    /// Host CHAP user.
    #[serde(default)]
    pub host_user: Option<String>,
    /// Host CHAP password, masked by the array.
    #[serde(default)]
    pub host_password: Option<String>,
    /// Target CHAP user.
    #[serde(default)]
    pub target_user: Option<String>,
    /// Target CHAP password, masked by the array.
    #[serde(default)]
    pub target_password: Option<String>,
}

/// Host group object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Hostgroup {
    /// Host group name.
    pub name: String,
    /// Member hosts.
    #[serde(default)]
    pub hosts: Vec<String>,
}

/// Volume connection of a host or host group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Connection {
    /// Host or host group name.
    pub name: String,
    /// Connected volume.
    pub vol: String,
    /// Logical unit number.
    pub lun: u32,
}

/// Replication target of a protection group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct PgroupTarget {
    /// Target array name.
    pub name: String,
    /// Whether the target allows replication.
    #[serde(default)]
    pub allowed: bool,
}

/// Protection group object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Pgroup {
    /// Protection group name.
    pub name: String,
    /// Member hosts.
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    /// Member host groups.
    #[serde(default)]
    pub hgroups: Option<Vec<String>>,
    /// Member volumes.
    #[serde(default)]
    pub volumes: Option<Vec<String>>,
    /// Replication targets.
    #[serde(default)]
    pub targets: Option<Vec<PgroupTarget>>,
    /// Seconds left before eradication for destroyed groups.
    #[serde(default)]
    pub time_remaining: Option<u64>,
}

/// Protection group schedule view.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct PgroupSchedule {
    /// Protection group name.
    pub name: String,
    /// Whether local snapshots are taken.
    #[serde(default)]
    pub snap_enabled: bool,
    /// Snapshot frequency in seconds.
    #[serde(default)]
    pub snap_frequency: u64,
    /// Preferred snapshot time, seconds after midnight.
    #[serde(default)]
    pub snap_at: Option<u64>,
    /// Whether replication is enabled.
    #[serde(default)]
    pub replicate_enabled: bool,
    /// Replication frequency in seconds.
    #[serde(default)]
    pub replicate_frequency: u64,
    /// Preferred replication time, seconds after midnight.
    #[serde(default)]
    pub replicate_at: Option<u64>,
}

/// Protection group retention view.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct PgroupRetention {
    /// Protection group name.
    pub name: String,
    /// Keep every local snapshot for this many seconds.
    #[serde(default)]
    pub all_for: u64,
    /// Local snapshots kept per day afterwards.
    #[serde(default)]
    pub per_day: u64,
    /// Days the per-day local snapshots are kept.
    #[serde(default)]
    pub days: u64,
    /// Keep every replicated snapshot for this many seconds.
    #[serde(default)]
    pub target_all_for: u64,
    /// Replicated snapshots kept per day afterwards.
    #[serde(default)]
    pub target_per_day: u64,
    /// Days the per-day replicated snapshots are kept.
    #[serde(default)]
    pub target_days: u64,
}

/// Volume group object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Vgroup {
    /// Volume group name.
    pub name: String,
    /// Volumes inside the group.
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Seconds left before eradication for destroyed groups.
    #[serde(default)]
    pub time_remaining: Option<u64>,
}

/// Array DNS settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct DnsSettings {
    /// Search domain.
    #[serde(default)]
    pub domain: String,
    /// Nameserver addresses.
    #[serde(default)]
    pub nameservers: Vec<String>,
}

/// Alert e-mail recipient.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Alert {
    /// Recipient address.
    pub name: String,
    /// Whether alerts are sent to the address.
    #[serde(default)]
    pub enabled: bool,
}

/// Payload for `POST host/{name}`.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct HostCreate {
    /// Initial WWNs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wwnlist: Vec<String>,
    /// Initial IQNs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub iqnlist: Vec<String>,
}

/// Payload for `PUT host/{name}`.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct HostPatch {
    /// New host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement WWN list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wwnlist: Option<Vec<String>>,
    /// Replacement IQN list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iqnlist: Option<Vec<String>>,
    /// Personality; an empty string clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    /// Host CHAP user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_user: Option<String>,
    /// Host CHAP password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_password: Option<String>,
    /// Target CHAP user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user: Option<String>,
    /// Target CHAP password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_password: Option<String>,
}

impl HostPatch {
    /// Returns true when the patch carries no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Payload for `PUT hgroup/{name}`.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct HostgroupPatch {
    /// New host group name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement member list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostlist: Option<Vec<String>>,
}

/// Payload for `POST pgroup/{name}`.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct PgroupCreate {
    /// Member hosts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hostlist: Vec<String>,
    /// Member host groups.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hgrouplist: Vec<String>,
    /// Member volumes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vollist: Vec<String>,
    /// Replication targets.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targetlist: Vec<String>,
}

/// Payload for `PUT pgroup/{name}`.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct PgroupPatch {
    /// New protection group name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement host list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostlist: Option<Vec<String>>,
    /// Replacement host group list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hgrouplist: Option<Vec<String>>,
    /// Replacement volume list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vollist: Option<Vec<String>>,
    /// Replacement target list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targetlist: Option<Vec<String>>,
    /// Enables or disables local snapshots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_enabled: Option<bool>,
    /// Enables or disables replication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicate_enabled: Option<bool>,
    /// Snapshot frequency in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_frequency: Option<u64>,
    /// Preferred snapshot time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_at: Option<u64>,
    /// Replication frequency in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicate_frequency: Option<u64>,
    /// Preferred replication time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicate_at: Option<u64>,
    /// Local all-snapshot retention in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_for: Option<u64>,
    /// Local snapshots kept per day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_day: Option<u64>,
    /// Days local per-day snapshots are kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u64>,
    /// Target all-snapshot retention in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_all_for: Option<u64>,
    /// Target snapshots kept per day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_per_day: Option<u64>,
    /// Days target per-day snapshots are kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_days: Option<u64>,
}

impl PgroupPatch {
    /// Returns true when the patch carries no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Payload for `PUT dns`.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct DnsPatch {
    /// Search domain; empty clears it.
    pub domain: String,
    /// Nameserver addresses; empty clears them.
    pub nameservers: Vec<String>,
}
