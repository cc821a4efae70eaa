//! Client abstraction over the array's management API.
//!
//! [`FlashArrayApi`] has one method per array call, grouped by entity
//! category. Every method performs a single request and returns the decoded
//! object or an [`ApiError`]. Lookups return `Ok(None)` when the object does
//! not exist so callers can treat absence as state rather than failure.

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod types;

pub use error::{ApiError, OptionalExt};
pub use types::{
    Alert, ArrayInfo, Connection, DnsPatch, DnsSettings, Host, HostChap, HostCreate, HostPatch,
    HostPersonality, Hostgroup, HostgroupPatch, Pgroup, PgroupCreate, PgroupPatch,
    PgroupRetention, PgroupSchedule, PgroupTarget, Vgroup, Volume,
};

/// Future returned by array client operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Calls exposed by the array's management API.
pub trait FlashArrayApi: Send + Sync {
    /// Address of the array this client talks to.
    fn target(&self) -> &str;

    /// Reads the array identity.
    fn get_array(&self) -> ApiFuture<'_, ArrayInfo>;

    // Volumes.

    /// Creates an empty volume of `size` bytes.
    fn create_volume<'a>(&'a self, name: &'a str, size: u64) -> ApiFuture<'a, Volume>;
    /// Copies `source` into `name`; `overwrite` replaces an existing volume.
    fn copy_volume<'a>(
        &'a self,
        name: &'a str,
        source: &'a str,
        overwrite: bool,
    ) -> ApiFuture<'a, Volume>;
    /// Looks a live volume up by full name.
    fn get_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Volume>>;
    /// Renames a volume.
    fn rename_volume<'a>(&'a self, name: &'a str, new_name: &'a str) -> ApiFuture<'a, Volume>;
    /// Grows a volume to `size` bytes.
    fn extend_volume<'a>(&'a self, name: &'a str, size: u64) -> ApiFuture<'a, Volume>;
    /// Moves a volume into `container`; an empty container means the array root.
    fn move_volume<'a>(&'a self, name: &'a str, container: &'a str) -> ApiFuture<'a, Volume>;
    /// Takes a snapshot of a volume and returns it.
    fn create_snapshot<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Volume>;
    /// Destroys a volume; it stays recoverable until eradicated.
    fn destroy_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Volume>;
    /// Permanently removes a destroyed volume.
    fn eradicate_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
    /// Lists live volumes, or destroyed ones when `pending_only` is set.
    fn list_volumes(&self, pending_only: bool) -> ApiFuture<'_, Vec<Volume>>;

    // Hosts.

    /// Creates a host.
    fn create_host<'a>(&'a self, name: &'a str, request: &'a HostCreate) -> ApiFuture<'a, Host>;
    /// Looks a host up by name.
    fn get_host<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Host>>;
    /// Reads a host's personality.
    fn get_host_personality<'a>(&'a self, name: &'a str) -> ApiFuture<'a, HostPersonality>;
    /// Reads a host's CHAP settings.
    fn get_host_chap<'a>(&'a self, name: &'a str) -> ApiFuture<'a, HostChap>;
    /// Applies a partial host update.
    fn set_host<'a>(&'a self, name: &'a str, patch: &'a HostPatch) -> ApiFuture<'a, Host>;
    /// Deletes a host.
    fn delete_host<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
    /// Connects a volume privately to a host; `None` lets the array pick the LUN.
    fn connect_host<'a>(
        &'a self,
        name: &'a str,
        volume: &'a str,
        lun: Option<u32>,
    ) -> ApiFuture<'a, Connection>;
    /// Disconnects a private volume connection.
    fn disconnect_host<'a>(&'a self, name: &'a str, volume: &'a str) -> ApiFuture<'a, ()>;
    /// Lists the private volume connections of a host.
    fn list_host_connections<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<Connection>>;

    // Host groups.

    /// Creates a host group with an initial member list.
    fn create_hostgroup<'a>(
        &'a self,
        name: &'a str,
        hosts: &'a [String],
    ) -> ApiFuture<'a, Hostgroup>;
    /// Looks a host group up by name.
    fn get_hostgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Hostgroup>>;
    /// Applies a partial host group update.
    fn set_hostgroup<'a>(
        &'a self,
        name: &'a str,
        patch: &'a HostgroupPatch,
    ) -> ApiFuture<'a, Hostgroup>;
    /// Deletes a host group.
    fn delete_hostgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
    /// Connects a shared volume to a host group.
    fn connect_hostgroup<'a>(
        &'a self,
        name: &'a str,
        volume: &'a str,
        lun: Option<u32>,
    ) -> ApiFuture<'a, Connection>;
    /// Disconnects a shared volume from a host group.
    fn disconnect_hostgroup<'a>(&'a self, name: &'a str, volume: &'a str) -> ApiFuture<'a, ()>;
    /// Lists the volume connections of a host group.
    fn list_hostgroup_connections<'a>(&'a self, name: &'a str)
    -> ApiFuture<'a, Vec<Connection>>;

    // Protection groups.

    /// Creates a protection group.
    fn create_pgroup<'a>(
        &'a self,
        name: &'a str,
        request: &'a PgroupCreate,
    ) -> ApiFuture<'a, Pgroup>;
    /// Looks a live protection group up by name.
    fn get_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Pgroup>>;
    /// Reads a protection group's schedule.
    fn get_pgroup_schedule<'a>(&'a self, name: &'a str) -> ApiFuture<'a, PgroupSchedule>;
    /// Reads a protection group's retention policy.
    fn get_pgroup_retention<'a>(&'a self, name: &'a str) -> ApiFuture<'a, PgroupRetention>;
    /// Applies a partial protection group update.
    fn set_pgroup<'a>(&'a self, name: &'a str, patch: &'a PgroupPatch) -> ApiFuture<'a, Pgroup>;
    /// Destroys a protection group; it stays recoverable until eradicated.
    fn destroy_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
    /// Permanently removes a destroyed protection group.
    fn eradicate_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
    /// Lists live protection groups, or destroyed ones when `pending_only` is set.
    fn list_pgroups(&self, pending_only: bool) -> ApiFuture<'_, Vec<Pgroup>>;

    // Volume groups.

    /// Creates a volume group.
    fn create_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vgroup>;
    /// Looks a live volume group up by name.
    fn get_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Vgroup>>;
    /// Renames a volume group.
    fn rename_vgroup<'a>(&'a self, name: &'a str, new_name: &'a str) -> ApiFuture<'a, Vgroup>;
    /// Destroys a volume group.
    fn destroy_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
    /// Permanently removes a destroyed volume group.
    fn eradicate_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
    /// Lists live volume groups, or destroyed ones when `pending_only` is set.
    fn list_vgroups(&self, pending_only: bool) -> ApiFuture<'_, Vec<Vgroup>>;

    // Networking.

    /// Reads the DNS settings.
    fn get_dns(&self) -> ApiFuture<'_, DnsSettings>;
    /// Replaces the DNS settings.
    fn set_dns<'a>(&'a self, patch: &'a DnsPatch) -> ApiFuture<'a, DnsSettings>;

    // Alerts.

    /// Adds an alert recipient.
    fn create_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, Alert>;
    /// Looks an alert recipient up.
    fn get_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, Option<Alert>>;
    /// Enables or disables an alert recipient.
    fn set_alert<'a>(&'a self, email: &'a str, enabled: bool) -> ApiFuture<'a, Alert>;
    /// Removes an alert recipient.
    fn delete_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, ()>;
}
