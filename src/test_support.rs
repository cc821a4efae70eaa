//! Test support utilities shared across unit and integration tests.
//!
//! [`MemoryArray`] is an in-process [`FlashArrayApi`] that keeps objects in
//! memory, records every call and enforces the array rules the resources
//! depend on: unique names (including names held by destroyed objects),
//! grow-only volumes and empty host groups before deletion.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::backend::{
    Alert, ApiError, ApiFuture, ArrayInfo, Connection, DnsPatch, DnsSettings, FlashArrayApi, Host,
    HostChap, HostCreate, HostPatch, HostPersonality, Hostgroup, HostgroupPatch, Pgroup,
    PgroupCreate, PgroupPatch, PgroupRetention, PgroupSchedule, PgroupTarget, Vgroup, Volume,
};

/// Management address reported by [`MemoryArray::target`](FlashArrayApi::target).
pub const MEMORY_TARGET: &str = "array.test";

/// Seconds a destroyed object stays recoverable.
const ERADICATION_DELAY: u64 = 86_400;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Holder {
    Host,
    Hostgroup,
}

impl Holder {
    const fn collection(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Hostgroup => "hgroup",
        }
    }
}

#[derive(Clone, Debug)]
struct StoredHost {
    host: Host,
    personality: Option<String>,
    chap: HostChap,
}

#[derive(Clone, Debug)]
struct StoredPgroup {
    group: Pgroup,
    schedule: PgroupSchedule,
    retention: PgroupRetention,
}

#[derive(Debug, Default)]
struct ArrayState {
    calls: Vec<String>,
    failures: BTreeMap<&'static str, ApiError>,
    volumes: BTreeMap<String, Volume>,
    destroyed_volumes: BTreeMap<String, Volume>,
    snapshots: Vec<Volume>,
    hosts: BTreeMap<String, StoredHost>,
    hostgroups: BTreeMap<String, Hostgroup>,
    connections: Vec<(Holder, Connection)>,
    pgroups: BTreeMap<String, StoredPgroup>,
    destroyed_pgroups: BTreeMap<String, StoredPgroup>,
    vgroups: BTreeSet<String>,
    destroyed_vgroups: BTreeSet<String>,
    dns: DnsSettings,
    alerts: BTreeMap<String, Alert>,
    serials: u64,
}

fn not_found(path: String) -> ApiError {
    ApiError::NotFound {
        path,
        message: String::from("Object does not exist."),
    }
}

fn rejected(method: &str, path: String, message: &str) -> ApiError {
    ApiError::Status {
        method: method.to_owned(),
        path,
        status: 400,
        message: message.to_owned(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

fn non_empty_list(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn targets(names: &[String]) -> Option<Vec<PgroupTarget>> {
    (!names.is_empty()).then(|| {
        names
            .iter()
            .map(|name| PgroupTarget {
                name: name.clone(),
                allowed: true,
            })
            .collect()
    })
}

fn short_name(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, short)| short)
}

impl ArrayState {
    fn record(&mut self, operation: &'static str, subject: &str) -> Result<(), ApiError> {
        self.calls
            .push(format!("{operation} {subject}").trim_end().to_owned());
        self.failures.remove(operation).map_or(Ok(()), Err)
    }

    fn volume_taken(&self, name: &str) -> bool {
        self.volumes.contains_key(name) || self.destroyed_volumes.contains_key(name)
    }

    fn next_serial(&mut self) -> String {
        self.serials += 1;
        format!("{:024X}", self.serials)
    }

    fn live_volume(&self, name: &str) -> Result<&Volume, ApiError> {
        self.volumes
            .get(name)
            .ok_or_else(|| not_found(format!("volume/{name}")))
    }

    fn ensure_container(&self, name: &str) -> Result<(), ApiError> {
        match name.split_once('/') {
            Some((group, _)) if !self.vgroups.contains(group) => {
                Err(not_found(format!("vgroup/{group}")))
            }
            _ => Ok(()),
        }
    }

    fn create_volume(&mut self, name: &str, size: u64) -> Result<Volume, ApiError> {
        let path = format!("volume/{name}");
        if self.volume_taken(name) {
            return Err(rejected("POST", path, "Volume already exists."));
        }
        self.ensure_container(name)?;
        let volume = Volume {
            name: name.to_owned(),
            size,
            serial: self.next_serial(),
            created: String::from("2026-01-01T00:00:00Z"),
            source: None,
            time_remaining: None,
        };
        self.volumes.insert(name.to_owned(), volume.clone());
        Ok(volume)
    }

    fn copy_volume(&mut self, name: &str, source: &str, overwrite: bool) -> Result<Volume, ApiError> {
        let path = format!("volume/{name}");
        let size = self.live_volume(source)?.size;
        let copied = match self.volumes.get(name) {
            Some(existing) if overwrite => Volume {
                size,
                source: Some(source.to_owned()),
                ..existing.clone()
            },
            Some(_) => return Err(rejected("POST", path, "Volume already exists.")),
            None if overwrite => return Err(not_found(path)),
            None => {
                if self.destroyed_volumes.contains_key(name) {
                    return Err(rejected("POST", path, "Volume already exists."));
                }
                self.ensure_container(name)?;
                Volume {
                    name: name.to_owned(),
                    size,
                    serial: self.next_serial(),
                    created: String::from("2026-01-01T00:00:00Z"),
                    source: Some(source.to_owned()),
                    time_remaining: None,
                }
            }
        };
        self.volumes.insert(name.to_owned(), copied.clone());
        Ok(copied)
    }

    fn move_volume_entry(&mut self, from: &str, to: &str) -> Result<Volume, ApiError> {
        let mut volume = self
            .volumes
            .remove(from)
            .ok_or_else(|| not_found(format!("volume/{from}")))?;
        to.clone_into(&mut volume.name);
        for (_, connection) in &mut self.connections {
            if connection.vol == from {
                to.clone_into(&mut connection.vol);
            }
        }
        self.volumes.insert(to.to_owned(), volume.clone());
        Ok(volume)
    }

    fn rename_volume(&mut self, name: &str, new_name: &str) -> Result<Volume, ApiError> {
        self.live_volume(name)?;
        if new_name == name {
            return self.live_volume(name).cloned();
        }
        if self.volume_taken(new_name) {
            return Err(rejected("PUT", format!("volume/{name}"), "Volume already exists."));
        }
        self.ensure_container(new_name)?;
        self.move_volume_entry(name, new_name)
    }

    fn extend_volume(&mut self, name: &str, size: u64) -> Result<Volume, ApiError> {
        let path = format!("volume/{name}");
        let volume = self
            .volumes
            .get_mut(name)
            .ok_or_else(|| not_found(path.clone()))?;
        if size < volume.size {
            return Err(rejected("PUT", path, "Implicit truncation not permitted."));
        }
        volume.size = size;
        Ok(volume.clone())
    }

    fn move_volume(&mut self, name: &str, container: &str) -> Result<Volume, ApiError> {
        self.live_volume(name)?;
        let short = short_name(name);
        let target = if container.is_empty() {
            short.to_owned()
        } else {
            if !self.vgroups.contains(container) {
                return Err(not_found(format!("vgroup/{container}")));
            }
            format!("{container}/{short}")
        };
        if target == name {
            return self.live_volume(name).cloned();
        }
        if self.volume_taken(&target) {
            return Err(rejected("PUT", format!("volume/{name}"), "Volume already exists."));
        }
        self.move_volume_entry(name, &target)
    }

    fn create_snapshot(&mut self, name: &str) -> Result<Volume, ApiError> {
        let source = self.live_volume(name)?.clone();
        let sequence = self.snapshots.len() + 1;
        let snapshot = Volume {
            name: format!("{name}.snap-{sequence}"),
            serial: self.next_serial(),
            source: Some(source.name.clone()),
            ..source
        };
        self.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    fn destroy_volume(&mut self, name: &str) -> Result<Volume, ApiError> {
        let mut volume = self
            .volumes
            .remove(name)
            .ok_or_else(|| not_found(format!("volume/{name}")))?;
        self.connections.retain(|(_, connection)| connection.vol != name);
        volume.time_remaining = Some(ERADICATION_DELAY);
        self.destroyed_volumes.insert(name.to_owned(), volume.clone());
        Ok(volume)
    }

    fn eradicate_volume(&mut self, name: &str) -> Result<(), ApiError> {
        self.destroyed_volumes
            .remove(name)
            .map(drop)
            .ok_or_else(|| not_found(format!("volume/{name}")))
    }

    fn list_volumes(&self, pending_only: bool) -> Vec<Volume> {
        let source = if pending_only {
            &self.destroyed_volumes
        } else {
            &self.volumes
        };
        source.values().cloned().collect()
    }

    fn stored_host(&self, name: &str) -> Result<&StoredHost, ApiError> {
        self.hosts
            .get(name)
            .ok_or_else(|| not_found(format!("host/{name}")))
    }

    fn create_host(&mut self, name: &str, request: &HostCreate) -> Result<Host, ApiError> {
        if self.hosts.contains_key(name) {
            return Err(rejected("POST", format!("host/{name}"), "Host already exists."));
        }
        let host = Host {
            name: name.to_owned(),
            wwn: request.wwnlist.clone(),
            iqn: request.iqnlist.clone(),
            hgroup: None,
        };
        let stored = StoredHost {
            host: host.clone(),
            personality: None,
            chap: HostChap {
                name: name.to_owned(),
                ..HostChap::default()
            },
        };
        self.hosts.insert(name.to_owned(), stored);
        Ok(host)
    }

    fn host_chap(&self, name: &str) -> Result<HostChap, ApiError> {
        let chap = &self.stored_host(name)?.chap;
        let mask = |secret: &Option<String>| secret.as_ref().map(|_| String::from("****"));
        Ok(HostChap {
            host_password: mask(&chap.host_password),
            target_password: mask(&chap.target_password),
            ..chap.clone()
        })
    }

    fn rename_host(&mut self, name: &str, new_name: &str) -> Result<(), ApiError> {
        if self.hosts.contains_key(new_name) {
            return Err(rejected("PUT", format!("host/{name}"), "Host already exists."));
        }
        let mut stored = self
            .hosts
            .remove(name)
            .ok_or_else(|| not_found(format!("host/{name}")))?;
        new_name.clone_into(&mut stored.host.name);
        new_name.clone_into(&mut stored.chap.name);
        self.hosts.insert(new_name.to_owned(), stored);
        self.rename_holder(Holder::Host, name, new_name);
        for group in self.hostgroups.values_mut() {
            for member in &mut group.hosts {
                if member == name {
                    new_name.clone_into(member);
                }
            }
        }
        Ok(())
    }

    fn rename_holder(&mut self, holder: Holder, name: &str, new_name: &str) {
        for (kind, connection) in &mut self.connections {
            if *kind == holder && connection.name == name {
                new_name.clone_into(&mut connection.name);
            }
        }
    }

    fn set_host(&mut self, name: &str, patch: &HostPatch) -> Result<Host, ApiError> {
        self.stored_host(name)?;
        let current = match patch.name.as_deref() {
            Some(new_name) if new_name != name => {
                self.rename_host(name, new_name)?;
                new_name
            }
            _ => name,
        };
        let stored = self
            .hosts
            .get_mut(current)
            .ok_or_else(|| not_found(format!("host/{current}")))?;
        if let Some(wwns) = &patch.wwnlist {
            stored.host.wwn.clone_from(wwns);
        }
        if let Some(iqns) = &patch.iqnlist {
            stored.host.iqn.clone_from(iqns);
        }
        if let Some(personality) = &patch.personality {
            stored.personality = non_empty(personality);
        }
        let chap = &mut stored.chap;
        for (field, value) in [
            (&mut chap.host_user, &patch.host_user),
            (&mut chap.host_password, &patch.host_password),
            (&mut chap.target_user, &patch.target_user),
            (&mut chap.target_password, &patch.target_password),
        ] {
            if let Some(text) = value {
                *field = non_empty(text);
            }
        }
        Ok(stored.host.clone())
    }

    fn delete_host(&mut self, name: &str) -> Result<(), ApiError> {
        self.stored_host(name)?;
        if !self.connections_of(Holder::Host, name).is_empty() {
            return Err(rejected("DELETE", format!("host/{name}"), "Host has connected volumes."));
        }
        self.hosts.remove(name);
        for group in self.hostgroups.values_mut() {
            group.hosts.retain(|member| member != name);
        }
        Ok(())
    }

    fn ensure_holder(&self, holder: Holder, name: &str) -> Result<(), ApiError> {
        let exists = match holder {
            Holder::Host => self.hosts.contains_key(name),
            Holder::Hostgroup => self.hostgroups.contains_key(name),
        };
        if exists {
            Ok(())
        } else {
            Err(not_found(format!("{}/{name}", holder.collection())))
        }
    }

    fn connections_of(&self, holder: Holder, name: &str) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|(kind, connection)| *kind == holder && connection.name == name)
            .map(|(_, connection)| connection.clone())
            .collect()
    }

    fn connect(
        &mut self,
        holder: Holder,
        name: &str,
        volume: &str,
        lun: Option<u32>,
    ) -> Result<Connection, ApiError> {
        self.ensure_holder(holder, name)?;
        self.live_volume(volume)?;
        let path = format!("{}/{name}/volume/{volume}", holder.collection());
        let existing = self.connections_of(holder, name);
        if existing.iter().any(|connection| connection.vol == volume) {
            return Err(rejected("POST", path, "Connection already exists."));
        }
        let in_use = |candidate: u32| existing.iter().any(|connection| connection.lun == candidate);
        let assigned = match lun {
            Some(requested) if in_use(requested) => {
                return Err(rejected("POST", path, "LUN is already in use."));
            }
            Some(requested) => requested,
            None => (1..).find(|candidate| !in_use(*candidate)).unwrap_or(1),
        };
        let connection = Connection {
            name: name.to_owned(),
            vol: volume.to_owned(),
            lun: assigned,
        };
        self.connections.push((holder, connection.clone()));
        Ok(connection)
    }

    fn disconnect(&mut self, holder: Holder, name: &str, volume: &str) -> Result<(), ApiError> {
        let position = self
            .connections
            .iter()
            .position(|(kind, connection)| {
                *kind == holder && connection.name == name && connection.vol == volume
            })
            .ok_or_else(|| not_found(format!("{}/{name}/volume/{volume}", holder.collection())))?;
        self.connections.remove(position);
        Ok(())
    }

    fn list_connections(&self, holder: Holder, name: &str) -> Result<Vec<Connection>, ApiError> {
        self.ensure_holder(holder, name)?;
        Ok(self.connections_of(holder, name))
    }

    fn assign_members(&mut self, group: &str, hosts: &[String]) -> Result<(), ApiError> {
        if let Some(missing) = hosts.iter().find(|host| !self.hosts.contains_key(*host)) {
            return Err(not_found(format!("host/{missing}")));
        }
        for stored in self.hosts.values_mut() {
            if hosts.contains(&stored.host.name) {
                stored.host.hgroup = Some(group.to_owned());
            } else if stored.host.hgroup.as_deref() == Some(group) {
                stored.host.hgroup = None;
            }
        }
        Ok(())
    }

    fn create_hostgroup(&mut self, name: &str, hosts: &[String]) -> Result<Hostgroup, ApiError> {
        if self.hostgroups.contains_key(name) {
            return Err(rejected("POST", format!("hgroup/{name}"), "Host group already exists."));
        }
        self.assign_members(name, hosts)?;
        let group = Hostgroup {
            name: name.to_owned(),
            hosts: hosts.to_vec(),
        };
        self.hostgroups.insert(name.to_owned(), group.clone());
        Ok(group)
    }

    fn set_hostgroup(&mut self, name: &str, patch: &HostgroupPatch) -> Result<Hostgroup, ApiError> {
        self.ensure_holder(Holder::Hostgroup, name)?;
        let mut current = name.to_owned();
        if let Some(new_name) = patch.name.as_deref()
            && new_name != name
        {
            if self.hostgroups.contains_key(new_name) {
                return Err(rejected("PUT", format!("hgroup/{name}"), "Host group already exists."));
            }
            if let Some(mut group) = self.hostgroups.remove(name) {
                new_name.clone_into(&mut group.name);
                self.hostgroups.insert(new_name.to_owned(), group);
            }
            self.rename_holder(Holder::Hostgroup, name, new_name);
            for stored in self.hosts.values_mut() {
                if stored.host.hgroup.as_deref() == Some(name) {
                    stored.host.hgroup = Some(new_name.to_owned());
                }
            }
            new_name.clone_into(&mut current);
        }
        if let Some(hosts) = &patch.hostlist {
            self.assign_members(&current, hosts)?;
            if let Some(group) = self.hostgroups.get_mut(&current) {
                group.hosts.clone_from(hosts);
            }
        }
        self.hostgroups
            .get(&current)
            .cloned()
            .ok_or_else(|| not_found(format!("hgroup/{current}")))
    }

    fn delete_hostgroup(&mut self, name: &str) -> Result<(), ApiError> {
        let path = format!("hgroup/{name}");
        let group = self
            .hostgroups
            .get(name)
            .ok_or_else(|| not_found(path.clone()))?;
        if !group.hosts.is_empty() {
            return Err(rejected("DELETE", path, "Host group is not empty."));
        }
        if !self.connections_of(Holder::Hostgroup, name).is_empty() {
            return Err(rejected("DELETE", path, "Host group has connected volumes."));
        }
        self.hostgroups.remove(name);
        Ok(())
    }

    fn pgroup_taken(&self, name: &str) -> bool {
        self.pgroups.contains_key(name) || self.destroyed_pgroups.contains_key(name)
    }

    fn live_pgroup(&self, name: &str) -> Result<&StoredPgroup, ApiError> {
        self.pgroups
            .get(name)
            .ok_or_else(|| not_found(format!("pgroup/{name}")))
    }

    fn create_pgroup(&mut self, name: &str, request: &PgroupCreate) -> Result<Pgroup, ApiError> {
        if self.pgroup_taken(name) {
            return Err(rejected(
                "POST",
                format!("pgroup/{name}"),
                "Protection group already exists.",
            ));
        }
        let group = Pgroup {
            name: name.to_owned(),
            hosts: non_empty_list(&request.hostlist),
            hgroups: non_empty_list(&request.hgrouplist),
            volumes: non_empty_list(&request.vollist),
            targets: targets(&request.targetlist),
            time_remaining: None,
        };
        let stored = StoredPgroup {
            group: group.clone(),
            schedule: PgroupSchedule {
                name: name.to_owned(),
                snap_enabled: false,
                snap_frequency: 3600,
                snap_at: None,
                replicate_enabled: false,
                replicate_frequency: 14_400,
                replicate_at: None,
            },
            retention: PgroupRetention {
                name: name.to_owned(),
                all_for: 86_400,
                per_day: 4,
                days: 7,
                target_all_for: 86_400,
                target_per_day: 4,
                target_days: 7,
            },
        };
        self.pgroups.insert(name.to_owned(), stored);
        Ok(group)
    }

    fn set_pgroup(&mut self, name: &str, patch: &PgroupPatch) -> Result<Pgroup, ApiError> {
        self.live_pgroup(name)?;
        let mut current = name.to_owned();
        if let Some(new_name) = patch.name.as_deref()
            && new_name != name
        {
            if self.pgroup_taken(new_name) {
                return Err(rejected(
                    "PUT",
                    format!("pgroup/{name}"),
                    "Protection group already exists.",
                ));
            }
            if let Some(mut stored) = self.pgroups.remove(name) {
                new_name.clone_into(&mut stored.group.name);
                new_name.clone_into(&mut stored.schedule.name);
                new_name.clone_into(&mut stored.retention.name);
                self.pgroups.insert(new_name.to_owned(), stored);
            }
            new_name.clone_into(&mut current);
        }
        let stored = self
            .pgroups
            .get_mut(&current)
            .ok_or_else(|| not_found(format!("pgroup/{current}")))?;

        let group = &mut stored.group;
        if let Some(list) = &patch.hostlist {
            group.hosts = non_empty_list(list);
        }
        if let Some(list) = &patch.hgrouplist {
            group.hgroups = non_empty_list(list);
        }
        if let Some(list) = &patch.vollist {
            group.volumes = non_empty_list(list);
        }
        if let Some(list) = &patch.targetlist {
            group.targets = targets(list);
        }

        let schedule = &mut stored.schedule;
        schedule.snap_enabled = patch.snap_enabled.unwrap_or(schedule.snap_enabled);
        schedule.replicate_enabled = patch.replicate_enabled.unwrap_or(schedule.replicate_enabled);
        schedule.snap_frequency = patch.snap_frequency.unwrap_or(schedule.snap_frequency);
        schedule.replicate_frequency = patch
            .replicate_frequency
            .unwrap_or(schedule.replicate_frequency);
        if patch.snap_at.is_some() {
            schedule.snap_at = patch.snap_at;
        }
        if patch.replicate_at.is_some() {
            schedule.replicate_at = patch.replicate_at;
        }

        let retention = &mut stored.retention;
        retention.all_for = patch.all_for.unwrap_or(retention.all_for);
        retention.per_day = patch.per_day.unwrap_or(retention.per_day);
        retention.days = patch.days.unwrap_or(retention.days);
        retention.target_all_for = patch.target_all_for.unwrap_or(retention.target_all_for);
        retention.target_per_day = patch.target_per_day.unwrap_or(retention.target_per_day);
        retention.target_days = patch.target_days.unwrap_or(retention.target_days);

        Ok(stored.group.clone())
    }

    fn destroy_pgroup(&mut self, name: &str) -> Result<(), ApiError> {
        let mut stored = self
            .pgroups
            .remove(name)
            .ok_or_else(|| not_found(format!("pgroup/{name}")))?;
        stored.group.time_remaining = Some(ERADICATION_DELAY);
        self.destroyed_pgroups.insert(name.to_owned(), stored);
        Ok(())
    }

    fn eradicate_pgroup(&mut self, name: &str) -> Result<(), ApiError> {
        self.destroyed_pgroups
            .remove(name)
            .map(drop)
            .ok_or_else(|| not_found(format!("pgroup/{name}")))
    }

    fn list_pgroups(&self, pending_only: bool) -> Vec<Pgroup> {
        let source = if pending_only {
            &self.destroyed_pgroups
        } else {
            &self.pgroups
        };
        source.values().map(|stored| stored.group.clone()).collect()
    }

    fn vgroup_view(&self, name: &str, time_remaining: Option<u64>) -> Vgroup {
        let prefix = format!("{name}/");
        Vgroup {
            name: name.to_owned(),
            volumes: self
                .volumes
                .keys()
                .filter(|volume| volume.starts_with(&prefix))
                .cloned()
                .collect(),
            time_remaining,
        }
    }

    fn create_vgroup(&mut self, name: &str) -> Result<Vgroup, ApiError> {
        if self.vgroups.contains(name) || self.destroyed_vgroups.contains(name) {
            return Err(rejected(
                "POST",
                format!("vgroup/{name}"),
                "Volume group already exists.",
            ));
        }
        self.vgroups.insert(name.to_owned());
        Ok(self.vgroup_view(name, None))
    }

    fn rename_vgroup(&mut self, name: &str, new_name: &str) -> Result<Vgroup, ApiError> {
        let path = format!("vgroup/{name}");
        if !self.vgroups.contains(name) {
            return Err(not_found(path));
        }
        if self.vgroups.contains(new_name) || self.destroyed_vgroups.contains(new_name) {
            return Err(rejected("PUT", path, "Volume group already exists."));
        }
        let members = self.vgroup_view(name, None).volumes;
        self.vgroups.remove(name);
        self.vgroups.insert(new_name.to_owned());
        for member in members {
            self.move_volume_entry(&member, &format!("{new_name}/{}", short_name(&member)))?;
        }
        Ok(self.vgroup_view(new_name, None))
    }

    fn destroy_vgroup(&mut self, name: &str) -> Result<(), ApiError> {
        let path = format!("vgroup/{name}");
        if !self.vgroups.contains(name) {
            return Err(not_found(path));
        }
        if !self.vgroup_view(name, None).volumes.is_empty() {
            return Err(rejected("DELETE", path, "Volume group is not empty."));
        }
        self.vgroups.remove(name);
        self.destroyed_vgroups.insert(name.to_owned());
        Ok(())
    }

    fn eradicate_vgroup(&mut self, name: &str) -> Result<(), ApiError> {
        if self.destroyed_vgroups.remove(name) {
            Ok(())
        } else {
            Err(not_found(format!("vgroup/{name}")))
        }
    }

    fn list_vgroups(&self, pending_only: bool) -> Vec<Vgroup> {
        if pending_only {
            self.destroyed_vgroups
                .iter()
                .map(|name| self.vgroup_view(name, Some(ERADICATION_DELAY)))
                .collect()
        } else {
            self.vgroups
                .iter()
                .map(|name| self.vgroup_view(name, None))
                .collect()
        }
    }

    fn create_alert(&mut self, email: &str) -> Result<Alert, ApiError> {
        if self.alerts.contains_key(email) {
            return Err(rejected(
                "POST",
                format!("alert/{email}"),
                "Alert recipient already exists.",
            ));
        }
        let alert = Alert {
            name: email.to_owned(),
            enabled: true,
        };
        self.alerts.insert(email.to_owned(), alert.clone());
        Ok(alert)
    }

    fn set_alert(&mut self, email: &str, enabled: bool) -> Result<Alert, ApiError> {
        let alert = self
            .alerts
            .get_mut(email)
            .ok_or_else(|| not_found(format!("alert/{email}")))?;
        alert.enabled = enabled;
        Ok(alert.clone())
    }

    fn delete_alert(&mut self, email: &str) -> Result<(), ApiError> {
        self.alerts
            .remove(email)
            .map(drop)
            .ok_or_else(|| not_found(format!("alert/{email}")))
    }
}

/// In-memory array used by unit and integration tests.
#[derive(Clone, Debug)]
pub struct MemoryArray {
    state: Arc<Mutex<ArrayState>>,
}

impl Default for MemoryArray {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryArray {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ArrayState::default())),
        }
    }

    /// Returns every call made so far as `"<operation> <subject>"`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Forgets the recorded calls.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Makes the next call to `operation` fail with `error`.
    pub async fn fail_next(&self, operation: &'static str, error: ApiError) {
        self.state.lock().await.failures.insert(operation, error);
    }

    /// Names of the snapshots taken so far.
    pub async fn snapshots(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .snapshots
            .iter()
            .map(|snapshot| snapshot.name.clone())
            .collect()
    }

    /// Number of volume connections held by hosts and host groups.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    fn call<'a, T, F>(&'a self, operation: &'static str, subject: &'a str, action: F) -> ApiFuture<'a, T>
    where
        T: Send + 'a,
        F: FnOnce(&mut ArrayState) -> Result<T, ApiError> + Send + 'a,
    {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.record(operation, subject)?;
            action(&mut state)
        })
    }
}

const fn listing(pending_only: bool) -> &'static str {
    if pending_only { "pending" } else { "" }
}

impl FlashArrayApi for MemoryArray {
    fn target(&self) -> &str {
        MEMORY_TARGET
    }

    fn get_array(&self) -> ApiFuture<'_, ArrayInfo> {
        self.call("get_array", "", |_| {
            Ok(ArrayInfo {
                id: String::from("5b8f8d3c-0001-4c3a-9f00-memoryarray"),
                array_name: String::from("memory-array"),
                version: String::from("6.1.0"),
                revision: String::from("2024.01.01"),
            })
        })
    }

    fn create_volume<'a>(&'a self, name: &'a str, size: u64) -> ApiFuture<'a, Volume> {
        self.call("create_volume", name, move |state| state.create_volume(name, size))
    }

    fn copy_volume<'a>(
        &'a self,
        name: &'a str,
        source: &'a str,
        overwrite: bool,
    ) -> ApiFuture<'a, Volume> {
        self.call("copy_volume", name, move |state| {
            state.copy_volume(name, source, overwrite)
        })
    }

    fn get_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Volume>> {
        self.call("get_volume", name, move |state| {
            Ok(state.volumes.get(name).cloned())
        })
    }

    fn rename_volume<'a>(&'a self, name: &'a str, new_name: &'a str) -> ApiFuture<'a, Volume> {
        self.call("rename_volume", name, move |state| {
            state.rename_volume(name, new_name)
        })
    }

    fn extend_volume<'a>(&'a self, name: &'a str, size: u64) -> ApiFuture<'a, Volume> {
        self.call("extend_volume", name, move |state| state.extend_volume(name, size))
    }

    fn move_volume<'a>(&'a self, name: &'a str, container: &'a str) -> ApiFuture<'a, Volume> {
        self.call("move_volume", name, move |state| {
            state.move_volume(name, container)
        })
    }

    fn create_snapshot<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Volume> {
        self.call("create_snapshot", name, move |state| state.create_snapshot(name))
    }

    fn destroy_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Volume> {
        self.call("destroy_volume", name, move |state| state.destroy_volume(name))
    }

    fn eradicate_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.call("eradicate_volume", name, move |state| {
            state.eradicate_volume(name)
        })
    }

    fn list_volumes(&self, pending_only: bool) -> ApiFuture<'_, Vec<Volume>> {
        self.call("list_volumes", listing(pending_only), move |state| {
            Ok(state.list_volumes(pending_only))
        })
    }

    fn create_host<'a>(&'a self, name: &'a str, request: &'a HostCreate) -> ApiFuture<'a, Host> {
        self.call("create_host", name, move |state| state.create_host(name, request))
    }

    fn get_host<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Host>> {
        self.call("get_host", name, move |state| {
            Ok(state.hosts.get(name).map(|stored| stored.host.clone()))
        })
    }

    fn get_host_personality<'a>(&'a self, name: &'a str) -> ApiFuture<'a, HostPersonality> {
        self.call("get_host_personality", name, move |state| {
            let stored = state.stored_host(name)?;
            Ok(HostPersonality {
                name: name.to_owned(),
                personality: stored.personality.clone(),
            })
        })
    }

    fn get_host_chap<'a>(&'a self, name: &'a str) -> ApiFuture<'a, HostChap> {
        self.call("get_host_chap", name, move |state| state.host_chap(name))
    }

    fn set_host<'a>(&'a self, name: &'a str, patch: &'a HostPatch) -> ApiFuture<'a, Host> {
        self.call("set_host", name, move |state| state.set_host(name, patch))
    }

    fn delete_host<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.call("delete_host", name, move |state| state.delete_host(name))
    }

    fn connect_host<'a>(
        &'a self,
        name: &'a str,
        volume: &'a str,
        lun: Option<u32>,
    ) -> ApiFuture<'a, Connection> {
        self.call("connect_host", name, move |state| {
            state.connect(Holder::Host, name, volume, lun)
        })
    }

    fn disconnect_host<'a>(&'a self, name: &'a str, volume: &'a str) -> ApiFuture<'a, ()> {
        self.call("disconnect_host", name, move |state| {
            state.disconnect(Holder::Host, name, volume)
        })
    }

    fn list_host_connections<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<Connection>> {
        self.call("list_host_connections", name, move |state| {
            state.list_connections(Holder::Host, name)
        })
    }

    fn create_hostgroup<'a>(
        &'a self,
        name: &'a str,
        hosts: &'a [String],
    ) -> ApiFuture<'a, Hostgroup> {
        self.call("create_hostgroup", name, move |state| {
            state.create_hostgroup(name, hosts)
        })
    }

    fn get_hostgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Hostgroup>> {
        self.call("get_hostgroup", name, move |state| {
            Ok(state.hostgroups.get(name).cloned())
        })
    }

    fn set_hostgroup<'a>(
        &'a self,
        name: &'a str,
        patch: &'a HostgroupPatch,
    ) -> ApiFuture<'a, Hostgroup> {
        self.call("set_hostgroup", name, move |state| {
            state.set_hostgroup(name, patch)
        })
    }

    fn delete_hostgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.call("delete_hostgroup", name, move |state| {
            state.delete_hostgroup(name)
        })
    }

    fn connect_hostgroup<'a>(
        &'a self,
        name: &'a str,
        volume: &'a str,
        lun: Option<u32>,
    ) -> ApiFuture<'a, Connection> {
        self.call("connect_hostgroup", name, move |state| {
            state.connect(Holder::Hostgroup, name, volume, lun)
        })
    }

    fn disconnect_hostgroup<'a>(&'a self, name: &'a str, volume: &'a str) -> ApiFuture<'a, ()> {
        self.call("disconnect_hostgroup", name, move |state| {
            state.disconnect(Holder::Hostgroup, name, volume)
        })
    }

    fn list_hostgroup_connections<'a>(
        &'a self,
        name: &'a str,
    ) -> ApiFuture<'a, Vec<Connection>> {
        self.call("list_hostgroup_connections", name, move |state| {
            state.list_connections(Holder::Hostgroup, name)
        })
    }

    fn create_pgroup<'a>(
        &'a self,
        name: &'a str,
        request: &'a PgroupCreate,
    ) -> ApiFuture<'a, Pgroup> {
        self.call("create_pgroup", name, move |state| {
            state.create_pgroup(name, request)
        })
    }

    fn get_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Pgroup>> {
        self.call("get_pgroup", name, move |state| {
            Ok(state.pgroups.get(name).map(|stored| stored.group.clone()))
        })
    }

    fn get_pgroup_schedule<'a>(&'a self, name: &'a str) -> ApiFuture<'a, PgroupSchedule> {
        self.call("get_pgroup_schedule", name, move |state| {
            Ok(state.live_pgroup(name)?.schedule.clone())
        })
    }

    fn get_pgroup_retention<'a>(&'a self, name: &'a str) -> ApiFuture<'a, PgroupRetention> {
        self.call("get_pgroup_retention", name, move |state| {
            Ok(state.live_pgroup(name)?.retention.clone())
        })
    }

    fn set_pgroup<'a>(&'a self, name: &'a str, patch: &'a PgroupPatch) -> ApiFuture<'a, Pgroup> {
        self.call("set_pgroup", name, move |state| state.set_pgroup(name, patch))
    }

    fn destroy_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.call("destroy_pgroup", name, move |state| state.destroy_pgroup(name))
    }

    fn eradicate_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.call("eradicate_pgroup", name, move |state| {
            state.eradicate_pgroup(name)
        })
    }

    fn list_pgroups(&self, pending_only: bool) -> ApiFuture<'_, Vec<Pgroup>> {
        self.call("list_pgroups", listing(pending_only), move |state| {
            Ok(state.list_pgroups(pending_only))
        })
    }

    fn create_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vgroup> {
        self.call("create_vgroup", name, move |state| state.create_vgroup(name))
    }

    fn get_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Vgroup>> {
        self.call("get_vgroup", name, move |state| {
            Ok(state
                .vgroups
                .contains(name)
                .then(|| state.vgroup_view(name, None)))
        })
    }

    fn rename_vgroup<'a>(&'a self, name: &'a str, new_name: &'a str) -> ApiFuture<'a, Vgroup> {
        self.call("rename_vgroup", name, move |state| {
            state.rename_vgroup(name, new_name)
        })
    }

    fn destroy_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.call("destroy_vgroup", name, move |state| state.destroy_vgroup(name))
    }

    fn eradicate_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.call("eradicate_vgroup", name, move |state| {
            state.eradicate_vgroup(name)
        })
    }

    fn list_vgroups(&self, pending_only: bool) -> ApiFuture<'_, Vec<Vgroup>> {
        self.call("list_vgroups", listing(pending_only), move |state| {
            Ok(state.list_vgroups(pending_only))
        })
    }

    fn get_dns(&self) -> ApiFuture<'_, DnsSettings> {
        self.call("get_dns", "", |state| Ok(state.dns.clone()))
    }

    fn set_dns<'a>(&'a self, patch: &'a DnsPatch) -> ApiFuture<'a, DnsSettings> {
        self.call("set_dns", "", move |state| {
            state.dns = DnsSettings {
                domain: patch.domain.clone(),
                nameservers: patch.nameservers.clone(),
            };
            Ok(state.dns.clone())
        })
    }

    fn create_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, Alert> {
        self.call("create_alert", email, move |state| state.create_alert(email))
    }

    fn get_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, Option<Alert>> {
        self.call("get_alert", email, move |state| {
            Ok(state.alerts.get(email).cloned())
        })
    }

    fn set_alert<'a>(&'a self, email: &'a str, enabled: bool) -> ApiFuture<'a, Alert> {
        self.call("set_alert", email, move |state| state.set_alert(email, enabled))
    }

    fn delete_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, ()> {
        self.call("delete_alert", email, move |state| state.delete_alert(email))
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    /// A `None` value removes the variable for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
