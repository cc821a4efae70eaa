//! `purefa_protectiongroup`: protection groups with snapshot and
//! replication schedules and retention policies.
//!
//! The array exposes members, schedule and retention as three views of the
//! same object. Reads merge them; writes go out as separate typed requests
//! carrying only the fields that changed.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Progress, Resource, ResourceError, ResourceFuture, Tracked};
use crate::backend::{FlashArrayApi, OptionalExt, PgroupCreate, PgroupPatch};
use crate::schema::{Attribute, AttributeType, Schema};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_protectiongroup";

/// Attributes of a protection group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct PgroupModel {
    /// Group name.
    pub name: String,
    /// Member hosts.
    pub hosts: Vec<String>,
    /// Member host groups.
    pub hgroups: Vec<String>,
    /// Member volumes.
    pub volumes: Vec<String>,
    /// Replication targets.
    pub targets: Vec<String>,
    /// Local snapshots enabled.
    pub snap_enabled: Option<bool>,
    /// Seconds between snapshots.
    pub snap_frequency: Option<u64>,
    /// Preferred snapshot time, in seconds after midnight.
    pub snap_at: Option<u64>,
    /// Replication enabled.
    pub replicate_enabled: Option<bool>,
    /// Seconds between replications.
    pub replicate_frequency: Option<u64>,
    /// Preferred replication time, in seconds after midnight.
    pub replicate_at: Option<u64>,
    /// Seconds every local snapshot is kept.
    pub all_for: Option<u64>,
    /// Local snapshots kept per day after `all_for`.
    pub per_day: Option<u64>,
    /// Days the per-day local snapshots are kept.
    pub days: Option<u64>,
    /// Seconds every replicated snapshot is kept on targets.
    pub target_all_for: Option<u64>,
    /// Replicated snapshots kept per day after `target_all_for`.
    pub target_per_day: Option<u64>,
    /// Days the per-day replicated snapshots are kept.
    pub target_days: Option<u64>,
}

const MEMBER_LISTS: [&str; 3] = ["hosts", "hgroups", "volumes"];

fn member_list(name: &'static str, description: &'static str) -> Attribute {
    let others: Vec<&'static str> = MEMBER_LISTS
        .into_iter()
        .filter(|other| *other != name)
        .collect();
    Attribute::optional(name, AttributeType::List)
        .describe(description)
        .with_conflicts(&others)
}

fn schedule_field(name: &'static str, kind: AttributeType) -> Attribute {
    Attribute::optional(name, kind).with_computed()
}

/// Schema of `purefa_protectiongroup`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::required("name", AttributeType::String).describe("Protection group name."),
        member_list("hosts", "Member hosts."),
        member_list("hgroups", "Member host groups."),
        member_list("volumes", "Member volumes."),
        Attribute::optional("targets", AttributeType::List).describe("Replication targets."),
        schedule_field("snap_enabled", AttributeType::Bool),
        schedule_field("snap_frequency", AttributeType::Int),
        schedule_field("snap_at", AttributeType::Int),
        schedule_field("replicate_enabled", AttributeType::Bool),
        schedule_field("replicate_frequency", AttributeType::Int),
        schedule_field("replicate_at", AttributeType::Int),
        schedule_field("all_for", AttributeType::Int),
        schedule_field("per_day", AttributeType::Int),
        schedule_field("days", AttributeType::Int),
        schedule_field("target_all_for", AttributeType::Int),
        schedule_field("target_per_day", AttributeType::Int),
        schedule_field("target_days", AttributeType::Int),
    ])
}

fn changed<T: PartialEq + Copy>(new: Option<T>, old: Option<T>) -> Option<T> {
    new.filter(|value| Some(*value) != old)
}

fn list_changed(new: &[String], old: &[String]) -> Option<Vec<String>> {
    (new != old).then(|| new.to_vec())
}

impl PgroupModel {
    fn member_patch(&self, old: &Self) -> PgroupPatch {
        PgroupPatch {
            hostlist: list_changed(&self.hosts, &old.hosts),
            hgrouplist: list_changed(&self.hgroups, &old.hgroups),
            vollist: list_changed(&self.volumes, &old.volumes),
            targetlist: list_changed(&self.targets, &old.targets),
            ..PgroupPatch::default()
        }
    }

    fn schedule_patch(&self, old: &Self) -> PgroupPatch {
        PgroupPatch {
            snap_frequency: changed(self.snap_frequency, old.snap_frequency),
            snap_at: changed(self.snap_at, old.snap_at),
            replicate_frequency: changed(self.replicate_frequency, old.replicate_frequency),
            replicate_at: changed(self.replicate_at, old.replicate_at),
            ..PgroupPatch::default()
        }
    }

    fn flags_patch(&self, old: &Self) -> PgroupPatch {
        PgroupPatch {
            snap_enabled: changed(self.snap_enabled, old.snap_enabled),
            replicate_enabled: changed(self.replicate_enabled, old.replicate_enabled),
            ..PgroupPatch::default()
        }
    }

    fn retention_patch(&self, old: &Self) -> PgroupPatch {
        PgroupPatch {
            all_for: changed(self.all_for, old.all_for),
            per_day: changed(self.per_day, old.per_day),
            days: changed(self.days, old.days),
            target_all_for: changed(self.target_all_for, old.target_all_for),
            target_per_day: changed(self.target_per_day, old.target_per_day),
            target_days: changed(self.target_days, old.target_days),
            ..PgroupPatch::default()
        }
    }
}

async fn apply_settings(
    api: &dyn FlashArrayApi,
    id: &str,
    planned: &PgroupModel,
    old: &PgroupModel,
) -> Result<bool, ResourceError> {
    let mut sent = false;
    for patch in [
        planned.schedule_patch(old),
        planned.flags_patch(old),
        planned.retention_patch(old),
    ] {
        if !patch.is_empty() {
            api.set_pgroup(id, &patch).await?;
            sent = true;
        }
    }
    Ok(sent)
}

/// Creates the group, then applies schedule, enable flags and retention.
///
/// # Errors
///
/// Propagates array errors. Once the group exists, failures come back as
/// [`ResourceError::Partial`].
pub async fn create(
    api: &dyn FlashArrayApi,
    planned: &PgroupModel,
) -> Result<Tracked<PgroupModel>, ResourceError> {
    let request = PgroupCreate {
        hostlist: planned.hosts.clone(),
        hgrouplist: planned.hgroups.clone(),
        vollist: planned.volumes.clone(),
        targetlist: planned.targets.clone(),
    };
    let group = api.create_pgroup(&planned.name, &request).await?;
    let created = PgroupModel {
        name: group.name.clone(),
        hosts: planned.hosts.clone(),
        hgroups: planned.hgroups.clone(),
        volumes: planned.volumes.clone(),
        targets: planned.targets.clone(),
        ..PgroupModel::default()
    };
    let progress = Progress::created(TYPE_NAME, Tracked::new(group.name.clone(), created));
    let result = configure(api, group.name, planned).await;
    progress.settle(result)
}

async fn configure(
    api: &dyn FlashArrayApi,
    name: String,
    planned: &PgroupModel,
) -> Result<Tracked<PgroupModel>, ResourceError> {
    apply_settings(api, &name, planned, &PgroupModel::default()).await?;
    refreshed(api, name).await
}

/// Refreshes a protection group from its three views.
///
/// # Errors
///
/// Propagates array errors other than "does not exist".
pub async fn read(
    api: &dyn FlashArrayApi,
    id: &str,
) -> Result<Option<Tracked<PgroupModel>>, ResourceError> {
    let Some(group) = api.get_pgroup(id).await? else {
        warn!(kind = TYPE_NAME, id, "object no longer exists; clearing id");
        return Ok(None);
    };
    let schedule = api.get_pgroup_schedule(id).await?;
    let retention = api.get_pgroup_retention(id).await?;

    let state = PgroupModel {
        name: group.name.clone(),
        hosts: group.hosts.unwrap_or_default(),
        hgroups: group.hgroups.unwrap_or_default(),
        volumes: group.volumes.unwrap_or_default(),
        targets: group
            .targets
            .unwrap_or_default()
            .into_iter()
            .map(|target| target.name)
            .collect(),
        snap_enabled: Some(schedule.snap_enabled),
        snap_frequency: Some(schedule.snap_frequency),
        snap_at: schedule.snap_at,
        replicate_enabled: Some(schedule.replicate_enabled),
        replicate_frequency: Some(schedule.replicate_frequency),
        replicate_at: schedule.replicate_at,
        all_for: Some(retention.all_for),
        per_day: Some(retention.per_day),
        days: Some(retention.days),
        target_all_for: Some(retention.target_all_for),
        target_per_day: Some(retention.target_per_day),
        target_days: Some(retention.target_days),
    };
    Ok(Some(Tracked::new(group.name, state)))
}

async fn refreshed(api: &dyn FlashArrayApi, id: String) -> Result<Tracked<PgroupModel>, ResourceError> {
    read(api, &id)
        .await?
        .ok_or(ResourceError::NotFound { kind: TYPE_NAME, id })
}

/// Applies rename, member and target lists, then schedule, flags and
/// retention changes.
///
/// # Errors
///
/// Propagates array errors. Failures after an accepted change come back as
/// [`ResourceError::Partial`].
pub async fn update(
    api: &dyn FlashArrayApi,
    prior: &Tracked<PgroupModel>,
    planned: &PgroupModel,
) -> Result<Tracked<PgroupModel>, ResourceError> {
    let mut progress = Progress::unchanged(TYPE_NAME, prior.clone());
    let result = apply_update(api, prior, planned, &mut progress).await;
    progress.settle(result)
}

async fn apply_update(
    api: &dyn FlashArrayApi,
    prior: &Tracked<PgroupModel>,
    planned: &PgroupModel,
    progress: &mut Progress<PgroupModel>,
) -> Result<Tracked<PgroupModel>, ResourceError> {
    let mut id = prior.id.clone();

    if planned.name != prior.state.name {
        let patch = PgroupPatch {
            name: Some(planned.name.clone()),
            ..PgroupPatch::default()
        };
        id = api.set_pgroup(&id, &patch).await?.name;
        progress.accept(|confirmed| {
            confirmed.id.clone_from(&id);
            confirmed.state.name.clone_from(&planned.name);
        });
    }

    let members = planned.member_patch(&prior.state);
    if !members.is_empty() {
        api.set_pgroup(&id, &members).await?;
        progress.accept(|confirmed| {
            let state = &mut confirmed.state;
            state.hosts.clone_from(&planned.hosts);
            state.hgroups.clone_from(&planned.hgroups);
            state.volumes.clone_from(&planned.volumes);
            state.targets.clone_from(&planned.targets);
        });
    }
    if apply_settings(api, &id, planned, &prior.state).await? {
        progress.accept(|confirmed| confirmed.state.clone_from(planned));
    }

    refreshed(api, id).await
}

/// Destroys the group; it stays recoverable until eradicated.
///
/// # Errors
///
/// Propagates array errors other than "does not exist".
pub async fn delete(api: &dyn FlashArrayApi, id: &str) -> Result<(), ResourceError> {
    api.destroy_pgroup(id).await.optional()?;
    Ok(())
}

/// Lifecycle handlers for `purefa_protectiongroup`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PgroupResource;

impl Resource for PgroupResource {
    type Model = PgroupModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a PgroupModel,
    ) -> ResourceFuture<'a, Tracked<PgroupModel>> {
        Box::pin(create(api, planned))
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<PgroupModel>,
    ) -> ResourceFuture<'a, Option<Tracked<PgroupModel>>> {
        Box::pin(read(api, &prior.id))
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<PgroupModel>,
        planned: &'a PgroupModel,
    ) -> ResourceFuture<'a, Tracked<PgroupModel>> {
        Box::pin(update(api, prior, planned))
    }

    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<PgroupModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(delete(api, &prior.id))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn member_lists_are_mutually_exclusive() {
        let config = json!({ "name": "pg", "hosts": ["h"], "volumes": ["v"] });
        let errors = schema()
            .validate(&config)
            .expect_err("hosts and volumes together should be rejected");
        assert!(errors.mentions("hosts"));
    }

    #[test]
    fn patches_carry_only_changed_fields() {
        let old = PgroupModel {
            snap_frequency: Some(3600),
            all_for: Some(86_400),
            ..PgroupModel::default()
        };
        let new = PgroupModel {
            snap_frequency: Some(3600),
            replicate_frequency: Some(7200),
            all_for: Some(172_800),
            ..PgroupModel::default()
        };
        assert_eq!(
            new.schedule_patch(&old),
            PgroupPatch {
                replicate_frequency: Some(7200),
                ..PgroupPatch::default()
            }
        );
        assert!(new.flags_patch(&old).is_empty());
        assert_eq!(new.retention_patch(&old).all_for, Some(172_800));
    }
}
