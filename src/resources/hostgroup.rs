//! `purefa_hostgroup`: host groups and their shared volume connections.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::host::volume_attribute;
use super::{Progress, Resource, ResourceError, ResourceFuture, Tracked};
use crate::backend::{FlashArrayApi, HostgroupPatch, OptionalExt};
use crate::connections::{self, Attachment, VolumeConnection};
use crate::schema::{Attribute, AttributeType, Schema};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_hostgroup";

/// Attributes of a host group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct HostgroupModel {
    /// Group name.
    pub name: String,
    /// Member hosts.
    pub hosts: Vec<String>,
    /// Shared volume connections.
    pub volume: Vec<VolumeConnection>,
}

/// Schema of `purefa_hostgroup`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::required("name", AttributeType::String).describe("Host group name."),
        Attribute::optional("hosts", AttributeType::List).describe("Member hosts."),
        volume_attribute(),
    ])
}

/// Creates the group with its members, then connects the declared volumes.
///
/// # Errors
///
/// Propagates array errors. Once the group exists, failures come back as
/// [`ResourceError::Partial`].
pub async fn create(
    api: &dyn FlashArrayApi,
    planned: &HostgroupModel,
) -> Result<Tracked<HostgroupModel>, ResourceError> {
    let group = api.create_hostgroup(&planned.name, &planned.hosts).await?;
    let created = HostgroupModel {
        name: group.name.clone(),
        hosts: group.hosts,
        volume: Vec::new(),
    };
    let progress = Progress::created(TYPE_NAME, Tracked::new(group.name.clone(), created));
    let result = connect_planned(api, group.name, planned).await;
    progress.settle(result)
}

async fn connect_planned(
    api: &dyn FlashArrayApi,
    name: String,
    planned: &HostgroupModel,
) -> Result<Tracked<HostgroupModel>, ResourceError> {
    let changes = connections::diff(&[], &planned.volume);
    Attachment::Hostgroup(&name).apply(api, &changes).await?;
    refreshed(api, name, planned).await
}

/// Refreshes a host group.
///
/// # Errors
///
/// Propagates array errors other than "does not exist".
pub async fn read(
    api: &dyn FlashArrayApi,
    id: &str,
    known: &HostgroupModel,
) -> Result<Option<Tracked<HostgroupModel>>, ResourceError> {
    let Some(group) = api.get_hostgroup(id).await? else {
        warn!(kind = TYPE_NAME, id, "object no longer exists; clearing id");
        return Ok(None);
    };
    let connected = Attachment::Hostgroup(id).current(api).await?;
    let state = HostgroupModel {
        name: group.name.clone(),
        hosts: group.hosts,
        volume: connections::reconcile(&known.volume, connected),
    };
    Ok(Some(Tracked::new(group.name, state)))
}

async fn refreshed(
    api: &dyn FlashArrayApi,
    id: String,
    known: &HostgroupModel,
) -> Result<Tracked<HostgroupModel>, ResourceError> {
    read(api, &id, known)
        .await?
        .ok_or(ResourceError::NotFound { kind: TYPE_NAME, id })
}

/// Applies rename, member list replacement and connection changes.
///
/// # Errors
///
/// Propagates array errors. Failures after an accepted change come back as
/// [`ResourceError::Partial`].
pub async fn update(
    api: &dyn FlashArrayApi,
    prior: &Tracked<HostgroupModel>,
    planned: &HostgroupModel,
) -> Result<Tracked<HostgroupModel>, ResourceError> {
    let mut progress = Progress::unchanged(TYPE_NAME, prior.clone());
    let result = apply_update(api, prior, planned, &mut progress).await;
    progress.settle(result)
}

async fn apply_update(
    api: &dyn FlashArrayApi,
    prior: &Tracked<HostgroupModel>,
    planned: &HostgroupModel,
    progress: &mut Progress<HostgroupModel>,
) -> Result<Tracked<HostgroupModel>, ResourceError> {
    let mut id = prior.id.clone();

    if planned.name != prior.state.name {
        let patch = HostgroupPatch {
            name: Some(planned.name.clone()),
            ..HostgroupPatch::default()
        };
        id = api.set_hostgroup(&id, &patch).await?.name;
        progress.accept(|confirmed| {
            confirmed.id.clone_from(&id);
            confirmed.state.name.clone_from(&planned.name);
        });
    }

    if planned.hosts != prior.state.hosts {
        let patch = HostgroupPatch {
            hostlist: Some(planned.hosts.clone()),
            ..HostgroupPatch::default()
        };
        api.set_hostgroup(&id, &patch).await?;
        progress.accept(|confirmed| confirmed.state.hosts.clone_from(&planned.hosts));
    }

    let changes = connections::diff(&prior.state.volume, &planned.volume);
    Attachment::Hostgroup(&id).apply(api, &changes).await?;

    refreshed(api, id, planned).await
}

/// Disconnects every connected volume, empties the member list, then
/// deletes the group.
///
/// # Errors
///
/// Propagates array errors other than "does not exist".
pub async fn delete(api: &dyn FlashArrayApi, id: &str) -> Result<(), ResourceError> {
    let Some(group) = api.get_hostgroup(id).await? else {
        return Ok(());
    };
    Attachment::Hostgroup(id).disconnect_all(api).await?;
    if !group.hosts.is_empty() {
        debug!(hostgroup = id, hosts = group.hosts.len(), "removing members");
        let patch = HostgroupPatch {
            hostlist: Some(Vec::new()),
            ..HostgroupPatch::default()
        };
        api.set_hostgroup(id, &patch).await?;
    }
    api.delete_hostgroup(id).await.optional()?;
    Ok(())
}

/// Lifecycle handlers for `purefa_hostgroup`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostgroupResource;

impl Resource for HostgroupResource {
    type Model = HostgroupModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a HostgroupModel,
    ) -> ResourceFuture<'a, Tracked<HostgroupModel>> {
        Box::pin(create(api, planned))
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<HostgroupModel>,
    ) -> ResourceFuture<'a, Option<Tracked<HostgroupModel>>> {
        Box::pin(read(api, &prior.id, &prior.state))
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<HostgroupModel>,
        planned: &'a HostgroupModel,
    ) -> ResourceFuture<'a, Tracked<HostgroupModel>> {
        Box::pin(update(api, prior, planned))
    }

    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<HostgroupModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(delete(api, &prior.id))
    }
}
