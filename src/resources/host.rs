//! `purefa_host`: hosts, their initiators, personality, CHAP credentials and
//! private volume connections.
//!
//! The array never returns CHAP passwords, so reads carry the configured
//! passwords forward from the prior state.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{Progress, Resource, ResourceError, ResourceFuture, Tracked};
use crate::backend::{FlashArrayApi, HostCreate, HostPatch, OptionalExt};
use crate::connections::{self, Attachment, VolumeConnection};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_host";

/// Host personalities the array accepts.
pub const PERSONALITIES: &[&str] = &[
    "aix",
    "esxi",
    "hitachi-vsp",
    "hpux",
    "oracle-vm-server",
    "solaris",
    "vms",
];

/// Highest LUN the array assigns.
pub const MAX_LUN: u64 = 16_383;

/// Attributes of a host.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct HostModel {
    /// Host name.
    pub name: String,
    /// Fibre Channel WWNs.
    pub wwn: Vec<String>,
    /// iSCSI qualified names.
    pub iqn: Vec<String>,
    /// Host personality.
    pub personality: Option<String>,
    /// CHAP user the host authenticates with.
    pub host_user: Option<String>,
    /// CHAP secret the host authenticates with.
    pub host_password: Option<String>,
    /// CHAP user the array authenticates with.
    pub target_user: Option<String>,
    /// CHAP secret the array authenticates with.
    pub target_password: Option<String>,
    /// Private volume connections.
    pub volume: Vec<VolumeConnection>,
}

impl HostModel {
    /// CHAP fields to send. On create only configured values are sent; on
    /// update only changed ones, with removed values cleared.
    fn chap_patch(&self, prior: Option<&Self>) -> HostPatch {
        let field = |new: &Option<String>, old: Option<&Option<String>>| match old {
            None => new.clone(),
            Some(previous) if previous == new => None,
            Some(_) => Some(new.clone().unwrap_or_default()),
        };
        HostPatch {
            host_user: field(&self.host_user, prior.map(|host| &host.host_user)),
            host_password: field(&self.host_password, prior.map(|host| &host.host_password)),
            target_user: field(&self.target_user, prior.map(|host| &host.target_user)),
            target_password: field(
                &self.target_password,
                prior.map(|host| &host.target_password),
            ),
            ..HostPatch::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

/// The `volume` block shared by hosts and host groups.
#[must_use]
pub fn volume_attribute() -> Attribute {
    Attribute::optional(
        "volume",
        AttributeType::Block(vec![
            Attribute::required("vol", AttributeType::String).describe("Volume name."),
            Attribute::optional("lun", AttributeType::Int)
                .describe("LUN to use; 0 lets the array choose.")
                .with_default(json!(0))
                .with_validator(Validator::IntBetween {
                    min: 0,
                    max: MAX_LUN,
                }),
        ]),
    )
    .describe("Connected volumes.")
}

/// Schema of `purefa_host`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::required("name", AttributeType::String).describe("Host name."),
        Attribute::optional("wwn", AttributeType::List).describe("Fibre Channel WWNs."),
        Attribute::optional("iqn", AttributeType::List).describe("iSCSI qualified names."),
        Attribute::optional("personality", AttributeType::String)
            .describe("Host personality.")
            .with_validator(Validator::OneOf {
                values: PERSONALITIES,
            }),
        Attribute::optional("host_user", AttributeType::String),
        Attribute::optional("host_password", AttributeType::String).with_sensitive(),
        Attribute::optional("target_user", AttributeType::String),
        Attribute::optional("target_password", AttributeType::String).with_sensitive(),
        volume_attribute(),
    ])
}

/// Creates the host, applies personality and CHAP settings, then connects
/// the declared volumes.
///
/// # Errors
///
/// Propagates array errors. Once the host exists, failures come back as
/// [`ResourceError::Partial`] so the host stays tracked.
pub async fn create(
    api: &dyn FlashArrayApi,
    planned: &HostModel,
) -> Result<Tracked<HostModel>, ResourceError> {
    let request = HostCreate {
        wwnlist: planned.wwn.clone(),
        iqnlist: planned.iqn.clone(),
    };
    let host = api.create_host(&planned.name, &request).await?;
    let created = HostModel {
        name: host.name.clone(),
        wwn: host.wwn,
        iqn: host.iqn,
        ..HostModel::default()
    };
    let progress = Progress::created(TYPE_NAME, Tracked::new(host.name.clone(), created));
    let result = configure(api, host.name, planned).await;
    progress.settle(result)
}

async fn configure(
    api: &dyn FlashArrayApi,
    name: String,
    planned: &HostModel,
) -> Result<Tracked<HostModel>, ResourceError> {
    if let Some(personality) = &planned.personality {
        let patch = HostPatch {
            personality: Some(personality.clone()),
            ..HostPatch::default()
        };
        api.set_host(&name, &patch).await?;
    }
    let chap = planned.chap_patch(None);
    if !chap.is_empty() {
        api.set_host(&name, &chap).await?;
    }

    let changes = connections::diff(&[], &planned.volume);
    Attachment::Host(&name).apply(api, &changes).await?;

    refreshed(api, name, planned).await
}

/// Refreshes a host. `known` supplies CHAP passwords and LUN-0 entries.
///
/// # Errors
///
/// Propagates array errors other than "does not exist".
pub async fn read(
    api: &dyn FlashArrayApi,
    id: &str,
    known: &HostModel,
) -> Result<Option<Tracked<HostModel>>, ResourceError> {
    let Some(host) = api.get_host(id).await? else {
        warn!(kind = TYPE_NAME, id, "object no longer exists; clearing id");
        return Ok(None);
    };
    let personality = api.get_host_personality(id).await?;
    let chap = api.get_host_chap(id).await?;
    let connected = Attachment::Host(id).current(api).await?;

    let state = HostModel {
        name: host.name.clone(),
        wwn: host.wwn,
        iqn: host.iqn,
        personality: non_empty(personality.personality),
        host_user: non_empty(chap.host_user),
        host_password: known.host_password.clone(),
        target_user: non_empty(chap.target_user),
        target_password: known.target_password.clone(),
        volume: connections::reconcile(&known.volume, connected),
    };
    Ok(Some(Tracked::new(host.name, state)))
}

async fn refreshed(
    api: &dyn FlashArrayApi,
    id: String,
    known: &HostModel,
) -> Result<Tracked<HostModel>, ResourceError> {
    read(api, &id, known)
        .await?
        .ok_or(ResourceError::NotFound { kind: TYPE_NAME, id })
}

/// Applies rename, initiator lists, personality, CHAP and connection
/// changes.
///
/// # Errors
///
/// Propagates array errors. Failures after a rename come back as
/// [`ResourceError::Partial`] carrying the new identifier.
pub async fn update(
    api: &dyn FlashArrayApi,
    prior: &Tracked<HostModel>,
    planned: &HostModel,
) -> Result<Tracked<HostModel>, ResourceError> {
    let mut progress = Progress::unchanged(TYPE_NAME, prior.clone());
    let result = apply_update(api, planned, &mut progress).await;
    progress.settle(result)
}

async fn apply_update(
    api: &dyn FlashArrayApi,
    planned: &HostModel,
    progress: &mut Progress<HostModel>,
) -> Result<Tracked<HostModel>, ResourceError> {
    let prior = progress.current().clone();
    let old = &prior.state;
    let mut id = prior.id.clone();

    if planned.name != old.name {
        let patch = HostPatch {
            name: Some(planned.name.clone()),
            ..HostPatch::default()
        };
        id = api.set_host(&id, &patch).await?.name;
        progress.accept(|confirmed| {
            confirmed.id.clone_from(&id);
            confirmed.state.name.clone_from(&planned.name);
        });
    }

    let mut patch = planned.chap_patch(Some(old));
    if planned.wwn != old.wwn {
        patch.wwnlist = Some(planned.wwn.clone());
    }
    if planned.iqn != old.iqn {
        patch.iqnlist = Some(planned.iqn.clone());
    }
    if planned.personality != old.personality {
        patch.personality = Some(planned.personality.clone().unwrap_or_default());
    }
    if !patch.is_empty() {
        api.set_host(&id, &patch).await?;
        progress.accept(|confirmed| {
            let state = &mut confirmed.state;
            state.wwn.clone_from(&planned.wwn);
            state.iqn.clone_from(&planned.iqn);
            state.personality.clone_from(&planned.personality);
            state.host_user.clone_from(&planned.host_user);
            state.host_password.clone_from(&planned.host_password);
            state.target_user.clone_from(&planned.target_user);
            state.target_password.clone_from(&planned.target_password);
        });
    }

    let changes = connections::diff(&old.volume, &planned.volume);
    Attachment::Host(&id).apply(api, &changes).await?;

    refreshed(api, id, planned).await
}

/// Disconnects every connected volume, then deletes the host. A host that
/// is already gone counts as deleted.
///
/// # Errors
///
/// Propagates array errors other than "does not exist" for the host itself.
pub async fn delete(api: &dyn FlashArrayApi, id: &str) -> Result<(), ResourceError> {
    if api.get_host(id).await?.is_none() {
        return Ok(());
    }
    Attachment::Host(id).disconnect_all(api).await?;
    api.delete_host(id).await.optional()?;
    Ok(())
}

/// Lifecycle handlers for `purefa_host`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostResource;

impl Resource for HostResource {
    type Model = HostModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a HostModel,
    ) -> ResourceFuture<'a, Tracked<HostModel>> {
        Box::pin(create(api, planned))
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<HostModel>,
    ) -> ResourceFuture<'a, Option<Tracked<HostModel>>> {
        Box::pin(read(api, &prior.id, &prior.state))
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<HostModel>,
        planned: &'a HostModel,
    ) -> ResourceFuture<'a, Tracked<HostModel>> {
        Box::pin(update(api, prior, planned))
    }

    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<HostModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(delete(api, &prior.id))
    }
}
