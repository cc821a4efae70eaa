//! `purefa_volume`: volumes, optionally inside a volume group.
//!
//! Updates run in a fixed order so a late failure leaves the least damage:
//! shrink pre-check, rename, move between volume groups, snapshot followed by
//! overwrite when the source changes, then growth. Delete only destroys; the
//! array keeps the volume recoverable until it is eradicated.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::vgroup::NAME_PATTERN as VGROUP_NAME_PATTERN;
use super::{Progress, Resource, ResourceError, ResourceFuture, Tracked};
use crate::backend::{FlashArrayApi, OptionalExt, Volume};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_volume";

/// Smallest volume the array provisions (1 MiB).
pub const MIN_SIZE: u64 = 1 << 20;

/// Largest volume the array provisions (4 PiB).
pub const MAX_SIZE: u64 = 4 << 50;

/// Attributes of a volume.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct VolumeModel {
    /// Volume name without the volume group prefix.
    pub name: String,
    /// Provisioned size in bytes.
    pub size: Option<u64>,
    /// Volume copied into this one.
    pub source: Option<String>,
    /// Containing volume group.
    pub volume_group: Option<String>,
    /// Name including the volume group prefix.
    pub full_name: Option<String>,
    /// Array serial number.
    pub serial: Option<String>,
    /// Creation timestamp.
    pub created: Option<String>,
}

impl VolumeModel {
    fn qualified_name(&self) -> String {
        qualify(self.volume_group.as_deref(), &self.name)
    }
}

impl From<Volume> for VolumeModel {
    fn from(volume: Volume) -> Self {
        let (group, short) = volume.split_name();
        let (volume_group, name) = (group.map(str::to_owned), short.to_owned());
        Self {
            name,
            volume_group,
            full_name: Some(volume.name),
            size: Some(volume.size),
            source: volume.source,
            serial: Some(volume.serial),
            created: Some(volume.created),
        }
    }
}

fn qualify(group: Option<&str>, name: &str) -> String {
    match group.filter(|group| !group.is_empty()) {
        Some(group) => format!("{group}/{name}"),
        None => name.to_owned(),
    }
}

/// Schema of `purefa_volume`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::required("name", AttributeType::String).describe("Volume name."),
        Attribute::optional("size", AttributeType::Int)
            .with_computed()
            .describe("Size in bytes. Volumes only grow.")
            .with_validator(Validator::IntBetween {
                min: MIN_SIZE,
                max: MAX_SIZE,
            }),
        Attribute::optional("source", AttributeType::String)
            .with_computed()
            .describe("Volume to copy. Changing it snapshots and overwrites this volume."),
        Attribute::optional("volume_group", AttributeType::String)
            .describe("Volume group holding the volume.")
            .with_validator(Validator::Matches {
                pattern: VGROUP_NAME_PATTERN,
                message: "volume group names may only contain letters, digits, '_' and '-'",
            }),
        Attribute::computed("full_name", AttributeType::String),
        Attribute::computed("serial", AttributeType::String),
        Attribute::computed("created", AttributeType::String),
    ])
}

/// Creates an empty volume, or a copy when `source` is set.
///
/// # Errors
///
/// Returns [`ResourceError::Invalid`] when neither `size` nor `source` is
/// set, and propagates array errors.
pub async fn create(
    api: &dyn FlashArrayApi,
    planned: &VolumeModel,
) -> Result<Tracked<VolumeModel>, ResourceError> {
    let full_name = planned.qualified_name();
    let created = match planned.source.as_deref().filter(|source| !source.is_empty()) {
        Some(source) => api.copy_volume(&full_name, source, false).await?,
        None => {
            let size = planned.size.ok_or_else(|| ResourceError::Invalid {
                kind: TYPE_NAME,
                message: String::from("`size` is required when `source` is not set"),
            })?;
            api.create_volume(&full_name, size).await?
        }
    };
    Ok(Tracked::new(created.name.clone(), VolumeModel::from(created)))
}

/// Refreshes a volume by identifier.
///
/// # Errors
///
/// Propagates array errors other than "does not exist".
pub async fn read(
    api: &dyn FlashArrayApi,
    id: &str,
) -> Result<Option<Tracked<VolumeModel>>, ResourceError> {
    let Some(volume) = api.get_volume(id).await? else {
        warn!(kind = TYPE_NAME, id, "object no longer exists; clearing id");
        return Ok(None);
    };
    Ok(Some(Tracked::new(volume.name.clone(), VolumeModel::from(volume))))
}

/// Applies rename, volume group move, source overwrite and growth, in that
/// order.
///
/// # Errors
///
/// Returns [`ResourceError::Shrink`] before any mutating call when the
/// requested size is below the recorded size or a new source is smaller than
/// the live volume, and again before extending when the request is below the
/// live size. Failures after an accepted change come back as
/// [`ResourceError::Partial`] carrying the new identifier. Propagates array
/// errors.
pub async fn update(
    api: &dyn FlashArrayApi,
    prior: &Tracked<VolumeModel>,
    planned: &VolumeModel,
) -> Result<Tracked<VolumeModel>, ResourceError> {
    check_shrink(api, prior, planned).await?;
    let mut progress = Progress::unchanged(TYPE_NAME, prior.clone());
    let result = apply_update(api, planned, &mut progress).await;
    progress.settle(result)
}

fn changed_source<'a>(prior: &VolumeModel, planned: &'a VolumeModel) -> Option<&'a str> {
    planned
        .source
        .as_deref()
        .filter(|source| !source.is_empty() && planned.source != prior.source)
}

async fn live_volume(api: &dyn FlashArrayApi, id: &str) -> Result<Volume, ResourceError> {
    api.get_volume(id)
        .await?
        .ok_or_else(|| ResourceError::NotFound {
            kind: TYPE_NAME,
            id: id.to_owned(),
        })
}

async fn check_shrink(
    api: &dyn FlashArrayApi,
    prior: &Tracked<VolumeModel>,
    planned: &VolumeModel,
) -> Result<(), ResourceError> {
    if let (Some(requested), Some(current)) = (planned.size, prior.state.size)
        && requested < current
    {
        return Err(ResourceError::Shrink { current, requested });
    }
    if let Some(source) = changed_source(&prior.state, planned) {
        let incoming = live_volume(api, source).await?;
        let current = live_volume(api, &prior.id).await?.size;
        if incoming.size < current {
            return Err(ResourceError::Shrink {
                current,
                requested: incoming.size,
            });
        }
    }
    Ok(())
}

async fn apply_update(
    api: &dyn FlashArrayApi,
    planned: &VolumeModel,
    progress: &mut Progress<VolumeModel>,
) -> Result<Tracked<VolumeModel>, ResourceError> {
    let prior = progress.current().clone();
    let mut id = prior.id.clone();

    if planned.name != prior.state.name {
        let target = qualify(prior.state.volume_group.as_deref(), &planned.name);
        id = api.rename_volume(&id, &target).await?.name;
        progress.accept(|confirmed| {
            confirmed.id.clone_from(&id);
            confirmed.state.name.clone_from(&planned.name);
            confirmed.state.full_name = Some(id.clone());
        });
    }

    if planned.volume_group != prior.state.volume_group {
        let container = planned.volume_group.as_deref().unwrap_or_default();
        id = api.move_volume(&id, container).await?.name;
        progress.accept(|confirmed| {
            confirmed.id.clone_from(&id);
            confirmed.state.volume_group.clone_from(&planned.volume_group);
            confirmed.state.full_name = Some(id.clone());
        });
    }

    let mut overwritten = false;
    if let Some(source) = changed_source(&prior.state, planned) {
        let snapshot = api.create_snapshot(&id).await?;
        info!(snapshot = %snapshot.name, volume = %id, "created snapshot before overwriting volume");
        let copied = api.copy_volume(&id, source, true).await?;
        progress.accept(|confirmed| {
            confirmed.state.source = Some(source.to_owned());
            confirmed.state.size = Some(copied.size);
        });
        overwritten = true;
    }

    if let Some(requested) = planned.size
        && planned.size != prior.state.size
    {
        let live = live_volume(api, &id).await?;
        // A copy may leave the volume larger than requested; that is growth.
        if requested < live.size && !overwritten {
            return Err(ResourceError::Shrink {
                current: live.size,
                requested,
            });
        }
        if requested > live.size {
            api.extend_volume(&id, requested).await?;
            progress.accept(|confirmed| confirmed.state.size = Some(requested));
        }
    }

    read(api, &id).await?.ok_or(ResourceError::NotFound { kind: TYPE_NAME, id })
}

/// Destroys the volume without eradicating it.
///
/// # Errors
///
/// Propagates array errors other than "does not exist".
pub async fn delete(api: &dyn FlashArrayApi, id: &str) -> Result<(), ResourceError> {
    api.destroy_volume(id).await.optional()?;
    Ok(())
}

/// Lifecycle handlers for `purefa_volume`.
#[derive(Clone, Copy, Debug, Default)]
pub struct VolumeResource;

impl Resource for VolumeResource {
    type Model = VolumeModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a VolumeModel,
    ) -> ResourceFuture<'a, Tracked<VolumeModel>> {
        Box::pin(create(api, planned))
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<VolumeModel>,
    ) -> ResourceFuture<'a, Option<Tracked<VolumeModel>>> {
        Box::pin(read(api, &prior.id))
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<VolumeModel>,
        planned: &'a VolumeModel,
    ) -> ResourceFuture<'a, Tracked<VolumeModel>> {
        Box::pin(update(api, prior, planned))
    }

    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<VolumeModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(delete(api, &prior.id))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn model_splits_volume_group_prefix() {
        let model = VolumeModel::from(Volume {
            name: String::from("vg1/data"),
            size: MIN_SIZE,
            serial: String::from("ABC"),
            created: String::from("2024-01-01T00:00:00Z"),
            source: None,
            time_remaining: None,
        });
        assert_eq!(model.name, "data");
        assert_eq!(model.volume_group.as_deref(), Some("vg1"));
        assert_eq!(model.full_name.as_deref(), Some("vg1/data"));
    }

    #[test]
    fn blank_groups_do_not_qualify_names() {
        assert_eq!(qualify(Some(""), "v"), "v");
        assert_eq!(qualify(Some("g"), "v"), "g/v");
        assert_eq!(qualify(None, "v"), "v");
    }

    #[test]
    fn schema_rejects_sizes_below_one_mebibyte() {
        let errors = schema()
            .validate(&json!({ "name": "v", "size": 1024 }))
            .expect_err("tiny volumes should be rejected");
        assert!(errors.mentions("size"));
    }
}
