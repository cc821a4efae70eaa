//! `purefa_vgroup`: volume groups.
//!
//! Membership is owned by the volumes themselves (`volume_group`). Delete
//! destroys and then eradicates the group.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Resource, ResourceError, ResourceFuture, Tracked};
use crate::backend::{FlashArrayApi, OptionalExt};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_vgroup";

/// Accepted volume group names.
pub const NAME_PATTERN: &str = r"^[\w\-\d]+$";

/// Attributes of a volume group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct VgroupModel {
    /// Group name.
    pub name: String,
}

/// Schema of `purefa_vgroup`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::required("name", AttributeType::String)
            .describe("Name of the volume group.")
            .with_validator(Validator::Matches {
                pattern: NAME_PATTERN,
                message: "can only contain letters, numbers, '_' and '-'",
            }),
    ])
}

/// Lifecycle handlers for `purefa_vgroup`.
#[derive(Clone, Copy, Debug, Default)]
pub struct VgroupResource;

async fn read(
    api: &dyn FlashArrayApi,
    id: &str,
) -> Result<Option<Tracked<VgroupModel>>, ResourceError> {
    let Some(group) = api.get_vgroup(id).await? else {
        warn!(kind = TYPE_NAME, id, "object no longer exists; clearing id");
        return Ok(None);
    };
    Ok(Some(Tracked::new(
        group.name.clone(),
        VgroupModel { name: group.name },
    )))
}

impl Resource for VgroupResource {
    type Model = VgroupModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a VgroupModel,
    ) -> ResourceFuture<'a, Tracked<VgroupModel>> {
        Box::pin(async move {
            let group = api.create_vgroup(&planned.name).await?;
            Ok(Tracked::new(
                group.name.clone(),
                VgroupModel { name: group.name },
            ))
        })
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<VgroupModel>,
    ) -> ResourceFuture<'a, Option<Tracked<VgroupModel>>> {
        Box::pin(read(api, &prior.id))
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<VgroupModel>,
        planned: &'a VgroupModel,
    ) -> ResourceFuture<'a, Tracked<VgroupModel>> {
        Box::pin(async move {
            if planned.name == prior.state.name {
                return read(api, &prior.id)
                    .await?
                    .ok_or_else(|| ResourceError::NotFound {
                        kind: TYPE_NAME,
                        id: prior.id.clone(),
                    });
            }
            let renamed = api.rename_vgroup(&prior.id, &planned.name).await?;
            Ok(Tracked::new(
                renamed.name.clone(),
                VgroupModel { name: renamed.name },
            ))
        })
    }

    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<VgroupModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(async move {
            if api.destroy_vgroup(&prior.id).await.optional()?.is_some() {
                api.eradicate_vgroup(&prior.id).await.optional()?;
            }
            Ok(())
        })
    }
}
