//! `purefa_flasharray`: array identity.
//!
//! Primarily a data source. The same type is registered as a resource whose
//! create, update and read all re-read the array and whose delete forgets
//! the id.

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceError, ResourceFuture, Tracked};
use crate::backend::{ArrayInfo, FlashArrayApi};
use crate::schema::{Attribute, AttributeType, Schema};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_flasharray";

/// Array identity attributes.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct FlashArrayModel {
    /// Array name.
    pub name: String,
    /// Purity version.
    pub version: String,
    /// Purity revision.
    pub revision: String,
}

impl From<ArrayInfo> for FlashArrayModel {
    fn from(info: ArrayInfo) -> Self {
        Self {
            name: info.array_name,
            version: info.version,
            revision: info.revision,
        }
    }
}

/// Schema of `purefa_flasharray`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::computed("name", AttributeType::String).describe("Array name."),
        Attribute::computed("version", AttributeType::String).describe("Purity version."),
        Attribute::computed("revision", AttributeType::String).describe("Purity revision."),
    ])
}

/// Reads the array identity; the id is the array id.
///
/// # Errors
///
/// Propagates array errors.
pub async fn read(api: &dyn FlashArrayApi) -> Result<Tracked<FlashArrayModel>, ResourceError> {
    let info = api.get_array().await?;
    Ok(Tracked::new(info.id.clone(), FlashArrayModel::from(info)))
}

/// Resource registration of `purefa_flasharray`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlashArrayResource;

impl Resource for FlashArrayResource {
    type Model = FlashArrayModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        _planned: &'a FlashArrayModel,
    ) -> ResourceFuture<'a, Tracked<FlashArrayModel>> {
        Box::pin(read(api))
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        _prior: &'a Tracked<FlashArrayModel>,
    ) -> ResourceFuture<'a, Option<Tracked<FlashArrayModel>>> {
        Box::pin(async move { read(api).await.map(Some) })
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        _prior: &'a Tracked<FlashArrayModel>,
        _planned: &'a FlashArrayModel,
    ) -> ResourceFuture<'a, Tracked<FlashArrayModel>> {
        Box::pin(read(api))
    }

    fn delete<'a>(
        &'a self,
        _api: &'a dyn FlashArrayApi,
        _prior: &'a Tracked<FlashArrayModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}
