//! Provider registry: maps Terraform type names onto resources and data
//! sources, validates configuration before any array call and converts JSON
//! state to and from the typed resource models.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::backend::{ApiError, FlashArrayApi};
use crate::config::{ConfigError, ProviderConfig, ProviderOptions};
use crate::flasharray::RestClient;
use crate::resources::alert::AlertResource;
use crate::resources::dns::DnsResource;
use crate::resources::flasharray::{self as array, FlashArrayResource};
use crate::resources::host::HostResource;
use crate::resources::hostgroup::HostgroupResource;
use crate::resources::pgroup::PgroupResource;
use crate::resources::vgroup::VgroupResource;
use crate::resources::volume::VolumeResource;
use crate::resources::{DynamicResource, ResourceError, StateRecord};
use crate::schema::{Attribute, AttributeType, Schema, ValidationErrors};

/// Errors surfaced to the host runtime.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Session setup failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// A resource block violates its schema.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    /// A lifecycle handler failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// No resource or data source has this type name.
    #[error("unknown type `{type_name}`")]
    UnknownType {
        /// Requested type name.
        type_name: String,
    },
    /// An in-place update was requested for a change that needs replacement.
    #[error("{type_name}: changing {} requires replacing the object", .attributes.join(", "))]
    RequiresReplacement {
        /// Resource type name.
        type_name: String,
        /// Force-new attributes that changed.
        attributes: Vec<String>,
    },
}

impl ProviderError {
    /// State the caller must keep when a handler failed after the array
    /// accepted a change.
    #[must_use]
    pub fn confirmed_state(&self) -> Option<&StateRecord> {
        match self {
            Self::Resource(err) => err.confirmed(),
            _ => None,
        }
    }
}

/// Outcome of planning one resource instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    /// No prior state; the object will be created.
    Create,
    /// The object is updated in place.
    Update {
        /// Attributes that change.
        changed: Vec<String>,
    },
    /// A force-new attribute changed; the object is destroyed and recreated.
    Replace {
        /// Force-new attributes that change.
        attributes: Vec<String>,
    },
    /// Configuration matches state.
    Unchanged,
}

/// Schemas of the provider block, every resource and every data source.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderSchema {
    /// Provider block.
    pub provider: Schema,
    /// Resources by type name.
    pub resources: BTreeMap<&'static str, Schema>,
    /// Data sources by type name.
    pub data_sources: BTreeMap<&'static str, Schema>,
}

/// Schema of the provider block itself.
#[must_use]
pub fn options_schema() -> Schema {
    let option = |name, description| {
        Attribute::optional(name, AttributeType::String).describe(description)
    };
    Schema::new(vec![
        option("target", "Array management address. Falls back to PURE_TARGET."),
        option("username", "User name. Falls back to PURE_USERNAME."),
        option("password", "Password. Falls back to PURE_PASSWORD.").with_sensitive(),
        option("api_token", "API token. Falls back to PURE_API_TOKEN.").with_sensitive(),
        option("rest_version", "REST API version. Negotiated when unset."),
        Attribute::optional("verify_https", AttributeType::Bool)
            .describe("Verify the array's TLS certificate.")
            .with_default(json!(false)),
        option("ssl_cert", "PEM bundle trusted in addition to the system roots."),
        option("user_agent", "User agent sent with every request.")
            .with_default(json!(crate::config::DEFAULT_USER_AGENT)),
        Attribute::optional("request_kwargs", AttributeType::Map)
            .describe("HTTP client options: `timeout`, `connect_timeout` (seconds)."),
    ])
}

/// Resolves configuration and opens a session. Configuration errors are
/// reported before any network traffic.
///
/// # Errors
///
/// Returns [`ProviderError::Config`] for unusable configuration and
/// [`ProviderError::Api`] when the session cannot be opened.
pub async fn configure(
    options: &ProviderOptions,
    layered: &ProviderConfig,
) -> Result<RestClient, ProviderError> {
    let settings = options.resolve(layered)?;
    debug!(target = %settings.target, "connecting to array");
    Ok(RestClient::connect(&settings).await?)
}

/// Registry of every resource type.
pub struct Provider {
    resources: BTreeMap<&'static str, Box<dyn DynamicResource>>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    /// Registers every resource type.
    #[must_use]
    pub fn new() -> Self {
        let registered: Vec<Box<dyn DynamicResource>> = vec![
            Box::new(AlertResource),
            Box::new(DnsResource),
            Box::new(FlashArrayResource),
            Box::new(HostResource),
            Box::new(HostgroupResource),
            Box::new(PgroupResource),
            Box::new(VgroupResource),
            Box::new(VolumeResource),
        ];
        let resources = registered
            .into_iter()
            .map(|resource| (resource.type_name(), resource))
            .collect();
        Self { resources }
    }

    /// Registered resource type names, sorted.
    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// Schemas of the provider, its resources and data sources.
    #[must_use]
    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: options_schema(),
            resources: self
                .resources
                .iter()
                .map(|(name, resource)| (*name, resource.schema()))
                .collect(),
            data_sources: BTreeMap::from([(array::TYPE_NAME, array::schema())]),
        }
    }

    fn resource(&self, type_name: &str) -> Result<&dyn DynamicResource, ProviderError> {
        self.resources
            .get(type_name)
            .map(AsRef::as_ref)
            .ok_or_else(|| ProviderError::UnknownType {
                type_name: type_name.to_owned(),
            })
    }

    /// Validates a resource block against its schema.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownType`] or [`ProviderError::Validation`].
    pub fn validate(&self, type_name: &str, config: &Value) -> Result<(), ProviderError> {
        self.resource(type_name)?.schema().validate(config)?;
        Ok(())
    }

    /// Plans one resource instance against its prior state.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownType`] or [`ProviderError::Validation`].
    pub fn plan(
        &self,
        type_name: &str,
        prior: Option<&StateRecord>,
        config: &Value,
    ) -> Result<PlanAction, ProviderError> {
        let schema = self.resource(type_name)?.schema();
        schema.validate(config)?;
        let Some(prior) = prior else {
            return Ok(PlanAction::Create);
        };
        let planned = schema.planned_state(Some(&prior.attributes), config);
        let changed = schema.changed_attributes(&prior.attributes, &planned);
        let force_new = schema.force_new(&changed);
        Ok(if !force_new.is_empty() {
            PlanAction::Replace {
                attributes: force_new.into_iter().map(str::to_owned).collect(),
            }
        } else if changed.is_empty() {
            PlanAction::Unchanged
        } else {
            PlanAction::Update {
                changed: changed.into_iter().map(str::to_owned).collect(),
            }
        })
    }

    /// Validates `config` and creates the object.
    ///
    /// # Errors
    ///
    /// Returns validation errors before any array call, then handler errors.
    pub async fn create(
        &self,
        api: &dyn FlashArrayApi,
        type_name: &str,
        config: &Value,
    ) -> Result<StateRecord, ProviderError> {
        let resource = self.resource(type_name)?;
        let schema = resource.schema();
        schema.validate(config)?;
        let planned = schema.planned_state(None, config);
        Ok(resource.create(api, &planned).await?)
    }

    /// Refreshes a state record; `None` means the object is gone and the id
    /// should be cleared.
    ///
    /// # Errors
    ///
    /// Returns handler errors.
    pub async fn read(
        &self,
        api: &dyn FlashArrayApi,
        type_name: &str,
        prior: &StateRecord,
    ) -> Result<Option<StateRecord>, ProviderError> {
        Ok(self.resource(type_name)?.read(api, prior).await?)
    }

    /// Validates `config` and updates the object in place.
    ///
    /// # Errors
    ///
    /// Returns validation errors and [`ProviderError::RequiresReplacement`]
    /// before any array call, then handler errors.
    pub async fn update(
        &self,
        api: &dyn FlashArrayApi,
        type_name: &str,
        prior: &StateRecord,
        config: &Value,
    ) -> Result<StateRecord, ProviderError> {
        let resource = self.resource(type_name)?;
        let schema = resource.schema();
        schema.validate(config)?;
        let planned = schema.planned_state(Some(&prior.attributes), config);
        let changed = schema.changed_attributes(&prior.attributes, &planned);
        let force_new = schema.force_new(&changed);
        if !force_new.is_empty() {
            return Err(ProviderError::RequiresReplacement {
                type_name: type_name.to_owned(),
                attributes: force_new.into_iter().map(str::to_owned).collect(),
            });
        }
        Ok(resource.update(api, prior, &planned).await?)
    }

    /// Removes the object behind a state record.
    ///
    /// # Errors
    ///
    /// Returns handler errors.
    pub async fn delete(
        &self,
        api: &dyn FlashArrayApi,
        type_name: &str,
        prior: &StateRecord,
    ) -> Result<(), ProviderError> {
        Ok(self.resource(type_name)?.delete(api, prior).await?)
    }

    /// Adopts an existing object.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::NotFound`] when the object does not exist.
    pub async fn import(
        &self,
        api: &dyn FlashArrayApi,
        type_name: &str,
        id: &str,
    ) -> Result<StateRecord, ProviderError> {
        Ok(self.resource(type_name)?.import(api, id).await?)
    }

    /// Reads a data source.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownType`] for anything but
    /// `purefa_flasharray`, then array errors.
    pub async fn read_data_source(
        &self,
        api: &dyn FlashArrayApi,
        type_name: &str,
    ) -> Result<StateRecord, ProviderError> {
        if type_name != array::TYPE_NAME {
            return Err(ProviderError::UnknownType {
                type_name: type_name.to_owned(),
            });
        }
        let tracked = array::read(api).await?;
        let attributes =
            serde_json::to_value(&tracked.state).map_err(|err| ResourceError::Decode {
                kind: array::TYPE_NAME,
                message: err.to_string(),
            })?;
        Ok(StateRecord {
            id: tracked.id,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_resource_type() {
        let provider = Provider::new();
        assert_eq!(
            provider.resource_types().collect::<Vec<_>>(),
            vec![
                "purefa_alert_recipient",
                "purefa_dns_settings",
                "purefa_flasharray",
                "purefa_host",
                "purefa_hostgroup",
                "purefa_protectiongroup",
                "purefa_vgroup",
                "purefa_volume",
            ]
        );
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = Provider::new()
            .validate("purefa_network_interface", &json!({}))
            .expect_err("unregistered type should be rejected");
        assert!(matches!(err, ProviderError::UnknownType { .. }));
    }

    #[test]
    fn provider_block_schema_accepts_resolver_options() {
        let config = json!({
            "target": "array.example",
            "api_token": "token",
            "verify_https": true,
            "request_kwargs": { "timeout": "30" },
        });
        assert_eq!(options_schema().validate(&config), Ok(()));
    }
}
