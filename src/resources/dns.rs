//! `purefa_dns_settings`: the array's singleton DNS configuration.
//!
//! Create and update both replace the whole setting. Delete leaves the
//! array untouched and only forgets the tracked id, because the array has no
//! way to unset DNS.

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceFuture, Tracked};
use crate::backend::{DnsPatch, DnsSettings, FlashArrayApi};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_dns_settings";

/// Most nameservers the array accepts.
pub const MAX_NAMESERVERS: usize = 3;

/// Attributes of the DNS settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct DnsModel {
    /// Nameserver IP addresses.
    pub nameservers: Vec<String>,
    /// Search domain.
    pub domain: Option<String>,
}

impl From<DnsSettings> for DnsModel {
    fn from(settings: DnsSettings) -> Self {
        Self {
            nameservers: settings.nameservers,
            domain: Some(settings.domain).filter(|domain| !domain.is_empty()),
        }
    }
}

/// Identifier of the DNS settings of `target`.
#[must_use]
pub fn settings_id(target: &str) -> String {
    format!("dns-settings-{target}")
}

/// Schema of `purefa_dns_settings`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::required("nameservers", AttributeType::List)
            .describe("Up to three DNS server IP addresses.")
            .with_max_items(MAX_NAMESERVERS)
            .with_validator(Validator::IpAddress),
        Attribute::optional("domain", AttributeType::String).describe("DNS search domain."),
    ])
}

async fn apply(
    api: &dyn FlashArrayApi,
    planned: &DnsModel,
) -> Result<Tracked<DnsModel>, super::ResourceError> {
    let patch = DnsPatch {
        domain: planned.domain.clone().unwrap_or_default(),
        nameservers: planned.nameservers.clone(),
    };
    let settings = api.set_dns(&patch).await?;
    Ok(Tracked::new(
        settings_id(api.target()),
        DnsModel::from(settings),
    ))
}

/// Lifecycle handlers for `purefa_dns_settings`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DnsResource;

impl Resource for DnsResource {
    type Model = DnsModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a DnsModel,
    ) -> ResourceFuture<'a, Tracked<DnsModel>> {
        Box::pin(apply(api, planned))
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        _prior: &'a Tracked<DnsModel>,
    ) -> ResourceFuture<'a, Option<Tracked<DnsModel>>> {
        Box::pin(async move {
            let settings = api.get_dns().await?;
            Ok(Some(Tracked::new(
                settings_id(api.target()),
                DnsModel::from(settings),
            )))
        })
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        _prior: &'a Tracked<DnsModel>,
        planned: &'a DnsModel,
    ) -> ResourceFuture<'a, Tracked<DnsModel>> {
        Box::pin(apply(api, planned))
    }

    fn delete<'a>(
        &'a self,
        _api: &'a dyn FlashArrayApi,
        _prior: &'a Tracked<DnsModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn id_embeds_the_target() {
        assert_eq!(settings_id("array.example"), "dns-settings-array.example");
    }

    #[test]
    fn more_than_three_nameservers_are_rejected() {
        let config = json!({
            "nameservers": ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"],
        });
        let errors = schema()
            .validate(&config)
            .expect_err("four nameservers should be rejected");
        assert!(errors.mentions("nameservers"));
    }

    #[test]
    fn empty_domain_reads_back_as_unset() {
        let model = DnsModel::from(DnsSettings {
            domain: String::new(),
            nameservers: vec![String::from("10.0.0.1")],
        });
        assert_eq!(model.domain, None);
    }
}
