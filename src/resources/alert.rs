//! `purefa_alert_recipient`: e-mail alert recipients.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{Progress, Resource, ResourceError, ResourceFuture, Tracked};
use crate::backend::{Alert, FlashArrayApi, OptionalExt};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

/// Terraform type name.
pub const TYPE_NAME: &str = "purefa_alert_recipient";

/// Accepted recipient addresses.
pub const EMAIL_PATTERN: &str = r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,4}$";

/// Attributes of an alert recipient.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default)]
pub struct AlertModel {
    /// Recipient address; also the identifier.
    pub email: String,
    /// Whether alerts are sent to the recipient.
    pub enabled: bool,
}

impl Default for AlertModel {
    fn default() -> Self {
        Self {
            email: String::new(),
            enabled: true,
        }
    }
}

impl From<Alert> for AlertModel {
    fn from(alert: Alert) -> Self {
        Self {
            email: alert.name,
            enabled: alert.enabled,
        }
    }
}

/// Schema of `purefa_alert_recipient`.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(vec![
        Attribute::required("email", AttributeType::String)
            .describe("Email address.")
            .with_force_new()
            .with_validator(Validator::Matches {
                pattern: EMAIL_PATTERN,
                message: "not a valid email address format",
            }),
        Attribute::optional("enabled", AttributeType::Bool)
            .describe("Enable or disable the recipient.")
            .with_default(json!(true)),
    ])
}

/// Lifecycle handlers for `purefa_alert_recipient`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlertResource;

impl Resource for AlertResource {
    type Model = AlertModel;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a AlertModel,
    ) -> ResourceFuture<'a, Tracked<AlertModel>> {
        Box::pin(async move {
            let alert = api.create_alert(&planned.email).await?;
            let created = Tracked::new(alert.name.clone(), AlertModel::from(alert));
            // New recipients start enabled.
            if planned.enabled {
                return Ok(created);
            }
            let progress = Progress::created(TYPE_NAME, created);
            let result = api
                .set_alert(&planned.email, false)
                .await
                .map(|alert| Tracked::new(alert.name.clone(), AlertModel::from(alert)))
                .map_err(ResourceError::from);
            progress.settle(result)
        })
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<AlertModel>,
    ) -> ResourceFuture<'a, Option<Tracked<AlertModel>>> {
        Box::pin(async move {
            let Some(alert) = api.get_alert(&prior.id).await? else {
                warn!(kind = TYPE_NAME, id = %prior.id, "object no longer exists; clearing id");
                return Ok(None);
            };
            Ok(Some(Tracked::new(alert.name.clone(), AlertModel::from(alert))))
        })
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<AlertModel>,
        planned: &'a AlertModel,
    ) -> ResourceFuture<'a, Tracked<AlertModel>> {
        Box::pin(async move {
            if planned.enabled == prior.state.enabled {
                return Ok(prior.clone());
            }
            let alert = api.set_alert(&prior.id, planned.enabled).await?;
            Ok(Tracked::new(alert.name.clone(), AlertModel::from(alert)))
        })
    }

    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<AlertModel>,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(async move {
            api.delete_alert(&prior.id).await.optional()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("ops@example.com", true)]
    #[case("first.last+tag@mail.example.io", true)]
    #[case("Ops@Example.com", false)]
    #[case("not-an-address", false)]
    #[case("a@b.toolong", false)]
    fn email_validation(#[case] email: &str, #[case] accepted: bool) {
        let result = schema().validate(&json!({ "email": email }));
        assert_eq!(result.is_ok(), accepted, "{email}: {result:?}");
    }

    #[test]
    fn missing_enabled_deserialises_as_enabled() {
        let model: AlertModel = serde_json::from_value(json!({ "email": "a@b.io" }))
            .unwrap_or_else(|err| panic!("decode failed: {err}"));
        assert!(model.enabled);
    }
}
