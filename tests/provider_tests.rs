//! Provider-level tests: validation, planning, import, the singleton DNS
//! resource, alert recipients, protection groups and the data source.

#[path = "common/fixtures.rs"]
mod fixtures;

use fixtures::{GIB, array, provider};
use purefa::backend::{ApiError, FlashArrayApi};
use purefa::resources::ResourceError;
use purefa::test_support::{MEMORY_TARGET, MemoryArray};
use purefa::{PlanAction, Provider, ProviderError, StateRecord};
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[case::unknown_attribute("purefa_volume", json!({ "name": "vol-a", "size": 1024, "colour": "red" }), "colour")]
#[case::missing_required("purefa_host", json!({ "wwn": [] }), "name")]
#[case::bad_email("purefa_alert_recipient", json!({ "email": "not-an-address" }), "email")]
#[case::bad_personality("purefa_host", json!({ "name": "h", "personality": "beos" }), "personality")]
#[case::conflicting_members(
    "purefa_protectiongroup",
    json!({ "name": "pg", "hosts": ["h"], "volumes": ["v"] }),
    "hosts"
)]
#[case::too_many_nameservers(
    "purefa_dns_settings",
    json!({ "nameservers": ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"] }),
    "nameservers"
)]
#[case::bad_nameserver("purefa_dns_settings", json!({ "nameservers": ["dns.example.com"] }), "nameservers")]
#[tokio::test]
async fn invalid_blocks_fail_before_any_call(
    provider: Provider,
    array: MemoryArray,
    #[case] type_name: &str,
    #[case] config: Value,
    #[case] attribute: &str,
) {
    let err = provider
        .create(&array, type_name, &config)
        .await
        .expect_err("validation should fail");

    assert!(
        matches!(&err, ProviderError::Validation(errors) if errors.mentions(attribute)),
        "{err}"
    );
    assert!(array.calls().await.is_empty());
}

#[rstest]
#[tokio::test]
async fn unknown_types_are_rejected(provider: Provider, array: MemoryArray) {
    let err = provider
        .create(&array, "purefa_network_interface", &json!({}))
        .await
        .expect_err("unregistered type");
    assert!(matches!(err, ProviderError::UnknownType { .. }));
}

fn alert_state(email: &str, enabled: bool) -> StateRecord {
    StateRecord {
        id: email.to_owned(),
        attributes: json!({ "email": email, "enabled": enabled }),
    }
}

#[rstest]
#[case::no_prior(None, json!({ "email": "ops@example.com" }), PlanAction::Create)]
#[case::same_block(
    Some(alert_state("ops@example.com", true)),
    json!({ "email": "ops@example.com" }),
    PlanAction::Unchanged
)]
#[case::toggle(
    Some(alert_state("ops@example.com", true)),
    json!({ "email": "ops@example.com", "enabled": false }),
    PlanAction::Update { changed: vec![String::from("enabled")] }
)]
#[case::new_address(
    Some(alert_state("ops@example.com", true)),
    json!({ "email": "noc@example.com" }),
    PlanAction::Replace { attributes: vec![String::from("email")] }
)]
fn alert_plans(
    provider: Provider,
    #[case] prior: Option<StateRecord>,
    #[case] config: Value,
    #[case] expected: PlanAction,
) {
    let action = provider
        .plan("purefa_alert_recipient", prior.as_ref(), &config)
        .expect("plan");
    assert_eq!(action, expected);
}

#[rstest]
#[tokio::test]
async fn update_refuses_force_new_changes(provider: Provider, array: MemoryArray) {
    let prior = provider
        .create(&array, "purefa_alert_recipient", &json!({ "email": "ops@example.com" }))
        .await
        .expect("create");
    array.clear_calls().await;

    let err = provider
        .update(
            &array,
            "purefa_alert_recipient",
            &prior,
            &json!({ "email": "noc@example.com" }),
        )
        .await
        .expect_err("email forces replacement");

    assert!(matches!(
        err,
        ProviderError::RequiresReplacement { ref attributes, .. } if attributes == &[String::from("email")]
    ));
    assert!(array.calls().await.is_empty());
}

#[rstest]
#[tokio::test]
async fn alert_enabled_flag_round_trips(provider: Provider, array: MemoryArray) {
    let created = provider
        .create(
            &array,
            "purefa_alert_recipient",
            &json!({ "email": "ops@example.com", "enabled": false }),
        )
        .await
        .expect("create");
    assert_eq!(created.id, "ops@example.com");
    assert_eq!(created.attributes["enabled"], json!(false));

    let read = provider
        .read(&array, "purefa_alert_recipient", &created)
        .await
        .expect("read")
        .expect("present");
    assert_eq!(read.attributes["enabled"], json!(false));

    let enabled = provider
        .update(
            &array,
            "purefa_alert_recipient",
            &read,
            &json!({ "email": "ops@example.com", "enabled": true }),
        )
        .await
        .expect("update");
    assert_eq!(enabled.attributes["enabled"], json!(true));
    let live = array
        .get_alert("ops@example.com")
        .await
        .expect("get")
        .expect("alert");
    assert!(live.enabled);
}

#[rstest]
#[tokio::test]
async fn alert_disable_failure_keeps_the_recipient_tracked(provider: Provider, array: MemoryArray) {
    let rejection = ApiError::Status {
        method: String::from("PUT"),
        path: String::from("alert/ops@example.com"),
        status: 400,
        message: String::from("Operation not permitted."),
    };
    array.fail_next("set_alert", rejection.clone()).await;

    let err = provider
        .create(
            &array,
            "purefa_alert_recipient",
            &json!({ "email": "ops@example.com", "enabled": false }),
        )
        .await
        .expect_err("disable call fails");

    assert!(
        matches!(
            &err,
            ProviderError::Resource(ResourceError::Partial { source, .. })
                if **source == ResourceError::Api(rejection.clone())
        ),
        "{err}"
    );
    let confirmed = err.confirmed_state().expect("confirmed record");
    assert_eq!(confirmed.id, "ops@example.com");
    assert_eq!(confirmed.attributes["enabled"], json!(true));
}

#[rstest]
#[tokio::test]
async fn unchanged_alert_update_makes_no_call(provider: Provider, array: MemoryArray) {
    let prior = provider
        .create(&array, "purefa_alert_recipient", &json!({ "email": "ops@example.com" }))
        .await
        .expect("create");
    array.clear_calls().await;

    let same = provider
        .update(&array, "purefa_alert_recipient", &prior, &json!({ "email": "ops@example.com" }))
        .await
        .expect("update");

    assert_eq!(same, prior);
    assert!(array.calls().await.is_empty());
}

#[rstest]
#[tokio::test]
async fn deleted_alert_reads_as_gone(provider: Provider, array: MemoryArray) {
    let prior = provider
        .create(&array, "purefa_alert_recipient", &json!({ "email": "ops@example.com" }))
        .await
        .expect("create");

    provider
        .delete(&array, "purefa_alert_recipient", &prior)
        .await
        .expect("delete");
    provider
        .delete(&array, "purefa_alert_recipient", &prior)
        .await
        .expect("second delete is harmless");

    let refreshed = provider
        .read(&array, "purefa_alert_recipient", &prior)
        .await
        .expect("read");
    assert!(refreshed.is_none());
}

#[rstest]
#[tokio::test]
async fn dns_settings_apply_and_delete_is_a_no_op(provider: Provider, array: MemoryArray) {
    let config = json!({ "nameservers": ["10.0.0.53", "10.0.1.53"], "domain": "example.com" });

    let created = provider
        .create(&array, "purefa_dns_settings", &config)
        .await
        .expect("create");
    assert_eq!(created.id, format!("dns-settings-{MEMORY_TARGET}"));
    assert_eq!(created.attributes["domain"], json!("example.com"));

    let read = provider
        .read(&array, "purefa_dns_settings", &created)
        .await
        .expect("read")
        .expect("singleton always exists");
    assert_eq!(read, created);

    array.clear_calls().await;
    provider
        .delete(&array, "purefa_dns_settings", &created)
        .await
        .expect("delete");
    assert!(array.calls().await.is_empty());
    let live = array.get_dns().await.expect("dns");
    assert_eq!(live.nameservers, vec!["10.0.0.53", "10.0.1.53"]);
}

#[rstest]
#[tokio::test]
async fn protection_group_applies_schedule_and_keeps_defaults(
    provider: Provider,
    array: MemoryArray,
) {
    array.create_volume("vol-a", GIB).await.expect("volume");
    let created = provider
        .create(
            &array,
            "purefa_protectiongroup",
            &json!({
                "name": "pg-a",
                "volumes": ["vol-a"],
                "snap_enabled": true,
                "snap_frequency": 7200,
                "days": 14
            }),
        )
        .await
        .expect("create");

    let attributes = &created.attributes;
    assert_eq!(created.id, "pg-a");
    assert_eq!(attributes["volumes"], json!(["vol-a"]));
    assert_eq!(attributes["snap_enabled"], json!(true));
    assert_eq!(attributes["snap_frequency"], json!(7200));
    assert_eq!(attributes["days"], json!(14));
    assert_eq!(attributes["replicate_frequency"], json!(14400));
    assert_eq!(attributes["per_day"], json!(4));

    let renamed = provider
        .update(
            &array,
            "purefa_protectiongroup",
            &created,
            &json!({ "name": "pg-b", "volumes": ["vol-a"], "snap_enabled": true }),
        )
        .await
        .expect("rename");
    assert_eq!(renamed.id, "pg-b");
    assert_eq!(renamed.attributes["snap_frequency"], json!(7200));
    assert!(array.get_pgroup("pg-a").await.expect("get").is_none());

    provider
        .delete(&array, "purefa_protectiongroup", &renamed)
        .await
        .expect("delete");
    let pending = array.list_pgroups(true).await.expect("pending");
    assert_eq!(pending.len(), 1);
}

#[rstest]
#[tokio::test]
async fn protection_group_rename_survives_a_failed_refresh(provider: Provider, array: MemoryArray) {
    let created = provider
        .create(&array, "purefa_protectiongroup", &json!({ "name": "pg-a" }))
        .await
        .expect("create");
    array
        .fail_next(
            "get_pgroup_schedule",
            ApiError::Transport {
                message: String::from("connection reset"),
            },
        )
        .await;

    let err = provider
        .update(&array, "purefa_protectiongroup", &created, &json!({ "name": "pg-b" }))
        .await
        .expect_err("refresh fails");

    let confirmed = err.confirmed_state().expect("confirmed record").clone();
    assert_eq!(confirmed.id, "pg-b");
    let refreshed = provider
        .read(&array, "purefa_protectiongroup", &confirmed)
        .await
        .expect("read")
        .expect("renamed group is tracked");
    assert_eq!(refreshed.attributes["name"], json!("pg-b"));
}

#[rstest]
#[tokio::test]
async fn import_adopts_existing_objects(provider: Provider, array: MemoryArray) {
    array.create_volume("vol-a", GIB).await.expect("volume");

    let imported = provider
        .import(&array, "purefa_volume", "vol-a")
        .await
        .expect("import");

    assert_eq!(imported.id, "vol-a");
    assert_eq!(imported.attributes["size"], json!(GIB));
}

#[rstest]
#[tokio::test]
async fn import_of_a_missing_object_fails(provider: Provider, array: MemoryArray) {
    let err = provider
        .import(&array, "purefa_hostgroup", "hg-missing")
        .await
        .expect_err("missing object");
    assert!(matches!(
        err,
        ProviderError::Resource(ResourceError::NotFound { ref id, .. }) if id == "hg-missing"
    ));
}

#[rstest]
#[tokio::test]
async fn data_source_reports_array_identity(provider: Provider, array: MemoryArray) {
    let record = provider
        .read_data_source(&array, "purefa_flasharray")
        .await
        .expect("data source");

    assert!(!record.id.is_empty());
    assert_eq!(record.attributes["name"], json!("memory-array"));
    assert_eq!(record.attributes["version"], json!("6.1.0"));
}

#[rstest]
#[tokio::test]
async fn only_the_array_is_a_data_source(provider: Provider, array: MemoryArray) {
    let err = provider
        .read_data_source(&array, "purefa_volume")
        .await
        .expect_err("not a data source");
    assert!(matches!(err, ProviderError::UnknownType { .. }));
}

#[rstest]
fn schema_lists_every_type(provider: Provider) {
    let schema = provider.schema();
    assert!(schema.resources.contains_key("purefa_volume"));
    assert!(schema.data_sources.contains_key("purefa_flasharray"));
    let encoded = serde_json::to_value(&schema).expect("schema serialises");
    assert!(encoded["provider"].is_object());
}
