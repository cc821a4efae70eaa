//! Unit tests for the janitor module.

use super::*;
use crate::test_support::MemoryArray;
use rstest::rstest;

#[rstest]
#[case("  ")]
#[case("")]
fn janitor_config_rejects_blank_prefix(#[case] prefix: &str) {
    let err = JanitorConfig::new(prefix).expect_err("expected invalid config");
    assert!(matches!(err, JanitorError::InvalidConfig { field } if field == "prefix"));
}

#[rstest]
#[case("tfacc-vol", true)]
#[case("tfacc-vg/data", true)]
#[case("vg/tfacc-data", true)]
#[case("prod-data", false)]
fn ownership_checks_every_name_segment(#[case] name: &str, #[case] owned: bool) {
    let cfg = JanitorConfig::new(DEFAULT_TEST_PREFIX).expect("config");
    assert_eq!(cfg.owns(name), owned);
}

#[rstest]
fn test_names_are_unique_and_prefixed() {
    let cfg = JanitorConfig::new("run-7-").expect("config");
    let first = cfg.test_name("volume");
    let second = cfg.test_name("volume");
    assert!(first.starts_with("run-7-volume-"));
    assert_ne!(first, second);
}

#[rstest]
#[tokio::test]
async fn sweep_eradicates_only_prefixed_destroyed_objects() {
    let array = MemoryArray::new();
    array.create_vgroup("tfacc-vg").await.expect("vgroup");
    array.create_volume("tfacc-vg/data", 1 << 20).await.expect("grouped volume");
    array.create_volume("tfacc-vol", 1 << 20).await.expect("volume");
    array.create_volume("prod-vol", 1 << 20).await.expect("volume");
    array
        .create_pgroup("tfacc-pg", &crate::backend::PgroupCreate::default())
        .await
        .expect("pgroup");
    for name in ["tfacc-vg/data", "tfacc-vol", "prod-vol"] {
        array.destroy_volume(name).await.expect("destroy volume");
    }
    array.destroy_pgroup("tfacc-pg").await.expect("destroy pgroup");
    array.destroy_vgroup("tfacc-vg").await.expect("destroy vgroup");

    let cfg = JanitorConfig::new(DEFAULT_TEST_PREFIX).expect("config");
    let summary = Janitor::new(cfg, array.clone())
        .sweep()
        .await
        .expect("sweep should succeed");

    assert_eq!(
        summary,
        SweepSummary {
            eradicated_volumes: 2,
            eradicated_pgroups: 1,
            eradicated_vgroups: 1,
        }
    );
    let pending = array.list_volumes(true).await.expect("pending volumes");
    assert_eq!(
        pending.into_iter().map(|volume| volume.name).collect::<Vec<_>>(),
        vec![String::from("prod-vol")]
    );
}

#[rstest]
#[tokio::test]
async fn sweep_propagates_array_failures() {
    let array = MemoryArray::new();
    array.create_volume("tfacc-vol", 1 << 20).await.expect("volume");
    array.destroy_volume("tfacc-vol").await.expect("destroy");
    array
        .fail_next(
            "eradicate_volume",
            ApiError::NotFound {
                path: String::from("volume/tfacc-vol"),
                message: String::from("simulated"),
            },
        )
        .await;

    let cfg = JanitorConfig::new(DEFAULT_TEST_PREFIX).expect("config");
    let err = Janitor::new(cfg, array)
        .sweep()
        .await
        .expect_err("sweep should fail");
    assert!(matches!(err, JanitorError::Api(_)));
}

#[rstest]
#[tokio::test]
async fn sweep_on_clean_array_does_nothing() {
    let array = MemoryArray::new();
    let cfg = JanitorConfig::new(DEFAULT_TEST_PREFIX).expect("config");
    let summary = Janitor::new(cfg, array.clone())
        .sweep()
        .await
        .expect("sweep should succeed");
    assert_eq!(summary, SweepSummary::default());
    assert_eq!(
        array.calls().await,
        vec![
            "list_volumes pending",
            "list_pgroups pending",
            "list_vgroups pending",
            "list_volumes pending",
            "list_pgroups pending",
            "list_vgroups pending",
        ]
    );
}
