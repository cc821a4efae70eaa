//! BDD scenarios for resource lifecycles.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(path = "tests/features/lifecycle.feature", name = "Refuse to shrink a volume")]
fn scenario_refuse_shrink(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse to overwrite a volume from a smaller source"
)]
fn scenario_refuse_smaller_source(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Rename a volume without leaving a duplicate"
)]
fn scenario_rename_volume(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Keep the new name when growth fails after a rename"
)]
fn scenario_rename_then_failure(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Track a host whose connections fail during create"
)]
fn scenario_host_create_failure(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Disable an alert recipient and enable it again"
)]
fn scenario_alert_toggle(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Delete a host group with shared connections"
)]
fn scenario_hostgroup_delete(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Clear the id of a volume removed out of band"
)]
fn scenario_drifted_volume(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
