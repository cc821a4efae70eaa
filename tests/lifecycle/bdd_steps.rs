//! BDD step definitions for resource lifecycles.

use std::future::Future;

use purefa::backend::{ApiError, FlashArrayApi};
use purefa::{Provider, ProviderError, StateRecord};
use rstest_bdd_macros::{given, then, when};
use serde_json::{Value, json};
use tokio::runtime::Runtime;

use super::test_helpers::{GIB, LifecycleContext, Outcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn block_on<F: Future>(future: F) -> Result<F::Output, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    Ok(runtime.block_on(future))
}

fn record_outcome(
    mut lifecycle_context: LifecycleContext,
    result: Result<StateRecord, ProviderError>,
) -> LifecycleContext {
    lifecycle_context.outcome = Some(match result {
        Ok(record) => {
            lifecycle_context.record = Some(record.clone());
            Outcome::Applied(record)
        }
        Err(err) => Outcome::Failed {
            message: err.to_string(),
            confirmed: err.confirmed_state().cloned(),
        },
    });
    lifecycle_context
}

fn apply(
    lifecycle_context: LifecycleContext,
    type_name: &'static str,
    config: &Value,
) -> Result<LifecycleContext, StepError> {
    let provider = Provider::new();
    let array = lifecycle_context.array.clone();
    let tracked = lifecycle_context.record.clone();
    let result = block_on(async {
        match &tracked {
            Some(prior) => provider.update(&array, type_name, prior, config).await,
            None => provider.create(&array, type_name, config).await,
        }
    })?;
    let mut updated = record_outcome(lifecycle_context, result);
    updated.type_name = type_name;
    Ok(updated)
}

#[given("a tracked volume \"{name}\" of {size:u64} GiB")]
fn tracked_volume(
    lifecycle_context: LifecycleContext,
    name: String,
    size: u64,
) -> Result<LifecycleContext, StepError> {
    let config = json!({ "name": name, "size": size * GIB });
    let created = apply(lifecycle_context, "purefa_volume", &config)?;
    if created.record.is_none() {
        return Err(StepError::Assertion(format!(
            "volume setup failed: {:?}",
            created.outcome
        )));
    }
    Ok(created)
}

#[given("an untracked volume \"{name}\" of {size:u64} GiB")]
fn untracked_volume(
    lifecycle_context: LifecycleContext,
    name: String,
    size: u64,
) -> Result<LifecycleContext, StepError> {
    block_on(lifecycle_context.array.create_volume(&name, size * GIB))?
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    Ok(lifecycle_context)
}

#[given("growing a volume fails on the array")]
fn growth_fails(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let outage = ApiError::Status {
        method: String::from("PUT"),
        path: String::from("volume"),
        status: 500,
        message: String::from("Internal error."),
    };
    block_on(lifecycle_context.array.fail_next("extend_volume", outage))?;
    Ok(lifecycle_context)
}

#[given("\"{name}\" is destroyed outside the provider")]
fn destroyed_out_of_band(
    lifecycle_context: LifecycleContext,
    name: String,
) -> Result<LifecycleContext, StepError> {
    block_on(lifecycle_context.array.destroy_volume(&name))?
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    Ok(lifecycle_context)
}

#[given("a tracked host group \"{name}\" connected to \"{first}\" and \"{second}\"")]
fn tracked_hostgroup(
    lifecycle_context: LifecycleContext,
    name: String,
    first: String,
    second: String,
) -> Result<LifecycleContext, StepError> {
    let array = lifecycle_context.array.clone();
    block_on(async {
        for volume in [&first, &second] {
            array.create_volume(volume, GIB).await?;
        }
        Ok::<(), ApiError>(())
    })?
    .map_err(|err| StepError::Assertion(err.to_string()))?;
    let config = json!({
        "name": name,
        "volume": [{ "vol": first }, { "vol": second }]
    });
    apply(lifecycle_context, "purefa_hostgroup", &config)
}

#[when("I resize \"{name}\" to {size:u64} GiB")]
fn resize(
    lifecycle_context: LifecycleContext,
    name: String,
    size: u64,
) -> Result<LifecycleContext, StepError> {
    apply(
        lifecycle_context,
        "purefa_volume",
        &json!({ "name": name, "size": size * GIB }),
    )
}

#[when("I point \"{name}\" at source \"{source}\"")]
fn point_at_source(
    lifecycle_context: LifecycleContext,
    name: String,
    source: String,
) -> Result<LifecycleContext, StepError> {
    block_on(lifecycle_context.array.clear_calls())?;
    apply(
        lifecycle_context,
        "purefa_volume",
        &json!({ "name": name, "source": source }),
    )
}

#[when("I rename \"{name}\" to \"{new_name}\" at {size:u64} GiB")]
fn rename(
    lifecycle_context: LifecycleContext,
    name: String,
    new_name: String,
    size: u64,
) -> Result<LifecycleContext, StepError> {
    let tracked = lifecycle_context.tracked();
    if tracked.id != name {
        return Err(StepError::Assertion(format!(
            "expected to rename {name}, tracking {}",
            tracked.id
        )));
    }
    apply(
        lifecycle_context,
        "purefa_volume",
        &json!({ "name": new_name, "size": size * GIB }),
    )
}

#[when("I create host \"{name}\" connected to \"{volume}\"")]
fn create_host(
    lifecycle_context: LifecycleContext,
    name: String,
    volume: String,
) -> Result<LifecycleContext, StepError> {
    apply(
        lifecycle_context,
        "purefa_host",
        &json!({ "name": name, "volume": [{ "vol": volume, "lun": 1 }] }),
    )
}

#[when("I delete the confirmed host")]
fn delete_confirmed_host(
    lifecycle_context: LifecycleContext,
) -> Result<LifecycleContext, StepError> {
    let Some(confirmed) = lifecycle_context.confirmed().cloned() else {
        return Err(StepError::Assertion(String::from("no confirmed state")));
    };
    let provider = Provider::new();
    block_on(provider.delete(&lifecycle_context.array, "purefa_host", &confirmed))?
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    Ok(lifecycle_context)
}

#[when("I create alert recipient \"{email}\" with enabled \"{enabled}\"")]
fn create_alert(
    lifecycle_context: LifecycleContext,
    email: String,
    enabled: bool,
) -> Result<LifecycleContext, StepError> {
    apply(
        lifecycle_context,
        "purefa_alert_recipient",
        &json!({ "email": email, "enabled": enabled }),
    )
}

#[when("I set the tracked alert enabled \"{enabled}\"")]
fn toggle_alert(
    lifecycle_context: LifecycleContext,
    enabled: bool,
) -> Result<LifecycleContext, StepError> {
    let email = lifecycle_context.tracked().id;
    apply(
        lifecycle_context,
        "purefa_alert_recipient",
        &json!({ "email": email, "enabled": enabled }),
    )
}

#[when("I delete the tracked host group")]
fn delete_hostgroup(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let tracked = lifecycle_context.tracked();
    let provider = Provider::new();
    let array = lifecycle_context.array.clone();
    block_on(async {
        array.clear_calls().await;
        provider.delete(&array, "purefa_hostgroup", &tracked).await
    })?
    .map_err(|err| StepError::Assertion(err.to_string()))?;
    Ok(lifecycle_context)
}

#[when("I refresh the tracked object")]
fn refresh(mut lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let tracked = lifecycle_context.tracked();
    let provider = Provider::new();
    let refreshed = block_on(provider.read(
        &lifecycle_context.array,
        lifecycle_context.type_name,
        &tracked,
    ))?
    .map_err(|err| StepError::Assertion(err.to_string()))?;
    lifecycle_context.refreshed = Some(refreshed);
    Ok(lifecycle_context)
}

#[then("the change fails with \"{text}\"")]
fn change_fails(lifecycle_context: &LifecycleContext, text: String) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(Outcome::Failed { message, .. }) if message.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a failure mentioning {text:?}, got {other:?}"
        ))),
    }
}

#[then("the array reports \"{name}\" at {size:u64} GiB")]
fn array_reports_size(
    lifecycle_context: &LifecycleContext,
    name: String,
    size: u64,
) -> Result<(), StepError> {
    let live = block_on(lifecycle_context.array.get_volume(&name))?
        .map_err(|err| StepError::Assertion(err.to_string()))?
        .ok_or_else(|| StepError::Assertion(format!("{name} is missing")))?;
    if live.size == size * GIB {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {name} at {size} GiB, got {} bytes",
            live.size
        )))
    }
}

#[then("no snapshot was taken")]
fn no_snapshot(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let snapshots = block_on(lifecycle_context.array.snapshots())?;
    if snapshots.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected snapshots: {snapshots:?}")))
    }
}

#[then("the tracked id is \"{id}\"")]
fn tracked_id(lifecycle_context: &LifecycleContext, id: String) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(Outcome::Applied(record)) if record.id == id => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {id} to be tracked, got {other:?}"
        ))),
    }
}

#[then("the array holds exactly one volume")]
fn one_volume(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let volumes = block_on(lifecycle_context.array.list_volumes(false))?
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    if volumes.len() == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected one volume, got {volumes:?}")))
    }
}

#[then("the confirmed state tracks \"{id}\"")]
fn confirmed_tracks(lifecycle_context: &LifecycleContext, id: String) -> Result<(), StepError> {
    match lifecycle_context.confirmed() {
        Some(record) if record.id == id => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected confirmed state for {id}, got {other:?}"
        ))),
    }
}

#[then("reading the confirmed state finds the object")]
fn confirmed_is_readable(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let Some(confirmed) = lifecycle_context.confirmed() else {
        return Err(StepError::Assertion(String::from("no confirmed state")));
    };
    let provider = Provider::new();
    let refreshed = block_on(provider.read(
        &lifecycle_context.array,
        lifecycle_context.type_name,
        confirmed,
    ))?
    .map_err(|err| StepError::Assertion(err.to_string()))?;
    match refreshed {
        Some(record) if record.id == confirmed.id => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {} to be readable, got {other:?}",
            confirmed.id
        ))),
    }
}

#[then("the array has no host \"{name}\"")]
fn host_is_gone(lifecycle_context: &LifecycleContext, name: String) -> Result<(), StepError> {
    let host = block_on(lifecycle_context.array.get_host(&name))?
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    match host {
        None => Ok(()),
        Some(host) => Err(StepError::Assertion(format!("host survived: {host:?}"))),
    }
}

#[then("the tracked alert reads enabled \"{enabled}\"")]
fn alert_reads(lifecycle_context: &LifecycleContext, enabled: bool) -> Result<(), StepError> {
    let tracked = lifecycle_context.tracked();
    let provider = Provider::new();
    let refreshed = block_on(provider.read(
        &lifecycle_context.array,
        "purefa_alert_recipient",
        &tracked,
    ))?
    .map_err(|err| StepError::Assertion(err.to_string()))?
    .ok_or_else(|| StepError::Assertion(format!("{} is missing", tracked.id)))?;
    if refreshed.attributes["enabled"] == json!(enabled) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected enabled = {enabled}, got {}",
            refreshed.attributes["enabled"]
        )))
    }
}

#[then("every host group disconnect precedes the delete call")]
fn disconnects_precede_delete(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let calls = block_on(lifecycle_context.array.calls())?;
    let last_disconnect = calls
        .iter()
        .rposition(|call| call.starts_with("disconnect_hostgroup"));
    let delete = calls
        .iter()
        .position(|call| call.starts_with("delete_hostgroup"));
    match (last_disconnect, delete) {
        (Some(disconnect), Some(deleted)) if disconnect < deleted => Ok(()),
        _ => Err(StepError::Assertion(format!("unexpected call order: {calls:?}"))),
    }
}

#[then("the array holds no connections")]
fn no_connections(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let count = block_on(lifecycle_context.array.connection_count())?;
    if count == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("{count} connections remain")))
    }
}

#[then("the tracked object is gone")]
fn tracked_object_gone(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.refreshed {
        Some(None) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected the object to be gone, got {other:?}"
        ))),
    }
}
