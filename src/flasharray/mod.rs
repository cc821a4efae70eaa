//! REST implementation of [`FlashArrayApi`].
//!
//! Every call is a single request relative to `https://{target}/api/{version}`.
//! Failed responses are classified by [`ApiError::from_response`]; lookups
//! turn "does not exist" answers into `None`.

mod session;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::backend::{
    Alert, ApiError, ApiFuture, ArrayInfo, Connection, DnsPatch, DnsSettings, FlashArrayApi, Host,
    HostChap, HostCreate, HostPatch, HostPersonality, Hostgroup, HostgroupPatch, OptionalExt,
    Pgroup, PgroupCreate, PgroupPatch, PgroupRetention, PgroupSchedule, Vgroup, Volume,
};

pub use session::{SUPPORTED_REST_VERSIONS, choose_version};

/// Client holding an authenticated session with one array.
#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    target: String,
    version: String,
    base_url: String,
}

impl RestClient {
    /// REST version negotiated for this session.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String, ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        debug!(method = %method, path, "array request");
        let url = format!("{}/{path}", self.base_url);
        let mut request = self.http.request(method.clone(), url);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            debug!(method = %method, path, status = status.as_u16(), "array request failed");
            Err(ApiError::from_response(
                method.as_str(),
                path,
                status.as_u16(),
                &text,
            ))
        }
    }

    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let text = self.execute(method, path, body).await?;
        serde_json::from_str(&text).map_err(|err| ApiError::Decode {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, Value>(Method::GET, path, None).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute::<Value>(Method::DELETE, path, None)
            .await
            .map(drop)
    }

    async fn eradicate(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, Some(&json!({ "eradicate": true })))
            .await
            .map(drop)
    }
}

fn listing(collection: &str, pending_only: bool) -> String {
    if pending_only {
        format!("{collection}?pending_only=true")
    } else {
        collection.to_owned()
    }
}

impl FlashArrayApi for RestClient {
    fn target(&self) -> &str {
        &self.target
    }

    fn get_array(&self) -> ApiFuture<'_, ArrayInfo> {
        Box::pin(async move { self.get("array").await })
    }

    fn create_volume<'a>(&'a self, name: &'a str, size: u64) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            self.post(&format!("volume/{name}"), &json!({ "size": size }))
                .await
        })
    }

    fn copy_volume<'a>(
        &'a self,
        name: &'a str,
        source: &'a str,
        overwrite: bool,
    ) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            let body = json!({ "source": source, "overwrite": overwrite });
            self.post(&format!("volume/{name}"), &body).await
        })
    }

    fn get_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Volume>> {
        Box::pin(async move { self.get(&format!("volume/{name}")).await.optional() })
    }

    fn rename_volume<'a>(&'a self, name: &'a str, new_name: &'a str) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            self.put(&format!("volume/{name}"), &json!({ "name": new_name }))
                .await
        })
    }

    fn extend_volume<'a>(&'a self, name: &'a str, size: u64) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            let body = json!({ "size": size, "truncate": false });
            self.put(&format!("volume/{name}"), &body).await
        })
    }

    fn move_volume<'a>(&'a self, name: &'a str, container: &'a str) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            self.put(&format!("volume/{name}"), &json!({ "container": container }))
                .await
        })
    }

    fn create_snapshot<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            let snapshots: Vec<Volume> = self.post("volume", &json!({ "source": [name] })).await?;
            snapshots
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::Decode {
                    path: String::from("volume"),
                    message: format!("no snapshot returned for {name}"),
                })
        })
    }

    fn destroy_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            self.send::<Volume, Value>(Method::DELETE, &format!("volume/{name}"), None)
                .await
        })
    }

    fn eradicate_volume<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.eradicate(&format!("volume/{name}")).await })
    }

    fn list_volumes(&self, pending_only: bool) -> ApiFuture<'_, Vec<Volume>> {
        Box::pin(async move { self.get(&listing("volume", pending_only)).await })
    }

    fn create_host<'a>(&'a self, name: &'a str, request: &'a HostCreate) -> ApiFuture<'a, Host> {
        Box::pin(async move { self.post(&format!("host/{name}"), request).await })
    }

    fn get_host<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Host>> {
        Box::pin(async move { self.get(&format!("host/{name}")).await.optional() })
    }

    fn get_host_personality<'a>(&'a self, name: &'a str) -> ApiFuture<'a, HostPersonality> {
        Box::pin(async move { self.get(&format!("host/{name}?personality=true")).await })
    }

    fn get_host_chap<'a>(&'a self, name: &'a str) -> ApiFuture<'a, HostChap> {
        Box::pin(async move { self.get(&format!("host/{name}?chap=true")).await })
    }

    fn set_host<'a>(&'a self, name: &'a str, patch: &'a HostPatch) -> ApiFuture<'a, Host> {
        Box::pin(async move { self.put(&format!("host/{name}"), patch).await })
    }

    fn delete_host<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("host/{name}")).await })
    }

    fn connect_host<'a>(
        &'a self,
        name: &'a str,
        volume: &'a str,
        lun: Option<u32>,
    ) -> ApiFuture<'a, Connection> {
        Box::pin(async move {
            let body = lun.map_or_else(|| json!({}), |value| json!({ "lun": value }));
            self.post(&format!("host/{name}/volume/{volume}"), &body)
                .await
        })
    }

    fn disconnect_host<'a>(&'a self, name: &'a str, volume: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("host/{name}/volume/{volume}")).await })
    }

    fn list_host_connections<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<Connection>> {
        Box::pin(async move { self.get(&format!("host/{name}/volume?private=true")).await })
    }

    fn create_hostgroup<'a>(
        &'a self,
        name: &'a str,
        hosts: &'a [String],
    ) -> ApiFuture<'a, Hostgroup> {
        Box::pin(async move {
            self.post(&format!("hgroup/{name}"), &json!({ "hostlist": hosts }))
                .await
        })
    }

    fn get_hostgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Hostgroup>> {
        Box::pin(async move { self.get(&format!("hgroup/{name}")).await.optional() })
    }

    fn set_hostgroup<'a>(
        &'a self,
        name: &'a str,
        patch: &'a HostgroupPatch,
    ) -> ApiFuture<'a, Hostgroup> {
        Box::pin(async move { self.put(&format!("hgroup/{name}"), patch).await })
    }

    fn delete_hostgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("hgroup/{name}")).await })
    }

    fn connect_hostgroup<'a>(
        &'a self,
        name: &'a str,
        volume: &'a str,
        lun: Option<u32>,
    ) -> ApiFuture<'a, Connection> {
        Box::pin(async move {
            let body = lun.map_or_else(|| json!({}), |value| json!({ "lun": value }));
            self.post(&format!("hgroup/{name}/volume/{volume}"), &body)
                .await
        })
    }

    fn disconnect_hostgroup<'a>(&'a self, name: &'a str, volume: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("hgroup/{name}/volume/{volume}")).await })
    }

    fn list_hostgroup_connections<'a>(
        &'a self,
        name: &'a str,
    ) -> ApiFuture<'a, Vec<Connection>> {
        Box::pin(async move { self.get(&format!("hgroup/{name}/volume")).await })
    }

    fn create_pgroup<'a>(
        &'a self,
        name: &'a str,
        request: &'a PgroupCreate,
    ) -> ApiFuture<'a, Pgroup> {
        Box::pin(async move { self.post(&format!("pgroup/{name}"), request).await })
    }

    fn get_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Pgroup>> {
        Box::pin(async move { self.get(&format!("pgroup/{name}")).await.optional() })
    }

    fn get_pgroup_schedule<'a>(&'a self, name: &'a str) -> ApiFuture<'a, PgroupSchedule> {
        Box::pin(async move { self.get(&format!("pgroup/{name}?schedule=true")).await })
    }

    fn get_pgroup_retention<'a>(&'a self, name: &'a str) -> ApiFuture<'a, PgroupRetention> {
        Box::pin(async move { self.get(&format!("pgroup/{name}?retention=true")).await })
    }

    fn set_pgroup<'a>(&'a self, name: &'a str, patch: &'a PgroupPatch) -> ApiFuture<'a, Pgroup> {
        Box::pin(async move { self.put(&format!("pgroup/{name}"), patch).await })
    }

    fn destroy_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("pgroup/{name}")).await })
    }

    fn eradicate_pgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.eradicate(&format!("pgroup/{name}")).await })
    }

    fn list_pgroups(&self, pending_only: bool) -> ApiFuture<'_, Vec<Pgroup>> {
        Box::pin(async move { self.get(&listing("pgroup", pending_only)).await })
    }

    fn create_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vgroup> {
        Box::pin(async move { self.post(&format!("vgroup/{name}"), &json!({})).await })
    }

    fn get_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Vgroup>> {
        Box::pin(async move { self.get(&format!("vgroup/{name}")).await.optional() })
    }

    fn rename_vgroup<'a>(&'a self, name: &'a str, new_name: &'a str) -> ApiFuture<'a, Vgroup> {
        Box::pin(async move {
            self.put(&format!("vgroup/{name}"), &json!({ "name": new_name }))
                .await
        })
    }

    fn destroy_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("vgroup/{name}")).await })
    }

    fn eradicate_vgroup<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.eradicate(&format!("vgroup/{name}")).await })
    }

    fn list_vgroups(&self, pending_only: bool) -> ApiFuture<'_, Vec<Vgroup>> {
        Box::pin(async move { self.get(&listing("vgroup", pending_only)).await })
    }

    fn get_dns(&self) -> ApiFuture<'_, DnsSettings> {
        Box::pin(async move { self.get("dns").await })
    }

    fn set_dns<'a>(&'a self, patch: &'a DnsPatch) -> ApiFuture<'a, DnsSettings> {
        Box::pin(async move { self.put("dns", patch).await })
    }

    fn create_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, Alert> {
        Box::pin(async move { self.post(&format!("alert/{email}"), &json!({})).await })
    }

    fn get_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, Option<Alert>> {
        Box::pin(async move { self.get(&format!("alert/{email}")).await.optional() })
    }

    fn set_alert<'a>(&'a self, email: &'a str, enabled: bool) -> ApiFuture<'a, Alert> {
        Box::pin(async move {
            self.put(&format!("alert/{email}"), &json!({ "enabled": enabled }))
                .await
        })
    }

    fn delete_alert<'a>(&'a self, email: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("alert/{email}")).await })
    }
}

#[cfg(test)]
mod tests {
    use super::listing;

    #[test]
    fn listing_adds_pending_filter_only_when_requested() {
        assert_eq!(listing("volume", false), "volume");
        assert_eq!(listing("pgroup", true), "pgroup?pending_only=true");
    }
}
