//! Session setup: HTTP client construction, REST version negotiation and
//! authentication.

use reqwest::Certificate;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::RestClient;
use crate::backend::ApiError;
use crate::config::{ConnectionSettings, Credentials};

/// REST versions this client speaks, oldest first.
pub const SUPPORTED_REST_VERSIONS: [&str; 9] = [
    "1.11", "1.12", "1.13", "1.14", "1.15", "1.16", "1.17", "1.18", "1.19",
];

#[derive(Deserialize)]
struct VersionList {
    version: Vec<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    api_token: String,
}

/// Picks the REST version for a session.
///
/// A pinned version must be offered by the array. Otherwise the newest
/// version offered by the array and supported by this client wins.
///
/// # Errors
///
/// Returns [`ApiError::UnsupportedVersion`] when no acceptable version is
/// offered.
pub fn choose_version(offered: &[String], pinned: Option<&str>) -> Result<String, ApiError> {
    let unsupported = || ApiError::UnsupportedVersion {
        offered: offered.join(", "),
    };
    if let Some(version) = pinned {
        return offered
            .iter()
            .find(|candidate| candidate.as_str() == version)
            .cloned()
            .ok_or_else(unsupported);
    }
    offered
        .iter()
        .filter(|candidate| SUPPORTED_REST_VERSIONS.contains(&candidate.as_str()))
        .max_by_key(|candidate| version_key(candidate))
        .cloned()
        .ok_or_else(unsupported)
}

fn version_key(version: &str) -> (u32, u32) {
    let mut parts = version
        .split('.')
        .map(|part| part.parse::<u32>().unwrap_or_default());
    (
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    )
}

fn setup_error(message: impl Into<String>) -> ApiError {
    ApiError::Setup {
        message: message.into(),
    }
}

fn build_http(settings: &ConnectionSettings) -> Result<reqwest::Client, ApiError> {
    let mut builder = reqwest::Client::builder()
        .cookie_store(true)
        .danger_accept_invalid_certs(!settings.verify_https)
        .user_agent(settings.user_agent.clone());
    if let Some(timeout) = settings.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(connect_timeout) = settings.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    if let Some(path) = &settings.ssl_cert {
        let pem = std::fs::read(path)
            .map_err(|err| setup_error(format!("failed to read certificate {path}: {err}")))?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| setup_error(format!("invalid certificate {path}: {err}")))?;
        builder = builder.add_root_certificate(certificate);
    }
    builder
        .build()
        .map_err(|err| setup_error(format!("failed to build HTTP client: {err}")))
}

impl RestClient {
    /// Opens an authenticated session with the array described by `settings`.
    ///
    /// Username/password credentials are exchanged for an API token first;
    /// the token then opens a cookie-backed session used by every later call.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Setup`] when the HTTP client cannot be built,
    /// [`ApiError::UnsupportedVersion`] when version negotiation fails and
    /// [`ApiError::Authentication`] when the array rejects the credentials.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, ApiError> {
        let http = build_http(settings)?;
        let api_root = format!("https://{}/api", settings.target);

        let offered: VersionList = decode(
            http.get(format!("{api_root}/api_version")).send().await?,
            "api_version",
        )
        .await?;
        let version = choose_version(&offered.version, settings.rest_version.as_deref())?;
        debug!(target = %settings.target, version = %version, "negotiated REST version");

        let base_url = format!("{api_root}/{version}");
        let api_token = match &settings.credentials {
            Credentials::ApiToken(token) => token.clone(),
            Credentials::Password { username, password } => {
                let response = http
                    .post(format!("{base_url}/auth/apitoken"))
                    .json(&json!({ "username": username, "password": password }))
                    .send()
                    .await?;
                authenticated::<TokenResponse>(response).await?.api_token
            }
        };

        let session = http
            .post(format!("{base_url}/auth/session"))
            .json(&json!({ "api_token": api_token }))
            .send()
            .await?;
        authenticated::<serde_json::Value>(session).await?;
        info!(target = %settings.target, version = %version, "opened array session");

        Ok(Self {
            http,
            target: settings.target.clone(),
            version,
            base_url,
        })
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_response("GET", path, status.as_u16(), &text));
    }
    serde_json::from_str(&text).map_err(|err| ApiError::Decode {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

async fn authenticated<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let rejected = ApiError::from_response("POST", "auth", status.as_u16(), &text);
        return Err(ApiError::Authentication {
            message: rejected.to_string(),
        });
    }
    serde_json::from_str(&text).map_err(|err| ApiError::Authentication {
        message: format!("unexpected authentication response: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn offered(versions: &[&str]) -> Vec<String> {
        versions.iter().map(|version| (*version).to_owned()).collect()
    }

    #[rstest]
    #[case(&["1.0", "1.11", "1.12", "1.19"], "1.19")]
    #[case(&["1.2", "1.14", "1.13"], "1.14")]
    #[case(&["1.19", "1.20", "2.0"], "1.19")]
    fn picks_newest_supported_version(#[case] versions: &[&str], #[case] expected: &str) {
        let chosen = choose_version(&offered(versions), None)
            .unwrap_or_else(|err| panic!("negotiation failed: {err}"));
        assert_eq!(chosen, expected);
    }

    #[test]
    fn pinned_version_must_be_offered() {
        let versions = offered(&["1.11", "1.12"]);
        assert_eq!(choose_version(&versions, Some("1.12")), Ok(String::from("1.12")));
        assert_eq!(
            choose_version(&versions, Some("1.16")),
            Err(ApiError::UnsupportedVersion {
                offered: String::from("1.11, 1.12"),
            })
        );
    }

    #[test]
    fn legacy_only_arrays_are_rejected() {
        let err = choose_version(&offered(&["1.0", "1.1"]), None)
            .expect_err("no supported version should be found");
        assert!(err.to_string().contains("1.0, 1.1"));
    }
}
