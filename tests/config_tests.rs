//! Tests for merging provider block options over layered configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use purefa::config::{DEFAULT_USER_AGENT, LEGACY_API_TOKEN_ENV};
use purefa::test_support::EnvGuard;
use purefa::{ConfigError, Credentials, ProviderConfig, ProviderOptions};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

#[fixture]
fn layered() -> ProviderConfig {
    ProviderConfig {
        target: Some(String::from("array.example.com")),
        api_token: Some(String::from("layered-token")),
        ..ProviderConfig::unset()
    }
}

fn with_kwargs(entries: &[(&str, Value)]) -> ProviderOptions {
    ProviderOptions {
        request_kwargs: entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect::<BTreeMap<_, _>>(),
        ..ProviderOptions::default()
    }
}

#[rstest]
fn missing_target_names_option_and_variable() {
    let layered = ProviderConfig {
        api_token: Some(String::from("token")),
        ..ProviderConfig::unset()
    };

    let err = ProviderOptions::default()
        .resolve(&layered)
        .expect_err("target is required");

    let ConfigError::MissingField(message) = err else {
        panic!("expected a missing field error");
    };
    assert!(message.contains("`target`"), "{message}");
    assert!(message.contains("PURE_TARGET"), "{message}");
}

#[rstest]
fn blank_target_counts_as_missing() {
    let layered = ProviderConfig {
        target: Some(String::from("   ")),
        api_token: Some(String::from("token")),
        ..ProviderConfig::unset()
    };
    assert!(matches!(
        ProviderOptions::default().resolve(&layered),
        Err(ConfigError::MissingField(_))
    ));
}

#[rstest]
fn token_wins_over_password_pair() {
    let options = ProviderOptions {
        target: Some(String::from("array.example.com")),
        api_token: Some(String::from("token")),
        username: Some(String::from("pureuser")),
        password: Some(String::from("secret")),
        ..ProviderOptions::default()
    };

    let settings = options.resolve(&ProviderConfig::unset()).expect("resolve");

    assert_eq!(settings.credentials, Credentials::ApiToken(String::from("token")));
}

#[rstest]
fn password_pair_is_accepted_without_token() {
    let options = ProviderOptions {
        target: Some(String::from("array.example.com")),
        username: Some(String::from("pureuser")),
        password: Some(String::from("secret")),
        ..ProviderOptions::default()
    };

    let settings = options.resolve(&ProviderConfig::unset()).expect("resolve");

    assert_eq!(
        settings.credentials,
        Credentials::Password {
            username: String::from("pureuser"),
            password: String::from("secret"),
        }
    );
}

#[rstest]
#[case::username_only(Some("pureuser"), None, "PURE_PASSWORD")]
#[case::password_only(None, Some("secret"), "PURE_USERNAME")]
fn incomplete_password_pair_names_the_missing_half(
    #[case] username: Option<&str>,
    #[case] password: Option<&str>,
    #[case] variable: &str,
) {
    let options = ProviderOptions {
        target: Some(String::from("array.example.com")),
        username: username.map(str::to_owned),
        password: password.map(str::to_owned),
        ..ProviderOptions::default()
    };

    let err = options
        .resolve(&ProviderConfig::unset())
        .expect_err("pair is incomplete");

    assert!(matches!(err, ConfigError::MissingField(ref message) if message.contains(variable)));
}

#[rstest]
fn no_credentials_at_all_is_reported() {
    let options = ProviderOptions {
        target: Some(String::from("array.example.com")),
        ..ProviderOptions::default()
    };
    assert_eq!(
        options.resolve(&ProviderConfig::unset()),
        Err(ConfigError::MissingCredentials)
    );
}

#[rstest]
fn declared_options_override_layered_values(layered: ProviderConfig) {
    let options = ProviderOptions {
        target: Some(String::from("other.example.com")),
        verify_https: Some(true),
        user_agent: Some(String::from("acceptance")),
        ..ProviderOptions::default()
    };

    let settings = options.resolve(&layered).expect("resolve");

    assert_eq!(settings.target, "other.example.com");
    assert_eq!(
        settings.credentials,
        Credentials::ApiToken(String::from("layered-token"))
    );
    assert!(settings.verify_https);
    assert_eq!(settings.user_agent, "acceptance");
}

#[rstest]
fn layered_values_fill_the_gaps(layered: ProviderConfig) {
    let settings = ProviderOptions::default().resolve(&layered).expect("resolve");

    assert_eq!(settings.target, "array.example.com");
    assert!(!settings.verify_https);
    assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    assert_eq!(settings.ssl_cert, None);
    assert_eq!(settings.timeout, None);
}

#[rstest]
#[case::number(json!(30))]
#[case::string(json!("30"))]
fn request_timeouts_accept_numbers_and_strings(layered: ProviderConfig, #[case] value: Value) {
    let options = with_kwargs(&[("timeout", value), ("connect_timeout", json!(5))]);

    let settings = options.resolve(&layered).expect("resolve");

    assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
    assert_eq!(settings.connect_timeout, Some(Duration::from_secs(5)));
}

#[rstest]
#[case::unknown_key("retries", json!(3))]
#[case::negative("timeout", json!(-1))]
#[case::not_a_number("timeout", json!("soon"))]
fn bad_request_options_are_rejected(
    layered: ProviderConfig,
    #[case] key: &str,
    #[case] value: Value,
) {
    let err = with_kwargs(&[(key, value)])
        .resolve(&layered)
        .expect_err("option is invalid");

    assert!(matches!(err, ConfigError::InvalidRequestOption { key: ref bad, .. } if bad == key));
}

#[rstest]
fn unknown_provider_block_fields_fail_to_decode() {
    let decoded = serde_json::from_value::<ProviderOptions>(json!({ "endpoint": "x" }));
    assert!(decoded.is_err());
}

#[rstest]
fn credentials_debug_output_is_redacted() {
    let token = format!("{:?}", Credentials::ApiToken(String::from("s3cr3t-token")));
    let pair = format!(
        "{:?}",
        Credentials::Password {
            username: String::from("pureuser"),
            password: String::from("hunter2"),
        }
    );

    assert!(!token.contains("s3cr3t-token"));
    assert!(pair.contains("pureuser"));
    assert!(!pair.contains("hunter2"));
}

#[tokio::test]
async fn environment_supplies_target_and_legacy_token() {
    let _guard = EnvGuard::set_vars(&[
        ("PURE_TARGET", Some("env-array.example.com")),
        ("PURE_API_TOKEN", None),
        (LEGACY_API_TOKEN_ENV, Some("legacy-token")),
        ("PURE_USERNAME", None),
        ("PURE_PASSWORD", None),
    ])
    .await;

    let layered = ProviderConfig::load_without_cli_args().expect("load");
    let settings = ProviderOptions::default().resolve(&layered).expect("resolve");

    assert_eq!(settings.target, "env-array.example.com");
    assert_eq!(
        settings.credentials,
        Credentials::ApiToken(String::from("legacy-token"))
    );
}

#[tokio::test]
async fn primary_token_variable_beats_the_legacy_alias() {
    let _guard = EnvGuard::set_vars(&[
        ("PURE_TARGET", Some("env-array.example.com")),
        ("PURE_API_TOKEN", Some("primary-token")),
        (LEGACY_API_TOKEN_ENV, Some("legacy-token")),
    ])
    .await;

    let layered = ProviderConfig::load_without_cli_args().expect("load");

    assert_eq!(layered.api_token.as_deref(), Some("primary-token"));
}
