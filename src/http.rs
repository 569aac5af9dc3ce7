//! Remote configuration over HTTP.
//!
//! The endpoint's JSON body is deep-merged over the defaults. Every failure
//! (no endpoint, network error, non-success status, bad JSON, non-object
//! body, a merge that does not fit `T`) yields the defaults unchanged.

use crate::merge::deep_merge_with;
use crate::resolve::{ConfigRequest, Resolved};
use crate::source::ConfigSource;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 0,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Fetch `endpoint` and resolve the request against its body.
pub async fn load_config_http<T>(request: &ConfigRequest<T>, options: &HttpOptions) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    resolve_http(request, options).await.config
}

/// [`load_config_http`] with the contributing sources.
pub async fn resolve_http<T>(request: &ConfigRequest<T>, options: &HttpOptions) -> Resolved<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let fallback = || Resolved {
        config: request.default_config.clone(),
        sources: vec![ConfigSource::default_config()],
    };

    let Some(endpoint) = request.endpoint.as_deref() else {
        debug!(name = %request.name, "No endpoint configured, using defaults");
        return fallback();
    };
    let Ok(defaults) = serde_json::to_value(&request.default_config) else {
        return fallback();
    };
    let Some(body) = fetch_remote_config(endpoint, &request.headers, options).await else {
        return fallback();
    };
    if !body.is_object() {
        warn!(endpoint, "Remote config is not a JSON object, using defaults");
        return fallback();
    }

    let merged = deep_merge_with(defaults, body, request.array_strategy);
    match serde_json::from_value(merged) {
        Ok(config) => Resolved {
            config,
            sources: vec![ConfigSource::default_config(), ConfigSource::http(endpoint)],
        },
        Err(e) => {
            warn!(endpoint, error = %e, "Remote config does not match the defaults, using defaults");
            fallback()
        }
    }
}

/// GET `endpoint` as JSON. `None` on any failure, after retries.
pub async fn fetch_remote_config(
    endpoint: &str,
    headers: &BTreeMap<String, String>,
    options: &HttpOptions,
) -> Option<Value> {
    let client = match reqwest::Client::builder().timeout(options.timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client");
            return None;
        }
    };
    let headers = request_headers(headers);

    for attempt in 0..=options.retries {
        if attempt > 0 {
            tokio::time::sleep(options.retry_delay).await;
        }
        match fetch_once(&client, endpoint, &headers).await {
            Ok(value) => return Some(value),
            Err(reason) => {
                warn!(endpoint, attempt = attempt + 1, reason = %reason, "Remote config fetch failed");
            }
        }
    }
    None
}

async fn fetch_once(
    client: &reqwest::Client,
    endpoint: &str,
    headers: &HeaderMap,
) -> Result<Value, String> {
    let response = client
        .get(endpoint)
        .headers(headers.clone())
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    response.json::<Value>().await.map_err(|e| e.to_string())
}

/// JSON accept/content-type headers, overridden by the caller's.
fn request_headers(extra: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in extra {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid request header"),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_headers_override_defaults() {
        let mut extra = BTreeMap::new();
        extra.insert("Accept".to_string(), "application/vnd.cfg+json".to_string());
        extra.insert("X-Token".to_string(), "abc".to_string());
        extra.insert("bad header".to_string(), "x".to_string());

        let headers = request_headers(&extra);
        assert_eq!(headers[ACCEPT], "application/vnd.cfg+json");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers["x-token"], "abc");
        assert_eq!(headers.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_endpoint_uses_defaults() {
        let request = ConfigRequest::new("app", serde_json::json!({"port": 1}));
        let resolved = resolve_http(&request, &HttpOptions::default()).await;
        assert_eq!(resolved.config, serde_json::json!({"port": 1}));
        assert_eq!(resolved.sources.len(), 1);
    }
}
