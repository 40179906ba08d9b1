//! etcd v2 keys API client.
//!
//! # Responsibilities
//! - Fetch recursive, sorted snapshots of a key
//! - Long-poll for changes below a prefix
//! - Map etcd error codes onto `StoreError`
//!
//! # Design Decisions
//! - No request timeout: watch requests are long-polls and may legitimately
//!   block for minutes
//! - Snapshots are requested with `sorted=true` so two fetches of unchanged
//!   data traverse in the same order

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::store::{StoreError, TreeNode, TreeSource};

const KEY_NOT_FOUND: u64 = 100;
const EVENT_INDEX_CLEARED: u64 = 401;
const INDEX_HEADER: &str = "x-etcd-index";

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: TreeNode,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    index: Option<u64>,
}

/// Result of a single watch long-poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A change was observed at `modified_index`.
    Changed { modified_index: u64 },
    /// The requested index fell out of the store's event history.
    IndexCleared { current_index: u64 },
    /// The store closed the long-poll without an event.
    TimedOut,
}

/// Client for the etcd v2 HTTP keys API.
#[derive(Debug, Clone)]
pub struct EtcdClient {
    base: Url,
    http: reqwest::Client,
}

impl EtcdClient {
    /// Create a client for the store at `base` (e.g. `http://127.0.0.1:4001`).
    pub fn new(base: Url) -> Self {
        Self {
            base,
            http: reqwest::Client::new(),
        }
    }

    /// Store address this client talks to.
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn keys_url(&self, key: &str) -> String {
        let base = self.base.as_str().trim_end_matches('/');
        let key = key.trim_start_matches('/');
        format!("{}/v2/keys/{}", base, key)
    }

    /// Fetch the subtree at `key` together with the store index it was read at.
    pub async fn get(&self, key: &str) -> Result<(TreeNode, u64), StoreError> {
        let res = self
            .http
            .get(self.keys_url(key))
            .query(&[("recursive", "true"), ("sorted", "true")])
            .send()
            .await?;

        let index = store_index(&res);
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(error_from_body(key, status, &body));
        }

        let decoded: KeysResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;
        let index = index.unwrap_or(decoded.node_index());
        Ok((decoded.node, index))
    }

    /// Current store index as reported for `key`, whether or not the key exists.
    ///
    /// A watch started at this index plus one sees every change made after
    /// the call returned.
    pub async fn current_index(&self, key: &str) -> Result<u64, StoreError> {
        let res = self.http.get(self.keys_url(key)).send().await?;
        if let Some(index) = store_index(&res) {
            return Ok(index);
        }

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(error_from_body(key, status, &body));
        }
        Err(StoreError::Decode(format!("no {} header in response", INDEX_HEADER)))
    }

    /// Block until something below `prefix` changes.
    ///
    /// With `wait_index = None` the store reports the next change from now on;
    /// otherwise the first change at or after that index.
    pub async fn wait(&self, prefix: &str, wait_index: Option<u64>) -> Result<WatchOutcome, StoreError> {
        let mut query = vec![("wait", "true".to_string()), ("recursive", "true".to_string())];
        if let Some(index) = wait_index {
            query.push(("waitIndex", index.to_string()));
        }

        let res = self
            .http
            .get(self.keys_url(prefix))
            .query(&query)
            .send()
            .await?;

        let header_index = store_index(&res);
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
                if err.error_code == EVENT_INDEX_CLEARED {
                    let current_index = err.index.or(header_index).unwrap_or_default();
                    return Ok(WatchOutcome::IndexCleared { current_index });
                }
            }
            return Err(error_from_body(prefix, status, &body));
        }

        if body.trim().is_empty() {
            return Ok(WatchOutcome::TimedOut);
        }

        let decoded: KeysResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(WatchOutcome::Changed {
            modified_index: decoded.node.modified_index,
        })
    }
}

impl KeysResponse {
    fn node_index(&self) -> u64 {
        self.node.modified_index
    }
}

impl TreeSource for EtcdClient {
    async fn fetch(&self, key: &str) -> Result<TreeNode, StoreError> {
        self.get(key).await.map(|(node, _)| node)
    }
}

fn store_index(res: &reqwest::Response) -> Option<u64> {
    res.headers()
        .get(INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn error_from_body(key: &str, status: StatusCode, body: &str) -> StoreError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if err.error_code == KEY_NOT_FOUND => {
            StoreError::KeyNotFound(err.cause.unwrap_or_else(|| key.to_string()))
        }
        Ok(err) => StoreError::Status {
            status: status.as_u16(),
            message: err.message,
        },
        Err(_) => StoreError::Status {
            status: status.as_u16(),
            message: body.trim().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_url_joins_cleanly() {
        let client = EtcdClient::new("http://127.0.0.1:4001/".parse().unwrap());
        assert_eq!(
            client.keys_url("/varnish/hosts"),
            "http://127.0.0.1:4001/v2/keys/varnish/hosts"
        );
    }

    #[test]
    fn test_key_not_found_maps_to_variant() {
        let body = r#"{"errorCode":100,"message":"Key not found","cause":"/varnish/hosts","index":12}"#;
        let err = error_from_body("/varnish/hosts", StatusCode::NOT_FOUND, body);
        assert!(matches!(err, StoreError::KeyNotFound(ref k) if k == "/varnish/hosts"));
    }

    #[test]
    fn test_unknown_body_keeps_status() {
        let err = error_from_body("/x", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, StoreError::Status { status: 500, .. }));
    }
}
