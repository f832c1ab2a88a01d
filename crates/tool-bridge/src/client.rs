use crate::cache::{CacheStats, ToolCache};
use crate::error::{ToolBridgeError, ToolBridgeResult};
use crate::policy;
use md5::{Digest, Md5};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ToolBridgeConfig {
    pub base_url: String,
    pub api_key: String,
}

impl ToolBridgeConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("TOOL_BRIDGE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8088".to_string()),
            api_key: std::env::var("TOOL_BRIDGE_API_KEY").unwrap_or_default(),
        }
    }
}

pub struct ToolBridgeClient {
    http: reqwest::Client,
    cfg: ToolBridgeConfig,
    cache: ToolCache,
}

impl ToolBridgeClient {
    pub fn new(cfg: ToolBridgeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            cfg,
            cache: ToolCache::new(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Canonical cache key: MD5 of `tool_name ":" canonical_json(args)` with
    /// object keys sorted so argument order never changes the key.
    fn cache_key(tool_name: &str, args: &Value) -> String {
        let canonical = canonicalize(args);
        let payload = format!("{tool_name}:{canonical}");
        let digest = Md5::digest(payload.as_bytes());
        format!("{digest:x}")
    }

    pub async fn call_tool(&self, tool_name: &str, args: Value) -> ToolBridgeResult<Value> {
        let cacheable = policy::is_cacheable(tool_name);
        let key = Self::cache_key(tool_name, &args);

        if cacheable {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(hit);
            }
        }

        let result = self.invoke_with_retry(tool_name, &args).await?;

        if cacheable {
            self.cache
                .put(key, tool_name, result.clone(), policy::ttl_for(tool_name));
        } else {
            for target in policy::invalidation_targets(tool_name) {
                self.cache.invalidate_tool(target);
            }
        }

        Ok(result)
    }

    async fn invoke_with_retry(&self, tool_name: &str, args: &Value) -> ToolBridgeResult<Value> {
        let timeout = policy::timeout_for(tool_name);

        for attempt in 0..3u32 {
            let response = self
                .http
                .post(format!("{}/tools/{}", self.cfg.base_url, tool_name))
                .bearer_auth(&self.cfg.api_key)
                .timeout(timeout)
                .json(args)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if attempt < 2 => {
                    tracing::warn!(tool_name, attempt, error = %e, "tool call transport error, retrying");
                    tokio::time::sleep(policy::backoff_for_attempt(attempt)).await;
                    continue;
                }
                Err(e) => return Err(ToolBridgeError::RequestFailed(e)),
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response.json::<Value>().await?);
            }

            if policy::is_retryable_status(status) && attempt < 2 {
                tracing::warn!(tool_name, attempt, status, "retryable tool status, backing off");
                tokio::time::sleep(policy::backoff_for_attempt(attempt)).await;
                continue;
            }

            if policy::is_retryable_status(status) {
                return Err(ToolBridgeError::RetriesExhausted {
                    tool: tool_name.to_string(),
                });
            }

            return Err(ToolBridgeError::NonRetryable {
                tool: tool_name.to_string(),
                status,
            });
        }

        Err(ToolBridgeError::RetriesExhausted {
            tool: tool_name.to_string(),
        })
    }
}

/// Serialize a JSON value with object keys sorted recursively, so argument
/// order never changes the cache key.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_across_argument_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(
            ToolBridgeClient::cache_key("get_profile", &a),
            ToolBridgeClient::cache_key("get_profile", &b)
        );
    }

    #[test]
    fn cache_key_differs_by_tool_name() {
        let args = serde_json::json!({"id": 1});
        assert_ne!(
            ToolBridgeClient::cache_key("get_profile", &args),
            ToolBridgeClient::cache_key("get_status", &args)
        );
    }

    #[test]
    fn duration_helpers_stay_in_expected_range() {
        assert!(Duration::from_secs(1) < policy::ttl_for("list_tasks"));
    }
}
