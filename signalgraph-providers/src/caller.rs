//! ABOUTME: The LLM calling abstraction node executors are written against
//! ABOUTME: LlmCaller is the seam; HttpCaller is the only networked implementation

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use signalgraph_core::error::{Result, WorkflowError};

/// A single LLM invocation: take a fully-formed prompt and a node's
/// `llm_config` block, return the raw text response.
///
/// One call, one prompt, one response — retry logic lives in
/// [`crate::resolver::resolve_llm_call`], not here. A caller is a bare
/// callable with no retry awareness of its own.
#[async_trait]
pub trait LlmCaller: std::fmt::Debug + Send + Sync {
    async fn call(&self, prompt: &str, config: &Value) -> Result<String>;
}

/// Configuration for an [`HttpCaller`], following the provider-config
/// shape this workspace's teacher crate uses: name/endpoint/model plus
/// an env-var loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    #[serde(default)]
    pub custom_config: HashMap<String, Value>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout_secs: 60,
            custom_config: HashMap::new(),
        }
    }

    /// Load from `SIGNALGRAPH_{NAME}_{ENDPOINT,API_KEY,MODEL,TIMEOUT}`.
    pub fn from_env(name: &str) -> Result<Self> {
        let prefix = format!("SIGNALGRAPH_{}_", name.to_uppercase());
        let endpoint = std::env::var(format!("{prefix}ENDPOINT"))
            .map_err(|_| WorkflowError::Provider(format!("missing {prefix}ENDPOINT env var")))?;
        let model = std::env::var(format!("{prefix}MODEL")).unwrap_or_else(|_| "default".to_string());
        let api_key = std::env::var(format!("{prefix}API_KEY")).ok();
        let timeout_secs = std::env::var(format!("{prefix}TIMEOUT")).ok().and_then(|v| v.parse().ok()).unwrap_or(60);

        Ok(Self { name: name.to_string(), endpoint, model, api_key, timeout_secs, custom_config: HashMap::new() })
    }
}

/// Calls a generic chat-completion-shaped HTTP endpoint: POST
/// `{"model": ..., "prompt": ..., ...config}`, expects
/// `{"response": "..."}` or `{"text": "..."}` back.
#[derive(Debug)]
pub struct HttpCaller {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpCaller {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WorkflowError::Provider(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmCaller for HttpCaller {
    async fn call(&self, prompt: &str, config: &Value) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
        });
        if let (Value::Object(body_map), Value::Object(extra)) = (&mut body, config) {
            for (k, v) in extra {
                body_map.insert(k.clone(), v.clone());
            }
        }

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| WorkflowError::Provider(format!("LLM request failed: {e}")))?;
        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| WorkflowError::Provider(format!("LLM response was not JSON: {e}")))?;

        if !status.is_success() {
            return Err(WorkflowError::Provider(format!("LLM endpoint returned {status}: {payload}")));
        }

        payload
            .get("response")
            .or_else(|| payload.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WorkflowError::Provider(format!("LLM response missing 'response'/'text' field: {payload}")))
    }
}

/// Test double that always returns a fixed string.
#[derive(Debug, Clone)]
pub struct EchoCaller {
    pub response: String,
}

#[async_trait]
impl LlmCaller for EchoCaller {
    async fn call(&self, _prompt: &str, _config: &Value) -> Result<String> {
        Ok(self.response.clone())
    }
}

/// Test double that returns queued responses in order, one per call,
/// useful for exercising `resolve_llm_call`'s retry loop.
#[derive(Debug)]
pub struct ScriptedCaller {
    responses: parking_lot::Mutex<std::collections::VecDeque<String>>,
}

impl ScriptedCaller {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self { responses: parking_lot::Mutex::new(responses.into_iter().collect()) }
    }
}

#[async_trait]
impl LlmCaller for ScriptedCaller {
    async fn call(&self, _prompt: &str, _config: &Value) -> Result<String> {
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| WorkflowError::Provider("ScriptedCaller exhausted its queued responses".into()))
    }
}
