use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::assertions;
use crate::config::ApiConfig;
use crate::errors::{Result, StepError};
use crate::request::{self, RequestBody, RequestRecord};
use crate::response::CapturedResponse;
use crate::schema;
use crate::scope::Scope;

/// State for one scenario: configuration, the shared HTTP client, the
/// headers and query parameters accumulated for the next request, the scope,
/// and the last request/response pair.
#[derive(Debug)]
pub struct ApiContext {
    config: ApiConfig,
    client: Client,
    headers: HashMap<String, String>,
    query_params: HashMap<String, String>,
    scope: Scope,
    last_request: Option<RequestRecord>,
    last_response: Option<CapturedResponse>,
}

impl ApiContext {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Use a caller-built client, e.g. one with a timeout or proxy.
    pub fn with_client(config: ApiConfig, client: Client) -> Self {
        ApiContext {
            config,
            client,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            scope: Scope::new(),
            last_request: None,
            last_response: None,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn configure(&mut self, config: ApiConfig) {
        self.config = config;
    }

    /// Clear everything a scenario may have left behind: headers, query
    /// parameters, scope and the last request/response. Configuration and
    /// the client are kept.
    pub fn reset(&mut self) {
        self.headers.clear();
        self.query_params.clear();
        self.scope.clear();
        self.last_request = None;
        self.last_response = None;
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn last_request(&self) -> Option<&RequestRecord> {
        self.last_request.as_ref()
    }

    /// The last captured response, or `NoResponse` before the first request.
    pub fn last_response(&self) -> Result<&CapturedResponse> {
        self.last_response.as_ref().ok_or(StepError::NoResponse)
    }

    // -- Request setup --

    /// Set one header. The value is used literally, without scope expansion.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Set several headers; values are scope-expanded.
    pub fn set_headers<K, V>(&mut self, rows: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        for (name, value) in rows {
            let value = self.scope.resolve(value.as_ref());
            self.headers.insert(name.into(), value);
        }
    }

    pub fn set_query_param(&mut self, name: impl Into<String>, value: &str) {
        let value = self.scope.resolve(value);
        self.query_params.insert(name.into(), value);
    }

    pub fn set_query_params<K, V>(&mut self, rows: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        for (name, value) in rows {
            self.set_query_param(name, value.as_ref());
        }
    }

    // -- Sending --

    /// Send `method` to `path` (appended to the base URL) and capture the
    /// response, replacing any previous one.
    pub async fn send(
        &mut self,
        method: &str,
        path: &str,
        body: RequestBody,
    ) -> Result<&CapturedResponse> {
        let url = format!("{}{}", self.config.base_url, self.scope.resolve(path));
        let body = body.resolve(&self.scope);
        let (request, record) = request::build(
            &self.client,
            method,
            &url,
            &self.headers,
            &self.query_params,
            body,
        )
        .await?;

        debug!(method = %record.method, url = %record.url, "sending request");
        if self.config.debug {
            info!("request:\n{}", record.dump());
        }
        let (method, url) = (record.method.to_string(), record.url.to_string());
        self.last_request = Some(record);
        self.last_response = None;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|source| StepError::Transport {
                method,
                url,
                source,
            })?;
        let captured = CapturedResponse::capture(response).await?;

        debug!(
            status = captured.status(),
            bytes = captured.body().len(),
            "captured response"
        );
        if self.config.debug {
            info!("response:\n{}", captured.dump());
        }
        let captured: &CapturedResponse = self.last_response.insert(captured);
        Ok(captured)
    }

    // -- Assertions --

    pub fn assert_status(&self, expected: u16) -> Result<()> {
        assertions::status_code(self.last_response()?, expected)
    }

    pub fn assert_valid_json(&self) -> Result<()> {
        assertions::valid_json(self.last_response()?)
    }

    pub fn assert_json_matches(&self, expected: &str) -> Result<()> {
        assertions::matches_json(self.last_response()?, &self.scope.resolve(expected))
    }

    pub fn assert_header(&self, name: &str, expected: &str) -> Result<()> {
        assertions::header_equals(self.last_response()?, name, &self.scope.resolve(expected))
    }

    pub fn assert_schema(&self, relative: &str) -> Result<()> {
        let response = self.last_response()?;
        schema::validate(&self.config.schemas_path, relative, response.body())
    }

    pub fn assert_json_path_value(&self, expr: &str, expected: &str) -> Result<()> {
        assertions::json_path_value(self.last_response()?, expr, &self.scope.resolve(expected))
    }

    pub fn assert_json_path_matches(&self, expr: &str, pattern: &str) -> Result<()> {
        assertions::json_path_matches(self.last_response()?, expr, pattern)
    }

    pub fn assert_json_path_count(&self, expr: &str, expected: usize) -> Result<()> {
        assertions::json_path_count(self.last_response()?, expr, expected)
    }

    pub fn assert_json_path_present(&self, expr: &str) -> Result<()> {
        assertions::json_path_present(self.last_response()?, expr)
    }

    pub fn assert_body_contains(&self, needle: &str) -> Result<()> {
        assertions::body_contains(self.last_response()?, &self.scope.resolve(needle))
    }

    pub fn assert_body_matches(&self, pattern: &str) -> Result<()> {
        assertions::body_matches(self.last_response()?, pattern)
    }

    pub fn assert_scope(&self, key: &str, expected: &str) -> Result<()> {
        let actual = self.scope.get(key).unwrap_or_default();
        if actual != expected {
            return Err(StepError::mismatch(format!(
                "expected scope variable {key} to have value {expected}. actual : {actual}"
            )));
        }
        Ok(())
    }

    // -- Scope --

    pub fn store_literal(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.scope.store(key, value);
    }

    /// Store response header `name` (empty when absent) under `key`.
    pub fn store_header(&mut self, name: &str, key: impl Into<String>) -> Result<()> {
        let value = self.last_response()?.header(name);
        self.scope.store(key, value);
        Ok(())
    }

    /// Store the value at `expr`; non-strings are stored as compact JSON.
    pub fn store_json_path(&mut self, expr: &str, key: impl Into<String>) -> Result<()> {
        let value = assertions::json_path(self.last_response()?, expr)?;
        self.scope.store(key, assertions::stringify(&value));
        Ok(())
    }

    // -- Timing --

    pub async fn wait(&self, seconds: u64) {
        debug!(seconds, "waiting");
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }
}
