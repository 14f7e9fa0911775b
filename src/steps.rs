//! Step vocabulary registered with `cucumber`.
//!
//! Run a suite with `ApiWorld::cucumber().run("tests/features")`. The world
//! is built from [`ApiConfig::from_env`]; a `before` hook can call
//! [`ApiContext::configure`] to point it somewhere else.
#![allow(clippy::unused_async)]

use cucumber::gherkin::Step;
use cucumber::{World, given, then, when};

use crate::config::ApiConfig;
use crate::context::ApiContext;
use crate::errors::{Result, StepError};
use crate::request::{FormField, RequestBody};

/// Cucumber world wrapping one [`ApiContext`] per scenario.
///
/// Defined in the same module as the steps so the step registrations are
/// linked into any binary that uses the world.
#[derive(Debug, World)]
#[world(init = Self::from_env)]
pub struct ApiWorld {
    context: ApiContext,
}

impl ApiWorld {
    /// Fails when the `API_STEPS_*` environment holds an unusable value.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_context(ApiContext::new(ApiConfig::from_env()?)))
    }

    pub fn with_context(context: ApiContext) -> Self {
        ApiWorld { context }
    }

    pub fn context(&self) -> &ApiContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ApiContext {
        &mut self.context
    }
}

// ---------------------------------------------------------------------------
// Step argument helpers
// ---------------------------------------------------------------------------

fn table_rows(step: &Step) -> Result<&[Vec<String>]> {
    step.table
        .as_ref()
        .map(|t| t.rows.as_slice())
        .ok_or_else(|| StepError::InvalidTable(format!("step `{}` needs a data table", step.value)))
}

/// Rows of `name | value`.
fn pairs(step: &Step) -> Result<Vec<(String, String)>> {
    table_rows(step)?
        .iter()
        .map(|row| match row.as_slice() {
            [name, value, ..] => Ok((name.clone(), value.clone())),
            _ => Err(StepError::InvalidTable(format!(
                "expected `name | value` rows, got {row:?}"
            ))),
        })
        .collect()
}

/// Rows of `key | value | text|file`.
fn form_fields(step: &Step) -> Result<Vec<FormField>> {
    table_rows(step)?
        .iter()
        .map(|row| match row.as_slice() {
            [key, value, kind, ..] => Ok(FormField {
                key: key.clone(),
                value: value.clone(),
                kind: kind.parse()?,
            }),
            _ => Err(StepError::InvalidTable(format!(
                "expected `key | value | type` rows, got {row:?}"
            ))),
        })
        .collect()
}

fn docstring(step: &Step) -> Result<String> {
    let doc = step
        .docstring
        .as_deref()
        .ok_or_else(|| StepError::InvalidTable(format!("step `{}` needs a doc string", step.value)))?;
    Ok(doc.strip_prefix('\n').unwrap_or(doc).to_string())
}

// ---------------------------------------------------------------------------
// Request setup
// ---------------------------------------------------------------------------

/// Set one request header. Placeholders in the value are kept as written.
#[given(regex = r#"^I set header "([^"]*)" with value "([^"]*)"$"#)]
#[when(regex = r#"^I set header "([^"]*)" with value "([^"]*)"$"#)]
async fn set_header(world: &mut ApiWorld, name: String, value: String) {
    world.context.set_header(name, value);
}

/// Set headers from a `name | value` table.
#[given(regex = r"^I set headers to:$")]
#[when(regex = r"^I set headers to:$")]
async fn set_headers(world: &mut ApiWorld, step: &Step) -> Result<()> {
    world.context.set_headers(pairs(step)?);
    Ok(())
}

#[given(regex = r#"^I set query param "([^"]*)" with value "([^"]*)"$"#)]
#[when(regex = r#"^I set query param "([^"]*)" with value "([^"]*)"$"#)]
async fn set_query_param(world: &mut ApiWorld, name: String, value: String) {
    world.context.set_query_param(name, &value);
}

#[given(regex = r"^I set query params to:$")]
#[when(regex = r"^I set query params to:$")]
async fn set_query_params(world: &mut ApiWorld, step: &Step) -> Result<()> {
    world.context.set_query_params(pairs(step)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[when(regex = r#"^I send "([^"]*)" request to "([^"]*)"$"#)]
#[given(regex = r#"^I send "([^"]*)" request to "([^"]*)"$"#)]
async fn send_request(world: &mut ApiWorld, method: String, path: String) -> Result<()> {
    world
        .context
        .send(&method, &path, RequestBody::Empty)
        .await
        .map(|_| ())
}

/// Send a multipart body built from `key | value | text|file` rows. File
/// values are paths read from disk.
#[when(regex = r#"^I send "([^"]*)" request to "([^"]*)" with form body::?$"#)]
#[given(regex = r#"^I send "([^"]*)" request to "([^"]*)" with form body::?$"#)]
async fn send_form_request(
    world: &mut ApiWorld,
    method: String,
    path: String,
    step: &Step,
) -> Result<()> {
    let fields = form_fields(step)?;
    world
        .context
        .send(&method, &path, RequestBody::Form(fields))
        .await
        .map(|_| ())
}

/// Send the doc string as the request body.
#[when(regex = r#"^I send "([^"]*)" request to "([^"]*)" with body:$"#)]
#[given(regex = r#"^I send "([^"]*)" request to "([^"]*)" with body:$"#)]
async fn send_raw_request(
    world: &mut ApiWorld,
    method: String,
    path: String,
    step: &Step,
) -> Result<()> {
    let body = docstring(step)?;
    world
        .context
        .send(&method, &path, RequestBody::Raw(body))
        .await
        .map(|_| ())
}

// ---------------------------------------------------------------------------
// Response checks
// ---------------------------------------------------------------------------

#[then(regex = r"^The response code should be (\d+)$")]
async fn response_code(world: &mut ApiWorld, code: u16) -> Result<()> {
    world.context.assert_status(code)
}

#[then(regex = r"^The response should be a valid json$")]
async fn response_is_json(world: &mut ApiWorld) -> Result<()> {
    world.context.assert_valid_json()
}

/// Deep-compare the body with the doc string, ignoring key order.
#[then(regex = r"^The response should match json:$")]
async fn response_matches_json(world: &mut ApiWorld, step: &Step) -> Result<()> {
    world.context.assert_json_matches(&docstring(step)?)
}

/// The value may be written with or without quotes.
#[then(regex = r#"^The response header "([^"]*)" should have value "([^"]*)"$"#)]
#[then(regex = r#"^The response header "([^"]*)" should have value ([^"]*)$"#)]
async fn response_header(world: &mut ApiWorld, name: String, value: String) -> Result<()> {
    world.context.assert_header(&name, &value)
}

#[then(regex = r#"^The response should match json schema "([^"]*)"$"#)]
async fn response_matches_schema(world: &mut ApiWorld, path: String) -> Result<()> {
    world.context.assert_schema(&path)
}

/// The expected text is read as whatever type the path resolves to.
#[then(regex = r#"^The json path "([^"]*)" should have value "([^"]*)"$"#)]
async fn json_path_value(world: &mut ApiWorld, expr: String, value: String) -> Result<()> {
    world.context.assert_json_path_value(&expr, &value)
}

#[then(regex = r#"^The json path "([^"]*)" should match "([^"]*)"$"#)]
async fn json_path_matches(world: &mut ApiWorld, expr: String, pattern: String) -> Result<()> {
    world.context.assert_json_path_matches(&expr, &pattern)
}

#[then(regex = r#"^The json path "([^"]*)" should have count "(\d+)"$"#)]
async fn json_path_count(world: &mut ApiWorld, expr: String, count: usize) -> Result<()> {
    world.context.assert_json_path_count(&expr, count)
}

/// Fails on null and on a wildcard or slice that matched nothing.
#[then(regex = r#"^The json path "([^"]*)" should be present$"#)]
async fn json_path_present(world: &mut ApiWorld, expr: String) -> Result<()> {
    world.context.assert_json_path_present(&expr)
}

#[then(regex = r#"^The response body should contain "([^"]*)"$"#)]
async fn body_contains(world: &mut ApiWorld, needle: String) -> Result<()> {
    world.context.assert_body_contains(&needle)
}

#[then(regex = r#"^The response body should match "([^"]*)"$"#)]
async fn body_matches(world: &mut ApiWorld, pattern: String) -> Result<()> {
    world.context.assert_body_matches(&pattern)
}

// ---------------------------------------------------------------------------
// Timing and scope
// ---------------------------------------------------------------------------

/// Pause before the next step.
#[given(regex = r"^I wait for (\d+) seconds?$")]
#[when(regex = r"^I wait for (\d+) seconds?$")]
#[then(regex = r"^I wait for (\d+) seconds?$")]
async fn wait_for(world: &mut ApiWorld, seconds: u64) {
    world.context.wait(seconds).await;
}

#[given(regex = r#"^I store data in scope variable "([^"]*)" with value "([^"]*)"$"#)]
#[when(regex = r#"^I store data in scope variable "([^"]*)" with value "([^"]*)"$"#)]
#[then(regex = r#"^I store data in scope variable "([^"]*)" with value "([^"]*)"$"#)]
async fn store_literal(world: &mut ApiWorld, key: String, value: String) {
    world.context.store_literal(key, value);
}

#[given(regex = r#"^I store the value of response header "([^"]*)" as "([^"]*)" in scenario scope$"#)]
#[when(regex = r#"^I store the value of response header "([^"]*)" as "([^"]*)" in scenario scope$"#)]
#[then(regex = r#"^I store the value of response header "([^"]*)" as "([^"]*)" in scenario scope$"#)]
async fn store_header(world: &mut ApiWorld, name: String, key: String) -> Result<()> {
    world.context.store_header(&name, key)
}

/// Strings are stored as-is, anything else as compact JSON.
#[given(regex = r#"^I store the value of body path "([^"]*)" as "([^"]*)" in scenario scope$"#)]
#[when(regex = r#"^I store the value of body path "([^"]*)" as "([^"]*)" in scenario scope$"#)]
#[then(regex = r#"^I store the value of body path "([^"]*)" as "([^"]*)" in scenario scope$"#)]
async fn store_json_path(world: &mut ApiWorld, expr: String, key: String) -> Result<()> {
    world.context.store_json_path(&expr, key)
}

#[then(regex = r#"^The scope variable "([^"]*)" should have value "([^"]*)"$"#)]
async fn scope_value(world: &mut ApiWorld, key: String, value: String) -> Result<()> {
    world.context.assert_scope(&key, &value)
}
