use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Request, Url};

use crate::errors::{Result, StepError};
use crate::scope::Scope;

/// How a form-body value is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain form field.
    Text,
    /// The value is a local path; the file contents are uploaded.
    File,
}

impl FromStr for FieldKind {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(FieldKind::Text),
            "file" => Ok(FieldKind::File),
            other => Err(StepError::InvalidTable(format!(
                "unknown form field type {other:?}, expected \"text\" or \"file\""
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub key: String,
    pub value: String,
    pub kind: FieldKind,
}

impl FormField {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        FormField {
            key: key.into(),
            value: value.into(),
            kind: FieldKind::Text,
        }
    }

    pub fn file(key: impl Into<String>, path: impl Into<String>) -> Self {
        FormField {
            key: key.into(),
            value: path.into(),
            kind: FieldKind::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `multipart/form-data`, fields in table order.
    Form(Vec<FormField>),
    /// Sent verbatim; Content-Type comes from the accumulated headers.
    Raw(String),
}

impl RequestBody {
    /// Expand scope references in the raw body and in text field values.
    /// File paths are used as written.
    pub fn resolve(self, scope: &Scope) -> Self {
        match self {
            RequestBody::Empty => RequestBody::Empty,
            RequestBody::Form(fields) => RequestBody::Form(
                fields
                    .into_iter()
                    .map(|f| match f.kind {
                        FieldKind::Text => FormField {
                            value: scope.resolve(&f.value),
                            ..f
                        },
                        FieldKind::File => f,
                    })
                    .collect(),
            ),
            RequestBody::Raw(text) => RequestBody::Raw(scope.resolve(&text)),
        }
    }
}

/// What was actually sent, kept after the request for inspection.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Raw body text, or a field summary for multipart bodies.
    pub body: Option<String>,
}

impl RequestRecord {
    /// Wire-style rendering for debug output.
    pub fn dump(&self) -> String {
        let mut out = format!("{} {} HTTP/1.1\n", self.method, self.url);
        for (name, value) in &self.headers {
            let _ = writeln!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
        }
        if let Some(body) = &self.body {
            let _ = write!(out, "\n{body}");
        }
        out
    }
}

/// Build a request against `url` from the accumulated headers and query
/// parameters. Both maps are taken as already resolved.
pub(crate) async fn build(
    client: &Client,
    method: &str,
    url: &str,
    headers: &HashMap<String, String>,
    query: &HashMap<String, String>,
    body: RequestBody,
) -> Result<(Request, RequestRecord)> {
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| StepError::InvalidRequest(format!("invalid HTTP method `{method}`: {e}")))?;
    let url = Url::parse(url)
        .map_err(|e| StepError::InvalidRequest(format!("invalid URL `{url}`: {e}")))?;

    let mut header_map = build_headers(headers)?;
    let mut builder = client.request(method, url);

    if !query.is_empty() {
        let mut pairs: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable();
        builder = builder.query(&pairs);
    }

    let summary = match body {
        RequestBody::Empty => {
            builder = builder.headers(header_map);
            None
        }
        RequestBody::Form(fields) => {
            // The multipart boundary has to win over any user Content-Type.
            header_map.remove(CONTENT_TYPE);
            let (form, summary) = multipart_form(&fields).await?;
            builder = builder.headers(header_map).multipart(form);
            Some(summary)
        }
        RequestBody::Raw(text) => {
            builder = builder.headers(header_map).body(text.clone());
            Some(text)
        }
    };

    let request = builder
        .build()
        .map_err(|e| StepError::InvalidRequest(e.to_string()))?;
    let record = RequestRecord {
        method: request.method().clone(),
        url: request.url().clone(),
        headers: request.headers().clone(),
        body: summary,
    };
    Ok((request, record))
}

fn build_headers(input: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in input {
        if key.trim().is_empty() {
            return Err(StepError::InvalidTable(format!(
                "header with value {value:?} has no name"
            )));
        }
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| StepError::InvalidRequest(format!("invalid header name `{key}`: {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            StepError::InvalidRequest(format!("invalid header value for `{key}`: {e}"))
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

async fn multipart_form(fields: &[FormField]) -> Result<(Form, String)> {
    let mut form = Form::new();
    let mut parts = Vec::with_capacity(fields.len());
    for field in fields {
        match field.kind {
            FieldKind::Text => {
                parts.push(format!("{}={}", field.key, field.value));
                form = form.text(field.key.clone(), field.value.clone());
            }
            FieldKind::File => {
                let path = PathBuf::from(&field.value);
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|source| StepError::UploadFile {
                        path: path.clone(),
                        source,
                    })?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| field.value.clone());
                parts.push(format!("{}=@{file_name} ({} bytes)", field.key, bytes.len()));
                form = form.part(field.key.clone(), Part::bytes(bytes).file_name(file_name));
            }
        }
    }
    Ok((form, format!("multipart/form-data: {}", parts.join(", "))))
}
