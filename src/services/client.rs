//! Blocking HTTP client for remote-reply services, plus the canned
//! keyword fallback used when a service cannot answer.
//!
//! The interpreter core is synchronous; these calls run on blocking worker
//! threads (the HTTP surface wraps turns in `spawn_blocking`), so the
//! blocking reqwest client is the right tool here.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use super::{Method, ResponseFormat, ServiceConfig};
use crate::error::EngineError;

/// One outgoing service call.
#[derive(Debug, Default)]
pub struct ServiceRequest {
    pub input: String,
    /// `star1..starN` of the matched pattern, sent only when the service
    /// opts in via `include_wildcards`.
    pub wildcards: BTreeMap<String, String>,
    pub botid: Option<String>,
}

/// Issue the HTTP call described by `config` and interpret the response.
pub fn call(config: &ServiceConfig, request: &ServiceRequest) -> Result<String, EngineError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()
        .map_err(|e| EngineError::Service(config.name.clone(), e.to_string()))?;

    let mut builder = match config.method {
        Method::Get => {
            let separator = if config.base_url.contains('?') { '&' } else { '?' };
            let url = format!(
                "{}{}input={}",
                config.base_url,
                separator,
                urlencoding::encode(&request.input)
            );
            client.get(url)
        }
        Method::Post => {
            let mut body = json!({ "input": request.input });
            if config.include_wildcards && !request.wildcards.is_empty() {
                body["wildcards"] = json!(request.wildcards);
            }
            if let Some(botid) = &request.botid {
                body["botid"] = json!(botid);
            }
            if let Some(host) = &config.host {
                body["host"] = json!(host);
            }
            if let Some(hint) = &config.hint {
                body["hint"] = json!(hint);
            }
            client
                .post(&config.base_url)
                .header("Content-Type", "application/json")
                .json(&body)
        }
    };
    for (name, value) in &config.headers {
        builder = builder.header(name, value);
    }

    let response = builder.send().map_err(|e| {
        if e.is_timeout() {
            EngineError::ServiceTimeout(config.name.clone())
        } else {
            EngineError::Service(config.name.clone(), e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::Service(
            config.name.clone(),
            format!("HTTP {status}"),
        ));
    }

    let body = response
        .text()
        .map_err(|e| EngineError::Service(config.name.clone(), e.to_string()))?;
    interpret(config, body)
}

fn interpret(config: &ServiceConfig, body: String) -> Result<String, EngineError> {
    match config.response_format {
        ResponseFormat::Text | ResponseFormat::Xml => Ok(body),
        ResponseFormat::Json => {
            let value: Value = serde_json::from_str(&body)
                .map_err(|e| EngineError::Service(config.name.clone(), format!("bad JSON: {e}")))?;
            let Some(path) = &config.response_path else {
                return Ok(body);
            };
            let mut cursor = &value;
            for segment in path.split('.') {
                cursor = cursor.get(segment).ok_or_else(|| {
                    EngineError::Service(config.name.clone(), format!("missing response path '{path}'"))
                })?;
            }
            Ok(match cursor.as_str() {
                Some(s) => s.to_string(),
                None => cursor.to_string(),
            })
        }
    }
}

/// Words too generic to anchor a canned reply on.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "do", "does", "did", "what",
    "who", "when", "where", "why", "how", "i", "you", "me", "my", "your", "it", "its", "this",
    "that", "of", "for", "to", "in", "on", "at", "and", "or", "please", "tell", "about", "know",
];

/// Deterministic keyword-driven fallback when a service is unreachable and
/// no explicit fallback text is configured. Always plain text, never markup.
pub fn fallback_reply(service: &str, query: &str) -> String {
    let keywords = content_words(query);
    if keywords.is_empty() {
        return format!("The {service} service is not responding right now. Please try again in a moment.");
    }
    if keywords.iter().any(|w| w == "weather" || w == "forecast") {
        return format!(
            "The {service} service is offline, so I have no live forecast for {} right now.",
            keywords.join(" ")
        );
    }
    if keywords.iter().any(|w| w == "news" || w == "headlines") {
        return format!(
            "The {service} service is offline, so I can't fetch {} at the moment.",
            keywords.join(" ")
        );
    }
    format!(
        "The {service} service is not responding right now, so I can't look up {} for you. Let's come back to it later.",
        keywords.join(" ")
    )
}

fn content_words(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Log helper: services must never leak raw user text at info level.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

pub(crate) fn warn_service_failure(service: &str, query: &str, err: &EngineError) {
    warn!(service, query = %anon_hash(query), error = %err, "service call failed");
}
