// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Request Context
//!
//! Transport-neutral view of one inbound request. The HTTP middleware builds it
//! from an axum request; message transports build it from a JSON message that
//! carries its headers under a `headers` key.
//!
//! The body starts as the bytes received and is replaced wholesale by a
//! [`VerifiedPayload`] once the envelope has been opened.

use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

use crate::domain::envelope::VerifiedPayload;

/// Method reported in audit records for message-transport requests.
pub const MESSAGE_METHOD: &str = "RPC";

/// Who sent the request and where it was going. Written to every audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    pub method: String,
    pub path: String,
    pub caller: Option<IpAddr>,
}

impl AuditContext {
    pub fn caller_display(&self) -> String {
        self.caller
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone)]
enum Body {
    Received(Vec<u8>),
    Verified(VerifiedPayload),
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    audit: AuditContext,
    headers: HashMap<String, String>,
    body: Body,
}

impl RequestContext {
    /// Header names are matched case-insensitively; the first value of a
    /// repeated header wins.
    pub fn new<I, K, V>(audit: AuditContext, headers: I, body: Vec<u8>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = HashMap::new();
        for (name, value) in headers {
            map.entry(name.as_ref().to_ascii_lowercase())
                .or_insert_with(|| value.into());
        }
        Self {
            audit,
            headers: map,
            body: Body::Received(body),
        }
    }

    /// Build a context from a message whose headers travel inside the message
    /// under `headers`. Non-string header values are ignored.
    pub fn from_message(pattern: &str, message: &Value) -> Self {
        let headers = message
            .get("headers")
            .and_then(Value::as_object)
            .map(|h| {
                h.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let audit = AuditContext {
            method: MESSAGE_METHOD.to_string(),
            path: pattern.to_string(),
            caller: None,
        };
        Self::new(audit, headers, message.to_string().into_bytes())
    }

    pub fn audit(&self) -> &AuditContext {
        &self.audit
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Remove and return a header so it cannot be read twice.
    pub fn take_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    /// Bytes as received, or the serialized payload after injection.
    pub fn body_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match &self.body {
            Body::Received(bytes) => std::borrow::Cow::Borrowed(bytes),
            Body::Verified(payload) => {
                std::borrow::Cow::Owned(payload.as_value().to_string().into_bytes())
            }
        }
    }

    pub fn verified_payload(&self) -> Option<&VerifiedPayload> {
        match &self.body {
            Body::Received(_) => None,
            Body::Verified(payload) => Some(payload),
        }
    }

    /// Drop whatever body the caller sent and install the verified payload.
    pub fn replace_body(&mut self, payload: VerifiedPayload) {
        self.body = Body::Verified(payload);
    }

    pub fn into_body_bytes(self) -> Vec<u8> {
        match self.body {
            Body::Received(bytes) => bytes,
            Body::Verified(payload) => payload.into_value().to_string().into_bytes(),
        }
    }

    /// The body as JSON. An empty received body reads as `null`.
    pub fn into_json(self) -> Result<Value, serde_json::Error> {
        match self.body {
            Body::Verified(payload) => Ok(payload.into_value()),
            Body::Received(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Value::Null),
            Body::Received(bytes) => serde_json::from_slice(&bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn audit() -> AuditContext {
        AuditContext {
            method: "POST".to_string(),
            path: "/api/v1/elections".to_string(),
            caller: Some("10.0.0.7".parse().unwrap()),
        }
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let ctx = RequestContext::new(audit(), [("X-Api-Key", "k")], vec![]);
        assert_eq!(ctx.header("x-api-key"), Some("k"));
        assert_eq!(ctx.header("X-API-KEY"), Some("k"));
    }

    #[test]
    fn test_first_repeated_header_wins() {
        let ctx = RequestContext::new(audit(), [("x-api-key", "first"), ("X-API-KEY", "second")], vec![]);
        assert_eq!(ctx.header("x-api-key"), Some("first"));
    }

    #[test]
    fn test_take_header_consumes() {
        let mut ctx = RequestContext::new(audit(), [("x-security-envelope", "e")], vec![]);
        assert_eq!(ctx.take_header("x-security-envelope").as_deref(), Some("e"));
        assert_eq!(ctx.header("x-security-envelope"), None);
    }

    #[test]
    fn test_replace_body_discards_received_fields() {
        let mut ctx = RequestContext::new(audit(), Vec::<(String, String)>::new(), br#"{"smuggled":true,"name":"x"}"#.to_vec());
        ctx.replace_body(VerifiedPayload::new(json!({"name": "signed"})));
        assert_eq!(ctx.into_json().unwrap(), json!({"name": "signed"}));
    }

    #[test]
    fn test_message_headers_are_extracted() {
        let message = json!({
            "headers": {"x-api-key": "secret1", "x-retry": 3},
            "electionId": "e-1"
        });
        let ctx = RequestContext::from_message("election.create", &message);
        assert_eq!(ctx.header("x-api-key"), Some("secret1"));
        assert_eq!(ctx.header("x-retry"), None);
        assert_eq!(ctx.audit().method, MESSAGE_METHOD);
        assert_eq!(ctx.audit().path, "election.create");
        assert_eq!(ctx.audit().caller_display(), "unknown");
    }

    #[test]
    fn test_empty_body_reads_as_null() {
        let ctx = RequestContext::new(audit(), Vec::<(String, String)>::new(), b"  ".to_vec());
        assert_eq!(ctx.into_json().unwrap(), Value::Null);
    }
}
