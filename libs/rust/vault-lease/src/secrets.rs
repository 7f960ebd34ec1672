//! Vault HTTP response bodies.
//!
//! Only the fields the lease manager uses are modelled; everything else in
//! the payload is ignored.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Response of `auth/approle/login` and `auth/token/renew-self`.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub auth: Option<AuthData>,
}

#[derive(Debug, Deserialize)]
pub struct AuthData {
    #[serde(default)]
    pub client_token: String,
    pub lease_duration: i64,
    #[serde(default)]
    pub renewable: bool,
}

/// Response of `auth/token/lookup-self`.
#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    pub data: LookupData,
}

#[derive(Debug, Deserialize)]
pub struct LookupData {
    pub ttl: i64,
    #[serde(default)]
    pub renewable: bool,
}

/// Response of a KV v2 `<mount>/data/<path>` read.
#[derive(Debug, Deserialize)]
pub struct KvResponse {
    pub data: KvData,
}

#[derive(Debug, Deserialize)]
pub struct KvData {
    /// `null` when the current version is deleted or destroyed
    pub data: Option<HashMap<String, Value>>,
    pub metadata: Option<KvMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct KvMetadata {
    pub version: Option<u64>,
}

/// Flatten KV values to strings; non-string JSON keeps its JSON text.
#[must_use]
pub fn stringify_values(data: HashMap<String, Value>) -> BTreeMap<String, String> {
    data.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_response_parses_versioned_read() {
        let body = r#"{
            "request_id": "5d0a3a51",
            "lease_id": "",
            "renewable": false,
            "lease_duration": 0,
            "data": {
                "data": {"username": "app", "port": 5432, "tls": true},
                "metadata": {"created_time": "2024-01-01T00:00:00Z", "version": 7}
            }
        }"#;
        let parsed: KvResponse = serde_json::from_str(body).unwrap();
        let data = stringify_values(parsed.data.data.unwrap());

        assert_eq!(data["username"], "app");
        assert_eq!(data["port"], "5432");
        assert_eq!(data["tls"], "true");
        assert_eq!(parsed.data.metadata.unwrap().version, Some(7));
    }

    #[test]
    fn test_deleted_version_has_null_data() {
        let body = r#"{"data": {"data": null, "metadata": {"version": 3}}}"#;
        let parsed: KvResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.data.data.is_none());
    }

    #[test]
    fn test_auth_response_without_auth_block() {
        let parsed: AuthResponse = serde_json::from_str(r#"{"auth": null}"#).unwrap();
        assert!(parsed.auth.is_none());
    }
}
