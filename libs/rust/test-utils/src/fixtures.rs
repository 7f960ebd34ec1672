//! Test fixtures with sample data.
//!
//! JSON bodies shaped like the Vault HTTP API responses the gateway parses.

use serde_json::{Value, json};

/// Body of `POST /v1/auth/approle/login`.
#[must_use]
pub fn approle_login_response(token: &str, lease_duration: i64, renewable: bool) -> Value {
    json!({
        "request_id": "c6f2a1de-4f3b-2e1a-9a43-0f2b7c1d8e55",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": null,
        "auth": {
            "client_token": token,
            "accessor": "hmac-accessor",
            "policies": ["default", "app"],
            "token_policies": ["default", "app"],
            "metadata": { "role_name": "app" },
            "lease_duration": lease_duration,
            "renewable": renewable,
            "entity_id": "",
            "token_type": "service",
            "orphan": true
        }
    })
}

/// Body of `GET /v1/auth/token/lookup-self`.
#[must_use]
pub fn lookup_self_response(ttl: i64, renewable: bool) -> Value {
    json!({
        "data": {
            "accessor": "hmac-accessor",
            "creation_ttl": 120,
            "display_name": "approle",
            "explicit_max_ttl": 0,
            "policies": ["default", "app"],
            "renewable": renewable,
            "ttl": ttl,
            "type": "service"
        }
    })
}

/// Body of `POST /v1/auth/token/renew-self`.
#[must_use]
pub fn renew_self_response(token: &str, lease_duration: i64) -> Value {
    json!({
        "auth": {
            "client_token": token,
            "policies": ["default", "app"],
            "lease_duration": lease_duration,
            "renewable": true
        }
    })
}

/// Body of `GET /v1/<mount>/data/<path>` for a KV v2 engine.
#[must_use]
pub fn kv2_read_response(data: &Value, version: u64) -> Value {
    json!({
        "data": {
            "data": data,
            "metadata": {
                "created_time": "2024-03-01T10:00:00.000000Z",
                "deletion_time": "",
                "destroyed": false,
                "version": version
            }
        }
    })
}

/// Body of a KV v2 read whose current version was deleted.
#[must_use]
pub fn kv2_deleted_response(version: u64) -> Value {
    json!({
        "data": {
            "data": null,
            "metadata": {
                "deletion_time": "2024-03-02T10:00:00.000000Z",
                "destroyed": false,
                "version": version
            }
        }
    })
}

/// Vault error body.
#[must_use]
pub fn vault_error_response(message: &str) -> Value {
    json!({ "errors": [message] })
}
