//! Plain Rust types exchanged between the provider and the gRPC layer.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generated;

/// The protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Prefix of the handshake line printed on stdout.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

/// Format the handshake line: `HEMMER_PROVIDER|<version>|<address>`.
pub fn handshake_line(addr: SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}

/// A change to a single attribute during a plan.
///
/// `before` is `None` when the attribute is being set for the first time and
/// `after` is `None` when it is being removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a change for a newly set attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// Compare two optional values, returning a change when they differ.
    ///
    /// `None` and `Value::Null` are treated as the same absent value.
    pub fn between(path: impl Into<String>, before: Option<&Value>, after: Option<&Value>) -> Option<Self> {
        let before = before.filter(|v| !v.is_null()).cloned();
        let after = after.filter(|v| !v.is_null()).cloned();
        if before == after {
            return None;
        }
        Some(Self {
            path: path.into(),
            before,
            after,
        })
    }
}

fn encode_json(value: Option<&Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(v).ok())
        .unwrap_or_default()
}

fn decode_json(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

impl From<generated::AttributeChange> for AttributeChange {
    fn from(proto: generated::AttributeChange) -> Self {
        Self {
            path: proto.path,
            before: decode_json(&proto.before),
            after: decode_json(&proto.after),
        }
    }
}

impl From<AttributeChange> for generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            before: encode_json(change.before.as_ref()),
            after: encode_json(change.after.as_ref()),
            path: change.path,
        }
    }
}

/// The result of planning a resource change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the resource will have once the change is applied.
    pub planned_state: Value,
    pub changes: Vec<AttributeChange>,
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves the resource untouched.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan that applies `changes` in place.
    pub fn in_place(planned_state: Value, changes: Vec<AttributeChange>) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace: false,
        }
    }
}

/// A resource state produced by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub resource_type: String,
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

impl From<ImportedResource> for generated::ImportedResource {
    fn from(imported: ImportedResource) -> Self {
        Self {
            state: encode_json(Some(&imported.state)),
            resource_type: imported.resource_type,
        }
    }
}

/// Provider metadata returned by `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    pub resources: Vec<String>,
    pub data_sources: Vec<String>,
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The provider plans destroy operations (reports what a delete removes).
    pub plan_destroy: bool,
}

impl From<ServerCapabilities> for generated::ServerCapabilities {
    fn from(caps: ServerCapabilities) -> Self {
        Self {
            plan_destroy: caps.plan_destroy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_line_format() {
        let addr: SocketAddr = "127.0.0.1:50051".parse().unwrap();
        assert_eq!(handshake_line(addr), "HEMMER_PROVIDER|1|127.0.0.1:50051");
    }

    #[test]
    fn test_change_between() {
        assert!(AttributeChange::between("range", Some(&json!("A1")), Some(&json!("A1"))).is_none());
        assert!(AttributeChange::between("range", None, Some(&Value::Null)).is_none());

        let change =
            AttributeChange::between("range", Some(&json!("A1")), Some(&json!("B2"))).unwrap();
        assert_eq!(change.before, Some(json!("A1")));
        assert_eq!(change.after, Some(json!("B2")));

        let change = AttributeChange::between("clear_on_destroy", None, Some(&json!(true))).unwrap();
        assert!(change.before.is_none());
    }

    #[test]
    fn test_attribute_change_to_proto() {
        let proto: generated::AttributeChange =
            AttributeChange::added("id", json!("abc/Sheet1!A1")).into();
        assert_eq!(proto.path, "id");
        assert!(proto.before.is_empty());
        assert_eq!(proto.after, br#""abc/Sheet1!A1""#.to_vec());

        let back: AttributeChange = proto.into();
        assert_eq!(back.after, Some(json!("abc/Sheet1!A1")));
        assert!(back.before.is_none());
    }

    #[test]
    fn test_imported_resource_to_proto() {
        let proto: generated::ImportedResource =
            ImportedResource::new("googlespreadsheets_rows", json!({"id": "abc/A1"})).into();
        assert_eq!(proto.resource_type, "googlespreadsheets_rows");
        let state: Value = serde_json::from_slice(&proto.state).unwrap();
        assert_eq!(state["id"], "abc/A1");
    }
}
