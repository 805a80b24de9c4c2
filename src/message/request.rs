//! Typed requests and replies.
//!
//! # Responsibilities
//! - Define the request shapes the proxy understands
//! - Tie each request type to its reply type
//! - Convert to and from the transport's wire representation
//!
//! # Design Decisions
//! - Replies are only built from a result code plus message, or from the wire;
//!   value-carrying replies are constructed explicitly by field so a result
//!   code can never be mistaken for a value

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::result::ResultCode;
use crate::transport::{WireReply, WireRequest};

/// Protocol operation carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Get,
    Set,
    Delete,
}

impl Operation {
    pub fn is_read(self) -> bool {
        matches!(self, Operation::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Operation::Get),
            "set" => Ok(Operation::Set),
            "delete" => Ok(Operation::Delete),
            other => Err(format!("unknown operation: {}", other)),
        }
    }
}

/// A request shape the proxy can route.
pub trait Request: Clone + fmt::Debug + Send + Sync + 'static {
    /// Reply type produced for this request.
    type Reply: Reply;

    const OPERATION: Operation;

    /// Full routing key.
    fn key(&self) -> &str;

    /// Copy of this request addressed to a different key.
    fn with_key(&self, key: String) -> Self;

    fn to_wire(&self) -> WireRequest;

    /// Reply returned when the request is absorbed without contacting a
    /// backend (recording traversal, background fan-out).
    fn default_reply(&self) -> Self::Reply;

    /// Stable hash of the routing key, shared by destination selection and
    /// log sampling.
    fn routing_key_hash(&self) -> u32 {
        crc32fast::hash(self.key().as_bytes())
    }
}

/// A reply to a [`Request`].
pub trait Reply: Clone + fmt::Debug + Send + Sync + 'static {
    fn result(&self) -> ResultCode;

    /// Error or status text attached to the reply, if any.
    fn message(&self) -> Option<&str>;

    /// Builds a reply that carries only a result code and a message.
    fn from_result(result: ResultCode, message: impl Into<String>) -> Self;

    fn from_wire(wire: WireReply) -> Self;
}

fn non_empty(message: String) -> Option<String> {
    if message.is_empty() {
        None
    } else {
        Some(message)
    }
}

/// Fetch a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub key: String,
}

impl GetRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetReply {
    pub result: ResultCode,
    pub value: Option<Vec<u8>>,
    pub message: Option<String>,
}

impl GetReply {
    /// A hit carrying `value`.
    pub fn found(value: impl Into<Vec<u8>>) -> Self {
        Self {
            result: ResultCode::Found,
            value: Some(value.into()),
            message: None,
        }
    }
}

impl Request for GetRequest {
    type Reply = GetReply;
    const OPERATION: Operation = Operation::Get;

    fn key(&self) -> &str {
        &self.key
    }

    fn with_key(&self, key: String) -> Self {
        Self { key }
    }

    fn to_wire(&self) -> WireRequest {
        WireRequest {
            operation: Operation::Get,
            key: self.key.clone(),
            value: None,
            exptime: 0,
        }
    }

    fn default_reply(&self) -> GetReply {
        GetReply::from_result(ResultCode::NotFound, "")
    }
}

impl Reply for GetReply {
    fn result(&self) -> ResultCode {
        self.result
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn from_result(result: ResultCode, message: impl Into<String>) -> Self {
        Self {
            result,
            value: None,
            message: non_empty(message.into()),
        }
    }

    fn from_wire(wire: WireReply) -> Self {
        Self {
            result: wire.result,
            value: wire.value,
            message: wire.message,
        }
    }
}

/// Store a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub key: String,
    pub value: Vec<u8>,
    /// Expiration in seconds; 0 means never.
    pub exptime: u32,
}

impl SetRequest {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            exptime: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetReply {
    pub result: ResultCode,
    pub message: Option<String>,
}

impl Request for SetRequest {
    type Reply = SetReply;
    const OPERATION: Operation = Operation::Set;

    fn key(&self) -> &str {
        &self.key
    }

    fn with_key(&self, key: String) -> Self {
        Self {
            key,
            value: self.value.clone(),
            exptime: self.exptime,
        }
    }

    fn to_wire(&self) -> WireRequest {
        WireRequest {
            operation: Operation::Set,
            key: self.key.clone(),
            value: Some(self.value.clone()),
            exptime: self.exptime,
        }
    }

    fn default_reply(&self) -> SetReply {
        SetReply::from_result(ResultCode::NotStored, "")
    }
}

impl Reply for SetReply {
    fn result(&self) -> ResultCode {
        self.result
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn from_result(result: ResultCode, message: impl Into<String>) -> Self {
        Self {
            result,
            message: non_empty(message.into()),
        }
    }

    fn from_wire(wire: WireReply) -> Self {
        Self {
            result: wire.result,
            message: wire.message,
        }
    }
}

/// Remove a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: String,
}

impl DeleteRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteReply {
    pub result: ResultCode,
    pub message: Option<String>,
}

impl Request for DeleteRequest {
    type Reply = DeleteReply;
    const OPERATION: Operation = Operation::Delete;

    fn key(&self) -> &str {
        &self.key
    }

    fn with_key(&self, key: String) -> Self {
        Self { key }
    }

    fn to_wire(&self) -> WireRequest {
        WireRequest {
            operation: Operation::Delete,
            key: self.key.clone(),
            value: None,
            exptime: 0,
        }
    }

    fn default_reply(&self) -> DeleteReply {
        DeleteReply::from_result(ResultCode::NotFound, "")
    }
}

impl Reply for DeleteReply {
    fn result(&self) -> ResultCode {
        self.result
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn from_result(result: ResultCode, message: impl Into<String>) -> Self {
        Self {
            result,
            message: non_empty(message.into()),
        }
    }

    fn from_wire(wire: WireReply) -> Self {
        Self {
            result: wire.result,
            message: wire.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_replies_are_misses() {
        assert_eq!(GetRequest::new("k").default_reply().result, ResultCode::NotFound);
        assert_eq!(
            SetRequest::new("k", "v").default_reply().result,
            ResultCode::NotStored
        );
        assert_eq!(DeleteRequest::new("k").default_reply().result, ResultCode::NotFound);
    }

    #[test]
    fn from_result_never_carries_a_value() {
        let reply = GetReply::from_result(ResultCode::Found, "value");
        assert_eq!(reply.result, ResultCode::Found);
        assert!(reply.value.is_none());
        assert_eq!(reply.message(), Some("value"));
    }

    #[test]
    fn routing_key_hash_is_stable() {
        let a = GetRequest::new("user:42");
        let b = DeleteRequest::new("user:42");
        assert_eq!(a.routing_key_hash(), b.routing_key_hash());
        assert_eq!(a.routing_key_hash(), crc32fast::hash(b"user:42"));
    }

    #[test]
    fn with_key_keeps_payload() {
        let req = SetRequest {
            key: "a".into(),
            value: b"v".to_vec(),
            exptime: 30,
        };
        let moved = req.with_key("b".into());
        assert_eq!(moved.key, "b");
        assert_eq!(moved.value, b"v");
        assert_eq!(moved.exptime, 30);
    }

    #[test]
    fn operation_parses_case_insensitively() {
        assert_eq!("GET".parse::<Operation>().unwrap(), Operation::Get);
        assert!("incr".parse::<Operation>().is_err());
    }
}
