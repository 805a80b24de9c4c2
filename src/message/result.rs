//! Reply result codes and request classes.

use serde::{Deserialize, Serialize};

/// Outcome of a request, as reported by a backend or produced locally.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    #[default]
    Unknown = 0,
    Ok = 1,
    Found = 2,
    NotFound = 3,
    Stored = 4,
    NotStored = 5,
    Deleted = 6,
    Timeout = 7,
    ConnectTimeout = 8,
    ConnectError = 9,
    /// Destination is marked technically-knocked-out and was not contacted.
    Tko = 10,
    Busy = 11,
    RemoteError = 12,
    LocalError = 13,
}

impl From<u8> for ResultCode {
    fn from(val: u8) -> Self {
        match val {
            1 => ResultCode::Ok,
            2 => ResultCode::Found,
            3 => ResultCode::NotFound,
            4 => ResultCode::Stored,
            5 => ResultCode::NotStored,
            6 => ResultCode::Deleted,
            7 => ResultCode::Timeout,
            8 => ResultCode::ConnectTimeout,
            9 => ResultCode::ConnectError,
            10 => ResultCode::Tko,
            11 => ResultCode::Busy,
            12 => ResultCode::RemoteError,
            13 => ResultCode::LocalError,
            _ => ResultCode::Unknown,
        }
    }
}

impl ResultCode {
    /// True for the failure class: the request did not get a protocol-level
    /// answer from the backend (or the backend reported an internal error).
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ResultCode::Timeout
                | ResultCode::ConnectTimeout
                | ResultCode::ConnectError
                | ResultCode::Tko
                | ResultCode::Busy
                | ResultCode::RemoteError
                | ResultCode::LocalError
        )
    }

    /// Ordering used when several replies compete for one logical reply.
    /// Higher is worse.
    pub fn severity(self) -> u8 {
        match self {
            ResultCode::Found
            | ResultCode::Stored
            | ResultCode::Deleted
            | ResultCode::Ok => 0,
            ResultCode::NotFound | ResultCode::NotStored => 1,
            ResultCode::Unknown => 2,
            ResultCode::Busy => 3,
            ResultCode::Tko => 4,
            ResultCode::ConnectTimeout | ResultCode::ConnectError => 5,
            ResultCode::Timeout => 6,
            ResultCode::RemoteError => 7,
            ResultCode::LocalError => 8,
        }
    }

    /// Short lowercase name for logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::Unknown => "unknown",
            ResultCode::Ok => "ok",
            ResultCode::Found => "found",
            ResultCode::NotFound => "notfound",
            ResultCode::Stored => "stored",
            ResultCode::NotStored => "notstored",
            ResultCode::Deleted => "deleted",
            ResultCode::Timeout => "timeout",
            ResultCode::ConnectTimeout => "connect_timeout",
            ResultCode::ConnectError => "connect_error",
            ResultCode::Tko => "tko",
            ResultCode::Busy => "busy",
            ResultCode::RemoteError => "remote_error",
            ResultCode::LocalError => "local_error",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request is being sent to a particular destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// First attempt on the primary routing path.
    #[default]
    Normal,
    /// Sent to an alternate destination after an earlier attempt failed.
    Failover,
    /// Copy of the request whose reply is never returned to the client.
    Shadow,
}

impl RequestClass {
    pub fn is_normal(self) -> bool {
        self == RequestClass::Normal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestClass::Normal => "normal",
            RequestClass::Failover => "failover",
            RequestClass::Shadow => "shadow",
        }
    }
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
