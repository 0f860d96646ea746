use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::error::DecodeError;

/// Identifies one recorded operation. Rendered as url-safe base64 (ulid bytes);
/// the alternate form (`{:#}`) prints the short tail for logs.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OperationId(Ulid);

impl OperationId {
    pub fn new() -> Self { OperationId(Ulid::new()) }

    pub fn from_bytes(bytes: [u8; 16]) -> Self { OperationId(Ulid::from_bytes(bytes)) }

    pub fn to_bytes(&self) -> [u8; 16] { self.0.to_bytes() }

    pub fn from_base64<T: AsRef<[u8]>>(input: T) -> Result<Self, DecodeError> {
        let decoded = general_purpose::URL_SAFE_NO_PAD.decode(input).map_err(DecodeError::InvalidBase64)?;
        let bytes: [u8; 16] = decoded[..].try_into().map_err(|_| DecodeError::InvalidLength)?;

        Ok(OperationId(Ulid::from_bytes(bytes)))
    }

    pub fn to_base64(&self) -> String { general_purpose::URL_SAFE_NO_PAD.encode(self.0.to_bytes()) }

    pub fn to_base64_short(&self) -> String {
        // take the last 6 characters of the base64 encoded string
        let value = self.to_base64();
        value[value.len() - 6..].to_string()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        if f.alternate() {
            write!(f, "{}", self.to_base64_short())
        } else {
            write!(f, "{}", self.to_base64())
        }
    }
}

impl TryFrom<&str> for OperationId {
    type Error = DecodeError;
    fn try_from(id: &str) -> Result<Self, Self::Error> { Self::from_base64(id) }
}

impl TryFrom<String> for OperationId {
    type Error = DecodeError;
    fn try_from(id: String) -> Result<Self, Self::Error> { Self::try_from(id.as_str()) }
}

impl std::fmt::Debug for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

impl From<OperationId> for Ulid {
    fn from(id: OperationId) -> Self { id.0 }
}

impl Default for OperationId {
    fn default() -> Self { Self::new() }
}

/// Identifies a transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(Ulid);

impl TransactionId {
    pub fn new() -> Self { Self(Ulid::new()) }
}

impl Default for TransactionId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id_str = self.0.to_string();
        write!(f, "T{}", &id_str[20..])
    }
}

/// Identifies a tracked container for audit matching. The ledger stores target
/// ids on operations; it never owns the targets themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(Ulid);

impl TargetId {
    pub fn new() -> Self { Self(Ulid::new()) }
}

impl Default for TargetId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id_str = self.0.to_string();
        write!(f, "Tg{}", &id_str[20..])
    }
}
