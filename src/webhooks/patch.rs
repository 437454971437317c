//! JSON-Patch model for admission responses.
//!
//! Every mutation the webhook performs is expressed as an RFC 6902 operation
//! addressed by an RFC 6901 JSON-Pointer. Pointers are built through
//! [`JsonPointer`] on top of `jsonptr`, so label keys like
//! `kai.scheduler/queue` always become `kai.scheduler~1queue` on the wire.

use std::fmt;

use json_patch::jsonptr::{PointerBuf, Token};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-Patch operation kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// A single JSON-Patch operation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    /// Create an `add` operation
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    /// Create a `replace` operation
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    /// Create a `remove` operation
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

/// Escape a single JSON-Pointer reference token (`~` to `~0`, `/` to `~1`)
pub fn escape_token(token: &str) -> String {
    Token::new(token).encoded().to_owned()
}

/// Builder for JSON-Pointer paths.
///
/// ```
/// use gpu_pool_webhook::webhooks::patch::JsonPointer;
///
/// let path = JsonPointer::root()
///     .push("metadata")
///     .push("labels")
///     .push("kai.scheduler/queue");
/// assert_eq!(path.as_str(), "/metadata/labels/kai.scheduler~1queue");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonPointer(PointerBuf);

impl JsonPointer {
    /// The empty pointer, referencing the whole document
    pub fn root() -> Self {
        Self(PointerBuf::new())
    }

    /// Build a pointer from unescaped tokens
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        tokens
            .into_iter()
            .fold(Self::root(), |ptr, token| ptr.push(token.as_ref()))
    }

    /// Append an unescaped token
    pub fn push(mut self, token: &str) -> Self {
        self.0.push_back(Token::new(token));
        self
    }

    /// Append an array index
    pub fn index(mut self, index: usize) -> Self {
        self.0.push_back(Token::new(index.to_string()));
        self
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unescaped tokens of this pointer
    pub fn tokens(&self) -> impl Iterator<Item = String> + '_ {
        self.0.tokens().map(|t| t.decoded().into_owned())
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JsonPointer> for String {
    fn from(ptr: JsonPointer) -> Self {
        ptr.as_str().to_owned()
    }
}

/// Convert operations into the `json_patch` representation used by kube-rs
/// admission responses.
pub fn to_json_patch(ops: &[PatchOperation]) -> Result<json_patch::Patch, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(ops)?)
}
