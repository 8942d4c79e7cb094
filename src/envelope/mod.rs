//! Response envelopes.
//!
//! A handler returns exactly one [`ResponseEnvelope`]; the [`writer`] turns it
//! into an HTTP response. The JSON envelope's `code` is a business result
//! (`0` success, non-zero failure) and is independent of the HTTP status.

mod template;
pub mod writer;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use template::{NoTemplates, RenderError, TemplateRenderer};
pub use writer::write_response;

/// Business code for a successful JSON envelope.
pub const CODE_OK: i64 = 0;
/// Business code for a failed JSON envelope.
pub const CODE_FAILURE: i64 = -1;

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    /// `{code, msg, data}` serialized as JSON. The default.
    Json(JsonEnvelope),
    /// A payload written verbatim.
    Raw(RawEnvelope),
    /// Output produced by the template renderer.
    Render(RenderEnvelope),
}

/// The `{code, msg, data}` wire object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub code: i64,
    pub msg: String,
    pub data: Value,
}

/// A non-JSON payload.
///
/// When `status` is not 200 the payload is an error explanation: it is sent as
/// plain text and `content_type` is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    pub data: Vec<u8>,
    pub status: u16,
    pub content_type: String,
}

/// A request to render `template_name` with `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEnvelope {
    pub template_name: String,
    pub fields: Map<String, Value>,
}

impl ResponseEnvelope {
    /// A JSON envelope with an explicit code and message.
    pub fn json(code: i64, msg: impl Into<String>, data: Value) -> Self {
        ResponseEnvelope::Json(JsonEnvelope {
            code,
            msg: msg.into(),
            data,
        })
    }

    /// A successful JSON envelope carrying `data`.
    pub fn success(data: Value) -> Self {
        Self::json(CODE_OK, "", data)
    }

    /// A failed JSON envelope with `msg` and null data.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::json(CODE_FAILURE, msg, Value::Null)
    }

    /// A raw payload with the given status and content type.
    pub fn raw(data: impl Into<Vec<u8>>, status: u16, content_type: impl Into<String>) -> Self {
        ResponseEnvelope::Raw(RawEnvelope {
            data: data.into(),
            status,
            content_type: content_type.into(),
        })
    }

    /// A template render request.
    pub fn render(template_name: impl Into<String>, fields: Map<String, Value>) -> Self {
        ResponseEnvelope::Render(RenderEnvelope {
            template_name: template_name.into(),
            fields,
        })
    }
}

impl JsonEnvelope {
    /// Serialize as `{"code":..,"msg":..,"data":..}` in that field order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
