//! Invocation input and output shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use secretfetch_core::RequestId;

/// Status code of every response, including failed retrievals
pub const STATUS_OK: u16 = 200;

const LOCAL_FUNCTION_ARN: &str = "arn:aws:lambda:local:000000000000:function:secretfetch";

/// The part of the invocation payload the function looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationEvent {
    /// Advisory only; never gates access to the secret
    pub mfa_verified: bool,
}

impl InvocationEvent {
    /// Read the event from an arbitrary JSON payload.
    ///
    /// Never fails: a missing key or a non-object payload reads as
    /// `mfa_verified = false`, and non-boolean values follow JSON truthiness.
    pub fn from_value(payload: &Value) -> Self {
        Self {
            mfa_verified: payload.get("mfa_verified").is_some_and(is_truthy),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Runtime context of one invocation, used only to label logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
    pub invoked_function_arn: String,
}

impl InvocationContext {
    /// Context for an invocation made outside of Lambda
    pub fn local() -> Self {
        Self {
            request_id: RequestId::new().to_string(),
            invoked_function_arn: LOCAL_FUNCTION_ARN.to_string(),
        }
    }
}

impl From<lambda_runtime::Context> for InvocationContext {
    fn from(context: lambda_runtime::Context) -> Self {
        Self {
            request_id: context.request_id,
            invoked_function_arn: context.invoked_function_arn,
        }
    }
}

/// HTTP-style result of an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: STATUS_OK,
            body: body.into(),
        }
    }

    /// The secret on success, the error text otherwise. Always 200.
    pub fn from_outcome<E: std::fmt::Display>(outcome: Result<String, E>) -> Self {
        match outcome {
            Ok(secret) => Self::ok(secret),
            Err(e) => Self::ok(e.to_string()),
        }
    }
}
