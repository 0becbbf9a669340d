//! Wire types for the line-delimited JSON-RPC dialect
//!
//! One JSON value per line. Requests are `{"id", "method", "params"}`,
//! responses echo the id with `result` or `error`, notifications carry a
//! method but no id, and batches are a JSON array of the above on one line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing request. Field order here is wire order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// Incoming response for one request id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Response {
    /// Collapse the result/error pair into a single outcome.
    /// A response carrying neither member counts as a null result.
    pub fn into_outcome(self) -> Result<Value, Value> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Server-pushed message with no id, correlated by method name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

/// Classified shape of one parsed wire document
#[derive(Debug)]
pub enum IncomingMessage {
    Response(Response),
    BatchResponse(Vec<Response>),
    Notification(Notification),
}

impl IncomingMessage {
    /// Classify a parsed JSON document: an array is a batch response, an
    /// object with an `id` member is a response, an object without one is a
    /// notification. Anything else is a protocol violation.
    pub fn classify(value: Value) -> Result<Self, crate::ClientError> {
        match value {
            Value::Array(elements) => {
                let mut responses = Vec::with_capacity(elements.len());
                for element in elements {
                    match serde_json::from_value::<Response>(element) {
                        Ok(response) => responses.push(response),
                        Err(e) => {
                            return Err(crate::ClientError::protocol(format!(
                                "invalid batch response element: {}",
                                e
                            )))
                        }
                    }
                }
                Ok(Self::BatchResponse(responses))
            }
            Value::Object(ref map) if map.contains_key("id") => {
                serde_json::from_value::<Response>(value)
                    .map(Self::Response)
                    .map_err(|e| {
                        crate::ClientError::protocol(format!("invalid response: {}", e))
                    })
            }
            Value::Object(_) => serde_json::from_value::<Notification>(value)
                .map(Self::Notification)
                .map_err(|e| {
                    crate::ClientError::protocol(format!("invalid notification: {}", e))
                }),
            other => Err(crate::ClientError::protocol(format!(
                "expected object or array, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let req = Request::new(1, "server.ping", json!([]));
        let wire = serde_json::to_string(&req).unwrap();
        assert_eq!(wire, r#"{"id":1,"method":"server.ping","params":[]}"#);
    }

    #[test]
    fn test_classify_response() {
        let msg = IncomingMessage::classify(json!({"id": 3, "result": "ok"})).unwrap();
        match msg {
            IncomingMessage::Response(resp) => {
                assert_eq!(resp.id, 3);
                assert_eq!(resp.into_outcome().unwrap(), json!("ok"));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_response() {
        let msg =
            IncomingMessage::classify(json!({"id": 4, "error": {"message": "nope"}})).unwrap();
        match msg {
            IncomingMessage::Response(resp) => {
                assert_eq!(resp.into_outcome().unwrap_err(), json!({"message": "nope"}));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_notification() {
        let msg = IncomingMessage::classify(
            json!({"method": "ledger.tip", "params": [{ "height": 10 }]}),
        )
        .unwrap();
        match msg {
            IncomingMessage::Notification(n) => assert_eq!(n.method, "ledger.tip"),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_batch() {
        let msg = IncomingMessage::classify(json!([
            {"id": 1, "result": null},
            {"id": 2, "error": "boom"}
        ]))
        .unwrap();
        match msg {
            IncomingMessage::BatchResponse(responses) => assert_eq!(responses.len(), 2),
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_rejects_scalar() {
        assert!(IncomingMessage::classify(json!(42)).is_err());
    }

    #[test]
    fn test_response_without_result_or_error_is_null() {
        let resp: Response = serde_json::from_value(json!({"id": 9})).unwrap();
        assert_eq!(resp.into_outcome().unwrap(), Value::Null);
    }
}
