//! Typed outcome of a gateway call and the classifier that produces it.
//!
//! The gateway overloads the HTTP status: `200` carries a signed JSON API result,
//! `302` is the browser-redirect flow of the cashier page. Classification branches on
//! the status first and only then looks at the body.

use crate::sign;
use crate::types::{Endpoint, Key, ParameterSet, ResponseFields};
use crate::transport::TransportResponse;
use reqwest::StatusCode;
use serde_json::{Map, Value};

/// Message used when no gateway message is available.
pub const REQUEST_FAILED_MSG: &str = "request failed";

/// Message used when the response signature does not verify.
pub const BAD_SIGNATURE_MSG: &str = "response signature mismatch";

/// Why a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The gateway rejected the operation (`return_code` 0)
    Business,
    /// The response signature did not verify
    InvalidSignature,
    /// Unexpected status or a body that is not a JSON object
    NoJson,
}

/// A successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Success {
    /// HTTP status of the response
    pub status: StatusCode,
    /// Business fields (empty for the redirect flow)
    pub fields: ResponseFields,
    /// Whether the order is paid; set for order queries only
    pub paid: Option<bool>,
    /// Cashier page to send the browser to
    pub redirect: Option<String>,
    /// Raw response body
    pub raw_body: String,
}

/// A failed call.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// HTTP status of the response
    pub status: StatusCode,
    /// Failure category
    pub kind: FailureKind,
    /// Gateway `return_code`, when a JSON body was available
    pub code: Option<i64>,
    /// Gateway message, or a fixed message for non-business failures
    pub message: Option<String>,
    /// Decoded body, `None` when there was no JSON
    pub body: Option<Value>,
}

impl Failure {
    fn no_json(status: StatusCode) -> Self {
        Self {
            status,
            kind: FailureKind::NoJson,
            code: None,
            message: Some(REQUEST_FAILED_MSG.to_string()),
            body: None,
        }
    }
}

/// Outcome of one request/response cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PayResult {
    /// The gateway accepted the call
    Success(Success),
    /// The call failed; see [`Failure::kind`]
    Fail(Failure),
}

impl PayResult {
    /// Returns true for [`PayResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, PayResult::Success(_))
    }

    /// Returns the success payload, if any.
    pub fn as_success(&self) -> Option<&Success> {
        match self {
            PayResult::Success(s) => Some(s),
            PayResult::Fail(_) => None,
        }
    }

    /// Returns the failure payload, if any.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            PayResult::Success(_) => None,
            PayResult::Fail(f) => Some(f),
        }
    }

    /// HTTP status of the underlying response.
    pub fn status(&self) -> StatusCode {
        match self {
            PayResult::Success(s) => s.status,
            PayResult::Fail(f) => f.status,
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> std::result::Result<Success, Failure> {
        match self {
            PayResult::Success(s) => Ok(s),
            PayResult::Fail(f) => Err(f),
        }
    }
}

/// Classifies a transport response for `endpoint`.
///
/// - `200` + JSON object: `return_code` `0` is a business failure; otherwise the
///   signature must verify, or the call fails with
///   [`FailureKind::InvalidSignature`]; otherwise success.
/// - `200` + anything else: [`FailureKind::NoJson`].
/// - `302`: success, redirect target from `Location`.
/// - any other status: [`FailureKind::NoJson`].
pub fn classify(key: &Key, endpoint: Endpoint, response: &TransportResponse) -> PayResult {
    let status = response.status;

    if status == StatusCode::FOUND {
        tracing::debug!(?endpoint, "redirect response");
        return PayResult::Success(Success {
            status,
            fields: ResponseFields::default(),
            paid: None,
            redirect: response.location(),
            raw_body: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }

    if status != StatusCode::OK {
        tracing::debug!(?endpoint, %status, "unexpected status");
        return PayResult::Fail(Failure::no_json(status));
    }

    let raw_body = match std::str::from_utf8(&response.body) {
        Ok(text) => text,
        Err(_) => {
            tracing::debug!(?endpoint, "response body is not UTF-8");
            return PayResult::Fail(Failure::no_json(status));
        }
    };

    let body: Value = match serde_json::from_str(raw_body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(?endpoint, error = %e, "response body is not JSON");
            return PayResult::Fail(Failure::no_json(status));
        }
    };

    let object = match body.as_object() {
        Some(object) => object,
        None => return PayResult::Fail(Failure::no_json(status)),
    };

    let signature_ok = sign::verify(key, &ParameterSet::from_json_object(object), None).is_ok();
    let fields = ResponseFields::from_json_object(object);

    if is_business_failure(object) {
        tracing::debug!(?endpoint, signature_ok, "business failure");
        return PayResult::Fail(Failure {
            status,
            kind: FailureKind::Business,
            code: Some(0),
            message: fields.message().map(ToString::to_string),
            body: Some(body),
        });
    }

    if !signature_ok {
        tracing::warn!(?endpoint, "response signature mismatch");
        return PayResult::Fail(Failure {
            status,
            kind: FailureKind::InvalidSignature,
            code: fields.return_code,
            message: Some(BAD_SIGNATURE_MSG.to_string()),
            body: Some(body),
        });
    }

    let paid = match endpoint {
        Endpoint::Check => Some(fields.status == Some(1)),
        _ => None,
    };
    let redirect = match endpoint {
        Endpoint::Cashier => response.location(),
        _ => None,
    };

    tracing::debug!(?endpoint, ?paid, "success");
    PayResult::Success(Success {
        status,
        fields,
        paid,
        redirect,
        raw_body: raw_body.to_string(),
    })
}

/// `return_code` is compared in its textual form, so `0` and `"0"` both count.
fn is_business_failure(object: &Map<String, Value>) -> bool {
    match object.get("return_code") {
        Some(Value::Number(n)) => n.to_string() == "0",
        Some(Value::String(s)) => s == "0",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, LOCATION};
    use serde_json::json;

    fn key() -> Key {
        Key::new("1234567890123456")
    }

    fn signed_body(body: Value) -> Vec<u8> {
        let params = ParameterSet::from_json_object(body.as_object().unwrap());
        let signature = sign::sign(&key(), &params);
        let mut body = body;
        body["sign"] = json!(signature);
        serde_json::to_vec(&body).unwrap()
    }

    fn response(status: StatusCode, endpoint: Endpoint, body: Vec<u8>) -> TransportResponse {
        TransportResponse::new(status, endpoint.url("https://payjs.cn"), body)
    }

    #[test]
    fn test_business_failure_surfaces_message() {
        let body = serde_json::to_vec(&json!({
            "return_code": "0",
            "return_msg": "FAIL",
            "msg": "order number already used"
        }))
        .unwrap();
        let result = classify(&key(), Endpoint::Native, &response(StatusCode::OK, Endpoint::Native, body));

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Business);
        assert_eq!(failure.code, Some(0));
        assert_eq!(failure.message.as_deref(), Some("order number already used"));
        assert!(!result.is_success());
    }

    #[test]
    fn test_paid_order_query() {
        let body = signed_body(json!({
            "return_code": 1,
            "payjs_order_id": "2018050612345",
            "out_trade_no": "2017TEST",
            "total_fee": 1,
            "status": 1
        }));
        let result = classify(&key(), Endpoint::Check, &response(StatusCode::OK, Endpoint::Check, body));

        let success = result.as_success().unwrap();
        assert_eq!(success.paid, Some(true));
        assert_eq!(success.fields.payjs_order_id.as_deref(), Some("2018050612345"));
        assert_eq!(success.fields.total_fee, Some(1));
        assert!(!success.fields.other.contains_key("sign"));
    }

    #[test]
    fn test_unpaid_order_query() {
        let body = signed_body(json!({"return_code": 1, "status": 0}));
        let result = classify(&key(), Endpoint::Check, &response(StatusCode::OK, Endpoint::Check, body));
        assert_eq!(result.as_success().unwrap().paid, Some(false));
    }

    #[test]
    fn test_paid_only_derived_for_check() {
        let body = signed_body(json!({"return_code": 1, "status": 1}));
        let result = classify(&key(), Endpoint::Close, &response(StatusCode::OK, Endpoint::Close, body));
        assert_eq!(result.as_success().unwrap().paid, None);
    }

    #[test]
    fn test_signature_mismatch_is_failure() {
        let mut body: Value = serde_json::from_slice(&signed_body(json!({
            "return_code": 1,
            "total_fee": 1
        })))
        .unwrap();
        body["total_fee"] = json!(10000);
        let result = classify(
            &key(),
            Endpoint::Native,
            &response(StatusCode::OK, Endpoint::Native, serde_json::to_vec(&body).unwrap()),
        );

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::InvalidSignature);
        assert_eq!(failure.message.as_deref(), Some(BAD_SIGNATURE_MSG));
        assert!(failure.body.is_some());
    }

    #[test]
    fn test_unsigned_success_is_failure() {
        let body = serde_json::to_vec(&json!({"return_code": 1, "qrcode": "https://x"})).unwrap();
        let result = classify(&key(), Endpoint::Native, &response(StatusCode::OK, Endpoint::Native, body));
        assert_eq!(result.as_failure().unwrap().kind, FailureKind::InvalidSignature);
    }

    #[test]
    fn test_non_json_body() {
        let result = classify(
            &key(),
            Endpoint::Native,
            &response(StatusCode::OK, Endpoint::Native, b"<html>oops</html>".to_vec()),
        );
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::NoJson);
        assert_eq!(failure.body, None);
        assert_eq!(failure.code, None);
    }

    #[test]
    fn test_non_utf8_body() {
        let result = classify(
            &key(),
            Endpoint::Native,
            &response(StatusCode::OK, Endpoint::Native, vec![0xff, 0xfe, 0x00]),
        );
        assert_eq!(result.as_failure().unwrap().kind, FailureKind::NoJson);
    }

    #[test]
    fn test_json_array_body() {
        let result = classify(
            &key(),
            Endpoint::Native,
            &response(StatusCode::OK, Endpoint::Native, b"[1,2]".to_vec()),
        );
        assert_eq!(result.as_failure().unwrap().kind, FailureKind::NoJson);
    }

    #[test]
    fn test_cashier_redirect() {
        let mut resp = response(StatusCode::FOUND, Endpoint::Cashier, Vec::new());
        resp.headers.insert(
            LOCATION,
            HeaderValue::from_static("https://payjs.cn/cashier/abc"),
        );
        let result = classify(&key(), Endpoint::Cashier, &resp);

        let success = result.as_success().unwrap();
        assert_eq!(success.redirect.as_deref(), Some("https://payjs.cn/cashier/abc"));
        assert_eq!(success.fields, ResponseFields::default());
        assert_eq!(result.status(), StatusCode::FOUND);
    }

    #[test]
    fn test_other_status_is_failure() {
        let body = signed_body(json!({"return_code": 1}));
        let result = classify(
            &key(),
            Endpoint::Native,
            &response(StatusCode::INTERNAL_SERVER_ERROR, Endpoint::Native, body),
        );
        let failure = result.into_result().unwrap_err();
        assert_eq!(failure.kind, FailureKind::NoJson);
        assert_eq!(failure.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_mistyped_field_keeps_business_message() {
        let body = serde_json::to_vec(&json!({
            "return_code": 0,
            "msg": "order already closed",
            "total_fee": "1.00"
        }))
        .unwrap();
        let result = classify(&key(), Endpoint::Native, &response(StatusCode::OK, Endpoint::Native, body));

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Business);
        assert_eq!(failure.code, Some(0));
        assert_eq!(failure.message.as_deref(), Some("order already closed"));
    }

    #[test]
    fn test_mistyped_field_does_not_spoil_signed_success() {
        let body = signed_body(json!({"return_code": 1, "payjs_order_id": "X1", "jsapi": ""}));
        let result = classify(&key(), Endpoint::Jsapi, &response(StatusCode::OK, Endpoint::Jsapi, body));

        let success = result.as_success().unwrap();
        assert_eq!(success.fields.payjs_order_id.as_deref(), Some("X1"));
        assert_eq!(success.fields.jsapi, None);
        assert_eq!(success.fields.other.get("jsapi"), Some(&json!("")));
    }

    #[test]
    fn test_cashier_ok_with_location_surfaces_redirect() {
        let mut resp = response(
            StatusCode::OK,
            Endpoint::Cashier,
            signed_body(json!({"return_code": 1, "payjs_order_id": "X1"})),
        );
        resp.headers.insert(
            LOCATION,
            HeaderValue::from_static("https://payjs.cn/cashier/abc"),
        );
        let result = classify(&key(), Endpoint::Cashier, &resp);

        let success = result.as_success().unwrap();
        assert_eq!(success.status, StatusCode::OK);
        assert_eq!(success.redirect.as_deref(), Some("https://payjs.cn/cashier/abc"));
        assert_eq!(success.fields.payjs_order_id.as_deref(), Some("X1"));
    }

    #[test]
    fn test_location_ignored_outside_cashier() {
        let mut resp = response(
            StatusCode::OK,
            Endpoint::Native,
            signed_body(json!({"return_code": 1})),
        );
        resp.headers.insert(LOCATION, HeaderValue::from_static("https://payjs.cn/elsewhere"));
        let result = classify(&key(), Endpoint::Native, &resp);

        assert_eq!(result.as_success().unwrap().redirect, None);
    }
}
