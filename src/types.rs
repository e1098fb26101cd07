//! Core type definitions for the PayJS protocol.
//!
//! This module contains the parameter set exchanged with the gateway, the merchant
//! credentials, the per-operation order requests and the decoded response fields.

use reqwest::Method;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Default gateway origin.
pub const DEFAULT_BASE_URL: &str = "https://payjs.cn";

/// Highest accepted `total_fee`, in fen.
pub const MAX_TOTAL_FEE: i64 = 1_000_000;

/// Name of the signature field.
pub const SIGN_FIELD: &str = "sign";

/// A scalar value in a [`ParameterSet`].
///
/// `Null` and the empty string are both "empty": they are left out of the signature
/// and of the transmitted payload. Integer `0` is not empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Absent value
    Null,
    /// Integer value (amounts, codes)
    Int(i64),
    /// String value
    Str(String),
}

impl ParamValue {
    /// Returns true for values excluded from signing and transmission.
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Null => true,
            ParamValue::Int(_) => false,
            ParamValue::Str(s) => s.is_empty(),
        }
    }

    /// Returns the value as an integer, parsing strings when needed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            ParamValue::Str(s) => s.trim().parse().ok(),
            ParamValue::Null => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => Ok(()),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Str(s.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<i32> for ParamValue {
    fn from(n: i32) -> Self {
        ParamValue::Int(n.into())
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Int(n.into())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

/// Maps a decoded JSON value onto a scalar.
///
/// Booleans become `1`/`0` and nested arrays or objects are carried as their compact
/// JSON text.
impl From<&Value> for ParamValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Int(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Str(n.to_string()),
            },
            Value::String(s) => ParamValue::Str(s.clone()),
            other => ParamValue::Str(other.to_string()),
        }
    }
}

/// An ordered mapping of parameter names to scalar values.
///
/// Keys are kept in byte order, so two sets built in different insertion orders are
/// equal and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous one under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Returns the value under `key` rendered as a string, if present and non-empty.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    /// Returns true if `key` is present (even with an empty value).
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries, empty ones included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Returns a copy without `Null` or empty-string values.
    pub fn without_empty(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Renders every non-empty entry as a `(name, value)` string pair, in key order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    /// Builds a parameter set from the top level of a decoded JSON object.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        Self(
            object
                .iter()
                .map(|(k, v)| (k.clone(), ParamValue::from(v)))
                .collect(),
        )
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Shared signing secret.
///
/// The secret is never transmitted; its `Debug` output is redacted so that it cannot
/// leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Key(String);

impl Key {
    /// Expected length of a gateway-issued key.
    pub const EXPECTED_LEN: usize = 16;

    /// Wraps a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret for hashing.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length of the secret in characters.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// Returns true if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(****)")
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::new(s)
    }
}

/// Merchant identity held by a client. Immutable once the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Merchant id (`mchid`)
    pub mchid: String,
    /// Shared signing key
    pub key: Key,
}

impl Credentials {
    /// Expected length of a gateway-issued merchant id.
    pub const MCHID_LEN: usize = 6;

    /// Creates a credentials pair.
    pub fn new(mchid: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            mchid: mchid.into(),
            key: key.into(),
        }
    }
}

/// Gateway operations and their endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Order status query
    Check,
    /// QR-code payment
    Native,
    /// Cashier-page payment
    Cashier,
    /// JS-API payment
    Jsapi,
    /// In-store micropayment
    Micropay,
    /// Order close
    Close,
    /// Order refund
    Refund,
    /// OpenID bootstrap
    Openid,
}

impl Endpoint {
    /// Path of the endpoint relative to the gateway origin.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Check => "/api/check",
            Endpoint::Native => "/api/native",
            Endpoint::Cashier => "/api/cashier",
            Endpoint::Jsapi => "/api/jsapi",
            Endpoint::Micropay => "/api/micropay",
            Endpoint::Close => "/api/close",
            Endpoint::Refund => "/api/refund",
            Endpoint::Openid => "/api/openid",
        }
    }

    /// HTTP method used to reach the endpoint.
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Openid => Method::GET,
            _ => Method::POST,
        }
    }

    /// Full URL of the endpoint under `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }
}

/// Common fields of a payment order.
///
/// `notify_url` is tri-state: `None` uses the client default, `Some("")` asks for no
/// callback, anything else overrides the default.
///
/// # Examples
///
/// ```
/// use payjs_rs::types::Order;
///
/// let order = Order::new(1, "2017TEST")
///     .with_body("test payment")
///     .with_attach("info");
/// assert_eq!(order.total_fee, 1);
/// assert_eq!(order.notify_url, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Amount in fen, `1..=1_000_000`
    pub total_fee: i64,
    /// Merchant order number, unique per merchant, 1-32 characters
    pub out_trade_no: String,
    /// Order title, up to 32 characters
    pub body: Option<String>,
    /// Per-call notification URL
    pub notify_url: Option<String>,
    /// Opaque data echoed back in the notification
    pub attach: Option<String>,
}

impl Order {
    /// Creates an order with the required fields.
    pub fn new(total_fee: i64, out_trade_no: impl Into<String>) -> Self {
        Self {
            total_fee,
            out_trade_no: out_trade_no.into(),
            body: None,
            notify_url: None,
            attach: None,
        }
    }

    /// Sets the order title.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Overrides the client's default notification URL.
    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    /// Disables the notification callback for this order.
    pub fn without_notify(mut self) -> Self {
        self.notify_url = Some(String::new());
        self
    }

    /// Sets the opaque attachment.
    pub fn with_attach(mut self, attach: impl Into<String>) -> Self {
        self.attach = Some(attach.into());
        self
    }
}

/// A cashier-page payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashierOrder {
    /// Order details
    pub order: Order,
    /// Front-end URL the user is sent back to after paying
    pub callback_url: Option<String>,
}

impl CashierOrder {
    /// Wraps an order for the cashier flow.
    pub fn new(order: Order) -> Self {
        Self {
            order,
            callback_url: None,
        }
    }

    /// Sets the post-payment front-end URL.
    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

/// A JS-API payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsapiOrder {
    /// Order details
    pub order: Order,
    /// Payer OpenID, see [`PayJsClient::get_openid`](crate::client::PayJsClient::get_openid)
    pub openid: String,
}

impl JsapiOrder {
    /// Wraps an order for the JS-API flow.
    pub fn new(order: Order, openid: impl Into<String>) -> Self {
        Self {
            order,
            openid: openid.into(),
        }
    }
}

/// An in-store micropayment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicropayOrder {
    /// Amount in fen, `1..=1_000_000`
    pub total_fee: i64,
    /// Merchant order number
    pub out_trade_no: String,
    /// Code scanned from the payer's wallet, 18 digits
    pub auth_code: String,
    /// Order title
    pub body: Option<String>,
}

impl MicropayOrder {
    /// Creates a micropayment request.
    pub fn new(total_fee: i64, out_trade_no: impl Into<String>, auth_code: impl Into<String>) -> Self {
        Self {
            total_fee,
            out_trade_no: out_trade_no.into(),
            auth_code: auth_code.into(),
            body: None,
        }
    }

    /// Sets the order title.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Parameters handed to the WeChat JS bridge after a JS-API order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct JsapiParams {
    /// Official-account app id
    #[serde(rename = "appId", default, deserialize_with = "lenient_string")]
    pub app_id: Option<String>,
    /// Unix timestamp, as a string
    #[serde(rename = "timeStamp", default, deserialize_with = "lenient_string")]
    pub time_stamp: Option<String>,
    /// Random nonce
    #[serde(rename = "nonceStr", default, deserialize_with = "lenient_string")]
    pub nonce_str: Option<String>,
    /// `prepay_id=...`
    #[serde(default, deserialize_with = "lenient_string")]
    pub package: Option<String>,
    /// Signature algorithm of `pay_sign`
    #[serde(rename = "signType", default, deserialize_with = "lenient_string")]
    pub sign_type: Option<String>,
    /// Signature for the JS bridge
    #[serde(rename = "paySign", default, deserialize_with = "lenient_string")]
    pub pay_sign: Option<String>,
}

/// Business fields of a gateway response.
///
/// The documented fields are typed; anything else the gateway sends lands in
/// `other`. The `sign` field is never copied here.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResponseFields {
    /// `1` on success, `0` on failure
    #[serde(default, deserialize_with = "lenient_i64")]
    pub return_code: Option<i64>,
    /// Short status message
    #[serde(default, deserialize_with = "lenient_string")]
    pub return_msg: Option<String>,
    /// Detailed message, usually on failure
    #[serde(default, deserialize_with = "lenient_string")]
    pub msg: Option<String>,
    /// Merchant id
    #[serde(default, deserialize_with = "lenient_string")]
    pub mchid: Option<String>,
    /// Gateway order id
    #[serde(default, deserialize_with = "lenient_string")]
    pub payjs_order_id: Option<String>,
    /// Merchant order number
    #[serde(default, deserialize_with = "lenient_string")]
    pub out_trade_no: Option<String>,
    /// Amount in fen
    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_fee: Option<i64>,
    /// HTTPS URL of a QR-code image
    #[serde(default, deserialize_with = "lenient_string")]
    pub qrcode: Option<String>,
    /// `weixin://` URL to encode into a QR code
    #[serde(default, deserialize_with = "lenient_string")]
    pub code_url: Option<String>,
    /// JS bridge parameters of a JS-API order
    #[serde(default)]
    pub jsapi: Option<JsapiParams>,
    /// WeChat transaction id
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_id: Option<String>,
    /// Payment completion time
    #[serde(default, deserialize_with = "lenient_string")]
    pub time_end: Option<String>,
    /// Payer OpenID
    #[serde(default, deserialize_with = "lenient_string")]
    pub openid: Option<String>,
    /// Order status on `/api/check`: `1` paid, `0` unpaid
    #[serde(default, deserialize_with = "lenient_i64")]
    pub status: Option<i64>,
    /// Payment time reported by order queries
    #[serde(default, deserialize_with = "lenient_string")]
    pub paid_time: Option<String>,
    /// Merchant data echoed back
    #[serde(default, deserialize_with = "lenient_string")]
    pub attach: Option<String>,
    /// Undocumented or mistyped fields, kept verbatim
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl ResponseFields {
    /// Decodes the fields of a response body, dropping `sign`.
    ///
    /// Decoding never fails: a documented field whose value does not fit its type
    /// (`"total_fee": "1.00"`, `"jsapi": ""`) is left unset and kept verbatim in
    /// `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use payjs_rs::types::ResponseFields;
    /// use serde_json::json;
    ///
    /// let body = json!({"return_code": 1, "total_fee": "1.00"});
    /// let fields = ResponseFields::from_json_object(body.as_object().unwrap());
    /// assert_eq!(fields.return_code, Some(1));
    /// assert_eq!(fields.total_fee, None);
    /// assert_eq!(fields.other["total_fee"], json!("1.00"));
    /// ```
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut kept = Map::new();
        let mut rejected = BTreeMap::new();

        for (name, value) in object {
            if name == SIGN_FIELD {
                continue;
            }
            let single = Map::from_iter([(name.clone(), value.clone())]);
            match serde_json::from_value::<Self>(Value::Object(single)) {
                Ok(_) => {
                    kept.insert(name.clone(), value.clone());
                }
                Err(e) => {
                    tracing::debug!(field = %name, error = %e, "response field kept untyped");
                    rejected.insert(name.clone(), value.clone());
                }
            }
        }

        let mut fields = match serde_json::from_value::<Self>(Value::Object(kept.clone())) {
            Ok(fields) => fields,
            Err(_) => Self {
                other: kept.into_iter().collect(),
                ..Self::default()
            },
        };
        fields.other.extend(rejected);
        fields
    }

    /// The gateway's message, preferring `msg` over `return_msg`.
    pub fn message(&self) -> Option<&str> {
        self.msg
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.return_msg.as_deref())
    }
}

// The gateway is loose about scalar types: integers arrive as numbers or numeric
// strings, identifiers sometimes as numbers.

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected an integer, got {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
        Some(Value::Bool(b)) => Ok(Some(i64::from(b))),
        Some(other) => Err(de::Error::custom(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!("expected a string, got {}", other))),
    }
}
