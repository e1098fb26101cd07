//! Asynchronous payment notifications.
//!
//! The gateway posts a signed, form-encoded notification to the merchant's notify
//! URL once an order is paid. A [`Notification`] only exists if its signature
//! verified; nothing in the payload is trusted before that.

use crate::errors::{PayJsError, Result};
use crate::sign;
use crate::types::{Key, ParamValue, ParameterSet};
use crate::utils::parse_gateway_time;
use chrono::NaiveDateTime;
use url::form_urlencoded;

/// Payment completion time of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeEnd {
    /// Parsed `YYYY-MM-DD HH:MM:SS` timestamp
    Parsed(NaiveDateTime),
    /// Value that did not match the expected format, kept verbatim
    Raw(String),
}

impl TimeEnd {
    fn from_gateway(raw: String) -> Self {
        match parse_gateway_time(&raw) {
            Some(t) => TimeEnd::Parsed(t),
            None => {
                tracing::warn!(time_end = %raw, "unrecognised time_end format, keeping raw value");
                TimeEnd::Raw(raw)
            }
        }
    }

    /// Returns the parsed timestamp, if any.
    pub fn parsed(&self) -> Option<NaiveDateTime> {
        match self {
            TimeEnd::Parsed(t) => Some(*t),
            TimeEnd::Raw(_) => None,
        }
    }
}

/// A verified payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Merchant id the notification is addressed to
    pub mchid: String,
    /// Raw `return_code`
    pub return_code: i64,
    /// True when `return_code` is `1`
    pub paid: bool,
    /// Amount in fen
    pub total_fee: i64,
    /// Gateway order id
    pub payjs_order_id: String,
    /// Merchant order number
    pub out_trade_no: String,
    /// WeChat transaction id
    pub transaction_id: Option<String>,
    /// Payer OpenID
    pub openid: Option<String>,
    /// Merchant data echoed verbatim
    pub attach: Option<String>,
    /// Payment completion time
    pub time_end: Option<TimeEnd>,
}

impl Notification {
    /// Parses and verifies a raw query string or form body.
    ///
    /// Percent-decoding follows form rules; a repeated key keeps its last value.
    ///
    /// # Examples
    ///
    /// ```
    /// use payjs_rs::notify::Notification;
    /// use payjs_rs::sign::signed;
    /// use payjs_rs::types::{Key, ParameterSet};
    ///
    /// let key = Key::new("1234567890123456");
    /// let params = signed(&key, &ParameterSet::new()
    ///     .with("mchid", "100000")
    ///     .with("return_code", 1)
    ///     .with("total_fee", 1)
    ///     .with("payjs_order_id", "2018050612345")
    ///     .with("out_trade_no", "2017TEST"));
    /// let query = params
    ///     .to_pairs()
    ///     .iter()
    ///     .map(|(k, v)| format!("{}={}", k, v))
    ///     .collect::<Vec<_>>()
    ///     .join("&");
    ///
    /// let notification = Notification::from_query(&key, &query, Some("100000")).unwrap();
    /// assert!(notification.paid);
    /// ```
    pub fn from_query(key: &Key, query: &str, expected_mchid: Option<&str>) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let params: ParameterSet = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self::from_parameter_set(key, params, expected_mchid)
    }

    /// Parses and verifies an already-decoded mapping.
    pub fn from_params<I, K, V>(key: &Key, pairs: I, expected_mchid: Option<&str>) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        Self::from_parameter_set(key, pairs.into_iter().collect(), expected_mchid)
    }

    /// Verifies `params` and extracts the typed fields.
    pub fn from_parameter_set(
        key: &Key,
        params: ParameterSet,
        expected_mchid: Option<&str>,
    ) -> Result<Self> {
        if let Err(e) = sign::verify(key, &params, None) {
            let order = params.get_str("payjs_order_id").unwrap_or_default();
            tracing::warn!(payjs_order_id = %order, "rejecting notification with bad signature");
            return Err(e);
        }

        let mchid = required(&params, "mchid")?;
        if let Some(expected) = expected_mchid {
            if expected != mchid {
                tracing::warn!(expected, received = %mchid, "notification merchant id mismatch");
            }
        }

        let return_code = required_i64(&params, "return_code")?;
        let notification = Notification {
            mchid,
            return_code,
            paid: return_code == 1,
            total_fee: required_i64(&params, "total_fee")?,
            payjs_order_id: required(&params, "payjs_order_id")?,
            out_trade_no: required(&params, "out_trade_no")?,
            transaction_id: params.get_str("transaction_id"),
            openid: params.get_str("openid"),
            attach: params.get_str("attach"),
            time_end: params.get_str("time_end").map(TimeEnd::from_gateway),
        };

        tracing::debug!(
            payjs_order_id = %notification.payjs_order_id,
            paid = notification.paid,
            "notification verified"
        );
        Ok(notification)
    }
}

fn required(params: &ParameterSet, field: &str) -> Result<String> {
    params
        .get_str(field)
        .ok_or_else(|| PayJsError::MissingField(field.to_string()))
}

fn required_i64(params: &ParameterSet, field: &str) -> Result<i64> {
    let value = params
        .get(field)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PayJsError::MissingField(field.to_string()))?;
    value.as_i64().ok_or_else(|| PayJsError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    })
}
