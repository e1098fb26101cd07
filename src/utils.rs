//! Utility functions for PayJS operations.
//!
//! URL validation for callback addresses, soft checks on order fields, and gateway
//! timestamp parsing.

use chrono::NaiveDateTime;
use url::{Host, Url};

/// Longest accepted `out_trade_no`, `payjs_order_id` and `body`, in characters.
pub const MAX_FIELD_LEN: usize = 32;

/// Length of a micropayment authorization code.
pub const AUTH_CODE_LEN: usize = 18;

/// Timestamp format used by the gateway, e.g. `2018-05-06 12:34:56`.
pub const GATEWAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Checks that a callback URL is acceptable to the gateway.
///
/// An empty URL passes (it means "no callback"). Otherwise the scheme must be
/// `https`, or `http` when `force_ssl` is false; the host must be an IPv4 address
/// or a domain with a 2-6 letter (or `xn--` punycode) top-level label; the path may
/// only hold letters, digits and `._/-`.
///
/// # Examples
///
/// ```
/// use payjs_rs::utils::check_url;
///
/// assert!(check_url("", true));
/// assert!(check_url("https://example.com/notify", true));
/// assert!(check_url("https://127.0.0.1:8443/payjs/notify", true));
/// assert!(!check_url("http://example.com/notify", true));
/// assert!(check_url("http://example.com/notify", false));
/// assert!(!check_url("ftp://example.com/", false));
/// ```
pub fn check_url(url: &str, force_ssl: bool) -> bool {
    if url.is_empty() {
        return true;
    }

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    let scheme_ok = match parsed.scheme() {
        "https" => true,
        "http" => !force_ssl,
        _ => false,
    };
    if !scheme_ok || !parsed.username().is_empty() || parsed.password().is_some() {
        return false;
    }

    let host_ok = match parsed.host() {
        Some(Host::Ipv4(_)) => true,
        Some(Host::Domain(domain)) => is_valid_domain(domain),
        _ => false,
    };

    host_ok
        && parsed
            .path()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '_' | '-'))
}

fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels
        .iter()
        .all(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));

    let tld = labels[labels.len() - 1];
    let tld_ok = ((2..=6).contains(&tld.len()) && tld.chars().all(|c| c.is_ascii_alphabetic()))
        || (tld.starts_with("xn--") && tld.len() > 4);

    labels_ok && tld_ok
}

/// Soft-checks a merchant order number. Logs a warning and returns false when the
/// value is empty or longer than 32 characters.
pub fn check_out_trade_no(out_trade_no: &str) -> bool {
    if out_trade_no.is_empty() {
        tracing::warn!("out_trade_no should not be empty");
        return false;
    }
    if out_trade_no.chars().count() > MAX_FIELD_LEN {
        tracing::warn!(out_trade_no, "out_trade_no is longer than 32 characters");
        return false;
    }
    true
}

/// Soft-checks an order title. Logs a warning and returns false when it is longer
/// than 32 characters.
pub fn check_body(body: &str) -> bool {
    if body.chars().count() > MAX_FIELD_LEN {
        tracing::warn!("body is longer than 32 characters");
        return false;
    }
    true
}

/// Soft-checks a gateway order id length (1-32).
pub fn check_payjs_order_id(payjs_order_id: &str) -> bool {
    let len = payjs_order_id.chars().count();
    if !(1..=MAX_FIELD_LEN).contains(&len) {
        tracing::warn!(payjs_order_id, "payjs_order_id length should be 1-32");
        return false;
    }
    true
}

/// Soft-checks a micropayment authorization code (18 digits).
pub fn check_auth_code(auth_code: &str) -> bool {
    if auth_code.len() != AUTH_CODE_LEN || !auth_code.chars().all(|c| c.is_ascii_digit()) {
        tracing::warn!("auth_code should be 18 digits");
        return false;
    }
    true
}

/// Parses a gateway timestamp such as `2018-05-06 12:34:56`.
///
/// # Examples
///
/// ```
/// use payjs_rs::utils::parse_gateway_time;
///
/// assert!(parse_gateway_time("2018-05-06 12:34:56").is_some());
/// assert!(parse_gateway_time("2021-13-40 99:99:99").is_none());
/// ```
pub fn parse_gateway_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), GATEWAY_TIME_FORMAT).ok()
}
