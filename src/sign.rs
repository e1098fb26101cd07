//! Request and callback signatures.
//!
//! The gateway signs a parameter set as follows:
//!
//! 1. drop the `sign` field and every empty value (integer `0` is kept),
//! 2. sort the rest by key, byte order,
//! 3. append `key=<secret>`,
//! 4. join as a form-encoded query string, spaces written literally instead of `+`,
//! 5. MD5 the result and render it as uppercase hex.
//!
//! MD5 is what the gateway computes on its side; it cannot be swapped for another
//! digest without breaking interoperability.
//!
//! Step 4 uses the WHATWG form-encoding set and keeps every percent escape except the
//! one for spaces. Python's `urlencode` followed by `unquote_plus` produces a
//! different string for values containing `*`, `~`, `/` or `:` (among others), so
//! such values hash differently from the Python SDK. Check those first when a
//! signature disagrees with the gateway.
//!
//! Signatures are compared in constant time.

use crate::errors::{PayJsError, Result};
use crate::types::{Key, ParameterSet, SIGN_FIELD};
use subtle::ConstantTimeEq;
use url::form_urlencoded;

/// Builds the string that gets hashed for `params`.
///
/// # Examples
///
/// ```
/// use payjs_rs::sign::canonical_string;
/// use payjs_rs::types::{Key, ParameterSet};
///
/// let params = ParameterSet::new()
///     .with("total_fee", 1)
///     .with("mchid", "100000")
///     .with("body", "")
///     .with("sign", "STALE");
///
/// assert_eq!(
///     canonical_string(&Key::new("secret"), &params),
///     "mchid=100000&total_fee=1&key=secret"
/// );
/// ```
pub fn canonical_string(key: &Key, params: &ParameterSet) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in params.iter() {
        if name == SIGN_FIELD || value.is_empty() {
            continue;
        }
        serializer.append_pair(name, &value.to_string());
    }
    serializer.append_pair("key", key.expose());

    // Form encoding writes spaces as `+`; the gateway hashes them as literal spaces.
    // A literal `+` in a value is already escaped to `%2B` at this point.
    serializer.finish().replace('+', " ")
}

/// Computes the signature of `params` under `key`.
///
/// Any existing `sign` field is ignored, so re-signing a signed set yields the same
/// value.
///
/// # Examples
///
/// ```
/// use payjs_rs::sign::sign;
/// use payjs_rs::types::{Key, ParameterSet};
///
/// let params = ParameterSet::new()
///     .with("mchid", "100000")
///     .with("total_fee", 1)
///     .with("out_trade_no", "2017TEST");
///
/// let signature = sign(&Key::new("1234567890123456"), &params);
/// assert_eq!(signature.len(), 32);
/// assert_eq!(signature, signature.to_uppercase());
/// ```
pub fn sign(key: &Key, params: &ParameterSet) -> String {
    let canonical = canonical_string(key, params);
    hex::encode_upper(md5::compute(canonical.as_bytes()).0)
}

/// Checks `params` against a signature.
///
/// When `expected` is `None` the signature is taken from the `sign` field of
/// `params`. Returns [`PayJsError::InvalidSignature`] on mismatch or when no
/// signature is available.
pub fn verify(key: &Key, params: &ParameterSet, expected: Option<&str>) -> Result<()> {
    let expected = match expected {
        Some(sign) => sign.to_string(),
        None => params
            .get_str(SIGN_FIELD)
            .ok_or(PayJsError::InvalidSignature)?,
    };

    let computed = sign(key, params);
    if bool::from(computed.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(PayJsError::InvalidSignature)
    }
}

/// Returns a copy of `params` carrying its signature in the `sign` field.
pub fn signed(key: &Key, params: &ParameterSet) -> ParameterSet {
    let mut out = params.clone();
    out.insert(SIGN_FIELD, sign(key, params));
    out
}
