//! # payjs-rs
//!
//! A Rust client for the [PayJS](https://payjs.cn) payment gateway.
//!
//! Every request and every callback exchanged with the gateway is signed with a
//! shared merchant key. This crate builds and signs the requests, sends them over
//! HTTPS, verifies and classifies the responses, and verifies asynchronous payment
//! notifications.
//!
//! ## Features
//!
//! - **Payments**: QR-code (`native`), cashier page, JS-API and in-store micropayments
//! - **Order management**: status query, close and refund
//! - **Computed URLs**: signed cashier and OpenID URLs for browser redirects
//! - **Notifications**: signature-checked parsing of payment callbacks
//! - **Pluggable transport**: swap the `reqwest` transport for anything implementing
//!   [`transport::Transport`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use payjs_rs::client::{PayJsClient, PayJsConfig};
//! use payjs_rs::types::Order;
//! use payjs_rs::PayResult;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PayJsClient::new(
//!     PayJsConfig::new("100000", "1234567890123456")
//!         .with_notify_url("https://shop.example.com/payjs/notify"),
//! )?;
//!
//! let order = Order::new(1, "2017TEST").with_body("test payment");
//! match client.native(&order).await? {
//!     PayResult::Success(ok) => println!("scan: {:?}", ok.fields.code_url),
//!     PayResult::Fail(err) => println!("failed: {:?}", err.message),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Signing
//!
//! Empty fields and any existing `sign` are dropped, the rest is sorted by key, the
//! key is appended as `key=<secret>`, and the form-encoded string (spaces kept
//! literal) is hashed with MD5 and rendered in uppercase hex. See [`sign`].
//!
//! ## Response classification
//!
//! | status | body                          | outcome                          |
//! |--------|-------------------------------|----------------------------------|
//! | 200    | JSON, `return_code` 0         | `Fail` (business)                |
//! | 200    | JSON, bad signature           | `Fail` (invalid signature)       |
//! | 200    | JSON, valid signature         | `Success`                        |
//! | 200    | not JSON                      | `Fail` (no JSON)                 |
//! | 302    | -                             | `Success` with `redirect`        |
//! | other  | -                             | `Fail` (no JSON)                 |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod errors;
pub mod notify;
pub mod result;
pub mod sign;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use client::{PayJsClient, PayJsConfig};
pub use errors::{PayJsError, Result};
pub use notify::{Notification, TimeEnd};
pub use result::{Failure, FailureKind, PayResult, Success};
pub use types::{
    CashierOrder, Credentials, Endpoint, JsapiOrder, Key, MicropayOrder, Order, ParamValue,
    ParameterSet, ResponseFields,
};
