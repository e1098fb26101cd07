//! Client for the PayJS gateway.
//!
//! [`PayJsClient`] builds the parameter set of each operation, validates it, signs it,
//! hands it to the [`Transport`] and classifies the response into a [`PayResult`].
//! Configuration errors are raised before anything reaches the network.

use crate::errors::{PayJsError, Result};
use crate::result::{self, PayResult};
use crate::sign;
use crate::transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
use crate::types::{
    CashierOrder, Credentials, Endpoint, JsapiOrder, Key, MicropayOrder, Order, ParameterSet,
    DEFAULT_BASE_URL, MAX_TOTAL_FEE,
};
use crate::utils::{check_auth_code, check_body, check_out_trade_no, check_payjs_order_id, check_url};
use std::sync::Arc;
use url::Url;

/// Error codes carried by [`PayJsError::InvalidConfiguration`].
pub mod codes {
    /// Merchant id missing or malformed
    pub const BAD_MCHID: i32 = -2001;
    /// Key missing
    pub const BAD_KEY: i32 = -2002;
    /// Notification URL rejected by [`check_url`](crate::utils::check_url)
    pub const BAD_NOTIFY_URL: i32 = -2003;
    /// `total_fee` outside `1..=1_000_000`
    pub const BAD_TOTAL_FEE: i32 = -2004;
    /// No order id given to close or refund
    pub const MISSING_ORDER_ID: i32 = -2005;
    /// Front-end callback URL rejected
    pub const BAD_CALLBACK_URL: i32 = -2006;
    /// No order id given to a status query
    pub const MISSING_QUERY_ORDER_ID: i32 = -3001;
}

/// Configuration for a [`PayJsClient`].
#[derive(Clone)]
pub struct PayJsConfig {
    /// Merchant id
    pub mchid: String,

    /// Shared signing key
    pub key: Key,

    /// Default notification URL, used when an order does not set its own
    pub notify_url: Option<String>,

    /// Require `https` callback URLs (default `true`)
    pub force_ssl: bool,

    /// Gateway origin (default `https://payjs.cn`)
    pub base_url: String,

    /// Transport to use; a redirect-free `reqwest` client when `None`
    pub transport: Option<Arc<dyn Transport>>,
}

impl PayJsConfig {
    /// Creates a configuration from merchant credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use payjs_rs::client::PayJsConfig;
    ///
    /// let config = PayJsConfig::new("100000", "1234567890123456")
    ///     .with_notify_url("https://shop.example.com/payjs/notify");
    /// assert!(config.force_ssl);
    /// ```
    pub fn new(mchid: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            mchid: mchid.into(),
            key: key.into(),
            notify_url: None,
            force_ssl: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            transport: None,
        }
    }

    /// Loads a configuration from `PAYJS_MCHID`, `PAYJS_KEY` and the optional
    /// `PAYJS_NOTIFY_URL` and `PAYJS_FORCE_SSL` (`0`/`false`/`no`/`off` disables).
    pub fn from_env() -> Result<Self> {
        let mchid = std::env::var("PAYJS_MCHID")
            .map_err(|_| PayJsError::config(codes::BAD_MCHID, "PAYJS_MCHID is not set"))?;
        let key = std::env::var("PAYJS_KEY")
            .map_err(|_| PayJsError::config(codes::BAD_KEY, "PAYJS_KEY is not set"))?;

        let mut config = Self::new(mchid, key);
        if let Ok(url) = std::env::var("PAYJS_NOTIFY_URL") {
            if !url.is_empty() {
                config = config.with_notify_url(url);
            }
        }
        if let Ok(flag) = std::env::var("PAYJS_FORCE_SSL") {
            config.force_ssl = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        Ok(config)
    }

    /// Sets the default notification URL.
    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    /// Allows plain `http` callback URLs when `false`.
    pub fn with_force_ssl(mut self, force_ssl: bool) -> Self {
        self.force_ssl = force_ssl;
        self
    }

    /// Points the client at another gateway origin.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets a custom transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom `reqwest` client. It must not follow redirects.
    pub fn with_http_client(self, client: reqwest::Client) -> Self {
        self.with_transport(Arc::new(ReqwestTransport::with_client(client)))
    }
}

/// PayJS client. Cheap to clone and safe to share between tasks.
#[derive(Clone)]
pub struct PayJsClient {
    credentials: Credentials,
    notify_url: Option<String>,
    force_ssl: bool,
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl PayJsClient {
    /// Validates `config` and builds a client.
    ///
    /// # Examples
    ///
    /// ```
    /// use payjs_rs::client::{PayJsClient, PayJsConfig};
    ///
    /// let client = PayJsClient::new(PayJsConfig::new("100000", "1234567890123456")).unwrap();
    /// assert_eq!(client.credentials().mchid, "100000");
    ///
    /// let bad = PayJsConfig::new("100000", "1234567890123456").with_notify_url("ftp://x");
    /// assert!(PayJsClient::new(bad).is_err());
    /// ```
    pub fn new(config: PayJsConfig) -> Result<Self> {
        if config.mchid.is_empty() || !config.mchid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PayJsError::config(
                codes::BAD_MCHID,
                "merchant id must be a non-empty alphanumeric string",
            ));
        }
        if config.mchid.len() != Credentials::MCHID_LEN {
            tracing::warn!(mchid = %config.mchid, "merchant id is usually 6 characters");
        }

        if config.key.is_empty() {
            return Err(PayJsError::config(codes::BAD_KEY, "key must not be empty"));
        }
        if config.key.len() != Key::EXPECTED_LEN {
            tracing::warn!(mchid = %config.mchid, "key is usually 16 characters");
        }

        let notify_url = config.notify_url.filter(|url| !url.is_empty());
        if let Some(url) = &notify_url {
            if !check_url(url, config.force_ssl) {
                return Err(PayJsError::config(codes::BAD_NOTIFY_URL, "invalid notify url"));
            }
        }

        Url::parse(&config.base_url)?;

        let transport: Arc<dyn Transport> = match config.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Self {
            credentials: Credentials::new(config.mchid, config.key),
            notify_url,
            force_ssl: config.force_ssl,
            base_url: config.base_url,
            transport,
        })
    }

    /// Merchant credentials of this client.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Default notification URL.
    pub fn notify_url(&self) -> Option<&str> {
        self.notify_url.as_deref()
    }

    /// Signs `params` and drops empty values, ready for transmission.
    pub fn signed_params(&self, params: &ParameterSet) -> ParameterSet {
        sign::signed(&self.credentials.key, params).without_empty()
    }

    /// Classifies a raw response for `endpoint` with this client's key.
    pub fn classify(&self, endpoint: Endpoint, response: &TransportResponse) -> PayResult {
        result::classify(&self.credentials.key, endpoint, response)
    }

    /// Queries an order by its gateway id. On success `paid` tells whether it is paid.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, payjs_order_id = %payjs_order_id))]
    pub async fn check_status(&self, payjs_order_id: &str) -> Result<PayResult> {
        let params = order_id_params(payjs_order_id, codes::MISSING_QUERY_ORDER_ID)?;
        self.request(Endpoint::Check, params).await
    }

    /// Creates a QR-code payment. The success fields carry `qrcode` and `code_url`.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, out_trade_no = %order.out_trade_no))]
    pub async fn native(&self, order: &Order) -> Result<PayResult> {
        let params = self.order_params(order)?;
        self.request(Endpoint::Native, params).await
    }

    /// Creates a cashier-page payment. The gateway answers with a redirect whose
    /// target is surfaced as `redirect`.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, out_trade_no = %order.order.out_trade_no))]
    pub async fn cashier(&self, order: &CashierOrder) -> Result<PayResult> {
        let params = self.cashier_params(order)?;
        self.request(Endpoint::Cashier, params).await
    }

    /// Builds a signed cashier-page URL to send the browser to, without calling the
    /// gateway.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, out_trade_no = %order.order.out_trade_no))]
    pub fn cashier_legacy(&self, order: &CashierOrder) -> Result<String> {
        let params = self.cashier_params(order)?;
        self.signed_url(Endpoint::Cashier, &params)
    }

    /// Creates a JS-API payment. The success fields carry the `jsapi` bridge
    /// parameters.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, out_trade_no = %order.order.out_trade_no))]
    pub async fn jsapi(&self, order: &JsapiOrder) -> Result<PayResult> {
        let mut params = self.order_params(&order.order)?;
        params.insert("openid", order.openid.as_str());
        self.request(Endpoint::Jsapi, params).await
    }

    /// Charges a payer-presented code at a point of sale.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, out_trade_no = %order.out_trade_no))]
    pub async fn micropay(&self, order: &MicropayOrder) -> Result<PayResult> {
        validate_total_fee(order.total_fee)?;
        check_out_trade_no(&order.out_trade_no);
        if let Some(body) = &order.body {
            check_body(body);
        }
        check_auth_code(&order.auth_code);

        let params = ParameterSet::new()
            .with("mchid", self.credentials.mchid.as_str())
            .with("total_fee", order.total_fee)
            .with("out_trade_no", order.out_trade_no.as_str())
            .with("body", order.body.clone())
            .with("auth_code", order.auth_code.as_str());
        self.request(Endpoint::Micropay, params).await
    }

    /// Closes an unpaid order.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, payjs_order_id = %payjs_order_id))]
    pub async fn close(&self, payjs_order_id: &str) -> Result<PayResult> {
        let params = order_id_params(payjs_order_id, codes::MISSING_ORDER_ID)?;
        self.request(Endpoint::Close, params).await
    }

    /// Refunds a paid order in full.
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid, payjs_order_id = %payjs_order_id))]
    pub async fn refund(&self, payjs_order_id: &str) -> Result<PayResult> {
        let params = order_id_params(payjs_order_id, codes::MISSING_ORDER_ID)?;
        self.request(Endpoint::Refund, params).await
    }

    /// Builds a signed URL that, opened in WeChat, redirects to `callback_url` with
    /// an `openid` query parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use payjs_rs::client::{PayJsClient, PayJsConfig};
    ///
    /// let client = PayJsClient::new(PayJsConfig::new("100000", "1234567890123456")).unwrap();
    /// let url = client.get_openid("https://shop.example.com/pay").unwrap();
    /// assert!(url.starts_with("https://payjs.cn/api/openid?"));
    /// assert!(url.contains("sign="));
    /// ```
    #[tracing::instrument(skip_all, fields(mchid = %self.credentials.mchid))]
    pub fn get_openid(&self, callback_url: &str) -> Result<String> {
        if callback_url.is_empty() || !check_url(callback_url, self.force_ssl) {
            return Err(PayJsError::config(codes::BAD_CALLBACK_URL, "invalid callback url"));
        }
        let params = ParameterSet::new()
            .with("mchid", self.credentials.mchid.as_str())
            .with("callback_url", callback_url);
        self.signed_url(Endpoint::Openid, &params)
    }

    async fn request(&self, endpoint: Endpoint, params: ParameterSet) -> Result<PayResult> {
        let signed = self.signed_params(&params);
        let request = TransportRequest {
            method: endpoint.method(),
            url: endpoint.url(&self.base_url),
            params: signed.to_pairs(),
        };

        tracing::debug!(url = %request.url, "sending request");
        let response = self.transport.send(request).await?;
        Ok(self.classify(endpoint, &response))
    }

    fn signed_url(&self, endpoint: Endpoint, params: &ParameterSet) -> Result<String> {
        let mut url = Url::parse(&endpoint.url(&self.base_url))?;
        url.query_pairs_mut()
            .extend_pairs(self.signed_params(params).to_pairs());
        Ok(url.to_string())
    }

    fn order_params(&self, order: &Order) -> Result<ParameterSet> {
        validate_total_fee(order.total_fee)?;
        check_out_trade_no(&order.out_trade_no);
        if let Some(body) = &order.body {
            check_body(body);
        }

        let notify_url = self.resolve_notify_url(order.notify_url.as_deref())?;

        Ok(ParameterSet::new()
            .with("mchid", self.credentials.mchid.as_str())
            .with("total_fee", order.total_fee)
            .with("out_trade_no", order.out_trade_no.as_str())
            .with("body", order.body.clone())
            .with("notify_url", notify_url)
            .with("attach", order.attach.clone()))
    }

    fn cashier_params(&self, order: &CashierOrder) -> Result<ParameterSet> {
        let callback_url = order.callback_url.as_deref().unwrap_or_default();
        if !check_url(callback_url, self.force_ssl) {
            return Err(PayJsError::config(codes::BAD_CALLBACK_URL, "invalid callback url"));
        }
        Ok(self
            .order_params(&order.order)?
            .with("callback_url", order.callback_url.clone()))
    }

    /// `None` falls back to the client default, `""` disables the callback.
    fn resolve_notify_url(&self, per_call: Option<&str>) -> Result<Option<String>> {
        let url = match per_call {
            None => self.notify_url.clone(),
            Some("") => None,
            Some(url) => Some(url.to_string()),
        };
        if let Some(url) = &url {
            if !check_url(url, self.force_ssl) {
                return Err(PayJsError::config(codes::BAD_NOTIFY_URL, "invalid notify url"));
            }
        }
        Ok(url)
    }
}

fn validate_total_fee(total_fee: i64) -> Result<()> {
    if !(1..=MAX_TOTAL_FEE).contains(&total_fee) {
        return Err(PayJsError::config(
            codes::BAD_TOTAL_FEE,
            format!("total_fee must be between 1 and {} fen", MAX_TOTAL_FEE),
        ));
    }
    Ok(())
}

fn order_id_params(payjs_order_id: &str, missing_code: i32) -> Result<ParameterSet> {
    let payjs_order_id = payjs_order_id.trim();
    if payjs_order_id.is_empty() {
        return Err(PayJsError::config(missing_code, "payjs_order_id is required"));
    }
    check_payjs_order_id(payjs_order_id);
    Ok(ParameterSet::new().with("payjs_order_id", payjs_order_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::FailureKind;
    use crate::types::ParamValue;
    use async_trait::async_trait;
    use reqwest::header::{HeaderValue, LOCATION};
    use reqwest::{Method, StatusCode};
    use serde_json::json;
    use std::sync::Mutex;

    const KEY: &str = "1234567890123456";

    /// Records requests and answers each with a fixed status, body and headers.
    struct MockTransport {
        status: StatusCode,
        body: Vec<u8>,
        location: Option<&'static str>,
        requests: Mutex<Vec<TransportRequest>>,
    }

    impl MockTransport {
        fn new(status: StatusCode, body: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                location: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn signed_json(body: serde_json::Value) -> Arc<Self> {
            let params = ParameterSet::from_json_object(body.as_object().unwrap());
            let mut body = body;
            body["sign"] = json!(sign::sign(&Key::new(KEY), &params));
            Self::new(StatusCode::OK, serde_json::to_vec(&body).unwrap())
        }

        fn last(&self) -> TransportRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        fn count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            let mut response = TransportResponse::new(self.status, url, self.body.clone());
            if let Some(location) = self.location {
                response
                    .headers
                    .insert(LOCATION, HeaderValue::from_static(location));
            }
            Ok(response)
        }
    }

    fn client(transport: Arc<MockTransport>) -> PayJsClient {
        let config = PayJsConfig::new("100000", KEY)
            .with_notify_url("https://shop.example.com/notify")
            .with_transport(transport);
        PayJsClient::new(config).unwrap()
    }

    fn sent_params(request: &TransportRequest) -> ParameterSet {
        request.params.iter().cloned().collect()
    }

    #[test]
    fn test_config_builders() {
        let config = PayJsConfig::new("100000", KEY)
            .with_notify_url("http://shop.example.com/notify")
            .with_force_ssl(false)
            .with_base_url("http://127.0.0.1:9999");

        assert_eq!(config.mchid, "100000");
        assert!(!config.force_ssl);
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert!(PayJsClient::new(config).is_ok());
    }

    #[test]
    fn test_invalid_configuration() {
        let err = PayJsClient::new(PayJsConfig::new("", KEY)).err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_MCHID));

        let err = PayJsClient::new(PayJsConfig::new("10 000", KEY)).err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_MCHID));

        let err = PayJsClient::new(PayJsConfig::new("100000", "")).err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_KEY));

        let config = PayJsConfig::new("100000", KEY).with_notify_url("http://shop.example.com/n");
        let err = PayJsClient::new(config).err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_NOTIFY_URL));

        let config = PayJsConfig::new("100000", KEY).with_base_url("not a url");
        assert!(matches!(PayJsClient::new(config), Err(PayJsError::UrlParse(_))));
    }

    #[tokio::test]
    async fn test_native_request_is_signed_and_uses_default_notify() {
        let transport = MockTransport::signed_json(json!({
            "return_code": 1,
            "payjs_order_id": "2018050612345",
            "qrcode": "https://payjs.cn/qrcode/abc",
            "code_url": "weixin://wxpay/bizpayurl?pr=abc"
        }));
        let client = client(transport.clone());

        let result = client
            .native(&Order::new(1, "2017TEST").with_body("测试支付"))
            .await
            .unwrap();

        let success = result.as_success().unwrap();
        assert_eq!(success.fields.code_url.as_deref(), Some("weixin://wxpay/bizpayurl?pr=abc"));

        let request = transport.last();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://payjs.cn/api/native");

        let params = sent_params(&request);
        assert_eq!(params.get_str("notify_url").as_deref(), Some("https://shop.example.com/notify"));
        assert!(!params.contains_key("attach"));
        assert!(sign::verify(&Key::new(KEY), &params, None).is_ok());
    }

    #[tokio::test]
    async fn test_notify_url_override_and_disable() {
        let transport = MockTransport::signed_json(json!({"return_code": 1}));
        let client = client(transport.clone());

        client
            .native(&Order::new(1, "A1").with_notify_url("https://other.example.com/cb"))
            .await
            .unwrap();
        let params = sent_params(&transport.last());
        assert_eq!(params.get_str("notify_url").as_deref(), Some("https://other.example.com/cb"));

        client.native(&Order::new(1, "A2").without_notify()).await.unwrap();
        assert!(!sent_params(&transport.last()).contains_key("notify_url"));
    }

    #[tokio::test]
    async fn test_invalid_fields_never_reach_transport() {
        let transport = MockTransport::signed_json(json!({"return_code": 1}));
        let client = client(transport.clone());

        let err = client.native(&Order::new(0, "A1")).await.err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_TOTAL_FEE));

        let err = client.native(&Order::new(MAX_TOTAL_FEE + 1, "A1")).await.err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_TOTAL_FEE));

        let err = client
            .native(&Order::new(1, "A1").with_notify_url("http://insecure.example.com/"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), Some(codes::BAD_NOTIFY_URL));

        let err = client.check_status("  ").await.err().unwrap();
        assert_eq!(err.code(), Some(codes::MISSING_QUERY_ORDER_ID));

        let err = client.close("").await.err().unwrap();
        assert_eq!(err.code(), Some(codes::MISSING_ORDER_ID));

        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn test_soft_issues_do_not_block() {
        let transport = MockTransport::signed_json(json!({"return_code": 1}));
        let client = client(transport.clone());

        let long_no = "x".repeat(40);
        let result = client.native(&Order::new(1, long_no.as_str())).await.unwrap();
        assert!(result.is_success());
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn test_check_status_paid() {
        let transport = MockTransport::signed_json(json!({
            "return_code": 1,
            "payjs_order_id": "2018050612345",
            "status": 1
        }));
        let client = client(transport.clone());

        let result = client.check_status("2018050612345").await.unwrap();
        assert_eq!(result.as_success().unwrap().paid, Some(true));

        let params = sent_params(&transport.last());
        assert_eq!(params.len(), 2);
        assert_eq!(params.get_str("payjs_order_id").as_deref(), Some("2018050612345"));
        assert_eq!(transport.last().url, "https://payjs.cn/api/check");
    }

    #[tokio::test]
    async fn test_cashier_redirect() {
        let transport = Arc::new(MockTransport {
            status: StatusCode::FOUND,
            body: Vec::new(),
            location: Some("https://payjs.cn/cashier/abc"),
            requests: Mutex::new(Vec::new()),
        });
        let client = client(transport.clone());

        let order = CashierOrder::new(Order::new(1, "2017TEST"))
            .with_callback_url("https://shop.example.com/done");
        let result = client.cashier(&order).await.unwrap();

        assert_eq!(
            result.as_success().unwrap().redirect.as_deref(),
            Some("https://payjs.cn/cashier/abc")
        );
        let params = sent_params(&transport.last());
        assert_eq!(params.get_str("callback_url").as_deref(), Some("https://shop.example.com/done"));
    }

    #[tokio::test]
    async fn test_cashier_rejects_bad_callback() {
        let transport = MockTransport::signed_json(json!({"return_code": 1}));
        let client = client(transport.clone());
        let order = CashierOrder::new(Order::new(1, "A1")).with_callback_url("http://x.example.com/");
        let err = client.cashier(&order).await.err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_CALLBACK_URL));
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn test_jsapi_and_micropay_fields() {
        let transport = MockTransport::signed_json(json!({"return_code": 1}));
        let client = client(transport.clone());

        client
            .jsapi(&JsapiOrder::new(Order::new(100, "J1"), "o7LFAwUGxQ6m3XZ"))
            .await
            .unwrap();
        let params = sent_params(&transport.last());
        assert_eq!(params.get_str("openid").as_deref(), Some("o7LFAwUGxQ6m3XZ"));
        assert_eq!(transport.last().url, "https://payjs.cn/api/jsapi");

        client
            .micropay(&MicropayOrder::new(100, "M1", "134567890123456789"))
            .await
            .unwrap();
        let params = sent_params(&transport.last());
        assert_eq!(params.get_str("auth_code").as_deref(), Some("134567890123456789"));
        assert!(!params.contains_key("notify_url"));
        assert_eq!(transport.last().url, "https://payjs.cn/api/micropay");
    }

    #[tokio::test]
    async fn test_refund_business_failure() {
        let body = serde_json::to_vec(&json!({"return_code": 0, "return_msg": "order not paid"})).unwrap();
        let transport = MockTransport::new(StatusCode::OK, body);
        let client = client(transport.clone());

        let result = client.refund("2018050612345").await.unwrap();
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Business);
        assert_eq!(failure.message.as_deref(), Some("order not paid"));
        assert_eq!(transport.last().url, "https://payjs.cn/api/refund");
    }

    #[test]
    fn test_cashier_legacy_url() {
        let client = client(MockTransport::new(StatusCode::OK, Vec::new()));
        let order = CashierOrder::new(Order::new(1, "2017TEST").with_body("a b"));
        let url = client.cashier_legacy(&order).unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/api/cashier");
        let params: ParameterSet = parsed.query_pairs().into_owned().collect();
        assert_eq!(params.get("total_fee"), Some(&ParamValue::from("1")));
        assert_eq!(params.get_str("body").as_deref(), Some("a b"));
        assert!(!params.contains_key("callback_url"));
        assert!(sign::verify(&Key::new(KEY), &params, None).is_ok());
    }

    #[test]
    fn test_get_openid_url() {
        let client = client(MockTransport::new(StatusCode::OK, Vec::new()));
        let url = client.get_openid("https://shop.example.com/pay").unwrap();

        let parsed = Url::parse(&url).unwrap();
        let params: ParameterSet = parsed.query_pairs().into_owned().collect();
        assert_eq!(params.get_str("mchid").as_deref(), Some("100000"));
        assert_eq!(params.get_str("callback_url").as_deref(), Some("https://shop.example.com/pay"));
        assert!(sign::verify(&Key::new(KEY), &params, None).is_ok());

        let err = client.get_openid("").err().unwrap();
        assert_eq!(err.code(), Some(codes::BAD_CALLBACK_URL));
    }
}
