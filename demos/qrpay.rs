//! Walk through the main PayJS operations against the live gateway.
//!
//! Run with:
//! ```bash
//! cargo run --example qrpay
//! ```
//!
//! Environment variables (a `.env` file is read if present):
//! - PAYJS_MCHID: merchant id
//! - PAYJS_KEY: merchant key
//! - PAYJS_NOTIFY_URL: optional default notification URL

use payjs_rs::{CashierOrder, Order, PayJsClient, PayJsConfig, PayResult};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("payjs_rs=debug")),
        )
        .init();

    let client = PayJsClient::new(PayJsConfig::from_env()?)?;

    // Merchant order numbers must be unique; reusing one is how retries stay safe.
    let out_trade_no = format!("DEMO{}", chrono::Utc::now().format("%Y%m%d%H%M%S"));
    let order = Order::new(1, out_trade_no.as_str())
        .with_body("test payment")
        .with_attach("info");

    println!("QR payment for {}", out_trade_no);
    let payjs_order_id = match client.native(&order).await? {
        PayResult::Success(ok) => {
            println!("  code_url: {:?}", ok.fields.code_url);
            println!("  qrcode:   {:?}", ok.fields.qrcode);
            ok.fields.payjs_order_id
        }
        PayResult::Fail(err) => {
            println!("  failed ({}): {:?} {:?}", err.status, err.kind, err.message);
            None
        }
    };

    let cashier = CashierOrder::new(order.clone());
    println!("Cashier URL: {}", client.cashier_legacy(&cashier)?);

    let Some(payjs_order_id) = payjs_order_id else {
        return Ok(());
    };

    match client.check_status(&payjs_order_id).await? {
        PayResult::Success(ok) => println!("Paid: {:?}", ok.paid),
        PayResult::Fail(err) => println!("Query failed: {:?}", err.message),
    }

    let closed = client.close(&payjs_order_id).await?;
    println!("Closed: {}", closed.is_success());

    Ok(())
}
