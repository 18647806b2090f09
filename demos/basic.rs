use named_http::{with_retry_count, with_timeout_str, CallContext, Registry};
use serde_json::Value;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("NAMED_HTTP_URL")
        .unwrap_or_else(|_| "https://httpbin.org/json".to_owned());

    let client = Registry::global().get_or_create(
        "demo.basic",
        [with_timeout_str("2s"), with_retry_count(2)],
    )?;

    let resp = client
        .get_json::<Value>(&CallContext::background(), &url, None)
        .await;

    println!("{}", resp.telemetry);
    let data = resp.into_result()?;
    println!("{data:#?}");

    Ok(())
}
