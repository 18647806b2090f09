use std::time::Duration;

use named_http::{CallContext, ClientProfile, Registry};

const PROFILES: &str = r#"[
    { "name": "fast", "timeout": "300ms", "retry_count": 0 },
    { "name": "patient", "timeout": "5s", "retry_count": 3,
      "backoff": { "kind": "exponential", "base": "100ms", "max": "2s" } }
]"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => PROFILES.to_owned(),
    };
    let profiles: Vec<ClientProfile> = serde_json::from_str(&source)?;

    let registry = Registry::new();
    for profile in &profiles {
        registry.get_or_create_profile(profile)?;
    }
    println!("registered: {:?}", registry.names());

    let url = std::env::var("NAMED_HTTP_URL").unwrap_or_else(|_| "https://example.com/".to_owned());
    let ctx = CallContext::with_timeout(Duration::from_secs(10));
    for name in registry.names() {
        if let Some(client) = registry.get(&name) {
            let resp = client.get(&ctx, &url, None).await;
            match &resp.error {
                None => println!("[{name}] {}", resp.telemetry),
                Some(err) => println!("[{name}] {} error={err}", resp.telemetry),
            }
        }
    }

    Ok(())
}
