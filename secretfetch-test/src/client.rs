//! AWS SDK clients for the local endpoint

use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::{
    config::{Credentials, Region},
    Client,
};

/// Static credentials accepted by the local endpoint
pub fn test_credentials() -> Credentials {
    Credentials::new("test", "test", None, None, "secretfetch-test")
}

/// Create a Secrets Manager client for `region` talking to `endpoint_url`
pub async fn create_client(endpoint_url: &str, region: &'static str) -> Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(endpoint_url)
        .credentials_provider(test_credentials())
        .region(Region::new(region))
        .load()
        .await;

    Client::new(&config)
}

/// An endpoint URL nothing is listening on
pub fn unreachable_endpoint() -> String {
    let port = portpicker::pick_unused_port().unwrap_or(1);
    format!("http://127.0.0.1:{}", port)
}
