//! Secrets Manager access

use async_trait::async_trait;
use aws_config::{retry::RetryConfig, BehaviorVersion};
use aws_sdk_secretsmanager::{
    config::{Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    Client,
};
use tracing::debug;

use crate::error::RetrievalError;

const GET_SECRET_VALUE: &str = "GetSecretValue";

/// Fetches secret payloads by identifier
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// The `SecretString` of the current version of `secret_id`
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, RetrievalError>;
}

/// Creates a store scoped to one region
#[async_trait]
pub trait SecretStoreFactory: Send + Sync {
    async fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, RetrievalError>;
}

/// [`SecretStore`] backed by the AWS SDK client
#[derive(Debug, Clone)]
pub struct AwsSecretStore {
    client: Client,
}

impl AwsSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, RetrievalError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(from_sdk_error)?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or(RetrievalError::MissingSecretString)
    }
}

fn from_sdk_error<E, R>(err: SdkError<E, R>) -> RetrievalError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(service) => RetrievalError::Service {
            operation: GET_SECRET_VALUE,
            code: service.err().code().unwrap_or("Unknown").to_string(),
            message: service.err().message().unwrap_or("Unknown").to_string(),
        },
        SdkError::DispatchFailure(_) => {
            RetrievalError::Connection(DisplayErrorContext(&err).to_string())
        }
        SdkError::TimeoutError(_) => RetrievalError::Timeout(DisplayErrorContext(&err).to_string()),
        _ => RetrievalError::Client(DisplayErrorContext(&err).to_string()),
    }
}

/// Builds an SDK client per region from the default AWS configuration chain.
///
/// The overrides exist for local endpoints and tests; in Lambda the defaults
/// (execution role credentials, `AWS_ENDPOINT_URL` if set) apply.
#[derive(Debug, Clone, Default)]
pub struct AwsSecretStoreFactory {
    endpoint_url: Option<String>,
    credentials: Option<Credentials>,
    retry_config: Option<RetryConfig>,
}

impl AwsSecretStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = Some(retry_config);
        self
    }
}

#[async_trait]
impl SecretStoreFactory for AwsSecretStoreFactory {
    async fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, RetrievalError> {
        debug!(region = %region, endpoint = ?self.endpoint_url, "Creating Secrets Manager client");

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(url) = &self.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        if let Some(credentials) = &self.credentials {
            loader = loader.credentials_provider(credentials.clone());
        }
        if let Some(retry_config) = &self.retry_config {
            loader = loader.retry_config(retry_config.clone());
        }

        let config = loader.load().await;
        Ok(Box::new(AwsSecretStore::new(Client::new(&config))))
    }
}
