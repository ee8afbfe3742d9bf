//! The secret retrieval handler

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::audit::{self, AuditLog, TracingAuditLog};
use crate::config::{self, Configuration, VarLookup};
use crate::error::RetrievalError;
use crate::event::{InvocationContext, InvocationEvent, ResponseEnvelope};
use crate::store::{AwsSecretStoreFactory, SecretStoreFactory};

/// Flavour of the function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    /// Fetch and return, nothing else
    #[default]
    Plain,
    /// Also log failed retrievals and unverified MFA
    Audited,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Audited => "audited",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "basic" => Ok(Self::Plain),
            "audited" | "bonus" => Ok(Self::Audited),
            other => Err(format!("unknown variant: {other}")),
        }
    }
}

/// Stateless handler: every call re-reads the environment and builds a new
/// client for the configured region.
pub struct SecretRetriever {
    variant: Variant,
    stores: Arc<dyn SecretStoreFactory>,
    audit: Arc<dyn AuditLog>,
    /// Replaces the process environment when set
    environment: Option<Arc<VarLookup>>,
}

impl SecretRetriever {
    /// Retriever backed by the AWS SDK and `tracing`
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            stores: Arc::new(AwsSecretStoreFactory::new()),
            audit: Arc::new(TracingAuditLog),
            environment: None,
        }
    }

    pub fn with_store_factory(mut self, stores: Arc<dyn SecretStoreFactory>) -> Self {
        self.stores = stores;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Read configuration from `vars` instead of the process environment
    pub fn with_environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let lookup: Arc<VarLookup> = Arc::new(config::lookup_in(config::collect_vars(vars)));
        self.environment = Some(lookup);
        self
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Handle one invocation. Never fails; the status code is always 200.
    pub async fn handle(
        &self,
        event: &InvocationEvent,
        context: &InvocationContext,
    ) -> ResponseEnvelope {
        debug!(
            request_id = %context.request_id,
            variant = %self.variant,
            "Handling invocation"
        );

        let outcome = self.fetch().await;

        if self.variant == Variant::Audited {
            match &outcome {
                Ok(_) if !event.mfa_verified => self.audit.warn(audit::MFA_NOT_VERIFIED),
                Ok(_) => {}
                Err(e) => self.audit.error(&audit::retrieval_failed(e)),
            }
        }

        ResponseEnvelope::from_outcome(outcome)
    }

    async fn fetch(&self) -> Result<String, RetrievalError> {
        let config = match &self.environment {
            Some(lookup) => Configuration::load(lookup.as_ref())?,
            None => Configuration::from_env()?,
        };
        let store = self.stores.connect(&config.region_name).await?;

        let secret_id = config
            .secret_name
            .as_deref()
            .ok_or(RetrievalError::MissingSecretId)?;

        debug!(secret_id = %secret_id, region = %config.region_name, "Fetching secret");
        store.get_secret_string(secret_id).await
    }
}

impl fmt::Debug for SecretRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRetriever")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::env::VarError;
    use std::ffi::OsString;
    use std::sync::Mutex;

    /// Regions mapped to their secrets
    #[derive(Default)]
    struct FakeStores {
        regions: HashMap<String, HashMap<String, Result<String, RetrievalError>>>,
        connected: Mutex<Vec<String>>,
    }

    impl FakeStores {
        fn with_secret(
            mut self,
            region: &str,
            name: &str,
            value: Result<String, RetrievalError>,
        ) -> Self {
            self.regions
                .entry(region.to_string())
                .or_default()
                .insert(name.to_string(), value);
            self
        }
    }

    struct FakeStore {
        secrets: HashMap<String, Result<String, RetrievalError>>,
    }

    #[async_trait]
    impl SecretStore for FakeStore {
        async fn get_secret_string(&self, secret_id: &str) -> Result<String, RetrievalError> {
            self.secrets
                .get(secret_id)
                .cloned()
                .unwrap_or_else(|| Err(not_found()))
        }
    }

    #[async_trait]
    impl SecretStoreFactory for FakeStores {
        async fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, RetrievalError> {
            self.connected.lock().unwrap().push(region.to_string());
            Ok(Box::new(FakeStore {
                secrets: self.regions.get(region).cloned().unwrap_or_default(),
            }))
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        lines: Mutex<Vec<(&'static str, String)>>,
    }

    impl RecordingAudit {
        fn lines(&self) -> Vec<(&'static str, String)> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl AuditLog for RecordingAudit {
        fn warn(&self, message: &str) {
            self.lines.lock().unwrap().push(("warn", message.to_string()));
        }

        fn error(&self, message: &str) {
            self.lines.lock().unwrap().push(("error", message.to_string()));
        }
    }

    fn not_found() -> RetrievalError {
        RetrievalError::Service {
            operation: "GetSecretValue",
            code: "ResourceNotFoundException".to_string(),
            message: "Secrets Manager can't find the specified secret.".to_string(),
        }
    }

    fn stores() -> Arc<FakeStores> {
        Arc::new(
            FakeStores::default()
                .with_secret("us-east-1", "db/prod", Ok("p@ss123".to_string()))
                .with_secret("eu-west-1", "db/prod", Ok("eu-pass".to_string()))
                .with_secret(
                    "us-east-1",
                    "locked",
                    Err(RetrievalError::Service {
                        operation: "GetSecretValue",
                        code: "AccessDeniedException".to_string(),
                        message: "User is not authorized to perform: \
                                  secretsmanager:GetSecretValue"
                            .to_string(),
                    }),
                ),
        )
    }

    fn setup(
        variant: Variant,
        vars: &[(&str, &str)],
    ) -> (SecretRetriever, Arc<FakeStores>, Arc<RecordingAudit>) {
        let stores = stores();
        let audit = Arc::new(RecordingAudit::default());
        let retriever = SecretRetriever::new(variant)
            .with_store_factory(stores.clone())
            .with_audit_log(audit.clone())
            .with_environment(vars.iter().copied());
        (retriever, stores, audit)
    }

    async fn invoke(retriever: &SecretRetriever, mfa_verified: bool) -> ResponseEnvelope {
        retriever
            .handle(&InvocationEvent { mfa_verified }, &InvocationContext::local())
            .await
    }

    #[tokio::test]
    async fn test_returns_secret_value() {
        let (retriever, stores, _) = setup(Variant::Plain, &[("SECRET_NAME", "db/prod")]);

        let response = invoke(&retriever, false).await;

        assert_eq!(response, ResponseEnvelope::ok("p@ss123"));
        assert_eq!(*stores.connected.lock().unwrap(), vec!["us-east-1"]);
    }

    #[tokio::test]
    async fn test_region_override() {
        let (retriever, stores, _) = setup(
            Variant::Plain,
            &[("SECRET_NAME", "db/prod"), ("AWS_REGION", "eu-west-1")],
        );

        let response = invoke(&retriever, false).await;

        assert_eq!(response.body, "eu-pass");
        assert_eq!(*stores.connected.lock().unwrap(), vec!["eu-west-1"]);
    }

    #[tokio::test]
    async fn test_missing_secret_becomes_body() {
        let (retriever, _, audit) = setup(Variant::Plain, &[("SECRET_NAME", "nope")]);

        let response = invoke(&retriever, false).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, not_found().to_string());
        // The plain variant never logs
        assert!(audit.lines().is_empty());
    }

    #[tokio::test]
    async fn test_unset_secret_name() {
        let (retriever, stores, _) = setup(Variant::Plain, &[]);

        let response = invoke(&retriever, false).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, RetrievalError::MissingSecretId.to_string());
        // The client is still created before the call fails
        assert_eq!(stores.connected.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_access_denied_becomes_body() {
        let (retriever, _, _) = setup(Variant::Plain, &[("SECRET_NAME", "locked")]);

        let response = invoke(&retriever, true).await;

        assert_eq!(response.status_code, 200);
        assert!(response.body.contains("AccessDeniedException"));
    }

    #[tokio::test]
    async fn test_every_invocation_creates_a_client() {
        let (retriever, stores, _) = setup(Variant::Plain, &[("SECRET_NAME", "db/prod")]);

        invoke(&retriever, false).await;
        invoke(&retriever, false).await;

        assert_eq!(stores.connected.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_audited_warns_without_mfa() {
        let (retriever, _, audit) = setup(Variant::Audited, &[("SECRET_NAME", "db/prod")]);

        let response = invoke(&retriever, false).await;

        assert_eq!(response.body, "p@ss123");
        assert_eq!(audit.lines(), vec![("warn", audit::MFA_NOT_VERIFIED.to_string())]);
    }

    #[tokio::test]
    async fn test_audited_silent_with_mfa() {
        let (retriever, _, audit) = setup(Variant::Audited, &[("SECRET_NAME", "db/prod")]);

        let response = invoke(&retriever, true).await;

        assert_eq!(response.body, "p@ss123");
        assert!(audit.lines().is_empty());
    }

    #[tokio::test]
    async fn test_audited_logs_error_and_skips_warning() {
        let (retriever, _, audit) = setup(Variant::Audited, &[("SECRET_NAME", "nope")]);

        let response = invoke(&retriever, false).await;

        let lines = audit.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, "error");
        assert_eq!(lines[0].1, format!("Error retrieving secret: {}", response.body));
    }

    #[tokio::test]
    async fn test_only_exact_secret_name_is_read() {
        let (retriever, _, _) = setup(Variant::Plain, &[("secret_name", "db/prod")]);

        let response = invoke(&retriever, false).await;

        assert_eq!(response.body, RetrievalError::MissingSecretId.to_string());
    }

    #[tokio::test]
    async fn test_audited_logs_configuration_error() {
        let (mut retriever, stores, audit) = setup(Variant::Audited, &[]);
        let lookup: Arc<VarLookup> = Arc::new(|name: &str| -> Result<String, VarError> {
            match name {
                "SECRET_NAME" => Err(VarError::NotUnicode(OsString::from("db/prod"))),
                _ => Err(VarError::NotPresent),
            }
        });
        retriever.environment = Some(lookup);

        let response = invoke(&retriever, true).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "Invalid configuration: SECRET_NAME is not valid unicode");
        assert_eq!(
            audit.lines(),
            vec![(
                "error",
                "Error retrieving secret: Invalid configuration: SECRET_NAME is not valid unicode"
                    .to_string()
            )]
        );
        // Nothing to connect with before the environment is read
        assert!(stores.connected.lock().unwrap().is_empty());
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("plain".parse::<Variant>().unwrap(), Variant::Plain);
        assert_eq!("AUDITED".parse::<Variant>().unwrap(), Variant::Audited);
        assert_eq!("bonus".parse::<Variant>().unwrap(), Variant::Audited);
        assert!("loud".parse::<Variant>().is_err());
        assert_eq!(Variant::default(), Variant::Plain);
    }
}
