//! Secret retrieval function for AWS Lambda
//!
//! Reads `SECRET_NAME` and `AWS_REGION` from the environment, fetches the
//! secret from Secrets Manager and answers with `{"statusCode": 200, "body": ...}`.
//! Failures never escape the handler: the error text becomes the body.

pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod retriever;
pub mod runtime;
pub mod store;

pub use audit::{AuditLog, TracingAuditLog};
pub use config::Configuration;
pub use error::RetrievalError;
pub use event::{InvocationContext, InvocationEvent, ResponseEnvelope};
pub use retriever::{SecretRetriever, Variant};
pub use store::{AwsSecretStore, AwsSecretStoreFactory, SecretStore, SecretStoreFactory};
