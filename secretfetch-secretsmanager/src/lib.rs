//! Local AWS Secrets Manager endpoint
//!
//! Provides region-scoped in-memory secrets storage with support for:
//! - CreateSecret, GetSecretValue, PutSecretValue
//! - DeleteSecret, DescribeSecret, ListSecrets
//! - Secret versioning (AWSCURRENT, AWSPREVIOUS)

pub mod handlers;
pub mod service;
mod storage;

pub use handlers::handle_request;
pub use service::router;
pub use storage::{
    Deletion, NewSecret, Secret, SecretVersion, SecretsManagerError, SecretsManagerState,
    SecretsManagerStorage, STAGE_CURRENT, STAGE_PREVIOUS,
};
