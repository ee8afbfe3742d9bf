//! Region-scoped in-memory secret storage

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::one::RefMut;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use secretfetch_core::{AccountRegionKey, ErrorCode, StateStore, DEFAULT_ACCOUNT_ID};

pub const STAGE_CURRENT: &str = "AWSCURRENT";
pub const STAGE_PREVIOUS: &str = "AWSPREVIOUS";

const DEFAULT_RECOVERY_WINDOW_DAYS: i64 = 30;

/// A secret with its versions
#[derive(Debug, Clone)]
pub struct Secret {
    pub arn: String,
    pub name: String,
    pub description: Option<String>,
    /// version_id -> SecretVersion
    pub versions: HashMap<String, SecretVersion>,
    pub current_version_id: Option<String>,
    pub previous_version_id: Option<String>,
    pub created_date: DateTime<Utc>,
    pub last_changed_date: DateTime<Utc>,
    pub last_accessed_date: Option<DateTime<Utc>>,
    /// Set once the secret is scheduled for deletion
    pub deleted_date: Option<DateTime<Utc>>,
}

impl Secret {
    pub fn is_scheduled_for_deletion(&self) -> bool {
        self.deleted_date.is_some()
    }

    /// Version ids mapped to their staging labels, skipping unlabelled versions
    pub fn version_ids_to_stages(&self) -> HashMap<String, Vec<String>> {
        self.versions
            .values()
            .filter(|v| !v.version_stages.is_empty())
            .map(|v| (v.version_id.clone(), v.version_stages.clone()))
            .collect()
    }
}

/// A version of a secret
#[derive(Debug, Clone)]
pub struct SecretVersion {
    pub version_id: String,
    pub secret_string: Option<String>,
    /// Base64 encoded, as carried on the wire
    pub secret_binary: Option<String>,
    pub created_date: DateTime<Utc>,
    pub version_stages: Vec<String>,
}

/// Input for [`SecretsManagerStorage::create_secret`]
#[derive(Debug, Clone, Default)]
pub struct NewSecret {
    pub name: String,
    pub description: Option<String>,
    pub secret_string: Option<String>,
    pub secret_binary: Option<String>,
    /// Used as the first version id when present
    pub client_request_token: Option<String>,
}

impl NewSecret {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret_string: Some(value.into()),
            ..Self::default()
        }
    }
}

/// How a secret should be deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// Schedule deletion after the recovery window (days)
    Scheduled(i64),
    /// Remove immediately
    Immediate,
}

impl Default for Deletion {
    fn default() -> Self {
        Self::Scheduled(DEFAULT_RECOVERY_WINDOW_DAYS)
    }
}

/// Secrets of one account/region, indexed by name
#[derive(Debug, Default)]
pub struct RegionSecrets {
    secrets: HashMap<String, Secret>,
}

impl RegionSecrets {
    /// Look a secret up by name or by ARN
    fn find(&self, secret_id: &str) -> Option<&Secret> {
        self.secrets
            .get(secret_id)
            .or_else(|| self.secrets.values().find(|s| s.arn == secret_id))
    }

    fn find_mut(&mut self, secret_id: &str) -> Option<&mut Secret> {
        let name = self.find(secret_id)?.name.clone();
        self.secrets.get_mut(&name)
    }
}

/// In-memory storage for secrets, scoped by region
#[derive(Default)]
pub struct SecretsManagerStorage {
    regions: StateStore<RegionSecrets>,
}

impl SecretsManagerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new secret
    pub fn create_secret(
        &self,
        region: &str,
        new: NewSecret,
    ) -> Result<Secret, SecretsManagerError> {
        if new.name.is_empty() {
            return Err(SecretsManagerError::InvalidParameter(
                "Name must not be empty".to_string(),
            ));
        }
        if new.secret_string.is_some() && new.secret_binary.is_some() {
            return Err(SecretsManagerError::InvalidParameter(
                "You can't specify both a binary secret value and a string secret value \
                 in the same secret."
                    .to_string(),
            ));
        }

        let mut state = self.regions.get_or_create(DEFAULT_ACCOUNT_ID, region);
        if let Some(existing) = state.secrets.get(&new.name) {
            if existing.is_scheduled_for_deletion() {
                return Err(SecretsManagerError::InvalidRequest(
                    "You can't create this secret because a secret with this name is \
                     already scheduled for deletion."
                        .to_string(),
                ));
            }
            return Err(SecretsManagerError::ResourceExists(format!(
                "The operation failed because the secret {} already exists.",
                new.name
            )));
        }

        let now = Utc::now();
        let arn = format!(
            "arn:aws:secretsmanager:{}:{}:secret:{}-{}",
            region,
            DEFAULT_ACCOUNT_ID,
            new.name,
            &Uuid::new_v4().simple().to_string()[..6]
        );

        let mut versions = HashMap::new();
        let current_version_id = if new.secret_string.is_some() || new.secret_binary.is_some() {
            let version_id = new
                .client_request_token
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            versions.insert(
                version_id.clone(),
                SecretVersion {
                    version_id: version_id.clone(),
                    secret_string: new.secret_string,
                    secret_binary: new.secret_binary,
                    created_date: now,
                    version_stages: vec![STAGE_CURRENT.to_string()],
                },
            );
            Some(version_id)
        } else {
            None
        };

        let secret = Secret {
            arn,
            name: new.name.clone(),
            description: new.description,
            versions,
            current_version_id,
            previous_version_id: None,
            created_date: now,
            last_changed_date: now,
            last_accessed_date: None,
            deleted_date: None,
        };

        state.secrets.insert(new.name, secret.clone());
        Ok(secret)
    }

    /// Resolve the requested version of a secret and record the access
    pub fn get_secret_value(
        &self,
        region: &str,
        secret_id: &str,
        version_id: Option<&str>,
        version_stage: Option<&str>,
    ) -> Result<(Secret, SecretVersion), SecretsManagerError> {
        let mut state = self.region_mut(region)?;
        let secret = state
            .find_mut(secret_id)
            .ok_or(SecretsManagerError::ResourceNotFound)?;

        if secret.is_scheduled_for_deletion() {
            return Err(SecretsManagerError::marked_for_deletion());
        }

        let version_id = match (version_id, version_stage) {
            (Some(vid), _) => vid.to_string(),
            (None, None | Some(STAGE_CURRENT)) => secret
                .current_version_id
                .clone()
                .ok_or(SecretsManagerError::ResourceNotFound)?,
            (None, Some(STAGE_PREVIOUS)) => secret
                .previous_version_id
                .clone()
                .ok_or(SecretsManagerError::ResourceNotFound)?,
            (None, Some(stage)) => {
                // Custom labels are looked up on the versions themselves
                secret
                    .versions
                    .values()
                    .find(|v| v.version_stages.iter().any(|s| s == stage))
                    .map(|v| v.version_id.clone())
                    .ok_or(SecretsManagerError::ResourceNotFound)?
            }
        };

        let version = secret
            .versions
            .get(&version_id)
            .cloned()
            .ok_or(SecretsManagerError::ResourceNotFound)?;

        secret.last_accessed_date = Some(Utc::now());
        Ok((secret.clone(), version))
    }

    /// Store a new value as AWSCURRENT, demoting the old current to AWSPREVIOUS
    pub fn put_secret_value(
        &self,
        region: &str,
        secret_id: &str,
        secret_string: Option<String>,
        secret_binary: Option<String>,
        client_request_token: Option<String>,
    ) -> Result<(Secret, SecretVersion), SecretsManagerError> {
        if secret_string.is_none() && secret_binary.is_none() {
            return Err(SecretsManagerError::InvalidParameter(
                "You must provide either SecretString or SecretBinary.".to_string(),
            ));
        }

        let mut state = self.region_mut(region)?;
        let secret = state
            .find_mut(secret_id)
            .ok_or(SecretsManagerError::ResourceNotFound)?;

        if secret.is_scheduled_for_deletion() {
            return Err(SecretsManagerError::marked_for_deletion());
        }

        let now = Utc::now();
        let new_version_id = client_request_token.unwrap_or_else(|| Uuid::new_v4().to_string());
        if secret.versions.contains_key(&new_version_id) {
            return Err(SecretsManagerError::ResourceExists(format!(
                "A version with VersionId {new_version_id} already exists."
            )));
        }

        if let Some(prev) = secret
            .previous_version_id
            .take()
            .and_then(|id| secret.versions.get_mut(&id))
        {
            prev.version_stages.retain(|s| s != STAGE_PREVIOUS);
        }

        if let Some(current_id) = secret.current_version_id.take() {
            if let Some(current) = secret.versions.get_mut(&current_id) {
                current.version_stages.retain(|s| s != STAGE_CURRENT);
                current.version_stages.push(STAGE_PREVIOUS.to_string());
            }
            secret.previous_version_id = Some(current_id);
        }

        let version = SecretVersion {
            version_id: new_version_id.clone(),
            secret_string,
            secret_binary,
            created_date: now,
            version_stages: vec![STAGE_CURRENT.to_string()],
        };

        secret.versions.insert(new_version_id.clone(), version.clone());
        secret.current_version_id = Some(new_version_id);
        secret.last_changed_date = now;

        Ok((secret.clone(), version))
    }

    /// Delete a secret, either scheduled or immediate
    pub fn delete_secret(
        &self,
        region: &str,
        secret_id: &str,
        deletion: Deletion,
    ) -> Result<Secret, SecretsManagerError> {
        let mut state = self.region_mut(region)?;

        match deletion {
            Deletion::Immediate => {
                let name = state
                    .find(secret_id)
                    .map(|s| s.name.clone())
                    .ok_or(SecretsManagerError::ResourceNotFound)?;
                let mut secret = state
                    .secrets
                    .remove(&name)
                    .ok_or(SecretsManagerError::ResourceNotFound)?;
                secret.deleted_date = Some(Utc::now());
                Ok(secret)
            }
            Deletion::Scheduled(days) => {
                if !(7..=30).contains(&days) {
                    return Err(SecretsManagerError::InvalidParameter(
                        "RecoveryWindowInDays value must be between 7 and 30 days (inclusive)."
                            .to_string(),
                    ));
                }

                let secret = state
                    .find_mut(secret_id)
                    .ok_or(SecretsManagerError::ResourceNotFound)?;
                if secret.is_scheduled_for_deletion() {
                    return Err(SecretsManagerError::marked_for_deletion());
                }

                secret.deleted_date = Some(Utc::now() + Duration::days(days));
                Ok(secret.clone())
            }
        }
    }

    /// Metadata of a secret, including secrets scheduled for deletion
    pub fn describe_secret(
        &self,
        region: &str,
        secret_id: &str,
    ) -> Result<Secret, SecretsManagerError> {
        self.regions
            .get(DEFAULT_ACCOUNT_ID, region)
            .and_then(|state| state.find(secret_id).cloned())
            .ok_or(SecretsManagerError::ResourceNotFound)
    }

    /// Secrets of a region that are not scheduled for deletion, sorted by name
    pub fn list_secrets(&self, region: &str) -> Vec<Secret> {
        let mut secrets: Vec<Secret> = self
            .regions
            .get(DEFAULT_ACCOUNT_ID, region)
            .map(|state| {
                state
                    .secrets
                    .values()
                    .filter(|s| !s.is_scheduled_for_deletion())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        secrets.sort_by(|a, b| a.name.cmp(&b.name));
        secrets
    }

    /// Secrets of an existing region; unknown regions hold no secrets
    fn region_mut(
        &self,
        region: &str,
    ) -> Result<RefMut<'_, AccountRegionKey, RegionSecrets>, SecretsManagerError> {
        self.regions
            .get_mut(DEFAULT_ACCOUNT_ID, region)
            .ok_or(SecretsManagerError::ResourceNotFound)
    }
}

/// Secrets Manager errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SecretsManagerError {
    #[error("{0}")]
    ResourceExists(String),

    #[error("Secrets Manager can't find the specified secret.")]
    ResourceNotFound,

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{0}")]
    Internal(String),
}

impl SecretsManagerError {
    fn marked_for_deletion() -> Self {
        Self::InvalidRequest(
            "You can't perform this operation on the secret because it was marked for deletion."
                .to_string(),
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ResourceExists(_) => ErrorCode::ResourceExists,
            Self::ResourceNotFound => ErrorCode::ResourceNotFound,
            Self::InvalidParameter(_) => ErrorCode::InvalidParameter,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::Validation(_) => ErrorCode::Validation,
            Self::UnknownOperation(_) => ErrorCode::UnknownOperation,
            Self::Internal(_) => ErrorCode::InternalServiceError,
        }
    }
}

/// State for Secrets Manager handlers
pub struct SecretsManagerState {
    pub storage: Arc<SecretsManagerStorage>,
}

impl SecretsManagerState {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(SecretsManagerStorage::new()),
        }
    }
}

impl Default for SecretsManagerState {
    fn default() -> Self {
        Self::new()
    }
}
