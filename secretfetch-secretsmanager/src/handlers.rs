//! HTTP handlers for the local Secrets Manager endpoint

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use secretfetch_core::{AwsError, RequestId, DEFAULT_REGION};

use crate::storage::{Deletion, NewSecret, Secret, SecretsManagerError, SecretsManagerState};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const REQUEST_ID_HEADER: &str = "x-amzn-requestid";

/// Handle Secrets Manager requests based on the X-Amz-Target header
pub async fn handle_request(
    State(state): State<Arc<SecretsManagerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = RequestId::new();
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let region = secretfetch_auth::region_from_headers(&headers).unwrap_or_else(|e| {
        debug!(error = %e, "No usable credential scope, using default region");
        DEFAULT_REGION.to_string()
    });

    info!(target = %target, region = %region, request_id = %request_id, "Secrets Manager request");

    let operation = target.strip_prefix("secretsmanager.").unwrap_or(target);
    let result = match operation {
        "CreateSecret" => create_secret(&state, &region, &body),
        "GetSecretValue" => get_secret_value(&state, &region, &body),
        "PutSecretValue" => put_secret_value(&state, &region, &body),
        "DescribeSecret" => describe_secret(&state, &region, &body),
        "ListSecrets" => list_secrets(&state, &region),
        "DeleteSecret" => delete_secret(&state, &region, &body),
        _ => Err(SecretsManagerError::UnknownOperation(target.to_string())),
    };

    match result {
        Ok(payload) => json_response(StatusCode::OK, &request_id, payload.to_string()),
        Err(e) => {
            warn!(target = %target, error = %e, "Secrets Manager request failed");
            error_response(&request_id, &e)
        }
    }
}

// === Request/Response types ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSecretRequest {
    name: String,
    description: Option<String>,
    secret_string: Option<String>,
    secret_binary: Option<String>,
    client_request_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSecretResponse {
    #[serde(rename = "ARN")]
    arn: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest {
    secret_id: String,
    version_id: Option<String>,
    version_stage: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    #[serde(rename = "ARN")]
    arn: String,
    name: String,
    version_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_binary: Option<String>,
    version_stages: Vec<String>,
    created_date: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutSecretValueRequest {
    secret_id: String,
    secret_string: Option<String>,
    secret_binary: Option<String>,
    client_request_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutSecretValueResponse {
    #[serde(rename = "ARN")]
    arn: String,
    name: String,
    version_id: String,
    version_stages: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecretIdRequest {
    secret_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecretResponse {
    #[serde(rename = "ARN")]
    arn: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    created_date: f64,
    last_changed_date: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_accessed_date: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_date: Option<f64>,
    version_ids_to_stages: HashMap<String, Vec<String>>,
}

impl From<&Secret> for DescribeSecretResponse {
    fn from(secret: &Secret) -> Self {
        Self {
            arn: secret.arn.clone(),
            name: secret.name.clone(),
            description: secret.description.clone(),
            created_date: epoch_seconds(secret.created_date),
            last_changed_date: epoch_seconds(secret.last_changed_date),
            last_accessed_date: secret.last_accessed_date.map(epoch_seconds),
            deleted_date: secret.deleted_date.map(epoch_seconds),
            version_ids_to_stages: secret.version_ids_to_stages(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListSecretsResponse {
    secret_list: Vec<DescribeSecretResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteSecretRequest {
    secret_id: String,
    #[serde(default)]
    force_delete_without_recovery: bool,
    recovery_window_in_days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteSecretResponse {
    #[serde(rename = "ARN")]
    arn: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    deletion_date: Option<f64>,
}

// === Operations ===

type OperationResult = Result<serde_json::Value, SecretsManagerError>;

fn create_secret(state: &SecretsManagerState, region: &str, body: &Bytes) -> OperationResult {
    let req: CreateSecretRequest = parse(body)?;
    let secret = state.storage.create_secret(
        region,
        NewSecret {
            name: req.name,
            description: req.description,
            secret_string: req.secret_string,
            secret_binary: req.secret_binary,
            client_request_token: req.client_request_token,
        },
    )?;

    info!(name = %secret.name, arn = %secret.arn, "Created secret");

    to_value(&CreateSecretResponse {
        arn: secret.arn,
        name: secret.name,
        version_id: secret.current_version_id,
    })
}

fn get_secret_value(state: &SecretsManagerState, region: &str, body: &Bytes) -> OperationResult {
    let req: GetSecretValueRequest = parse(body)?;
    let (secret, version) = state.storage.get_secret_value(
        region,
        &req.secret_id,
        req.version_id.as_deref(),
        req.version_stage.as_deref(),
    )?;

    to_value(&GetSecretValueResponse {
        arn: secret.arn,
        name: secret.name,
        version_id: version.version_id,
        secret_string: version.secret_string,
        secret_binary: version.secret_binary,
        version_stages: version.version_stages,
        created_date: epoch_seconds(version.created_date),
    })
}

fn put_secret_value(state: &SecretsManagerState, region: &str, body: &Bytes) -> OperationResult {
    let req: PutSecretValueRequest = parse(body)?;
    let (secret, version) = state.storage.put_secret_value(
        region,
        &req.secret_id,
        req.secret_string,
        req.secret_binary,
        req.client_request_token,
    )?;

    info!(name = %secret.name, version_id = %version.version_id, "Stored new secret version");

    to_value(&PutSecretValueResponse {
        arn: secret.arn,
        name: secret.name,
        version_id: version.version_id,
        version_stages: version.version_stages,
    })
}

fn describe_secret(state: &SecretsManagerState, region: &str, body: &Bytes) -> OperationResult {
    let req: SecretIdRequest = parse(body)?;
    let secret = state.storage.describe_secret(region, &req.secret_id)?;
    to_value(&DescribeSecretResponse::from(&secret))
}

fn list_secrets(state: &SecretsManagerState, region: &str) -> OperationResult {
    let secret_list = state
        .storage
        .list_secrets(region)
        .iter()
        .map(DescribeSecretResponse::from)
        .collect();
    to_value(&ListSecretsResponse { secret_list })
}

fn delete_secret(state: &SecretsManagerState, region: &str, body: &Bytes) -> OperationResult {
    let req: DeleteSecretRequest = parse(body)?;
    let deletion = match (req.force_delete_without_recovery, req.recovery_window_in_days) {
        (true, Some(_)) => {
            return Err(SecretsManagerError::InvalidParameter(
                "You can't use ForceDeleteWithoutRecovery in conjunction with RecoveryWindowInDays."
                    .to_string(),
            ))
        }
        (true, None) => Deletion::Immediate,
        (false, Some(days)) => Deletion::Scheduled(days),
        (false, None) => Deletion::default(),
    };

    let secret = state.storage.delete_secret(region, &req.secret_id, deletion)?;
    info!(name = %secret.name, ?deletion, "Deleted secret");

    to_value(&DeleteSecretResponse {
        arn: secret.arn,
        name: secret.name,
        deletion_date: secret.deleted_date.map(epoch_seconds),
    })
}

// === Helpers ===

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, SecretsManagerError> {
    let body: &[u8] = if body.is_empty() { b"{}" } else { body };
    serde_json::from_slice(body).map_err(|e| SecretsManagerError::Validation(e.to_string()))
}

fn to_value<T: Serialize>(response: &T) -> OperationResult {
    serde_json::to_value(response).map_err(|e| SecretsManagerError::Internal(e.to_string()))
}

#[allow(clippy::cast_precision_loss)]
fn epoch_seconds(date: DateTime<Utc>) -> f64 {
    date.timestamp_millis() as f64 / 1000.0
}

fn json_response(status: StatusCode, request_id: &RequestId, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE.to_string()),
            (HeaderName::from_static(REQUEST_ID_HEADER), request_id.to_string()),
        ],
        body,
    )
        .into_response()
}

fn error_response(request_id: &RequestId, error: &SecretsManagerError) -> Response {
    let code = error.code();
    let error = AwsError::new(code, error.to_string()).with_request_id(request_id.as_str());
    let status =
        StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, request_id, error.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use http_body_util::BodyExt;

    async fn call(
        state: &Arc<SecretsManagerState>,
        target: &str,
        region: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-amz-target",
            HeaderValue::from_str(&format!("secretsmanager.{target}")).unwrap(),
        );
        if let Some(region) = region {
            let auth = format!(
                "AWS4-HMAC-SHA256 Credential=test/20240101/{region}/secretsmanager/aws4_request, \
                 SignedHeaders=host, Signature=abc"
            );
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&auth).unwrap());
        }

        let response = handle_request(
            State(state.clone()),
            headers,
            Bytes::from(body.to_string()),
        )
        .await;

        assert!(response.headers().contains_key("x-amzn-requestid"));
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let state = Arc::new(SecretsManagerState::new());

        let (status, created) = call(
            &state,
            "CreateSecret",
            None,
            serde_json::json!({"Name": "db/prod", "SecretString": "p@ss123"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["Name"], "db/prod");

        let (status, value) = call(
            &state,
            "GetSecretValue",
            None,
            serde_json::json!({"SecretId": "db/prod"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["SecretString"], "p@ss123");
        assert_eq!(value["VersionStages"], serde_json::json!(["AWSCURRENT"]));
    }

    #[tokio::test]
    async fn test_missing_secret_error_shape() {
        let state = Arc::new(SecretsManagerState::new());

        let (status, error) = call(
            &state,
            "GetSecretValue",
            None,
            serde_json::json!({"SecretId": "nope"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["__type"], "ResourceNotFoundException");
        assert_eq!(error["message"], "Secrets Manager can't find the specified secret.");
    }

    #[tokio::test]
    async fn test_region_taken_from_authorization() {
        let state = Arc::new(SecretsManagerState::new());

        call(
            &state,
            "CreateSecret",
            Some("eu-west-1"),
            serde_json::json!({"Name": "regional", "SecretString": "v"}),
        )
        .await;

        let (status, _) = call(
            &state,
            "GetSecretValue",
            None,
            serde_json::json!({"SecretId": "regional"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, value) = call(
            &state,
            "GetSecretValue",
            Some("eu-west-1"),
            serde_json::json!({"SecretId": "regional"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(value["ARN"]
            .as_str()
            .unwrap()
            .starts_with("arn:aws:secretsmanager:eu-west-1:"));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let state = Arc::new(SecretsManagerState::new());

        let (status, error) = call(&state, "RotateSecret", None, serde_json::json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["__type"], "UnknownOperationException");
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let state = Arc::new(SecretsManagerState::new());

        let (status, error) = call(
            &state,
            "GetSecretValue",
            None,
            serde_json::json!({"Name": "missing SecretId"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["__type"], "ValidationException");
    }

    #[tokio::test]
    async fn test_delete_conflicting_options() {
        let state = Arc::new(SecretsManagerState::new());
        call(
            &state,
            "CreateSecret",
            None,
            serde_json::json!({"Name": "s", "SecretString": "v"}),
        )
        .await;

        let (status, error) = call(
            &state,
            "DeleteSecret",
            None,
            serde_json::json!({
                "SecretId": "s",
                "ForceDeleteWithoutRecovery": true,
                "RecoveryWindowInDays": 7
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["__type"], "InvalidParameterException");
    }

    #[tokio::test]
    async fn test_unserializable_response_is_internal_error() {
        let result = to_value(&HashMap::from([((1, 2), "tuple keys are not JSON")]));
        let error = result.unwrap_err();
        assert!(matches!(error, SecretsManagerError::Internal(_)));

        let response = error_response(&RequestId::new(), &error);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["__type"], "InternalServiceError");
    }
}
