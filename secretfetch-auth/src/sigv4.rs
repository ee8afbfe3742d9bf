//! AWS Signature Version 4 credential scope parsing

use http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

/// Errors while reading a SigV4 authorization header
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigV4Error {
    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthFormat,

    #[error("Missing credential")]
    MissingCredential,

    #[error("Invalid credential format")]
    InvalidCredentialFormat,
}

/// Region of the credential scope in an AWS SigV4 authorization header
///
/// Format: AWS4-HMAC-SHA256 Credential=AKID/DATE/REGION/SERVICE/aws4_request,
///         SignedHeaders=host;x-amz-date, Signature=HEX
///
/// Only the `Credential` component is read.
pub fn credential_region(header: &str) -> Result<&str, SigV4Error> {
    let (_algorithm, components) = header
        .split_once(' ')
        .ok_or(SigV4Error::InvalidAuthFormat)?;

    // The SDK separates components with ", " while some clients use ","
    let credential = components
        .split(',')
        .map(str::trim)
        .find_map(|component| component.strip_prefix("Credential="))
        .ok_or(SigV4Error::MissingCredential)?;

    match credential.split('/').collect::<Vec<_>>()[..] {
        [_access_key, _date, region, _service, _terminator] => Ok(region),
        _ => Err(SigV4Error::InvalidCredentialFormat),
    }
}

/// Region from the credential scope of a signed request
pub fn region_from_headers(headers: &HeaderMap) -> Result<String, SigV4Error> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(SigV4Error::MissingAuthHeader)?;

    credential_region(header).map(str::to_string)
}
