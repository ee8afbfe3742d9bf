//! AWS request authentication helpers
//!
//! The local endpoint does not verify signatures; it only reads the credential
//! scope of a SigV4 `Authorization` header to learn the caller's region.

pub mod sigv4;

pub use sigv4::{credential_region, region_from_headers, SigV4Error};
