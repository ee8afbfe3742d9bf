//! Core types for secretfetch
//!
//! This crate provides the AWS-facing types shared by the function and the
//! local secrets endpoint.

pub mod account;
pub mod error;
pub mod request_id;

pub use account::{AccountRegionKey, StateStore, DEFAULT_ACCOUNT_ID, DEFAULT_REGION};
pub use error::{AwsError, ErrorCode};
pub use request_id::RequestId;
