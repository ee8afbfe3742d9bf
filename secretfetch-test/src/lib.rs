//! Test utilities for secretfetch
//!
//! Provides utilities for integration testing against a local Secrets Manager:
//! - Start the local endpoint in-process on a free port
//! - Seed secrets, including binary-only ones
//! - AWS SDK clients and credentials pointed at the endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use secretfetch_test::TestServer;
//!
//! #[tokio::test]
//! async fn test_fetch() {
//!     let server = TestServer::start().await.unwrap();
//!     server.seed("us-east-1", "db/prod", "p@ss123");
//!
//!     let client = server.client("us-east-1").await;
//!     // ...
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{create_client, test_credentials, unreachable_endpoint};
pub use server::{init_tracing, TestError, TestServer};

/// Timeout for waiting on the endpoint
pub const STARTUP_TIMEOUT_SECS: u64 = 10;
