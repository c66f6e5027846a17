//! Compute Engine side of managed certificates
//!
//! Provides:
//! - SslCertificate CRUD for one project (`ssl`)
//! - Long-running operation polling and outcome classification (`operation`)
//! - A REST transport (`http`) and an in-memory simulator (`memory`)

pub mod http;
pub mod memory;
pub mod operation;
pub mod ssl;

pub use http::{ComputeClient, ComputeConfig, DEFAULT_ENDPOINT};
pub use memory::{InMemoryCompute, InMemoryComputeConfig};
pub use operation::{
    classify, CancelReason, CancelSignal, OperationFailure, OperationOutcome, OperationWaiter,
    CODE_QUOTA_EXCEEDED, DEFAULT_POLL_INTERVAL,
};
pub use ssl::{SslCertificateClient, MAX_DOMAINS};
