//! Managed Certs - Google-managed SSL certificates for Kubernetes
//!
//! Drives Compute Engine `SslCertificate` resources of type `MANAGED` to a
//! desired state and mirrors them into `ManagedCertificate` custom resources
//! (`networking.gke.io`, versions v1beta1, v1beta2 and v1).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         SslCertificateClient                          │
//! │        create / delete / exists / get / list (one project)            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                          OperationWaiter                              │
//! │     poll global operation until DONE or CancelSignal fires            │
//! │     classify: Success | QuotaExceeded | OtherFailure                  │
//! ├───────────────────────────────┬──────────────────────────────────────┤
//! │  ComputeClient (REST)         │  InMemoryCompute (simulated)          │
//! └───────────────────────────────┴──────────────────────────────────────┘
//!
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        ManagedCertificates                            │
//! │   create (v1beta1 / v1beta2 / v1) / update / delete / get / list      │
//! ├───────────────────────────────┬──────────────────────────────────────┤
//! │  KubeManagedCertificateStore  │  InMemoryManagedCertificateStore      │
//! └───────────────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`compute`]: SslCertificate client, operation polling and transports
//! - [`cluster`]: ManagedCertificate client and stores
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod cluster;
pub mod compute;
pub mod crd;
pub mod domain;
pub mod error;

// Re-export commonly used types
pub use cluster::{
    ClusterConfig, InMemoryManagedCertificateStore, KubeManagedCertificateStore,
    ManagedCertificates,
};

pub use compute::{
    CancelReason, CancelSignal, ComputeClient, ComputeConfig, InMemoryCompute,
    InMemoryComputeConfig, OperationFailure, OperationOutcome, OperationWaiter,
    SslCertificateClient,
};

pub use crd::{
    DomainStatus, ManagedCertificateRecord, ManagedCertificateStatus, SchemaVersion,
};

pub use domain::ports::{
    CertificateProvisioner, ComputeApi, ManagedCertificateStore, Operation, OperationStatus,
    SslCertificate,
};

pub use error::{Error, ErrorAction, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
