//! Domain Ports - Core trait definitions for managed certificates
//!
//! These traits define the boundaries between the certificate logic and the
//! external systems it drives: the Compute Engine API and the Kubernetes API.
//! Adapters implement these traits to provide concrete functionality.

use crate::crd::{ManagedCertificateRecord, SchemaVersion};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type marker for certificates provisioned by Google
pub const TYPE_MANAGED: &str = "MANAGED";

// =============================================================================
// SslCertificate Resource
// =============================================================================

/// Compute Engine SslCertificate resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificate {
    /// Name, unique within the project
    pub name: String,
    /// Certificate type (`MANAGED` or `SELF_MANAGED`)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    /// Managed certificate configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed: Option<ManagedSslCertificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
}

/// Managed part of an SslCertificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSslCertificate {
    /// Domains the certificate is issued for, in request order
    #[serde(default)]
    pub domains: Vec<String>,
    /// Provisioning status (`PROVISIONING`, `ACTIVE`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Per-domain provisioning status
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domain_status: BTreeMap<String, String>,
}

impl SslCertificate {
    /// Build an insert request for a managed certificate
    pub fn managed(name: impl Into<String>, domains: Vec<String>) -> Self {
        Self {
            name: name.into(),
            certificate_type: Some(TYPE_MANAGED.to_string()),
            managed: Some(ManagedSslCertificate {
                domains,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Domains of a managed certificate, empty for self-managed ones
    pub fn domains(&self) -> &[String] {
        self.managed
            .as_ref()
            .map(|m| m.domains.as_slice())
            .unwrap_or_default()
    }

    /// Provisioning status reported by the provider, if any
    pub fn managed_status(&self) -> Option<&str> {
        self.managed.as_ref().and_then(|m| m.status.as_deref())
    }
}

// =============================================================================
// Long-Running Operation Resource
// =============================================================================

/// Status of a Compute Engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    /// Check if the operation will not change anymore
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Done)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "PENDING"),
            OperationStatus::Running => write!(f, "RUNNING"),
            OperationStatus::Done => write!(f, "DONE"),
            OperationStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A single error reported by a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationErrorEntry {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl OperationErrorEntry {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }
}

/// Error list attached to a finished operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationErrorEntry>,
}

/// Compute Engine global operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationErrors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_status_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
}

impl Operation {
    /// Errors reported by the operation, empty while it is running or on success
    pub fn errors(&self) -> &[OperationErrorEntry] {
        self.error
            .as_ref()
            .map(|e| e.errors.as_slice())
            .unwrap_or_default()
    }
}

// =============================================================================
// Compute API Port
// =============================================================================

/// Port for the Compute Engine calls the certificate client depends on
///
/// Every mutating call returns immediately with an [`Operation`] handle that
/// must be polled through [`ComputeApi::get_global_operation`].
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Submit a new SslCertificate
    async fn insert_ssl_certificate(
        &self,
        project: &str,
        certificate: &SslCertificate,
    ) -> Result<Operation>;

    /// Submit deletion of an SslCertificate
    async fn delete_ssl_certificate(&self, project: &str, name: &str) -> Result<Operation>;

    /// Fetch an SslCertificate
    async fn get_ssl_certificate(&self, project: &str, name: &str) -> Result<SslCertificate>;

    /// Fetch all SslCertificates of a project
    async fn list_ssl_certificates(&self, project: &str) -> Result<Vec<SslCertificate>>;

    /// Fetch the current state of a global operation
    async fn get_global_operation(&self, project: &str, name: &str) -> Result<Operation>;
}

// =============================================================================
// Certificate Provisioner Port
// =============================================================================

/// Port for SslCertificate lifecycle operations
#[async_trait]
pub trait CertificateProvisioner: Send + Sync {
    /// Create a managed certificate and wait until the provider accepted it
    async fn create(
        &self,
        name: &str,
        domains: &[String],
        cancel: &crate::compute::CancelSignal,
    ) -> Result<()>;

    /// Delete a certificate; an absent certificate is not an error
    async fn delete(&self, name: &str, cancel: &crate::compute::CancelSignal) -> Result<()>;

    /// Check whether a certificate exists
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Fetch a certificate
    async fn get(&self, name: &str) -> Result<SslCertificate>;

    /// Fetch all certificates of the project
    async fn list(&self) -> Result<Vec<SslCertificate>>;
}

// =============================================================================
// ManagedCertificate Store Port
// =============================================================================

/// Port for ManagedCertificate custom resource storage in one namespace
///
/// Reads and updates go through the storage version; creation can target
/// any served schema version.
#[async_trait]
pub trait ManagedCertificateStore: Send + Sync {
    /// Create a ManagedCertificate in the given schema version
    async fn create(&self, version: SchemaVersion, record: &ManagedCertificateRecord) -> Result<()>;

    /// Replace the spec of an existing ManagedCertificate
    async fn update(&self, record: &ManagedCertificateRecord) -> Result<ManagedCertificateRecord>;

    /// Replace the status sub-resource of an existing ManagedCertificate
    async fn update_status(
        &self,
        record: &ManagedCertificateRecord,
    ) -> Result<ManagedCertificateRecord>;

    /// Delete a ManagedCertificate
    async fn delete(&self, name: &str) -> Result<()>;

    /// Fetch a ManagedCertificate
    async fn get(&self, name: &str) -> Result<ManagedCertificateRecord>;

    /// Fetch all ManagedCertificates
    async fn list(&self) -> Result<Vec<ManagedCertificateRecord>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ComputeApiRef = Arc<dyn ComputeApi>;
pub type CertificateProvisionerRef = Arc<dyn CertificateProvisioner>;
pub type ManagedCertificateStoreRef = Arc<dyn ManagedCertificateStore>;
