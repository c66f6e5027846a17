//! ManagedCertificate status
//!
//! The status shape is shared by every served schema version. It is written
//! through the status sub-resource only.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Observed state of the backing SslCertificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCertificateStatus {
    /// Provisioning status of the certificate (`Provisioning`, `Active`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_status: Option<String>,

    /// Provisioning status of each domain
    #[serde(default)]
    pub domain_status: Vec<DomainStatus>,

    /// Name of the backing SslCertificate resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_name: Option<String>,

    /// Expiration time of the certificate, RFC3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
}

/// Status of a single domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainStatus {
    pub domain: String,
    pub status: String,
}
