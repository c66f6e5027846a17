//! ManagedCertificate v1beta1
//!
//! First served version. Certificates are limited to a single domain.

use super::status::ManagedCertificateStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ManagedCertificate requests a Google-managed SslCertificate for a set of domains.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "networking.gke.io",
    version = "v1beta1",
    kind = "ManagedCertificate",
    plural = "managedcertificates",
    shortname = "mcrt",
    status = "ManagedCertificateStatus",
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.certificateStatus"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCertificateSpec {
    /// Domains the certificate is issued for
    #[schemars(length(min = 1, max = 1))]
    pub domains: Vec<String>,
}
