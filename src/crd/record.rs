//! Version-independent ManagedCertificate record
//!
//! The client logic works on [`ManagedCertificateRecord`] only. Each served
//! schema version converts to and from it through
//! [`VersionedManagedCertificate`], so version differences stay in this file.

use super::status::{DomainStatus, ManagedCertificateStatus};
use super::{v1, v1beta1, v1beta2};
use crate::domain::ports::SslCertificate;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// =============================================================================
// Schema Versions
// =============================================================================

/// Served ManagedCertificate schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    V1beta1,
    V1beta2,
    V1,
}

impl SchemaVersion {
    /// Every served version, oldest first
    pub const ALL: [SchemaVersion; 3] = [
        SchemaVersion::V1beta1,
        SchemaVersion::V1beta2,
        SchemaVersion::V1,
    ];

    /// Version the API server persists objects in
    pub const STORAGE: SchemaVersion = SchemaVersion::V1;

    /// Largest domain list the version accepts
    pub fn max_domains(&self) -> usize {
        match self {
            SchemaVersion::V1beta1 => 1,
            SchemaVersion::V1beta2 | SchemaVersion::V1 => 100,
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaVersion::V1beta1 => write!(f, "v1beta1"),
            SchemaVersion::V1beta2 => write!(f, "v1beta2"),
            SchemaVersion::V1 => write!(f, "v1"),
        }
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v1beta1" => Ok(SchemaVersion::V1beta1),
            "v1beta2" => Ok(SchemaVersion::V1beta2),
            "v1" => Ok(SchemaVersion::V1),
            other => Err(Error::Validation(format!(
                "unknown ManagedCertificate version {:?}",
                other
            ))),
        }
    }
}

// =============================================================================
// Canonical Record
// =============================================================================

/// ManagedCertificate as seen by the client, whatever version it came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCertificateRecord {
    pub name: String,
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ManagedCertificateStatus>,
    /// Required by the API server to replace an existing object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ManagedCertificateRecord {
    pub fn new(name: impl Into<String>, domains: Vec<String>) -> Self {
        Self {
            name: name.into(),
            domains,
            ..Default::default()
        }
    }

    /// Check that `version` can represent this record
    pub fn validate_for(&self, version: SchemaVersion) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation("ManagedCertificate name is empty".into()));
        }
        if self.domains.is_empty() || self.domains.len() > version.max_domains() {
            return Err(Error::Validation(format!(
                "ManagedCertificate {} {} accepts 1 to {} domains, got {}",
                version,
                self.name,
                version.max_domains(),
                self.domains.len()
            )));
        }
        Ok(())
    }

    pub fn certificate_status(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.certificate_status.as_deref())
    }

    /// Status mirroring a provisioned SslCertificate
    ///
    /// Domains are listed in the order of this record's spec; domains the
    /// provider does not report yet are left out.
    pub fn status_from_certificate(
        &self,
        certificate: &SslCertificate,
    ) -> ManagedCertificateStatus {
        let domain_status = certificate
            .managed
            .as_ref()
            .map(|managed| {
                self.domains
                    .iter()
                    .filter_map(|domain| {
                        managed.domain_status.get(domain).map(|status| DomainStatus {
                            domain: domain.clone(),
                            status: status.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        ManagedCertificateStatus {
            certificate_status: certificate.managed_status().map(str::to_string),
            domain_status,
            certificate_name: Some(certificate.name.clone()),
            expire_time: certificate.expire_time.clone(),
        }
    }
}

// =============================================================================
// Version Adapters
// =============================================================================

/// Conversion between a served version and [`ManagedCertificateRecord`]
pub trait VersionedManagedCertificate: Sized {
    const VERSION: SchemaVersion;

    /// Build the versioned object, rejecting records the version cannot hold
    fn from_record(record: &ManagedCertificateRecord) -> Result<Self>;

    fn to_record(&self) -> ManagedCertificateRecord;
}

macro_rules! versioned_adapter {
    ($module:ident, $version:expr) => {
        impl VersionedManagedCertificate for $module::ManagedCertificate {
            const VERSION: SchemaVersion = $version;

            fn from_record(record: &ManagedCertificateRecord) -> Result<Self> {
                record.validate_for(Self::VERSION)?;

                let mut resource = Self::new(
                    &record.name,
                    $module::ManagedCertificateSpec {
                        domains: record.domains.clone(),
                    },
                );
                resource.metadata.resource_version = record.resource_version.clone();
                resource.status = Some(record.status.clone().unwrap_or_default());
                Ok(resource)
            }

            fn to_record(&self) -> ManagedCertificateRecord {
                ManagedCertificateRecord {
                    name: self.metadata.name.clone().unwrap_or_default(),
                    domains: self.spec.domains.clone(),
                    status: self.status.clone(),
                    resource_version: self.metadata.resource_version.clone(),
                }
            }
        }
    };
}

versioned_adapter!(v1beta1, SchemaVersion::V1beta1);
versioned_adapter!(v1beta2, SchemaVersion::V1beta2);
versioned_adapter!(v1, SchemaVersion::V1);

/// Run a record through the adapter of `version` and back
pub fn normalize_for(
    version: SchemaVersion,
    record: &ManagedCertificateRecord,
) -> Result<ManagedCertificateRecord> {
    Ok(match version {
        SchemaVersion::V1beta1 => v1beta1::ManagedCertificate::from_record(record)?.to_record(),
        SchemaVersion::V1beta2 => v1beta2::ManagedCertificate::from_record(record)?.to_record(),
        SchemaVersion::V1 => v1::ManagedCertificate::from_record(record)?.to_record(),
    })
}
