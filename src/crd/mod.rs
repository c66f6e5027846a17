//! Custom Resource Definitions for ManagedCertificate
//!
//! This module contains the ManagedCertificate CRD in every served version:
//! - v1beta1: single domain
//! - v1beta2: up to 100 domains
//! - v1: up to 100 domains, storage version
//!
//! All versions share [`ManagedCertificateStatus`] and convert to the
//! version-independent [`ManagedCertificateRecord`].

pub mod record;
pub mod status;
pub mod v1;
pub mod v1beta1;
pub mod v1beta2;

pub use record::{
    normalize_for, ManagedCertificateRecord, SchemaVersion, VersionedManagedCertificate,
};
pub use status::{DomainStatus, ManagedCertificateStatus};

use crate::error::{Error, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

/// API group of the ManagedCertificate resource
pub const GROUP: &str = "networking.gke.io";

/// Single CustomResourceDefinition serving every version
pub fn merged_crd() -> Result<CustomResourceDefinition> {
    let crds = vec![
        v1beta1::ManagedCertificate::crd(),
        v1beta2::ManagedCertificate::crd(),
        v1::ManagedCertificate::crd(),
    ];

    kube::core::crd::merge_crds(crds, &SchemaVersion::STORAGE.to_string())
        .map_err(|e| Error::Internal(format!("Failed to merge ManagedCertificate CRDs: {}", e)))
}

/// CRD manifest as YAML
pub fn crd_yaml() -> Result<String> {
    Ok(serde_yaml::to_string(&merged_crd()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_crd_serves_all_versions() {
        let crd = merged_crd().unwrap();

        assert_eq!(crd.spec.group, GROUP);
        assert_eq!(crd.spec.names.kind, "ManagedCertificate");
        assert_eq!(crd.spec.names.plural, "managedcertificates");
        assert_eq!(crd.spec.names.short_names, Some(vec!["mcrt".to_string()]));
        assert_eq!(crd.spec.scope, "Namespaced");

        let mut served: Vec<&str> = crd
            .spec
            .versions
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        served.sort_unstable();
        assert_eq!(served, vec!["v1", "v1beta1", "v1beta2"]);

        let stored: Vec<&str> = crd
            .spec
            .versions
            .iter()
            .filter(|v| v.storage)
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(stored, vec!["v1"]);

        assert!(crd
            .spec
            .versions
            .iter()
            .all(|v| v.subresources.as_ref().and_then(|s| s.status.as_ref()).is_some()));
    }

    #[test]
    fn test_domain_limits_in_schema() {
        let yaml = serde_yaml::to_string(&v1beta1::ManagedCertificate::crd()).unwrap();
        assert!(yaml.contains("maxItems: 1\n"));

        let yaml = serde_yaml::to_string(&v1::ManagedCertificate::crd()).unwrap();
        assert!(yaml.contains("maxItems: 100"));
    }

    #[test]
    fn test_crd_yaml() {
        let yaml = crd_yaml().unwrap();
        assert!(yaml.contains("kind: CustomResourceDefinition"));
        assert!(yaml.contains("name: managedcertificates.networking.gke.io"));
    }
}
