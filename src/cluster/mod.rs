//! Cluster side of managed certificates
//!
//! [`ManagedCertificates`] performs CRUD on ManagedCertificate custom
//! resources through a [`ManagedCertificateStore`](crate::domain::ports::ManagedCertificateStore):
//! - `KubeManagedCertificateStore`: the Kubernetes API, one namespace
//! - `InMemoryManagedCertificateStore`: process memory, for tests and
//!   standalone mode

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeManagedCertificateStore;
pub use memory::InMemoryManagedCertificateStore;

use crate::crd::{ManagedCertificateRecord, SchemaVersion};
use crate::domain::ports::{ManagedCertificateStoreRef, SslCertificate};
use crate::error::Result;
use tracing::{debug, info, warn};

/// Kind reported in cluster not-found and conflict errors
pub const KIND: &str = "ManagedCertificate";

/// Configuration for cluster access
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Namespace ManagedCertificates live in
    pub namespace: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
        }
    }
}

// =============================================================================
// ManagedCertificates Client
// =============================================================================

/// Client for the ManagedCertificates of one namespace
#[derive(Clone)]
pub struct ManagedCertificates {
    store: ManagedCertificateStoreRef,
}

impl ManagedCertificates {
    pub fn new(store: ManagedCertificateStoreRef) -> Self {
        Self { store }
    }

    /// Create a v1beta1 ManagedCertificate, which holds a single domain
    pub async fn create_v1beta1(&self, name: &str, domain: &str) -> Result<()> {
        self.create_version(SchemaVersion::V1beta1, name, vec![domain.to_string()])
            .await
    }

    pub async fn create_v1beta2(&self, name: &str, domains: Vec<String>) -> Result<()> {
        self.create_version(SchemaVersion::V1beta2, name, domains).await
    }

    /// Create a ManagedCertificate in the storage version
    pub async fn create(&self, name: &str, domains: Vec<String>) -> Result<()> {
        self.create_version(SchemaVersion::V1, name, domains).await
    }

    /// Create a ManagedCertificate with an empty status through `version`
    pub async fn create_version(
        &self,
        version: SchemaVersion,
        name: &str,
        domains: Vec<String>,
    ) -> Result<()> {
        let mut record = ManagedCertificateRecord::new(name, domains);
        record.status = Some(Default::default());
        record.validate_for(version)?;

        info!("Creating ManagedCertificate {} ({}) for {:?}", name, version, record.domains);
        self.store.create(version, &record).await
    }

    /// Replace the spec of an existing ManagedCertificate
    pub async fn update(
        &self,
        record: &ManagedCertificateRecord,
    ) -> Result<ManagedCertificateRecord> {
        debug!("Updating ManagedCertificate {}", record.name);
        self.store.update(record).await
    }

    /// Replace the status of an existing ManagedCertificate
    pub async fn update_status(
        &self,
        record: &ManagedCertificateRecord,
    ) -> Result<ManagedCertificateRecord> {
        debug!("Updating status of ManagedCertificate {}", record.name);
        self.store.update_status(record).await
    }

    /// Mirror a provisioned SslCertificate into the status of `name`
    pub async fn sync_status(
        &self,
        name: &str,
        certificate: &SslCertificate,
    ) -> Result<ManagedCertificateRecord> {
        let mut record = self.store.get(name).await?;
        let status = record.status_from_certificate(certificate);

        if record.status.as_ref() == Some(&status) {
            debug!("ManagedCertificate {} status is up to date", name);
            return Ok(record);
        }

        info!(
            "ManagedCertificate {} status: {:?} (SslCertificate {})",
            name, status.certificate_status, certificate.name
        );
        record.status = Some(status);
        self.store.update_status(&record).await
    }

    /// Delete a ManagedCertificate; an absent one counts as deleted
    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.store.delete(name).await {
            Ok(()) => {
                info!("Deleted ManagedCertificate {}", name);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("ManagedCertificate {} already deleted", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete every ManagedCertificate in the namespace
    pub async fn delete_all(&self) -> Result<()> {
        for record in self.store.list().await? {
            self.delete(&record.name).await?;
        }
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<ManagedCertificateRecord> {
        self.store.get(name).await
    }

    pub async fn list(&self) -> Result<Vec<ManagedCertificateRecord>> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ManagedCertificateStatus;
    use crate::domain::ports::ManagedSslCertificate;
    use crate::error::Error;
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn client() -> ManagedCertificates {
        ManagedCertificates::new(Arc::new(InMemoryManagedCertificateStore::new()))
    }

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_sets_empty_status() {
        let client = client();
        client
            .create("example-cert", domains(&["a.example.com", "b.example.com"]))
            .await
            .unwrap();

        let record = client.get("example-cert").await.unwrap();
        assert_eq!(record.domains, domains(&["a.example.com", "b.example.com"]));
        assert_eq!(record.status, Some(ManagedCertificateStatus::default()));
    }

    #[tokio::test]
    async fn test_create_each_version() {
        let client = client();
        client.create_v1beta1("cert-a", "a.example.com").await.unwrap();
        client
            .create_v1beta2("cert-b", domains(&["b.example.com", "c.example.com"]))
            .await
            .unwrap();

        let names: Vec<String> = client.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["cert-a", "cert-b"]);
    }

    #[tokio::test]
    async fn test_create_rejects_domains_for_version() {
        let client = client();
        let err = client
            .create_version(
                SchemaVersion::V1beta1,
                "cert-a",
                domains(&["a.example.com", "b.example.com"]),
            )
            .await
            .unwrap_err();

        assert_matches!(err, Error::Validation(_));
        assert!(client.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_tolerates_not_found() {
        let client = client();
        client.delete("missing-cert").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_all() {
        let client = client();
        for name in ["cert-a", "cert-b", "cert-c"] {
            client.create(name, domains(&["a.example.com"])).await.unwrap();
        }

        client.delete_all().await.unwrap();

        assert!(client.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_domains() {
        let client = client();
        client.create("example-cert", domains(&["a.example.com"])).await.unwrap();

        let mut record = client.get("example-cert").await.unwrap();
        record.domains.push("b.example.com".into());
        let updated = client.update(&record).await.unwrap();

        assert_eq!(updated.domains, domains(&["a.example.com", "b.example.com"]));
        assert_ne!(updated.resource_version, record.resource_version);
    }

    #[tokio::test]
    async fn test_sync_status_from_certificate() {
        let client = client();
        client.create("example-cert", domains(&["a.example.com"])).await.unwrap();

        let certificate = SslCertificate {
            name: "mcrt-example".into(),
            managed: Some(ManagedSslCertificate {
                domains: domains(&["a.example.com"]),
                status: Some("PROVISIONING".into()),
                domain_status: BTreeMap::from([(
                    "a.example.com".to_string(),
                    "PROVISIONING".to_string(),
                )]),
            }),
            ..Default::default()
        };

        let synced = client.sync_status("example-cert", &certificate).await.unwrap();
        assert_eq!(synced.certificate_status(), Some("PROVISIONING"));

        let stored = client.get("example-cert").await.unwrap();
        let status = stored.status.unwrap();
        assert_eq!(status.certificate_name.as_deref(), Some("mcrt-example"));
        assert_eq!(status.domain_status.len(), 1);
        // Spec is untouched by a status write
        assert_eq!(stored.domains, domains(&["a.example.com"]));
    }

    #[tokio::test]
    async fn test_sync_status_of_missing_record() {
        let client = client();
        let err = client
            .sync_status("missing-cert", &SslCertificate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
