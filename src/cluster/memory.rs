//! In-memory ManagedCertificate store
//!
//! Behaves like the API server for the calls the client makes: creates are
//! validated against the requested version, names collide, every write bumps
//! the resource version and status writes leave the spec alone.

use super::KIND;
use crate::crd::{normalize_for, ManagedCertificateRecord, SchemaVersion};
use crate::domain::ports::ManagedCertificateStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// ManagedCertificates held in process memory
#[derive(Default)]
pub struct InMemoryManagedCertificateStore {
    records: RwLock<BTreeMap<String, ManagedCertificateRecord>>,
    resource_version: AtomicU64,
}

impl InMemoryManagedCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_resource_version(&self) -> Option<String> {
        Some((self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string())
    }
}

#[async_trait]
impl ManagedCertificateStore for InMemoryManagedCertificateStore {
    async fn create(
        &self,
        version: SchemaVersion,
        record: &ManagedCertificateRecord,
    ) -> Result<()> {
        let mut stored = normalize_for(version, record)?;

        let mut records = self.records.write().await;
        if records.contains_key(&stored.name) {
            return Err(Error::ResourceExists {
                kind: KIND.into(),
                name: stored.name,
            });
        }

        stored.resource_version = self.next_resource_version();
        debug!("Stored ManagedCertificate {} via {}", stored.name, version);
        records.insert(stored.name.clone(), stored);
        Ok(())
    }

    async fn update(&self, record: &ManagedCertificateRecord) -> Result<ManagedCertificateRecord> {
        let incoming = normalize_for(SchemaVersion::STORAGE, record)?;

        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&incoming.name)
            .ok_or_else(|| Error::not_found(KIND, &incoming.name))?;

        stored.domains = incoming.domains;
        stored.resource_version = self.next_resource_version();
        Ok(stored.clone())
    }

    async fn update_status(
        &self,
        record: &ManagedCertificateRecord,
    ) -> Result<ManagedCertificateRecord> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.name)
            .ok_or_else(|| Error::not_found(KIND, &record.name))?;

        stored.status = record.status.clone();
        stored.resource_version = self.next_resource_version();
        Ok(stored.clone())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(KIND, name))
    }

    async fn get(&self, name: &str) -> Result<ManagedCertificateRecord> {
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(KIND, name))
    }

    async fn list(&self) -> Result<Vec<ManagedCertificateRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn record(name: &str, domains: &[&str]) -> ManagedCertificateRecord {
        ManagedCertificateRecord::new(name, domains.iter().map(|d| d.to_string()).collect())
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let store = InMemoryManagedCertificateStore::new();
        let cert = record("example-cert", &["a.example.com"]);

        store.create(SchemaVersion::V1, &cert).await.unwrap();
        let err = store.create(SchemaVersion::V1beta2, &cert).await.unwrap_err();

        assert_matches!(err, Error::ResourceExists { ref name, .. } if name == "example-cert");
    }

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let store = InMemoryManagedCertificateStore::new();
        let cert = record("missing-cert", &["a.example.com"]);

        assert!(store.get("missing-cert").await.unwrap_err().is_not_found());
        assert!(store.delete("missing-cert").await.unwrap_err().is_not_found());
        assert!(store.update(&cert).await.unwrap_err().is_not_found());
        assert!(store.update_status(&cert).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_keeps_status() {
        let store = InMemoryManagedCertificateStore::new();
        let mut cert = record("example-cert", &["a.example.com"]);
        store.create(SchemaVersion::V1, &cert).await.unwrap();

        let mut with_status = store.get("example-cert").await.unwrap();
        with_status.status.get_or_insert_with(Default::default).certificate_status =
            Some("Active".into());
        store.update_status(&with_status).await.unwrap();

        cert.domains = vec!["b.example.com".into()];
        let updated = store.update(&cert).await.unwrap();

        assert_eq!(updated.domains, vec!["b.example.com"]);
        assert_eq!(updated.certificate_status(), Some("Active"));
    }

    #[tokio::test]
    async fn test_resource_version_advances() {
        let store = InMemoryManagedCertificateStore::new();
        let cert = record("example-cert", &["a.example.com"]);
        store.create(SchemaVersion::V1, &cert).await.unwrap();

        let first = store.get("example-cert").await.unwrap().resource_version;
        let second = store.update(&cert).await.unwrap().resource_version;

        assert_eq!(first.as_deref(), Some("1"));
        assert_eq!(second.as_deref(), Some("2"));
    }
}
