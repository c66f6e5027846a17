//! Kubernetes-backed ManagedCertificate store
//!
//! Creates go through the requested schema version; reads, updates and
//! status writes go through the storage version.

use super::{ClusterConfig, KIND};
use crate::crd::{
    v1, v1beta1, v1beta2, ManagedCertificateRecord, SchemaVersion, VersionedManagedCertificate,
};
use crate::domain::ports::ManagedCertificateStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Field manager recorded on status patches
const FIELD_MANAGER: &str = "managed-certs";

/// ManagedCertificate store over the Kubernetes API
#[derive(Clone)]
pub struct KubeManagedCertificateStore {
    client: Client,
    namespace: String,
}

impl KubeManagedCertificateStore {
    pub fn new(client: Client, config: &ClusterConfig) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn storage_api(&self) -> Api<v1::ManagedCertificate> {
        self.api()
    }

    async fn create_as<K>(&self, record: &ManagedCertificateRecord) -> Result<()>
    where
        K: VersionedManagedCertificate
            + Resource<Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let resource = K::from_record(record)?;
        debug!(
            "Creating ManagedCertificate {}/{} via {}",
            self.namespace,
            record.name,
            <K as VersionedManagedCertificate>::VERSION
        );

        self.api::<K>()
            .create(&PostParams::default(), &resource)
            .await
            .map_err(|e| map_kube_error(e, &record.name))?;
        Ok(())
    }
}

/// Translate kube API errors on a named ManagedCertificate
fn map_kube_error(err: kube::Error, name: &str) -> Error {
    match err {
        kube::Error::Api(e) if e.code == 404 => Error::not_found(KIND, name),
        kube::Error::Api(e) if e.code == 409 => Error::ResourceExists {
            kind: KIND.into(),
            name: name.into(),
        },
        other => Error::Kube(other),
    }
}

#[async_trait]
impl ManagedCertificateStore for KubeManagedCertificateStore {
    async fn create(
        &self,
        version: SchemaVersion,
        record: &ManagedCertificateRecord,
    ) -> Result<()> {
        match version {
            SchemaVersion::V1beta1 => self.create_as::<v1beta1::ManagedCertificate>(record).await,
            SchemaVersion::V1beta2 => self.create_as::<v1beta2::ManagedCertificate>(record).await,
            SchemaVersion::V1 => self.create_as::<v1::ManagedCertificate>(record).await,
        }
    }

    async fn update(&self, record: &ManagedCertificateRecord) -> Result<ManagedCertificateRecord> {
        let api = self.storage_api();
        let mut resource = v1::ManagedCertificate::from_record(record)?;

        if resource.metadata.resource_version.is_none() {
            let current = api
                .get(&record.name)
                .await
                .map_err(|e| map_kube_error(e, &record.name))?;
            resource.metadata.resource_version = current.metadata.resource_version;
        }

        let replaced = api
            .replace(&record.name, &PostParams::default(), &resource)
            .await
            .map_err(|e| map_kube_error(e, &record.name))?;
        Ok(replaced.to_record())
    }

    async fn update_status(
        &self,
        record: &ManagedCertificateRecord,
    ) -> Result<ManagedCertificateRecord> {
        let patch = serde_json::json!({
            "status": record.status.clone().unwrap_or_default()
        });

        let patched = self
            .storage_api()
            .patch_status(
                &record.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| map_kube_error(e, &record.name))?;
        Ok(patched.to_record())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.storage_api()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, name))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ManagedCertificateRecord> {
        let resource = self
            .storage_api()
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, name))?;
        Ok(resource.to_record())
    }

    async fn list(&self) -> Result<Vec<ManagedCertificateRecord>> {
        let list = self.storage_api().list(&ListParams::default()).await?;
        Ok(list.items.iter().map(|r| r.to_record()).collect())
    }
}
