//! SslCertificate resource client
//!
//! Idempotent CRUD over the managed SslCertificates of one project. Mutating
//! calls are driven to completion through [`OperationWaiter`].

use crate::compute::operation::{CancelSignal, OperationWaiter};
use crate::domain::ports::{CertificateProvisioner, ComputeApiRef, SslCertificate};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// Maximum number of domains on one managed certificate
pub const MAX_DOMAINS: usize = 100;

const MAX_NAME_LEN: usize = 63;

/// Client for the SslCertificates of a single project
///
/// Holds only immutable handles and is safe to share between tasks.
#[derive(Clone)]
pub struct SslCertificateClient {
    api: ComputeApiRef,
    project_id: String,
    waiter: OperationWaiter,
}

impl SslCertificateClient {
    /// Create a new client scoped to `project_id`
    pub fn new(api: ComputeApiRef, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            waiter: OperationWaiter::new(api.clone(), project_id.clone()),
            api,
            project_id,
        }
    }

    /// Override how often pending operations are polled
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.waiter = self.waiter.with_poll_interval(poll_interval);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Create a managed certificate for `domains`
    pub async fn create(
        &self,
        name: &str,
        domains: &[String],
        cancel: &CancelSignal,
    ) -> Result<()> {
        validate_name(name)?;
        validate_domains(domains)?;

        info!(
            "Creating SslCertificate {} for domains {:?} in project {}",
            name, domains, self.project_id
        );

        let certificate = SslCertificate::managed(name, domains.to_vec());
        let operation = self
            .api
            .insert_ssl_certificate(&self.project_id, &certificate)
            .await?;

        self.waiter
            .await_completion(&operation.name, cancel)
            .await?
            .into_result()
    }

    /// Delete a certificate, treating an already absent one as deleted
    pub async fn delete(&self, name: &str, cancel: &CancelSignal) -> Result<()> {
        info!("Deleting SslCertificate {} in project {}", name, self.project_id);

        let operation = match self.api.delete_ssl_certificate(&self.project_id, name).await {
            Ok(operation) => operation,
            Err(e) if e.is_not_found() => {
                warn!("SslCertificate {} already deleted", name);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.waiter
            .await_completion(&operation.name, cancel)
            .await?
            .into_result()
    }

    /// Check whether a certificate exists with a single fetch
    pub async fn exists(&self, name: &str) -> Result<bool> {
        match self.get(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch a certificate; not-found is returned as an error
    pub async fn get(&self, name: &str) -> Result<SslCertificate> {
        self.api.get_ssl_certificate(&self.project_id, name).await
    }

    /// Fetch every certificate of the project
    pub async fn list(&self) -> Result<Vec<SslCertificate>> {
        self.api.list_ssl_certificates(&self.project_id).await
    }
}

#[async_trait]
impl CertificateProvisioner for SslCertificateClient {
    async fn create(&self, name: &str, domains: &[String], cancel: &CancelSignal) -> Result<()> {
        SslCertificateClient::create(self, name, domains, cancel).await
    }

    async fn delete(&self, name: &str, cancel: &CancelSignal) -> Result<()> {
        SslCertificateClient::delete(self, name, cancel).await
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        SslCertificateClient::exists(self, name).await
    }

    async fn get(&self, name: &str) -> Result<SslCertificate> {
        SslCertificateClient::get(self, name).await
    }

    async fn list(&self) -> Result<Vec<SslCertificate>> {
        SslCertificateClient::list(self).await
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Check a resource name: lowercase letter first, then lowercase letters,
/// digits or dashes, not ending with a dash, at most 63 characters
pub fn validate_name(name: &str) -> Result<()> {
    let bytes = name.as_bytes();

    let valid = !bytes.is_empty()
        && bytes.len() <= MAX_NAME_LEN
        && bytes[0].is_ascii_lowercase()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[bytes.len() - 1] != b'-';

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid SslCertificate name {:?}",
            name
        )))
    }
}

fn validate_domains(domains: &[String]) -> Result<()> {
    if domains.is_empty() {
        return Err(Error::Validation(
            "a managed certificate needs at least one domain".into(),
        ));
    }
    if domains.len() > MAX_DOMAINS {
        return Err(Error::Validation(format!(
            "a managed certificate supports at most {} domains, got {}",
            MAX_DOMAINS,
            domains.len()
        )));
    }
    if let Some(blank) = domains.iter().find(|d| d.trim().is_empty()) {
        return Err(Error::Validation(format!("invalid domain {:?}", blank)));
    }
    Ok(())
}
