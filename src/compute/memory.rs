//! In-memory Compute Engine simulator
//!
//! Keeps SslCertificates and global operations in process memory and walks
//! every operation through `PENDING -> RUNNING -> DONE`, one step per status
//! fetch. Side effects of an insert or delete only become visible once the
//! operation reports `DONE`, as with the real provider.

use crate::compute::operation::CODE_QUOTA_EXCEEDED;
use crate::domain::ports::{
    ComputeApi, ManagedSslCertificate, Operation, OperationErrorEntry, OperationErrors,
    OperationStatus, SslCertificate,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Error code for an insert that collides with an existing certificate
pub const CODE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

const STATUS_PROVISIONING: &str = "PROVISIONING";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the simulated provider
#[derive(Debug, Clone)]
pub struct InMemoryComputeConfig {
    /// Status fetches that report the operation as not done yet
    pub polls_until_done: u32,
    /// Maximum number of certificates per project
    pub certificate_quota: Option<usize>,
}

impl Default for InMemoryComputeConfig {
    fn default() -> Self {
        Self {
            polls_until_done: 1,
            certificate_quota: None,
        }
    }
}

// =============================================================================
// Operation State
// =============================================================================

#[derive(Debug, Clone)]
enum Effect {
    Insert(SslCertificate),
    Delete(String),
}

#[derive(Debug, Clone)]
struct SimulatedOperation {
    project: String,
    operation: Operation,
    polls_remaining: u32,
    effect: Option<Effect>,
}

// =============================================================================
// In-Memory Compute
// =============================================================================

/// Simulated Compute Engine API
pub struct InMemoryCompute {
    config: InMemoryComputeConfig,
    /// Certificates keyed by (project, name)
    certificates: RwLock<BTreeMap<(String, String), SslCertificate>>,
    /// Operations keyed by name
    operations: RwLock<BTreeMap<String, SimulatedOperation>>,
    /// Errors the next submitted operation finishes with
    injected_errors: RwLock<Option<Vec<OperationErrorEntry>>>,
    operation_fetches: AtomicUsize,
    next_id: AtomicU64,
}

impl Default for InMemoryCompute {
    fn default() -> Self {
        Self::new(InMemoryComputeConfig::default())
    }
}

impl InMemoryCompute {
    /// Create a new simulator
    pub fn new(config: InMemoryComputeConfig) -> Self {
        Self {
            config,
            certificates: RwLock::new(BTreeMap::new()),
            operations: RwLock::new(BTreeMap::new()),
            injected_errors: RwLock::new(None),
            operation_fetches: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Make the next submitted operation finish with `errors`
    pub async fn fail_next_operation(&self, errors: Vec<OperationErrorEntry>) {
        *self.injected_errors.write().await = Some(errors);
    }

    /// Total number of operation status fetches served
    pub fn operation_fetches(&self) -> usize {
        self.operation_fetches.load(Ordering::SeqCst)
    }

    /// Number of certificates currently stored for a project
    pub async fn certificate_count(&self, project: &str) -> usize {
        self.certificates
            .read()
            .await
            .keys()
            .filter(|(p, _)| p == project)
            .count()
    }

    /// Register a new operation and hand out its initial state
    ///
    /// Takes the operations table already locked so callers can check and
    /// submit atomically.
    async fn submit(
        &self,
        operations: &mut BTreeMap<String, SimulatedOperation>,
        project: &str,
        operation_type: &str,
        target: &str,
        errors: Vec<OperationErrorEntry>,
        effect: Option<Effect>,
    ) -> Operation {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let failed = !errors.is_empty();
        let (http_message, http_status) = if errors.iter().any(|e| e.code == CODE_QUOTA_EXCEEDED) {
            ("FORBIDDEN", 403)
        } else {
            ("BAD REQUEST", 400)
        };

        let operation = Operation {
            name: format!("operation-{:016x}", id),
            status: OperationStatus::Pending,
            error: failed.then_some(OperationErrors { errors }),
            http_error_message: failed.then(|| http_message.to_string()),
            http_error_status_code: failed.then_some(http_status),
            operation_type: Some(operation_type.to_string()),
            target_link: Some(format!(
                "projects/{}/global/sslCertificates/{}",
                project, target
            )),
            progress: Some(0),
        };

        // Errors stay hidden until the operation reports DONE
        let mut visible = operation.clone();
        visible.error = None;
        visible.http_error_message = None;
        visible.http_error_status_code = None;

        info!(
            "Submitted operation {} ({} {})",
            operation.name, operation_type, target
        );

        let mut state = SimulatedOperation {
            project: project.to_string(),
            operation,
            polls_remaining: self.config.polls_until_done,
            effect: if failed { None } else { effect },
        };

        if state.polls_remaining == 0 {
            self.finish(&mut state).await;
            visible = state.operation.clone();
        }

        operations.insert(visible.name.clone(), state);

        visible
    }

    /// Move an operation to DONE and apply its side effect
    async fn finish(&self, state: &mut SimulatedOperation) {
        state.operation.status = OperationStatus::Done;
        state.operation.progress = Some(100);

        let mut certificates = self.certificates.write().await;
        match state.effect.take() {
            Some(Effect::Insert(cert)) => {
                certificates.insert((state.project.clone(), cert.name.clone()), cert);
            }
            Some(Effect::Delete(name)) => {
                certificates.remove(&(state.project.clone(), name));
            }
            None => {}
        }

        debug!("Operation {} done", state.operation.name);
    }

    fn provisioned(&self, project: &str, request: &SslCertificate) -> SslCertificate {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let domains = request.domains().to_vec();

        SslCertificate {
            name: request.name.clone(),
            certificate_type: request.certificate_type.clone(),
            managed: Some(ManagedSslCertificate {
                domain_status: domains
                    .iter()
                    .map(|d| (d.clone(), STATUS_PROVISIONING.to_string()))
                    .collect(),
                domains,
                status: Some(STATUS_PROVISIONING.to_string()),
            }),
            id: Some(id.to_string()),
            description: request.description.clone(),
            creation_timestamp: Some(chrono::Utc::now().to_rfc3339()),
            self_link: Some(format!(
                "https://compute.googleapis.com/compute/v1/projects/{}/global/sslCertificates/{}",
                project, request.name
            )),
            subject_alternative_names: Vec::new(),
            expire_time: None,
        }
    }
}

/// Names of certificates whose insert is submitted but not done yet
fn pending_inserts<'a>(
    operations: &'a BTreeMap<String, SimulatedOperation>,
    project: &str,
) -> Vec<&'a str> {
    operations
        .values()
        .filter(|state| state.project == project)
        .filter_map(|state| match &state.effect {
            Some(Effect::Insert(cert)) => Some(cert.name.as_str()),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl ComputeApi for InMemoryCompute {
    async fn insert_ssl_certificate(
        &self,
        project: &str,
        certificate: &SslCertificate,
    ) -> Result<Operation> {
        let key = (project.to_string(), certificate.name.clone());

        // Lock order: operations, then certificates
        let mut operations = self.operations.write().await;
        let injected = self.injected_errors.write().await.take();

        let errors = {
            let certificates = self.certificates.read().await;
            let pending = pending_inserts(&operations, project);
            let count = certificates.keys().filter(|(p, _)| p == project).count() + pending.len();

            if let Some(errors) = injected {
                errors
            } else if certificates.contains_key(&key)
                || pending.contains(&certificate.name.as_str())
            {
                vec![OperationErrorEntry::new(
                    CODE_ALREADY_EXISTS,
                    format!("The resource '{}' already exists", certificate.name),
                )]
            } else if self.config.certificate_quota.is_some_and(|quota| count >= quota) {
                vec![OperationErrorEntry::new(
                    CODE_QUOTA_EXCEEDED,
                    "Quota 'SSL_CERTIFICATES' exceeded.",
                )]
            } else {
                Vec::new()
            }
        };

        let effect = Effect::Insert(self.provisioned(project, certificate));
        Ok(self
            .submit(
                &mut operations,
                project,
                "insert",
                &certificate.name,
                errors,
                Some(effect),
            )
            .await)
    }

    async fn delete_ssl_certificate(&self, project: &str, name: &str) -> Result<Operation> {
        let key = (project.to_string(), name.to_string());
        let mut operations = self.operations.write().await;
        if !self.certificates.read().await.contains_key(&key) {
            return Err(Error::not_found("SslCertificate", name));
        }

        let errors = self.injected_errors.write().await.take().unwrap_or_default();
        let effect = Effect::Delete(name.to_string());
        Ok(self
            .submit(&mut operations, project, "delete", name, errors, Some(effect))
            .await)
    }

    async fn get_ssl_certificate(&self, project: &str, name: &str) -> Result<SslCertificate> {
        self.certificates
            .read()
            .await
            .get(&(project.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found("SslCertificate", name))
    }

    async fn list_ssl_certificates(&self, project: &str) -> Result<Vec<SslCertificate>> {
        Ok(self
            .certificates
            .read()
            .await
            .iter()
            .filter(|((p, _), _)| p == project)
            .map(|(_, cert)| cert.clone())
            .collect())
    }

    async fn get_global_operation(&self, project: &str, name: &str) -> Result<Operation> {
        self.operation_fetches.fetch_add(1, Ordering::SeqCst);

        let mut operations = self.operations.write().await;
        let state = operations
            .get_mut(name)
            .filter(|s| s.project == project)
            .ok_or_else(|| Error::not_found("Operation", name))?;

        if !state.operation.status.is_terminal() {
            if state.polls_remaining == 0 {
                self.finish(state).await;
            } else {
                state.polls_remaining -= 1;
                state.operation.status = OperationStatus::Running;
                state.operation.progress = Some(50);
            }
        }

        let mut visible = state.operation.clone();
        if !visible.status.is_terminal() {
            visible.error = None;
            visible.http_error_message = None;
            visible.http_error_status_code = None;
        }
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "test-project";

    fn cert(name: &str) -> SslCertificate {
        SslCertificate::managed(name, vec![format!("{}.example.com", name)])
    }

    #[tokio::test]
    async fn test_operation_state_machine() {
        let compute = InMemoryCompute::new(InMemoryComputeConfig {
            polls_until_done: 2,
            certificate_quota: None,
        });

        let op = compute
            .insert_ssl_certificate(PROJECT, &cert("cert-a"))
            .await
            .unwrap();
        assert_eq!(op.status, OperationStatus::Pending);

        let statuses = [
            OperationStatus::Running,
            OperationStatus::Running,
            OperationStatus::Done,
        ];
        for expected in statuses {
            // Not visible before the operation is done
            if expected != OperationStatus::Done {
                assert_eq!(compute.certificate_count(PROJECT).await, 0);
            }
            let polled = compute.get_global_operation(PROJECT, &op.name).await.unwrap();
            assert_eq!(polled.status, expected);
        }

        assert_eq!(compute.certificate_count(PROJECT).await, 1);
        assert_eq!(compute.operation_fetches(), 3);

        let stored = compute.get_ssl_certificate(PROJECT, "cert-a").await.unwrap();
        assert_eq!(stored.managed_status(), Some("PROVISIONING"));
        assert!(stored.self_link.unwrap().ends_with("/sslCertificates/cert-a"));
    }

    #[tokio::test]
    async fn test_quota_reported_on_done() {
        let compute = InMemoryCompute::new(InMemoryComputeConfig {
            polls_until_done: 1,
            certificate_quota: Some(0),
        });

        let op = compute
            .insert_ssl_certificate(PROJECT, &cert("cert-a"))
            .await
            .unwrap();
        assert!(op.errors().is_empty());

        let running = compute.get_global_operation(PROJECT, &op.name).await.unwrap();
        assert!(running.errors().is_empty());

        let done = compute.get_global_operation(PROJECT, &op.name).await.unwrap();
        assert_eq!(done.errors()[0].code, CODE_QUOTA_EXCEEDED);
        assert_eq!(done.http_error_status_code, Some(403));
        assert_eq!(compute.certificate_count(PROJECT).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let compute = InMemoryCompute::new(InMemoryComputeConfig {
            polls_until_done: 0,
            certificate_quota: None,
        });

        let first = compute
            .insert_ssl_certificate(PROJECT, &cert("cert-a"))
            .await
            .unwrap();
        assert!(first.status.is_terminal());
        assert!(first.errors().is_empty());

        let second = compute
            .insert_ssl_certificate(PROJECT, &cert("cert-a"))
            .await
            .unwrap();
        assert_eq!(second.errors()[0].code, CODE_ALREADY_EXISTS);
    }

    #[tokio::test]
    async fn test_pending_inserts_count_against_quota() {
        let compute = InMemoryCompute::new(InMemoryComputeConfig {
            polls_until_done: 2,
            certificate_quota: Some(1),
        });

        let first = compute
            .insert_ssl_certificate(PROJECT, &cert("cert-a"))
            .await
            .unwrap();
        let second = compute
            .insert_ssl_certificate(PROJECT, &cert("cert-b"))
            .await
            .unwrap();

        for _ in 0..3 {
            compute.get_global_operation(PROJECT, &first.name).await.unwrap();
        }
        for _ in 0..2 {
            compute.get_global_operation(PROJECT, &second.name).await.unwrap();
        }
        let done = compute.get_global_operation(PROJECT, &second.name).await.unwrap();

        assert!(done.status.is_terminal());
        assert_eq!(done.errors()[0].code, CODE_QUOTA_EXCEEDED);
        assert_eq!(compute.certificate_count(PROJECT).await, 1);
    }

    #[tokio::test]
    async fn test_pending_insert_blocks_same_name() {
        let compute = InMemoryCompute::new(InMemoryComputeConfig {
            polls_until_done: 2,
            certificate_quota: None,
        });

        compute
            .insert_ssl_certificate(PROJECT, &cert("cert-a"))
            .await
            .unwrap();
        let duplicate = compute
            .insert_ssl_certificate(PROJECT, &cert("cert-a"))
            .await
            .unwrap();

        for _ in 0..2 {
            compute.get_global_operation(PROJECT, &duplicate.name).await.unwrap();
        }
        let done = compute.get_global_operation(PROJECT, &duplicate.name).await.unwrap();
        assert_eq!(done.errors()[0].code, CODE_ALREADY_EXISTS);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let compute = InMemoryCompute::default();

        let err = compute
            .delete_ssl_certificate(PROJECT, "missing-cert")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = compute
            .get_global_operation(PROJECT, "operation-unknown")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let compute = InMemoryCompute::new(InMemoryComputeConfig {
            polls_until_done: 0,
            certificate_quota: None,
        });

        compute
            .insert_ssl_certificate("project-a", &cert("shared"))
            .await
            .unwrap();

        assert!(compute.get_ssl_certificate("project-b", "shared").await.is_err());
        assert_eq!(compute.list_ssl_certificates("project-a").await.unwrap().len(), 1);
        assert!(compute.list_ssl_certificates("project-b").await.unwrap().is_empty());
    }
}
