//! The `DocumentLedger` facade and its shared transaction helpers.

use std::future::Future;
use std::sync::Arc;

use time::OffsetDateTime;

use docledger_storage::{ChangeSeverity, DomainEventRecord, LedgerStorage, ReviewRecord};

use crate::classifier;
use crate::clock::{Clock, SystemClock};
use crate::config::{LedgerConfig, LedgerSettings};
use crate::error::LedgerError;
use crate::hasher;
use crate::lock::{NeverLocked, PostingLock};
use crate::registry::FieldRegistry;

/// Entry point for every ledger operation.
///
/// Holds no per-document state: every call names its `document_id`, and all
/// durable state lives in the storage backend.
pub struct DocumentLedger<S: LedgerStorage> {
    pub(crate) storage: Arc<S>,
    pub(crate) registry: FieldRegistry,
    pub(crate) settings: LedgerSettings,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: Arc<dyn PostingLock>,
}

impl<S: LedgerStorage> DocumentLedger<S> {
    /// A ledger with the built-in invoice registry, default settings, the
    /// system clock, and no posting locks.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            registry: FieldRegistry::invoice_defaults(),
            settings: LedgerSettings::default(),
            clock: Arc::new(SystemClock),
            locks: Arc::new(NeverLocked),
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.registry = config.registry;
        self.settings = config.settings;
        self
    }

    pub fn with_registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_settings(mut self, settings: LedgerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_posting_lock(mut self, locks: Arc<dyn PostingLock>) -> Self {
        self.locks = locks;
        self
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Severity of an explicit changed-field set under this ledger's registry.
    pub fn classify_change<I, T>(&self, object_type: &str, changed_fields: I) -> ChangeSeverity
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        classifier::classify_change(&self.registry, object_type, changed_fields)
    }

    pub async fn get_review(&self, document_id: &str) -> Result<ReviewRecord, LedgerError> {
        Ok(self.storage.get_review(document_id).await?)
    }

    pub async fn get_events(
        &self,
        document_id: &str,
    ) -> Result<Vec<DomainEventRecord>, LedgerError> {
        Ok(self.storage.list_events(document_id).await?)
    }

    /// Append a domain event (dispute, payment, ...) raised outside the
    /// ledger.
    pub async fn record_event(
        &self,
        document_id: &str,
        event_type: &str,
        actor: &str,
        payload: serde_json::Value,
    ) -> Result<DomainEventRecord, LedgerError> {
        // Ensures the document exists.
        self.storage.get_review(document_id).await?;

        let mut tx = self.storage.begin_transaction().await?;
        let at = self.now();
        let result = self
            .emit_event(&mut tx, document_id, event_type, actor, payload, at)
            .await;
        let event = self.finish(tx, result).await?;
        tracing::info!(document_id, event_type, "recorded event");
        Ok(event)
    }

    pub(crate) async fn emit_event(
        &self,
        tx: &mut S::Transaction,
        document_id: &str,
        event_type: &str,
        actor: &str,
        payload: serde_json::Value,
        at: OffsetDateTime,
    ) -> Result<DomainEventRecord, LedgerError> {
        let event = DomainEventRecord {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            event_type: event_type.to_string(),
            actor: actor.to_string(),
            created_at: at,
            payload_hash: hasher::hash_payload(&payload),
            payload,
        };
        self.storage.insert_event(tx, event.clone()).await?;
        Ok(event)
    }

    /// Run `attempt` until it succeeds, fails with something other than a
    /// write race, or the retry budget is spent.
    pub(crate) async fn with_retries<T, F, Fut>(
        &self,
        document_id: &str,
        mut attempt: F,
    ) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let max = self.settings.max_write_retries.max(1);
        for n in 1..=max {
            match attempt().await {
                Err(e) if e.is_write_conflict() => {
                    tracing::warn!(document_id, attempt = n, max, error = %e, "write conflict");
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
        Err(LedgerError::WriteConflict {
            document_id: document_id.to_string(),
            attempts: max,
        })
    }

    /// Commit `tx` if `result` is Ok, otherwise abort it.
    pub(crate) async fn finish<T>(
        &self,
        tx: S::Transaction,
        result: Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        match result {
            Ok(value) => {
                self.storage.commit_transaction(tx).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = self.storage.abort_transaction(tx).await {
                    tracing::warn!(error = %abort, "abort failed");
                }
                Err(e)
            }
        }
    }
}
