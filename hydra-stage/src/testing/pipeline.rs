//! In-memory coordinator.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::config::ConfigurationMap;
use crate::document::Document;
use crate::errors::PipelineError;
use crate::identity::StageIdentity;
use crate::pipeline::{ConfigurationSource, DocumentQuery, RemotePipeline};

/// A coordinator that serves queued documents and records results.
#[derive(Debug, Default)]
pub struct InMemoryPipeline {
    queue: Mutex<VecDeque<Document>>,
    submitted: Mutex<Vec<Document>>,
    failed: Mutex<Vec<(Document, String)>>,
    queries: Mutex<Vec<DocumentQuery>>,
    configuration: Mutex<ConfigurationMap>,
    configuration_requests: AtomicUsize,
    results: Notify,
}

impl InMemoryPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline serving `configuration` to every stage.
    #[must_use]
    pub fn with_configuration(configuration: ConfigurationMap) -> Self {
        let pipeline = Self::new();
        *pipeline.configuration.lock() = configuration;
        pipeline
    }

    /// Queues a document for the worker.
    ///
    /// Documents without an identifier get a fresh one, as the coordinator
    /// assigns ids on insert.
    pub fn push(&self, mut document: Document) {
        if document.id.is_none() {
            document.id = Some(Uuid::new_v4().to_string());
        }
        self.queue.lock().push_back(document);
    }

    /// Documents still waiting to be fetched.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Documents submitted as processed.
    #[must_use]
    pub fn submitted(&self) -> Vec<Document> {
        self.submitted.lock().clone()
    }

    /// Documents reported as failed, with the reasons.
    #[must_use]
    pub fn failed(&self) -> Vec<(Document, String)> {
        self.failed.lock().clone()
    }

    /// Queries received by `fetch_document`.
    #[must_use]
    pub fn queries(&self) -> Vec<DocumentQuery> {
        self.queries.lock().clone()
    }

    /// Number of configuration fetches served.
    #[must_use]
    pub fn configuration_requests(&self) -> usize {
        self.configuration_requests.load(Ordering::SeqCst)
    }

    /// Submitted plus failed documents.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.submitted.lock().len() + self.failed.lock().len()
    }

    /// Waits until at least `count` results were recorded.
    pub async fn wait_for_results(&self, count: usize) {
        loop {
            let notified = self.results.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.result_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RemotePipeline for InMemoryPipeline {
    async fn fetch_document(&self, query: &DocumentQuery) -> Result<Option<Document>, PipelineError> {
        self.queries.lock().push(query.clone());
        Ok(self.queue.lock().pop_front())
    }

    async fn submit(&self, document: &Document) -> Result<(), PipelineError> {
        self.submitted.lock().push(document.clone());
        self.results.notify_waiters();
        Ok(())
    }

    async fn mark_failed(&self, document: &Document, reason: &str) -> Result<(), PipelineError> {
        self.failed.lock().push((document.clone(), reason.to_string()));
        self.results.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl ConfigurationSource for InMemoryPipeline {
    async fn fetch_configuration(
        &self,
        _identity: &StageIdentity,
    ) -> Result<ConfigurationMap, PipelineError> {
        self.configuration_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.configuration.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_and_results() {
        let pipeline = InMemoryPipeline::new();
        pipeline.push(Document::with_id("1"));
        assert_eq!(pipeline.pending(), 1);

        let doc = pipeline
            .fetch_document(&DocumentQuery::default())
            .await
            .unwrap()
            .unwrap();
        assert!(pipeline.fetch_document(&DocumentQuery::default()).await.unwrap().is_none());

        pipeline.mark_failed(&doc, "boom").await.unwrap();
        pipeline.wait_for_results(1).await;
        assert_eq!(pipeline.failed()[0].1, "boom");
        assert_eq!(pipeline.queries().len(), 2);
    }

    #[test]
    fn test_push_assigns_missing_ids() {
        let pipeline = InMemoryPipeline::new();
        pipeline.push(Document::new());
        pipeline.push(Document::new());

        let queue = pipeline.queue.lock();
        assert!(queue.iter().all(|doc| doc.id.is_some()));
        assert_ne!(queue[0].id, queue[1].id);
    }
}
