//! In-memory audit log adapter

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{Duration, Utc};
use tracing::debug;

use ecmdrive_core::domain::{AuditEvent, RepositoryId};
use ecmdrive_core::ports::{AuditQuery, IAuditLog};

/// Embedded append-only audit log.
///
/// Ids are assigned from an atomic counter, so ordering is total. When a
/// clustering delay is configured, freshly appended events stay invisible
/// to queries and to the upper bound until the delay has elapsed, modeling
/// a write-buffered multi-node audit backend: "append returned" does not
/// imply "visible to the next change query".
pub struct MemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
    next_id: AtomicU64,
    clustering_delay: Option<Duration>,
}

impl MemoryAuditLog {
    /// Creates a log with immediate visibility
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            clustering_delay: None,
        }
    }

    /// Creates a log whose events become visible only after `delay_ms`
    pub fn with_clustering_delay(delay_ms: u64) -> Self {
        Self {
            clustering_delay: Some(Duration::milliseconds(delay_ms as i64)),
            ..Self::new()
        }
    }

    fn is_visible(&self, event: &AuditEvent) -> bool {
        match self.clustering_delay {
            Some(delay) => event.event_date <= Utc::now() - delay,
            None => true,
        }
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IAuditLog for MemoryAuditLog {
    async fn append(&self, mut event: AuditEvent) -> anyhow::Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        event.id = id;
        debug!(
            id,
            event_name = %event.event_name,
            doc_id = %event.doc_id,
            "Appending audit event"
        );
        self.events
            .write()
            .expect("audit log lock poisoned")
            .push(event);
        Ok(id)
    }

    async fn events(&self, query: &AuditQuery) -> anyhow::Result<Vec<AuditEvent>> {
        let events = self.events.read().expect("audit log lock poisoned");
        let mut matching: Vec<AuditEvent> = events
            .iter()
            .filter(|e| self.is_visible(e) && query.matches(e))
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.id);
        Ok(matching)
    }

    async fn upper_bound(&self, repository_ids: Option<&[RepositoryId]>) -> anyhow::Result<u64> {
        let events = self.events.read().expect("audit log lock poisoned");
        let bound = events
            .iter()
            .filter(|e| self.is_visible(e))
            .filter(|e| match repository_ids {
                Some(repos) => repos.contains(&e.repository_id),
                None => true,
            })
            .map(|e| e.id)
            .max()
            .unwrap_or(0);
        Ok(bound)
    }
}
