use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// Kind of store operation, for the per-request canonical log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub kind: QueryKind,
    pub label: &'static str,
    pub rows: u64,
}

/// Per-request accumulator of store operations. One instance is created per
/// inbound request and handed to store calls explicitly; it is never shared
/// between requests.
#[derive(Debug, Default)]
pub struct QueryStats {
    queries: Mutex<Vec<QueryRecord>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuerySummary {
    pub total: usize,
    pub selects: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Rows returned or affected across all recorded operations.
    pub rows: u64,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: QueryKind, label: &'static str, rows: u64) {
        let mut queries = self.queries.lock().expect("stats lock poisoned");
        queries.push(QueryRecord { kind, label, rows });
    }

    pub fn records(&self) -> Vec<QueryRecord> {
        self.queries.lock().expect("stats lock poisoned").clone()
    }

    pub fn summary(&self) -> QuerySummary {
        let queries = self.queries.lock().expect("stats lock poisoned");
        let mut summary = QuerySummary {
            total: queries.len(),
            ..QuerySummary::default()
        };
        for q in queries.iter() {
            summary.rows += q.rows;
            match q.kind {
                QueryKind::Select => summary.selects += 1,
                QueryKind::Insert => summary.inserts += 1,
                QueryKind::Update => summary.updates += 1,
                QueryKind::Delete => summary.deletes += 1,
            }
        }
        summary
    }
}

/// Middleware that attaches a fresh [`QueryStats`] to the request and emits
/// one canonical log line once the response is ready.
pub async fn track_queries(mut req: Request, next: Next) -> Response {
    let stats = Arc::new(QueryStats::new());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    req.extensions_mut().insert(stats.clone());

    let start = Instant::now();
    let res = next.run(req).await;

    for q in stats.records() {
        tracing::debug!(kind = ?q.kind, label = q.label, rows = q.rows, "store query");
    }
    let s = stats.summary();
    tracing::info!(
        %method,
        path,
        status = %res.status(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        db_queries = s.total,
        db_selects = s.selects,
        db_inserts = s.inserts,
        db_updates = s.updates,
        db_deletes = s.deletes,
        db_rows = s.rows,
        "request served"
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_summarize_to_zero() {
        let stats = QueryStats::new();
        assert_eq!(stats.summary(), QuerySummary::default());
    }

    #[test]
    fn summary_counts_by_kind_and_rows() {
        let stats = QueryStats::new();
        stats.record(QueryKind::Select, "users.list", 3);
        stats.record(QueryKind::Select, "users.find_by_email", 1);
        stats.record(QueryKind::Insert, "users.upsert", 1);
        stats.record(QueryKind::Delete, "addresses.delete", 1);

        let s = stats.summary();
        assert_eq!(s.total, 4);
        assert_eq!(s.selects, 2);
        assert_eq!(s.inserts, 1);
        assert_eq!(s.updates, 0);
        assert_eq!(s.deletes, 1);
        assert_eq!(s.rows, 6);
    }

    #[test]
    fn records_keep_labels_in_order() {
        let stats = QueryStats::new();
        stats.record(QueryKind::Insert, "users.upsert", 1);
        stats.record(QueryKind::Select, "users.list", 2);

        let records = stats.records();
        let labels: Vec<&str> = records.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["users.upsert", "users.list"]);
    }
}
