//! Database metrics collection.

use metrics::{counter, histogram};
use std::time::Instant;

/// Record how long a named query took.
pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Count a store call that failed at the database.
pub fn record_query_error(operation: &'static str) {
    counter!("database_query_errors_total", "operation" => operation).increment(1);
}

/// Times a database operation. Call [`record`] once it finishes.
///
/// ```ignore
/// let timer = QueryTimer::new("booking_summary");
/// let rows = sqlx::query_as::<_, Row>(...).fetch_all(&pool).await?;
/// timer.record();
/// ```
///
/// [`record`]: QueryTimer::record
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration to metrics.
    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}
