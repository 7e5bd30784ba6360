//! Finds sessions that have gone idle and feeds them to the session queue.
//!
//! A session counts as closed once its last event is older than the idle
//! gap. Each poll covers `[watermark, now - idle)` and then advances the
//! watermark, so every closed session is enqueued once. Sessions that
//! closed before the poller started are left to the full sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use transition_core::{Error, EventStore, Result};

use crate::session_queue::SessionQueue;

pub struct SessionPoller {
    events: Arc<dyn EventStore>,
    queue: SessionQueue,
    idle: Duration,
    watermark: DateTime<Utc>,
}

impl SessionPoller {
    pub fn new(
        events: Arc<dyn EventStore>,
        queue: SessionQueue,
        idle: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            events,
            queue,
            idle,
            watermark: started_at - idle,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Enqueues sessions that closed since the last poll.
    ///
    /// The watermark only advances after every id was handed to the queue,
    /// so a failed poll is retried in full on the next tick.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let until = now - self.idle;
        if until <= self.watermark {
            return Ok(0);
        }

        let session_ids = self.events.sessions_ended_between(self.watermark, until).await?;
        let found = session_ids.len();
        for session_id in session_ids {
            self.queue
                .enqueue(session_id)
                .await
                .map_err(|e| Error::internal(e.to_string()))?;
        }

        if found > 0 {
            debug!(sessions = found, until = %until, "Enqueued closed sessions");
        }
        self.watermark = until;
        Ok(found)
    }
}
