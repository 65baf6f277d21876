//! Registration of durable one-off auction jobs.
//!
//! The engine only knows the abstract interface: fire this payload at this
//! time, keyed so duplicate registrations collapse. The postgres
//! implementation writes `auction_jobs` rows that [`crate::jobs::JobRunner`]
//! later claims.

use {
    anyhow::{Context, Result},
    chrono::{DateTime, Utc},
    database::auction_jobs::{self, Job, JobKind, JobStatus},
    model::auction::AuctionId,
    sqlx::PgPool,
};

/// What a fired job should do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JobPayload {
    pub kind: JobKind,
    pub auction_id: AuctionId,
}

pub fn open_job_key(auction_id: AuctionId) -> String {
    format!("open_auction_{auction_id}")
}

pub fn close_job_key(auction_id: AuctionId) -> String {
    format!("close_auction_{auction_id}")
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Scheduler: Send + Sync {
    /// Registers a one-off job firing at `at`. Scheduling the same
    /// `idempotency_key` again is a no-op.
    async fn schedule(
        &self,
        at: DateTime<Utc>,
        idempotency_key: &str,
        payload: JobPayload,
    ) -> Result<()>;
}

pub struct PostgresScheduler {
    pool: PgPool,
}

impl PostgresScheduler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Scheduler for PostgresScheduler {
    async fn schedule(
        &self,
        at: DateTime<Utc>,
        idempotency_key: &str,
        payload: JobPayload,
    ) -> Result<()> {
        let mut ex = self.pool.acquire().await.context("acquire connection")?;
        let job = Job {
            name: idempotency_key.to_string(),
            kind: payload.kind,
            auction_id: payload.auction_id,
            fire_at: at,
            attempts: 0,
            status: JobStatus::Pending,
            last_error: None,
        };
        let inserted = auction_jobs::insert(&mut ex, &job)
            .await
            .context("insert job")?;
        if inserted {
            tracing::info!(
                job = idempotency_key,
                auction_id = payload.auction_id,
                fire_at = %at,
                "registered one-off job"
            );
        } else {
            tracing::debug!(job = idempotency_key, "job already registered");
        }
        Ok(())
    }
}
