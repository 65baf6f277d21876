//! Executes the durable one-off jobs that [`crate::scheduler`] registers.
//!
//! The runner polls for due PENDING jobs, claims them with `SKIP LOCKED` and
//! drives the engine. A failed job is retried with exponential backoff until
//! its retry budget runs out, at which point it is marked failed and an
//! operator alert goes out. All engine operations the jobs invoke are
//! idempotent, so a job that fails after its effect committed is harmless to
//! retry.

use {
    crate::{alert::Alerter, auctionhouse::Auctionhouse},
    anyhow::{Context, Result},
    chrono::{DateTime, TimeDelta, Utc},
    database::auction_jobs::{self, Job, JobKind},
    sqlx::{PgConnection, PgPool},
    std::{sync::Arc, time::Duration},
};

/// Upper bound on jobs claimed per poll.
const CLAIM_BATCH: i64 = 50;

/// The backoff stops doubling after this many attempts.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

pub struct JobRunner {
    db: PgPool,
    auctionhouse: Arc<Auctionhouse>,
    alerter: Alerter,
    poll_interval: Duration,
    retry_backoff: Duration,
    max_retries: u32,
}

impl JobRunner {
    pub fn new(
        db: PgPool,
        auctionhouse: Arc<Auctionhouse>,
        alerter: Alerter,
        poll_interval: Duration,
        retry_backoff: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            db,
            auctionhouse,
            alerter,
            poll_interval,
            retry_backoff,
            max_retries,
        }
    }

    pub async fn run_forever(self) -> ! {
        loop {
            if let Err(err) = self.run_once().await {
                tracing::error!(?err, "job runner iteration failed");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One poll: claims due jobs and executes them. The claim locks live
    /// until the final commit, so a concurrent runner instance works on a
    /// disjoint set of jobs.
    pub async fn run_once(&self) -> Result<()> {
        let mut tx = self.db.begin().await.context("begin")?;
        let now = Utc::now();
        let due = auction_jobs::claim_due(&mut tx, now, CLAIM_BATCH)
            .await
            .context("claim_due")?;
        for job in due {
            match self.execute(&job).await {
                Ok(()) => {
                    auction_jobs::mark_done(&mut tx, &job.name).await?;
                    tracing::info!(name = %job.name, "job done");
                }
                Err(err) => self.handle_failure(&mut tx, &job, now, err).await?,
            }
        }
        tx.commit().await.context("commit")?;
        Ok(())
    }

    async fn execute(&self, job: &Job) -> Result<()> {
        tracing::debug!(name = %job.name, attempts = job.attempts, "executing job");
        match job.kind {
            JobKind::CloseAuction => self.auctionhouse.close_auction(job.auction_id).await,
            JobKind::OpenAuction => self.auctionhouse.open_auction(job.auction_id).await,
        }
    }

    async fn handle_failure(
        &self,
        ex: &mut PgConnection,
        job: &Job,
        now: DateTime<Utc>,
        err: anyhow::Error,
    ) -> Result<()> {
        let attempts = u32::try_from(job.attempts).unwrap_or(u32::MAX);
        let error = format!("{err:#}");
        if attempts >= self.max_retries {
            tracing::error!(name = %job.name, attempts, %error, "job failed permanently");
            auction_jobs::mark_failed(ex, &job.name, &error).await?;
            self.alerter.alert(
                &format!("auction job {} failed permanently", job.name),
                &error,
            );
        } else {
            let delay = backoff_delay(self.retry_backoff, attempts);
            // `from_std` only fails on overflow.
            let fire_at = now + TimeDelta::from_std(delay).unwrap_or(TimeDelta::days(1));
            tracing::warn!(name = %job.name, attempts, ?delay, %error, "job failed, retrying");
            auction_jobs::reschedule(ex, &job.name, fire_at, &error).await?;
        }
        Ok(())
    }
}

/// Exponential backoff: the base delay doubles with every attempt, capped so
/// a stuck job keeps getting retried at a sane interval.
fn backoff_delay(base: Duration, attempts: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempts.min(MAX_BACKOFF_DOUBLINGS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(20));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(40));
        assert_eq!(backoff_delay(base, 5), Duration::from_secs(320));
        assert_eq!(backoff_delay(base, 6), Duration::from_secs(640));
        // Capped from here on.
        assert_eq!(backoff_delay(base, 7), Duration::from_secs(640));
        assert_eq!(backoff_delay(base, 1000), Duration::from_secs(640));
    }
}
