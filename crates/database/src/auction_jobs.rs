use {
    crate::{AuctionId, PgTransaction},
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "JobKind", rename_all = "snake_case")]
pub enum JobKind {
    OpenAuction,
    CloseAuction,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "JobStatus", rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

/// One row in the `auction_jobs` table: a durable one-off job. The name is
/// the idempotency key, so registering the same job twice is a no-op.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Job {
    pub name: String,
    pub kind: JobKind,
    pub auction_id: AuctionId,
    pub fire_at: DateTime<Utc>,
    pub attempts: i32,
    pub status: JobStatus,
    pub last_error: Option<String>,
}

/// Registers a one-off job. Returns whether a new row was inserted; `false`
/// means a job with this name already exists.
pub async fn insert(ex: &mut PgConnection, job: &Job) -> sqlx::Result<bool> {
    const QUERY: &str = r#"
INSERT INTO auction_jobs (name, kind, auction_id, fire_at, attempts, status, last_error)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (name) DO NOTHING
"#;
    let result = sqlx::query(QUERY)
        .bind(&job.name)
        .bind(job.kind)
        .bind(job.auction_id)
        .bind(job.fire_at)
        .bind(job.attempts)
        .bind(job.status)
        .bind(&job.last_error)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Claims due PENDING jobs for execution. `SKIP LOCKED` lets concurrent
/// runner instances claim disjoint sets, so no job fires twice at once.
/// The row locks live until the surrounding transaction ends.
pub async fn claim_due(
    ex: &mut PgTransaction<'_>,
    now: DateTime<Utc>,
    limit: i64,
) -> sqlx::Result<Vec<Job>> {
    const QUERY: &str = r#"
SELECT name, kind, auction_id, fire_at, attempts, status, last_error
FROM auction_jobs
WHERE status = 'pending' AND fire_at <= $1
ORDER BY fire_at
LIMIT $2
FOR UPDATE SKIP LOCKED
"#;
    sqlx::query_as(QUERY).bind(now).bind(limit).fetch_all(&mut **ex).await
}

pub async fn mark_done(ex: &mut PgConnection, name: &str) -> sqlx::Result<()> {
    const QUERY: &str = "UPDATE auction_jobs SET status = 'done', last_error = NULL WHERE name = $1;";
    sqlx::query(QUERY).bind(name).execute(ex).await?;
    Ok(())
}

/// Pushes a transiently failed job back into the future and records why.
pub async fn reschedule(
    ex: &mut PgConnection,
    name: &str,
    fire_at: DateTime<Utc>,
    error: &str,
) -> sqlx::Result<()> {
    const QUERY: &str = r#"
UPDATE auction_jobs
SET fire_at = $2, attempts = attempts + 1, last_error = $3
WHERE name = $1
"#;
    sqlx::query(QUERY)
        .bind(name)
        .bind(fire_at)
        .bind(error)
        .execute(ex)
        .await?;
    Ok(())
}

/// Marks a job permanently failed after its retry budget is exhausted.
pub async fn mark_failed(ex: &mut PgConnection, name: &str, error: &str) -> sqlx::Result<()> {
    const QUERY: &str = r#"
UPDATE auction_jobs
SET status = 'failed', attempts = attempts + 1, last_error = $2
WHERE name = $1
"#;
    sqlx::query(QUERY).bind(name).bind(error).execute(ex).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{auctions, clear_DANGER, roles},
        sqlx::Connection,
    };

    async fn any_auction(ex: &mut PgConnection) -> AuctionId {
        let seller_role = roles::testing::insert_seller(ex, "seller").await;
        let now = Utc::now();
        auctions::insert(
            ex,
            &auctions::AuctionData {
                title: "lot".to_string(),
                start_date: now,
                end_date: now + chrono::TimeDelta::days(1),
                min_price_cents: 100,
                buy_now_price_cents: None,
                seller_role_id: seller_role,
                category: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_job_lifecycle() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        clear_DANGER(&mut db).await.unwrap();

        let auction_id = any_auction(&mut db).await;
        let now = Utc::now();
        let job = Job {
            name: format!("close_auction_{auction_id}"),
            kind: JobKind::CloseAuction,
            auction_id,
            fire_at: now - chrono::TimeDelta::seconds(1),
            attempts: 0,
            status: JobStatus::Pending,
            last_error: None,
        };
        assert!(insert(&mut db, &job).await.unwrap());
        // The idempotency key makes duplicate registration a no-op.
        assert!(!insert(&mut db, &job).await.unwrap());

        let due = claim_due(&mut db, now, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, job.name);

        reschedule(&mut db, &job.name, now + chrono::TimeDelta::seconds(10), "db timeout")
            .await
            .unwrap();
        // Not due anymore after the backoff push.
        assert!(claim_due(&mut db, now, 10).await.unwrap().is_empty());

        mark_failed(&mut db, &job.name, "gave up").await.unwrap();
        let failed: Job = sqlx::query_as(
            "SELECT name, kind, auction_id, fire_at, attempts, status, last_error \
             FROM auction_jobs WHERE name = $1;",
        )
        .bind(&job.name)
        .fetch_one(&mut *db)
        .await
        .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.last_error.as_deref(), Some("gave up"));
    }
}
