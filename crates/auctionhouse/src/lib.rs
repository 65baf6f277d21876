pub mod alert;
pub mod api;
pub mod arguments;
pub mod auctionhouse;
pub mod database;
pub mod jobs;
pub mod relay;
pub mod scheduler;
pub mod storage;

use {
    crate::{
        alert::Alerter,
        arguments::Arguments,
        auctionhouse::Auctionhouse,
        database::Postgres,
        jobs::JobRunner,
        relay::Relay,
        scheduler::PostgresScheduler,
    },
    anyhow::{Context, Result},
    broadcast::Broadcaster,
    std::sync::Arc,
};

pub async fn run(args: Arguments) -> Result<()> {
    let db = Postgres::new(args.db_url.as_str()).context("failed to create database")?;
    // Events published here are relayed over postgres so subscribers
    // connected to other instances see them too.
    let (broadcast, relay_feed) = Broadcaster::with_relay();
    tokio::task::spawn(Relay::new(db.0.clone(), broadcast.clone(), relay_feed).run_forever());
    let scheduler = PostgresScheduler::new(db.0.clone());
    let auctionhouse = Arc::new(Auctionhouse::new(
        Arc::new(db.clone()),
        Arc::new(scheduler),
        broadcast.clone(),
    ));

    // The runner lives in the same process as the broadcast topics, so
    // status updates from scheduled closes reach connected clients. Several
    // instances may run concurrently; job claiming keeps them disjoint.
    let runner = JobRunner::new(
        db.0.clone(),
        auctionhouse.clone(),
        Alerter::new(args.alert_webhook.clone()),
        args.job_poll_interval,
        args.job_retry_backoff,
        args.job_max_retries,
    );
    tokio::task::spawn(runner.run_forever());

    let app = api::handle_all_routes(auctionhouse, broadcast);
    let listener = tokio::net::TcpListener::bind(args.bind_address)
        .await
        .context("failed to bind api address")?;
    tracing::info!(address = %args.bind_address, "serving api");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("api server")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for shutdown signal");
    }
}
