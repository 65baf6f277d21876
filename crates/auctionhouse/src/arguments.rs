use {
    std::{fmt, net::SocketAddr, time::Duration},
    tracing::level_filters::LevelFilter,
    url::Url,
};

#[derive(clap::Parser)]
pub struct Arguments {
    /// Address the HTTP and WebSocket API binds to.
    #[clap(long, env, default_value = "0.0.0.0:8080")]
    pub bind_address: SocketAddr,

    /// Url of the Postgres database.
    #[clap(long, env, default_value = "postgresql://")]
    pub db_url: Url,

    /// How often the job runner polls for due jobs.
    #[clap(long, env, default_value = "5s", value_parser = humantime::parse_duration)]
    pub job_poll_interval: Duration,

    /// Base delay of the exponential backoff used to retry failed jobs.
    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub job_retry_backoff: Duration,

    /// How many times a failing job is retried before it is marked failed
    /// and an operator alert goes out.
    #[clap(long, env, default_value = "5")]
    pub job_max_retries: u32,

    /// Webhook operator alerts are posted to. Alerts are only logged when
    /// unset.
    #[clap(long, env)]
    pub alert_webhook: Option<Url>,

    #[clap(
        long,
        env,
        default_value = "warn,auctionhouse=debug,database=debug,broadcast=debug"
    )]
    pub log_filter: String,

    /// Minimum level at which logs are also written to stderr.
    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            bind_address,
            db_url: _,
            job_poll_interval,
            job_retry_backoff,
            job_max_retries,
            alert_webhook,
            log_filter,
            log_stderr_threshold,
        } = self;
        writeln!(f, "bind_address: {bind_address}")?;
        writeln!(f, "db_url: SECRET")?;
        writeln!(f, "job_poll_interval: {job_poll_interval:?}")?;
        writeln!(f, "job_retry_backoff: {job_retry_backoff:?}")?;
        writeln!(f, "job_max_retries: {job_max_retries}")?;
        writeln!(f, "alert_webhook: {alert_webhook:?}")?;
        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "log_stderr_threshold: {log_stderr_threshold}")?;
        Ok(())
    }
}
