use clap::Parser;

#[tokio::main]
async fn main() {
    let args = auctionhouse::arguments::Arguments::parse();
    observe::tracing::initialize(&args.log_filter, args.log_stderr_threshold);
    tracing::info!("running auctionhouse with validated arguments:\n{}", args);
    if let Err(err) = auctionhouse::run(args).await {
        tracing::error!(?err, "auctionhouse exited");
        std::process::exit(1);
    }
}
