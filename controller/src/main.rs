mod api;
mod bridge;
mod daemon;
mod poller;
mod relay;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    daemon::run().await
}
