#[tokio::main]
async fn main() -> anyhow::Result<()> {
    peerlink_lib::run().await
}
