use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shenron_proxy::start_server()
        .await
        .context("shenron-proxy exited with an error")
}
