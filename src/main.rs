#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clinic_gateway::run().await
}
