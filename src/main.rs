use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    salud::run().await
}
