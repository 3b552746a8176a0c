use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    graftwork::cli::run().await
}
