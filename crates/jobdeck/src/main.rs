//! jobdeck CLI entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = jobdeck::cli::parse_cli();
    jobdeck::cli::run_with_cli(cli).await
}
