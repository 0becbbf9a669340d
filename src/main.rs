//! Ledgerline - line-delimited JSON-RPC client for indexing/ledger servers.

use anyhow::Result;
use ledgerline::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.run().await
}
