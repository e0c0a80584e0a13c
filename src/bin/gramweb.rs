//! Command-line client binary
//!
//! # Usage
//!
//! ```bash
//! IG_USERNAME=me IG_PASSWORD=... gramweb login
//! gramweb followers someone --amount 100
//! gramweb like https://www.instagram.com/p/Cabc123/
//! gramweb upload clip reel.mp4 --caption "hello"
//! ```

use clap::Parser;
use gramweb::cli::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run(Cli::parse()).await
}
