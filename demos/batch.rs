//! Fetch every link listed in a batch file, one per line.
//!
//! ```text
//! cargo run --example batch --features tracing-subscriber -- links.txt
//! ```

use std::sync::Arc;

use bookmate_rs::{
    BmClient, BmError, CancellationToken, FetchConfig, Library, TokenFile, parse_batch,
};
use tracing_subscriber::EnvFilter;

async fn run(cancel: CancellationToken) -> Result<(), BmError> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| BmError::Config("usage: batch <file>".into()))?;
    let text = tokio::fs::read_to_string(&path).await?;
    let batch = parse_batch(&text);
    if !batch.unrecognized.is_empty() {
        eprintln!("{} unrecognized line(s) skipped", batch.unrecognized.len());
    }

    let config = match std::env::var_os("BOOKMATE_CONFIG") {
        Some(p) => FetchConfig::from_path(p)?,
        None => FetchConfig::default(),
    };
    let client = BmClient::builder()
        .token_provider(Arc::new(TokenFile::new("token.txt")))
        .config(&config)?
        .build()?;
    let library = Library::builder(client)
        .config(config)
        .cancel_token(cancel)
        .build();

    let report = library.run_batch(&batch.entries).await?;
    println!(
        "downloaded {}, already done {}, failed {}",
        report.downloaded,
        report.already_done,
        report.failed.len()
    );
    for (entry, err) in &report.failed {
        println!("  {} {}: {err}", entry.kind, entry.id);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    if let Err(e) = run(cancel).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
