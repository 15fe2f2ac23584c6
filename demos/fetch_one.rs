//! Fetch a single resource.
//!
//! ```text
//! BOOKMATE_TOKEN=... cargo run --example fetch_one --features tracing-subscriber -- \
//!     https://books.yandex.ru/audiobooks/<id>
//! cargo run --example fetch_one --features tracing-subscriber -- series <id>
//! ```
//!
//! `BOOKMATE_CONFIG` may point at a JSON `FetchConfig`; without `BOOKMATE_TOKEN` the token
//! is read from `token.txt`.

use std::sync::Arc;

use bookmate_rs::{
    BmClient, BmError, CancellationToken, FetchConfig, Library, ResourceKind, StaticToken,
    TokenFile, TokenProvider, parse_link,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn target(args: &[String]) -> Result<(ResourceKind, String), BmError> {
    match args {
        [link] => parse_link(link)
            .ok_or_else(|| BmError::Config(format!("not a books.yandex.ru link: {link}"))),
        [kind, id] => Ok((kind.parse()?, id.clone())),
        _ => Err(BmError::Config(
            "usage: fetch_one <link> | fetch_one <kind> <id>".into(),
        )),
    }
}

async fn run(cancel: CancellationToken) -> Result<(), BmError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (kind, id) = target(&args)?;

    let config = match std::env::var_os("BOOKMATE_CONFIG") {
        Some(path) => FetchConfig::from_path(path)?,
        None => FetchConfig::default(),
    };
    let token: Arc<dyn TokenProvider> = match std::env::var("BOOKMATE_TOKEN") {
        Ok(t) => Arc::new(StaticToken(t)),
        Err(_) => Arc::new(TokenFile::new("token.txt")),
    };

    let client = BmClient::builder()
        .token_provider(token)
        .config(&config)?
        .build()?;
    let library = Library::builder(client)
        .config(config)
        .cancel_token(cancel)
        .build();

    let done = library.fetch(kind, &id).await?;
    println!("{kind} {id}: {done:?}");
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping");
            on_signal.cancel();
        }
    });

    if let Err(e) = run(cancel).await {
        if e.is_cancelled() {
            eprintln!("interrupted");
        } else {
            eprintln!("error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
