//! Offline index builder.
//!
//! Downloads "The Innocents Abroad" from Project Gutenberg, strips the
//! boilerplate, splits it into chapters and overlapping chunks, embeds
//! every chunk, and writes the index artifact the server loads at startup.
//!
//! Usage: `build-index [output-path]` (defaults to `data/book_index.json`).
//! Set `BOOK_URL` to override the download source, e.g. a local mirror.

use std::path::PathBuf;

use travel_advisor::index::build::{
    build_index_file, extract_chapters, save_index_file, strip_gutenberg_boilerplate,
    INNOCENTS_ABROAD_URL,
};
use travel_advisor::index::HashedBowEmbedding;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travel_advisor=info,build_index=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/book_index.json"));
    let url = std::env::var("BOOK_URL").unwrap_or_else(|_| INNOCENTS_ABROAD_URL.to_string());

    info!(url = %url, "Downloading 'The Innocents Abroad'");
    let raw = reqwest::get(&url).await?.error_for_status()?.text().await?;

    let clean = strip_gutenberg_boilerplate(&raw);
    anyhow::ensure!(!clean.is_empty(), "downloaded text is empty after cleanup");
    info!(chars = clean.len(), "Cleaned book text");

    let chapters = extract_chapters(&clean);
    anyhow::ensure!(!chapters.is_empty(), "no chapters found in book text");
    info!(chapters = chapters.len(), "Extracted chapters");

    let embedder = HashedBowEmbedding::default();
    let file = build_index_file(&chapters, &embedder).await?;

    save_index_file(&file, &output)?;
    info!(
        passages = file.passages.len(),
        output = %output.display(),
        "Index written"
    );

    Ok(())
}
