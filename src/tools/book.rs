//! Literary-knowledge tools backed by the passage index.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::index::{IndexError, PassageIndex, RetrievedPassage};

use super::{required_str_arg, Tool, ToolError};

/// Search "The Innocents Abroad" for passages relevant to a query.
pub struct QueryBook {
    index: Arc<PassageIndex>,
    top_k: usize,
}

impl QueryBook {
    pub fn new(index: Arc<PassageIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }
}

#[async_trait]
impl Tool for QueryBook {
    fn name(&self) -> &str {
        "query_twain_book"
    }

    fn description(&self) -> &str {
        "Search Mark Twain's 'The Innocents Abroad' for what Twain said, thought, or experienced \
         about a place or topic. Use for questions about Twain's travels, observations, opinions, \
         humor, or descriptions of locations he visited. Returns relevant passages with chapter \
         references."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural language query about the book, e.g. \"What did Twain think about the Sphinx?\""
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str_arg(&args, "query")?;

        tracing::info!(query = %query, "Searching the memoir");
        let passages = self
            .index
            .search(query, self.top_k)
            .await
            .map_err(map_index_error)?;

        if passages.is_empty() {
            return Ok(format!(
                "Nothing in 'The Innocents Abroad' matched '{}'. \
                 This may be outside the scope of Twain's travel memoir.",
                query
            ));
        }

        Ok(format_passages(
            "Here's what Mark Twain wrote about that in 'The Innocents Abroad':",
            &passages,
        ))
    }
}

/// Find passages about the places Twain visited in a given region.
pub struct ExtractLocations {
    index: Arc<PassageIndex>,
    top_k: usize,
}

impl ExtractLocations {
    pub fn new(index: Arc<PassageIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }
}

#[async_trait]
impl Tool for ExtractLocations {
    fn name(&self) -> &str {
        "extract_locations_from_twain"
    }

    fn description(&self) -> &str {
        "Find the specific cities and places Mark Twain visited in a given country or region, \
         according to 'The Innocents Abroad'. Use when the user wants to know where Twain went \
         within a region, e.g. to then look up weather for those places."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "region": {
                    "type": "string",
                    "description": "Country or region name, e.g. \"Italy\" or \"France\""
                }
            },
            "required": ["region"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let region = required_str_arg(&args, "region")?;

        let query = format!("places cities locations Twain visited in {}", region);
        tracing::info!(region = %region, "Extracting visited locations");
        let passages = self
            .index
            .search(&query, self.top_k)
            .await
            .map_err(map_index_error)?;

        if passages.is_empty() {
            return Ok(format!(
                "No passages about places Twain visited in {} were found.",
                region
            ));
        }

        Ok(format_passages(
            &format!(
                "References to Twain's travels in {} from 'The Innocents Abroad':",
                region
            ),
            &passages,
        ))
    }
}

fn map_index_error(e: IndexError) -> ToolError {
    match e {
        IndexError::EmptyQuery => ToolError::InvalidArguments("empty query".to_string()),
        other => ToolError::Service(other.to_string()),
    }
}

/// Render passages with bracketed chapter source markers, the convention
/// the response formatter and UI understand.
fn format_passages(intro: &str, passages: &[RetrievedPassage]) -> String {
    let mut parts = vec![intro.to_string()];
    for passage in passages {
        parts.push(format!(
            "**[{}]**\n{}",
            passage.chapter_label,
            passage.text.trim()
        ));
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{HashedBowEmbedding, PassageIndex, PassageRecord};
    use crate::index::EmbeddingProvider;

    async fn fixture_index() -> Arc<PassageIndex> {
        let embedder = Arc::new(HashedBowEmbedding::default());
        let texts = [
            ("XXXI", "The Buried City of Pompeii", "Pompeii is no longer a buried city, the ashes are swept away"),
            ("LVIII", "The Sphinx", "The Sphinx is grand in its loneliness, sad and solemn in its bearing"),
            ("XVII", "Venice", "Venice the queen of the sea, her gondolas gliding in the moonlight"),
        ];

        let mut records = Vec::new();
        for (i, (number, title, text)) in texts.iter().enumerate() {
            records.push(PassageRecord {
                id: i,
                text: text.to_string(),
                chapter_number: number.to_string(),
                chapter_title: title.to_string(),
                embedding: embedder.embed(text).await.unwrap(),
            });
        }
        Arc::new(PassageIndex::from_records(records, embedder))
    }

    #[tokio::test]
    async fn query_returns_passages_with_chapter_markers() {
        let tool = QueryBook::new(fixture_index().await, 3);
        let output = tool
            .execute(serde_json::json!({"query": "what did Twain think of the Sphinx"}))
            .await
            .unwrap();

        assert!(output.contains("The Innocents Abroad"));
        assert!(output.contains("**[Chapter LVIII - The Sphinx]**"));
        assert!(output.contains("grand in its loneliness"));
    }

    #[tokio::test]
    async fn empty_index_yields_in_band_note_not_error() {
        let embedder = Arc::new(HashedBowEmbedding::default());
        let index = Arc::new(PassageIndex::from_records(vec![], embedder));
        let tool = QueryBook::new(index, 3);

        let output = tool
            .execute(serde_json::json!({"query": "quantum physics"}))
            .await
            .unwrap();
        assert!(output.contains("Nothing in 'The Innocents Abroad'"));
    }

    #[tokio::test]
    async fn missing_query_argument_is_invalid() {
        let tool = QueryBook::new(fixture_index().await, 3);
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn extract_locations_mentions_region() {
        let tool = ExtractLocations::new(fixture_index().await, 3);
        let output = tool
            .execute(serde_json::json!({"region": "Italy"}))
            .await
            .unwrap();
        assert!(output.contains("Twain's travels in Italy"));
    }
}
