//! Free-text documents, chunked and addressed by character range.

use crate::chunk::split_text;
use crate::document::{DocumentData, DocumentKind};
use crate::embedding::EmbeddingGateway;
use crate::entry::Entry;
use crate::path::Key;
use crate::vector::SearchHit;
use cairn_core::error::StoreError;
use std::sync::Arc;
use tracing::debug;

/// A document made of text chunks. Searchable as a whole, not addressable
/// by path.
pub struct TextDocument {
    data: DocumentData,
    embedder: Arc<EmbeddingGateway>,
}

impl TextDocument {
    /// Chunk `text` to at most `chunk_tokens` per chunk and embed each chunk.
    pub async fn load_data(
        embedder: Arc<EmbeddingGateway>,
        title: impl Into<String>,
        text: &str,
        description: impl Into<String>,
        precision: u32,
        dimensions: usize,
        chunk_tokens: usize,
    ) -> Result<Self, StoreError> {
        let mut data = DocumentData::new(title, DocumentKind::Text, description, precision, dimensions);
        let chunks = split_text(text, chunk_tokens);
        let strings: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed(&strings, precision, dimensions).await?;

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            data.content.insert(Entry {
                path: vec![Key::Index(chunk.start), Key::Index(chunk.end)],
                value: None,
                string: chunk.text,
                embedding,
            });
        }
        debug!(title = %data.title, chunks = data.content.len(), "Text document built");
        Ok(Self { data, embedder })
    }

    pub(crate) fn from_data(data: DocumentData, embedder: Arc<EmbeddingGateway>) -> Self {
        Self { data, embedder }
    }

    pub fn data(&self) -> &DocumentData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut DocumentData {
        &mut self.data
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    /// `(start, end, text)` for every chunk, in source order.
    pub fn chunks(&self) -> impl Iterator<Item = (usize, usize, &str)> {
        self.data.content.iter().filter_map(|e| match e.path.as_slice() {
            [Key::Index(start), Key::Index(end)] => Some((*start, *end, e.string.as_str())),
            _ => None,
        })
    }

    /// Rank every chunk against `query`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let query = self
            .embedder
            .embed_one(query, self.data.embedding_precision, self.data.embedding_dimensions)
            .await?;
        Ok(self.data.rank(&query, limit, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::RetryPolicy;
    use cairn_providers::HashingProvider;

    fn gateway() -> Arc<EmbeddingGateway> {
        Arc::new(EmbeddingGateway::new(
            Arc::new(HashingProvider::new()),
            "hash",
            RetryPolicy::default(),
        ))
    }

    const BIO: &str = "Devin Townsend is a Canadian musician. He was born in New Westminster. \
                       He founded the band Strapping Young Lad.\nHe also records solo albums.";

    #[tokio::test]
    async fn chunks_are_keyed_by_range() {
        let doc = TextDocument::load_data(gateway(), "bio", BIO, "A biography", 5, 64, 10)
            .await
            .unwrap();
        let chunks: Vec<_> = doc.chunks().collect();
        assert!(chunks.len() > 1);
        let source: Vec<char> = BIO.chars().collect();
        for (start, end, text) in &chunks {
            let slice: String = source[*start..*end].iter().collect();
            assert_eq!(&slice, text);
        }
        assert!(doc.data().content.iter().all(|e| e.value.is_none()));
    }

    #[tokio::test]
    async fn search_finds_the_relevant_chunk() {
        let doc = TextDocument::load_data(gateway(), "bio", BIO, "A biography", 5, 64, 10)
            .await
            .unwrap();
        let hits = doc.search("born in New Westminster", 1, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("Westminster"));
    }

    #[tokio::test]
    async fn empty_text_has_no_chunks() {
        let doc = TextDocument::load_data(gateway(), "empty", "", "", 5, 64, 10)
            .await
            .unwrap();
        assert_eq!(doc.chunks().count(), 0);
        assert!(doc.search("anything", 5, -1.0).await.unwrap().is_empty());
    }
}
