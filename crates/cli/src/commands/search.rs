//! `cairn search` — Semantic search across documents.

use super::{CliResult, load_config, open_store};
use cairn_store::{DocumentStore, SearchResults};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    query: &str,
    titles: &[String],
    limit: usize,
    threshold: f32,
) -> CliResult {
    let config = load_config(config_path)?;
    let (_, mut store) = open_store(&config)?;

    let results = search(&mut store, query, titles, limit, threshold).await?;
    if results.is_empty() {
        println!("No entries found matching \"{query}\".");
        return Ok(());
    }
    print!("{}", render(&results));
    Ok(())
}

/// Load `titles` (every persisted document when empty) and search them.
pub async fn search(
    store: &mut DocumentStore,
    query: &str,
    titles: &[String],
    limit: usize,
    threshold: f32,
) -> CliResult<SearchResults> {
    let titles = if titles.is_empty() {
        store.get_titles()?
    } else {
        titles.to_vec()
    };
    for title in &titles {
        store.load_document(title)?;
    }
    Ok(store.search(query, Some(&titles), limit, threshold).await?)
}

/// One block per document with hits, highest score first.
pub fn render(results: &SearchResults) -> String {
    let mut out = String::new();
    for (title, hits) in &results.by_title {
        if hits.is_empty() {
            continue;
        }
        out.push_str(&format!("{title}\n"));
        for hit in hits {
            out.push_str(&format!("  {:.3}  {}\n", hit.score, hit.text));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_providers::HashingProvider;
    use cairn_store::{DocumentKind, DocumentSource, EmbeddingGateway, RetryPolicy, SearchHit};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn render_skips_empty_documents() {
        let results = SearchResults {
            by_title: vec![
                ("empty".into(), vec![]),
                (
                    "people".into(),
                    vec![SearchHit {
                        text: r#"people[Ana]="Rouen""#.into(),
                        score: 0.91234,
                    }],
                ),
            ],
        };
        assert_eq!(render(&results), "people\n  0.912  people[Ana]=\"Rouen\"\n");
    }

    #[tokio::test]
    async fn searches_every_persisted_document() {
        let dir = TempDir::new().unwrap();
        let gateway = Arc::new(EmbeddingGateway::new(
            Arc::new(HashingProvider::new()),
            "hash",
            RetryPolicy::default(),
        ));
        let mut store = DocumentStore::new(dir.path(), Arc::clone(&gateway))
            .unwrap()
            .with_defaults(5, 64);
        store
            .new_document(
                DocumentKind::Json,
                "people",
                DocumentSource::Value(json!({"Ana": {"city": "Rouen"}})),
                "",
                None,
                None,
            )
            .await
            .unwrap();

        // a fresh store over the same folder starts with nothing loaded
        let mut fresh = DocumentStore::new(dir.path(), gateway).unwrap();
        let results = search(&mut fresh, "Ana city Rouen", &[], 5, 0.1).await.unwrap();
        assert_eq!(results.get("people").unwrap().len(), 1);
        assert!(fresh.is_loaded("people"));
    }
}
