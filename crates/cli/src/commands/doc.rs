//! `cairn doc` — Document management commands.

use super::{CliResult, load_config, open_store, parse_value};
use cairn_store::{Document, DocumentKind, DocumentSource, DocumentStore, path};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum DocCommand {
    /// Create a document and save it
    New {
        title: String,

        /// json or text
        #[arg(short, long, default_value = "json")]
        kind: String,

        /// Inline content: JSON source for json documents, prose for text ones
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read the content from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Embedding rounding precision (default from config)
        #[arg(long)]
        precision: Option<u32>,

        /// Embedding dimensions (default from config)
        #[arg(long)]
        dimensions: Option<usize>,
    },

    /// List persisted documents
    List,

    /// Print a document, or the subtree at a dotted path
    Show { title: String, path: Option<String> },

    /// Write a value (JSON, or a plain string) at a dotted path and save
    Set {
        title: String,
        path: String,
        value: String,
    },

    /// Delete the subtree at a dotted path and save
    Delete { title: String, path: String },
}

pub async fn run(config_path: Option<&Path>, command: DocCommand) -> CliResult {
    let config = load_config(config_path)?;
    let (_, mut store) = open_store(&config)?;

    match command {
        DocCommand::New {
            title,
            kind,
            content,
            file,
            description,
            precision,
            dimensions,
        } => {
            let kind: DocumentKind = kind.parse()?;
            let source = match (file, content) {
                (Some(file), _) => DocumentSource::File(file),
                (None, Some(content)) => DocumentSource::Text(content),
                (None, None) if kind == DocumentKind::Json => DocumentSource::Text("{}".into()),
                (None, None) => DocumentSource::Text(String::new()),
            };
            let doc = store
                .new_document(kind, &title, source, &description, precision, dimensions)
                .await?;
            println!(
                "Created {kind} document '{title}' ({} entries)",
                doc.data().content.len()
            );
        }
        DocCommand::List => list(&mut store)?,
        DocCommand::Show { title, path } => {
            store.load_document(&title)?;
            let doc = store
                .get_document(&title)
                .ok_or_else(|| format!("'{title}' is not loaded"))?;
            println!("{}", show(doc, path.as_deref().unwrap_or(""))?);
        }
        DocCommand::Set { title, path, value } => {
            let at = path::parse_dotted(&path)?;
            store.load_document(&title)?;
            let doc = store.json_document_mut(&title)?;
            match at.split_last() {
                None => doc.assign(parse_value(&value)).await?,
                Some((last, parent)) => {
                    doc.item_mut(parent)?
                        .set(last.clone(), parse_value(&value))
                        .await?
                }
            }
            let file = store.save_document(&title)?;
            println!("Saved {}", file.display());
        }
        DocCommand::Delete { title, path } => {
            let at = path::parse_dotted(&path)?;
            let Some((last, parent)) = at.split_last() else {
                return Err("refusing to delete the whole document; give a path".into());
            };
            store.load_document(&title)?;
            store
                .json_document_mut(&title)?
                .item_mut(parent)?
                .delete(last.clone())?;
            let file = store.save_document(&title)?;
            println!("Saved {}", file.display());
        }
    }

    Ok(())
}

fn list(store: &mut DocumentStore) -> CliResult {
    let titles = store.get_titles()?;
    if titles.is_empty() {
        println!("No documents in {}", store.folder().display());
        return Ok(());
    }
    for title in titles {
        match store.load_document(&title) {
            Ok(()) => {
                if let Some(doc) = store.get_document(&title) {
                    println!(
                        "  {title:<24} {:<5} {:>6} entries  {}",
                        doc.kind(),
                        doc.data().content.len(),
                        doc.description()
                    );
                }
            }
            Err(e) => println!("  {title:<24} (unreadable: {e})"),
        }
    }
    Ok(())
}

/// Render a document, or one subtree of a JSON document, for the terminal.
pub fn show(doc: &Document, dotted: &str) -> CliResult<String> {
    let at = path::parse_dotted(dotted)?;
    let rendered = match doc {
        Document::Json(json) => serde_json::to_string_pretty(&json.item(&at)?.value()?)?,
        Document::Text(text) => {
            if !at.is_empty() {
                return Err("text documents have no paths".into());
            }
            text.chunks()
                .map(|(start, end, chunk)| format!("[{start}..{end}] {chunk}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    Ok(rendered)
}
