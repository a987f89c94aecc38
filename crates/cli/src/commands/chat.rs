//! `cairn chat` — Interactive or single-message chat mode.
//!
//! Lines starting with `/` are commands:
//! `/load <title>`, `/close <title>`, `/save <title>`, `/docs`,
//! `/observe <text>`, `/tool <name> <json arguments>`, `/exit`.

use super::{CliResult, load_config, open_store};
use cairn_agent::Session;
use cairn_core::tool::{ToolCall, ToolRegistry};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

pub async fn run(config_path: Option<&Path>, message: Option<String>, load: &[String]) -> CliResult {
    let config = load_config(config_path)?;
    let (provider, mut store) = open_store(&config)?;
    for title in load {
        store.load_document(title)?;
    }

    let store = Arc::new(Mutex::new(store));
    let tools = cairn_tools::default_registry(Arc::clone(&store));
    let mut session = Session::new(&config, provider, Arc::clone(&store)).with_tools(&tools);
    session.init_memory().await?;

    if let Some(message) = message {
        respond(&mut session, &message).await?;
        return Ok(());
    }

    println!();
    println!("  cairn chat — {} via {}", config.model, config.provider);
    println!("  Documents:  {}", config.store_dir().display());
    println!("  Type a message, /help for commands, /exit to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  {} > ", config.agent.username);
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Some(Command::Exit) => break,
            Some(command) => {
                if let Err(e) = command.apply(&mut session, &tools).await {
                    eprintln!("  [Error] {e}");
                }
            }
            None => {
                if let Err(e) = respond(&mut session, line).await {
                    eprintln!("  [Error] {e}");
                }
            }
        }
    }

    println!();
    Ok(())
}

async fn respond(session: &mut Session, prompt: &str) -> CliResult {
    print!("  {} > ", session.name());
    std::io::stdout().flush()?;
    session
        .respond_streaming(prompt, |token| {
            print!("{token}");
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!();
    println!();
    Ok(())
}

/// A slash command typed at the chat prompt.
#[derive(Debug, PartialEq)]
pub enum Command {
    Load(String),
    Close(String),
    Save(String),
    Docs,
    Observe(String),
    Tool { name: String, arguments: String },
    Help,
    Exit,
}

impl Command {
    /// `None` when `line` is a message rather than a command.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('/')?;
        let (word, arg) = match rest.split_once(char::is_whitespace) {
            Some((word, arg)) => (word, arg.trim()),
            None => (rest, ""),
        };
        Some(match word {
            "load" => Self::Load(arg.to_string()),
            "close" => Self::Close(arg.to_string()),
            "save" => Self::Save(arg.to_string()),
            "docs" => Self::Docs,
            "observe" => Self::Observe(arg.to_string()),
            "tool" => {
                let (name, arguments) = arg.split_once(char::is_whitespace).unwrap_or((arg, "{}"));
                Self::Tool {
                    name: name.to_string(),
                    arguments: arguments.trim().to_string(),
                }
            }
            "exit" | "quit" => Self::Exit,
            _ => Self::Help,
        })
    }

    async fn apply(self, session: &mut Session, tools: &ToolRegistry) -> CliResult {
        let store = session.store();
        match self {
            Self::Load(title) => {
                store.lock().await.load_document(&title)?;
                println!("  Loaded '{title}'");
            }
            Self::Close(title) => {
                if store.lock().await.close_document(&title)? {
                    println!("  Closed '{title}'");
                } else {
                    println!("  '{title}' was not loaded");
                }
            }
            Self::Save(title) => {
                let file = store.lock().await.save_document(&title)?;
                println!("  Saved {}", file.display());
            }
            Self::Docs => {
                let store = store.lock().await;
                for doc in store.get_loaded() {
                    println!("  {:<24} {}", doc.title, doc.description);
                }
                if store.loaded_count() == 0 {
                    println!("  (no documents loaded)");
                }
            }
            Self::Observe(text) => {
                session.observe(&text, None);
                println!("  Noted.");
            }
            Self::Tool { name, arguments } => {
                let call = ToolCall {
                    name,
                    arguments: serde_json::from_str(&arguments)?,
                };
                let result = tools.execute(&call).await?;
                println!("  {}", result.output);
                session.observe(&format!("{}:\n{}", call.name, result.output), None);
            }
            Self::Help => {
                println!("  /load <title>  /close <title>  /save <title>  /docs");
                println!("  /observe <text>  /tool <name> <json>  /exit");
                println!("  Tools: {}", tools.names().join(", "));
            }
            Self::Exit => {}
        }
        Ok(())
    }
}
