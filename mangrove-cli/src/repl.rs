//! Interactive chat session.

use crate::commands::{Context, PipelineState, Reply, TROUBLE_MESSAGE, format_sources, respond};
use mangrove_core::{MangroveConfig, Message};
use std::io::{self, BufRead, Write};

const HELP: &str = "Commands:
  /sources   list the documents in the corpus
  /reload    reload the documents directory
  /clear     forget the conversation so far
  /help      show this help
  /quit      exit";

/// Run the chat loop until EOF or `/quit`.
pub async fn run_chat(
    ctx: &Context,
    config: MangroveConfig,
    show_sources: bool,
) -> anyhow::Result<()> {
    let mut state = ctx.build_pipeline(&config).await?;
    println!(
        "Mangrove | Documents: {} | Workspace: {}",
        state.document_count(),
        ctx.workspace.display()
    );
    println!("Type /help for commands, /quit to exit\n");

    let mut messages: Vec<Message> = Vec::new();
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{}", HELP);
                continue;
            }
            "/clear" => {
                messages.clear();
                println!("Conversation cleared.");
                continue;
            }
            "/sources" => {
                let sources = state.pipeline().map(|p| p.sources()).unwrap_or_default();
                println!("{}", format_sources(&sources));
                continue;
            }
            "/reload" => {
                state = ctx.build_pipeline(&config).await?;
                match &state {
                    PipelineState::Ready(p) => {
                        println!("Reloaded {} document chunks.", p.documents().len())
                    }
                    PipelineState::Unavailable(_) => println!("\n{}\n", TROUBLE_MESSAGE),
                }
                continue;
            }
            _ if input.starts_with('/') => {
                println!("Unknown command: {}. Type /help for commands.", input);
                continue;
            }
            _ => {}
        }

        messages.push(Message::user(input));
        match respond(&state, &messages).await {
            Reply::Answer(response) => {
                println!("\n{}\n", response.text);
                if show_sources {
                    println!("Sources:\n{}\n", format_sources(&response.sources));
                }
                messages.push(Message::assistant(response.text));
            }
            Reply::Refused(message) => {
                // Keep the history to completed exchanges only.
                messages.pop();
                println!("\n{}\n", message);
            }
        }
    }

    Ok(())
}
