//! Query and chat commands

use std::io::Write;

use clap::Args;
use serde::Serialize;

use super::print_json;
use crate::App;
use crate::domain::conversation::ChatMessage;
use crate::domain::rag::TokenSink;

/// Arguments for the query command
#[derive(Args, Clone)]
pub struct QueryArgs {
    /// Print the answer token by token before the final result
    #[arg(long)]
    pub stream: bool,

    /// Question to answer
    #[arg(required = true)]
    pub text: Vec<String>,
}

/// Arguments for the chat command
#[derive(Args, Clone)]
pub struct ChatArgs {
    /// Existing session; a new one is created when omitted
    #[arg(long)]
    pub session: Option<String>,

    /// Print the answer token by token before the final message
    #[arg(long)]
    pub stream: bool,

    /// Message to send
    #[arg(required = true)]
    pub text: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatOutput {
    session_id: String,
    message: ChatMessage,
}

/// Writes tokens to stdout as they arrive
struct StdoutSink;

impl TokenSink for StdoutSink {
    fn on_token(&self, token: &str) {
        let mut stdout = std::io::stdout().lock();
        // Nothing useful to do when the terminal went away
        let _ = stdout.write_all(token.as_bytes());
        let _ = stdout.flush();
    }
}

static STDOUT_SINK: StdoutSink = StdoutSink;

fn sink(stream: bool) -> Option<&'static dyn TokenSink> {
    stream.then_some(&STDOUT_SINK as &dyn TokenSink)
}

pub async fn query(app: &App, args: QueryArgs) -> anyhow::Result<()> {
    let text = args.text.join(" ");

    let result = app.rag.process_query(&text, sink(args.stream)).await?;
    if args.stream {
        println!();
    }

    print_json(&result)
}

pub async fn chat(app: &App, args: ChatArgs) -> anyhow::Result<()> {
    let text = args.text.join(" ");

    let session_id = match args.session {
        Some(id) => id,
        None => app.conversations.create_session().await?.id,
    };

    let message = app
        .chat
        .send_message(&session_id, &text, sink(args.stream))
        .await?;
    if args.stream {
        println!();
    }

    print_json(&ChatOutput {
        session_id,
        message,
    })
}
