//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Every line is a text message from `local-user`. `/photo <ref>` simulates a
//! photo upload with `<ref>` as its file reference.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    Channel, IncomingMessage, Keyboard, MessageStream, OutgoingResponse, PhotoSize, ResponseBody,
};
use crate::error::ChannelError;

const PHOTO_COMMAND: &str = "/photo";

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Turn one input line into a message.
fn parse_line(line: &str) -> IncomingMessage {
    match line.strip_prefix(PHOTO_COMMAND) {
        Some(rest) if rest.is_empty() || rest.starts_with(' ') => {
            let file_id = rest.trim();
            let file_id = if file_id.is_empty() { "cli-photo" } else { file_id };
            IncomingMessage::photo(
                "cli",
                "local-user",
                vec![PhotoSize {
                    file_id: file_id.to_string(),
                    width: 0,
                    height: 0,
                    file_size: None,
                }],
            )
        }
        _ => IncomingMessage::new("cli", "local-user", line),
    }
}

/// Render a response the way a terminal can show it.
fn render(response: &OutgoingResponse) -> String {
    let mut out = match &response.body {
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Photo { file_id, caption } => format!("[photo: {file_id}]\n{caption}"),
    };
    if let Keyboard::Options(options) = &response.keyboard {
        let buttons: Vec<String> = options.iter().map(|o| format!("[{o}]")).collect();
        out.push('\n');
        out.push_str(&buttons.join(" "));
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        if tx.send(parse_line(&line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", render(&response));
        eprint!("> ");
        Ok(())
    }
}
