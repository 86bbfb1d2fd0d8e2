//! A line-oriented front-end: commands come from a reader, replies are
//! written as plain text, and attachments are copied into an outbox
//! directory before their artifacts are discarded.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::bot::{Bot, Interaction, Reply};

pub struct ConsoleInteraction<W> {
    user_id: String,
    outbox: Option<PathBuf>,
    out: W,
}

impl<W: AsyncWrite + Unpin> ConsoleInteraction<W> {
    pub fn new(user_id: impl Into<String>, outbox: Option<PathBuf>, out: W) -> Self {
        Self {
            user_id: user_id.into(),
            outbox,
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}

fn format_reply(reply: &Reply) -> String {
    let mut text = String::new();
    if let Some(content) = &reply.content {
        text.push_str(content);
        text.push('\n');
    }
    if let Some(embed) = &reply.embed {
        text.push_str(&format!("{}\n{}\n", embed.title, embed.description));
        for field in &embed.fields {
            text.push_str(&format!("\n{}\n{}\n", field.name, field.value));
        }
    }
    text
}

impl<W: AsyncWrite + Unpin> Interaction for ConsoleInteraction<W> {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn defer(&mut self) -> Result<()> {
        self.write("… working\n").await
    }

    async fn send(&mut self, reply: Reply) -> Result<()> {
        let mut text = format_reply(&reply);
        if let Some(artifact) = &reply.attachment {
            match &self.outbox {
                Some(outbox) => {
                    tokio::fs::create_dir_all(outbox)
                        .await
                        .with_context(|| format!("creating {}", outbox.display()))?;
                    let destination = outbox.join(artifact.file_name());
                    tokio::fs::copy(artifact.path(), &destination)
                        .await
                        .with_context(|| format!("saving {}", destination.display()))?;
                    text.push_str(&format!("[{} saved to {}]\n", artifact.kind(), destination.display()));
                }
                None => text.push_str(&format!(
                    "[{} {} discarded, no outbox configured]\n",
                    artifact.kind(),
                    artifact.file_name()
                )),
            }
        }
        text.push('\n');
        self.write(&text).await
    }
}

/// Handle commands from `input` until it ends or the user types `quit`.
pub async fn run_console<R, W>(bot: &Bot, input: R, interaction: &mut ConsoleInteraction<W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if matches!(line, "quit" | "exit" | "/quit") {
            break;
        }
        log::info!("Received command: {}", line);
        if let Err(e) = bot.handle_line(line, interaction).await {
            log::warn!("Could not deliver reply: {:#}", e);
        }
    }
    Ok(())
}
