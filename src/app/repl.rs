#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;

use std::str::FromStr;

use crate::app::{Controller, SubmitError};
use crate::models::Message;
use eyre::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const HELP: &str = r#"Commands:
  /new <name>            start a conversation and switch to it
  /list                  list conversations
  /switch <id>           switch to a conversation
  /rename <id> <name>    rename a conversation
  /delete <id>           delete a conversation and its messages
  /system [prompt]       show or set the system prompt ("/system \"\"" clears it)
  /models                list local models
  /model <name>          set the model used for replies
  /history               show the active conversation
  /help                  show this help
  /quit                  exit
Anything else is sent as a prompt."#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NewConversation(String),
    ListConversations,
    SwitchConversation(i64),
    RenameConversation(i64, String),
    DeleteConversation(i64),
    ShowSystemPrompt,
    SetSystemPrompt(String),
    ListModels,
    SetModel(String),
    History,
    Help,
    Quit,
    Submit(String),
}

impl FromStr for Action {
    type Err = eyre::Report;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Action::Submit(line.to_string()));
        };

        let (name, args) = match command.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (command, ""),
        };

        let action = match name {
            "new" => Action::NewConversation(required(args, "/new <name>")?.to_string()),
            "list" => Action::ListConversations,
            "switch" => Action::SwitchConversation(parse_id(args)?),
            "rename" => {
                let (id, name) = args
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| eyre::eyre!("usage: /rename <id> <name>"))?;
                Action::RenameConversation(parse_id(id)?, name.trim().to_string())
            }
            "delete" => Action::DeleteConversation(parse_id(args)?),
            "system" if args.is_empty() => Action::ShowSystemPrompt,
            "system" => Action::SetSystemPrompt(unquote(args).to_string()),
            "models" => Action::ListModels,
            "model" => Action::SetModel(required(args, "/model <name>")?.to_string()),
            "history" => Action::History,
            "help" => Action::Help,
            "quit" | "exit" => Action::Quit,
            _ => eyre::bail!("unknown command /{}, try /help", name),
        };
        Ok(action)
    }
}

fn required<'a>(args: &'a str, usage: &str) -> Result<&'a str> {
    if args.is_empty() {
        eyre::bail!("usage: {}", usage);
    }
    Ok(args)
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .wrap_err(format!("invalid conversation id {:?}", raw.trim()))
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

/// Line-oriented driver over a [`Controller`]. Reads one action per line
/// until EOF or `/quit`.
pub struct Repl<R, W> {
    controller: Controller,
    input: R,
    output: W,
}

impl<R, W> Repl<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(controller: Controller, input: R, output: W) -> Self {
        Self {
            controller,
            input,
            output,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.prompt().await?;
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .input
                .read_line(&mut line)
                .await
                .wrap_err("reading input")?;
            if n == 0 {
                log::debug!("Input closed");
                break;
            }

            if line.trim().is_empty() {
                self.prompt().await?;
                continue;
            }

            let action = match line.parse::<Action>() {
                Ok(action) => action,
                Err(err) => {
                    self.writeln(&format!("error: {}", err)).await?;
                    self.prompt().await?;
                    continue;
                }
            };

            if action == Action::Quit {
                break;
            }

            if let Err(err) = self.handle(action).await {
                log::error!("Command failed: {:#}", err);
                self.writeln(&format!("error: {:#}", err)).await?;
            }
            self.prompt().await?;
        }
        self.output.flush().await?;
        Ok(())
    }

    pub async fn handle(&mut self, action: Action) -> Result<()> {
        match action {
            Action::NewConversation(name) => {
                let convo = self.controller.new_conversation(&name).await?;
                self.writeln(&format!("Started conversation {}", convo))
                    .await?;
            }

            Action::ListConversations => {
                let conversations = self.controller.conversations().await?;
                if conversations.is_empty() {
                    self.writeln("No conversations yet, start one with /new <name>")
                        .await?;
                }
                for convo in conversations {
                    let marker = match self.controller.active_conversation() {
                        Some(id) if id == convo.id() => "*",
                        _ => " ",
                    };
                    self.writeln(&format!("{} {}", marker, convo)).await?;
                }
            }

            Action::SwitchConversation(id) => {
                self.controller.switch_conversation(id).await?;
                let count = self.controller.messages().await.len();
                self.writeln(&format!("Switched to conversation {} ({} messages)", id, count))
                    .await?;
            }

            Action::RenameConversation(id, name) => {
                self.controller.rename_conversation(id, &name).await?;
                self.writeln(&format!("Renamed conversation {}", id)).await?;
            }

            Action::DeleteConversation(id) => {
                self.controller.delete_conversation(id).await?;
                self.writeln(&format!("Deleted conversation {}", id)).await?;
            }

            Action::ShowSystemPrompt => {
                let prompt = self.controller.system_prompt().await?;
                if prompt.is_empty() {
                    self.writeln("System prompt is disabled").await?;
                } else {
                    self.writeln(&prompt).await?;
                }
            }

            Action::SetSystemPrompt(prompt) => {
                self.controller.set_system_prompt(&prompt).await?;
                self.writeln("System prompt updated").await?;
            }

            Action::ListModels => {
                let models = self.controller.list_models().await?;
                if models.is_empty() {
                    self.writeln("No local models, pull one with `ollama pull <model>`")
                        .await?;
                }
                for model in models {
                    let marker = if model.name() == self.controller.model() {
                        "*"
                    } else {
                        " "
                    };
                    self.writeln(&format!("{} {}", marker, model)).await?;
                }
            }

            Action::SetModel(model) => {
                self.controller.set_model(&model);
                self.writeln(&format!("Using model {}", model)).await?;
            }

            Action::History => {
                let messages = self.controller.messages().await;
                for message in &messages {
                    self.write_message(message).await?;
                }
            }

            Action::Help => self.writeln(HELP).await?,

            Action::Quit => {}

            Action::Submit(content) => match self.controller.submit(&content).await {
                Ok(reply) => self.writeln(&reply).await?,
                Err(SubmitError::Persist(err)) => {
                    // The reply still reached the user.
                    if let Some(message) = self.controller.messages().await.last() {
                        self.writeln(message.content()).await?;
                    }
                    self.writeln(&format!("warning: reply was not saved: {:#}", err))
                        .await?;
                }
                Err(err) => return Err(err.into()),
            },
        }
        Ok(())
    }

    async fn write_message(&mut self, message: &Message) -> Result<()> {
        self.writeln(&format!("[{}] {}", message.role(), message.content()))
            .await
    }

    async fn writeln(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        Ok(())
    }

    async fn prompt(&mut self) -> Result<()> {
        let label = match self.controller.active_conversation() {
            Some(id) => format!("#{}> ", id),
            None => "> ".to_string(),
        };
        self.output.write_all(label.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}
