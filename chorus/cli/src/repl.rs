//! Read-eval-print loop
//!
//! Reads lines from stdin, runs commands, and sends prompts to the selected
//! models while printing their streams.

use std::io::{self, IsTerminal, Stdout};

use anyhow::{Context, Result};
use chorus_core::{
    ChannelSink, ChatClient, ModelId, ModelSelection, SinkEvent, TurnOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::{self, Command, Input, HELP};
use crate::view::TerminalView;

pub struct Repl {
    client: ChatClient,
    selection: ModelSelection,
    view: TerminalView<Stdout>,
}

impl Repl {
    pub fn new(client: ChatClient) -> Self {
        let selection = ModelSelection::new(client.default_models().iter().cloned());
        let stdout = io::stdout();
        let color = stdout.is_terminal();
        let view = TerminalView::new(stdout, client.catalog().clone(), color);
        Self {
            client,
            selection,
            view,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.view
            .line("chorus - type a message, /help for commands, /quit to exit")?;

        loop {
            self.view.prompt(&self.selection.to_string())?;

            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read input")?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };

            match commands::parse(&line) {
                Ok(Input::Empty) => {}
                Ok(Input::Prompt(prompt)) => self.turn(&prompt).await?,
                Ok(Input::Command(Command::Quit)) => break,
                Ok(Input::Command(command)) => self.command(command).await?,
                Err(e) => self.view.line(&e.to_string())?,
            }
        }

        tracing::info!(turns = self.client.history().len(), "Session ended");
        Ok(())
    }

    async fn turn(&mut self, prompt: &str) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<SinkEvent>();
        let token = CancellationToken::new();
        let models = self.selection.models().to_vec();
        self.view.reset();

        let outcome = {
            let submit = self.client.submit(prompt, &models, &token, |_model| {
                ChannelSink::new(tx.clone())
            });
            tokio::pin!(submit);

            let mut interrupted = false;
            loop {
                tokio::select! {
                    outcome = &mut submit => break outcome,
                    Some(event) = rx.recv() => self.view.handle(&event)?,
                    _ = tokio::signal::ctrl_c(), if !interrupted => {
                        interrupted = true;
                        token.cancel();
                    }
                }
            }
        };

        drop(tx);
        while let Ok(event) = rx.try_recv() {
            self.view.handle(&event)?;
        }

        match outcome {
            Ok(outcome) => self.report(&outcome)?,
            Err(e) => self.view.line(&format!("error: {e}"))?,
        }
        Ok(())
    }

    fn report(&mut self, outcome: &TurnOutcome) -> io::Result<()> {
        tracing::debug!(
            turn = %outcome.turn,
            completed = outcome.completed().count(),
            appended = outcome.appended,
            "Turn finished"
        );
        if outcome.all_aborted() {
            self.view.line("(stopped; no answers recorded)")?;
        }
        Ok(())
    }

    async fn command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::New => {
                self.client.new_chat();
                self.view.line("Started a new chat.")?;
            }
            Command::Models => {
                let catalog = self.client.catalog();
                let mut listing = String::new();
                for entry in catalog.entries() {
                    let mark = if self.selection.contains(&entry.id) { '*' } else { ' ' };
                    let kind = if entry.reasoning { "  (reasoning)" } else { "" };
                    listing.push_str(&format!(
                        "{mark} {:<36} {}{kind}\n",
                        entry.id.as_str(),
                        entry.display_name
                    ));
                }
                for model in self.selection.models() {
                    if catalog.get(model).is_none() {
                        listing.push_str(&format!("* {}\n", model.as_str()));
                    }
                }
                self.view.line(listing.trim_end())?;
            }
            Command::Toggle(id) => {
                let message = match self.selection.toggle(ModelId::from(id.as_str())) {
                    Ok(true) => format!("Selected {id}"),
                    Ok(false) => format!("Deselected {id}"),
                    Err(e) => e.to_string(),
                };
                self.view.line(&message)?;
            }
            Command::Export(path) => {
                let message = match self.client.export_history(path.as_deref()).await {
                    Ok(written) => format!("Wrote {}", written.display()),
                    Err(e) => format!("error: {e}"),
                };
                self.view.line(&message)?;
            }
            Command::ExportHtml(path) => {
                let message = match self.client.export_transcript_html(path.as_deref()).await {
                    Ok(written) => format!("Wrote {}", written.display()),
                    Err(e) => format!("error: {e}"),
                };
                self.view.line(&message)?;
            }
            Command::Help => self.view.line(HELP)?,
            Command::Quit => {}
        }
        Ok(())
    }
}
