//! Terminal View
//!
//! Prints session events as they arrive. Updates carry full snapshots, so
//! each pane remembers how much it already printed and writes only the new
//! tail. When output switches to another model (or from reasoning to answer)
//! a `[name]` header is printed first, so interleaved streams stay readable.

use std::collections::HashMap;
use std::io::{self, Write};

use chorus_core::{ModelCatalog, ModelId, SessionResult, SinkEvent, StreamUpdate};

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Reasoning,
    Answer,
    Status,
}

#[derive(Debug, Default)]
struct Pane {
    reasoning_printed: usize,
    answer_printed: usize,
}

/// Incremental printer for one turn's streams
pub struct TerminalView<W: Write> {
    out: W,
    catalog: ModelCatalog,
    panes: HashMap<ModelId, Pane>,
    cursor: Option<(ModelId, Section)>,
    color: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, catalog: ModelCatalog, color: bool) -> Self {
        Self {
            out,
            catalog,
            panes: HashMap::new(),
            cursor: None,
            color,
        }
    }

    /// Forget per-model progress before the next turn
    pub fn reset(&mut self) {
        self.panes.clear();
        self.cursor = None;
    }

    pub fn handle(&mut self, event: &SinkEvent) -> io::Result<()> {
        match event {
            SinkEvent::Update(update) => self.update(update)?,
            SinkEvent::Finished(result) => self.finish(result)?,
        }
        self.out.flush()
    }

    fn update(&mut self, update: &StreamUpdate) -> io::Result<()> {
        let pane = self.panes.entry(update.model.clone()).or_default();
        let reasoning_tail = update
            .reasoning
            .get(pane.reasoning_printed..)
            .unwrap_or_default()
            .to_string();
        let answer_tail = update
            .answer
            .get(pane.answer_printed..)
            .unwrap_or_default()
            .to_string();
        pane.reasoning_printed = update.reasoning.len();
        pane.answer_printed = update.answer.len();

        if !reasoning_tail.is_empty() {
            self.switch_to(&update.model, Section::Reasoning)?;
            if self.color {
                write!(self.out, "{DIM}{reasoning_tail}{RESET}")?;
            } else {
                write!(self.out, "{reasoning_tail}")?;
            }
        }

        if update.phase_just_closed {
            self.switch_to(&update.model, Section::Status)?;
            writeln!(
                self.out,
                "(thought for {} words)",
                update.reasoning.split_whitespace().count()
            )?;
            self.cursor = None;
        }

        if !answer_tail.is_empty() {
            self.switch_to(&update.model, Section::Answer)?;
            write!(self.out, "{answer_tail}")?;
        }
        Ok(())
    }

    fn finish(&mut self, result: &SessionResult) -> io::Result<()> {
        let note = match result.status_message() {
            Some(message) => Some(message),
            None if result.unterminated_think && result.final_text.is_empty() => {
                Some("(no answer: reasoning never finished)".to_string())
            }
            None if result.final_text.is_empty() => Some("(empty answer)".to_string()),
            None => None,
        };

        if let Some(note) = note {
            self.switch_to(&result.model, Section::Status)?;
            writeln!(self.out, "{note}")?;
            self.cursor = None;
        } else if self.cursor.as_ref().is_some_and(|(m, _)| m == &result.model) {
            writeln!(self.out)?;
            self.cursor = None;
        }
        Ok(())
    }

    fn switch_to(&mut self, model: &ModelId, section: Section) -> io::Result<()> {
        let same_model = self.cursor.as_ref().is_some_and(|(m, _)| m == model);
        if same_model && self.cursor.as_ref().is_some_and(|(_, s)| *s == section) {
            return Ok(());
        }
        if self.cursor.is_some() {
            writeln!(self.out)?;
        }
        // Status lines continue the pane they belong to
        if same_model && section == Section::Status {
            self.cursor = Some((model.clone(), section));
            return Ok(());
        }

        let name = self.catalog.display_name(model);
        match section {
            Section::Reasoning => writeln!(self.out, "[{name} · thinking]")?,
            Section::Answer | Section::Status => writeln!(self.out, "[{name}]")?,
        }
        self.cursor = Some((model.clone(), section));
        Ok(())
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    pub fn prompt(&mut self, selection: &str) -> io::Result<()> {
        write!(self.out, "\n{selection}> ")?;
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
