//! Interactive question loop and answer rendering.
//!
//! The session reads questions until the user types `exit` or interrupts.
//! A failed turn is reported and the loop keeps going.

use std::io::{self, Write};

use async_trait::async_trait;
use policy_rag::{QueryResult, RagPipeline};
use tracing::warn;

/// Printed when the interactive session starts.
pub const BANNER: &str = "Insurance Policy RAG System";
/// Printed under the banner.
pub const EXIT_HINT: &str = "Type 'exit' to quit the program";
/// Prompt for each question.
pub const QUESTION_PROMPT: &str = "\nWhat would you like to know about your insurance policies? ";
/// Follow-up prompt after an answer.
pub const SOURCES_PROMPT: &str = "\nWould you like to see the sources? (y/n): ";
/// Input that ends the session, compared case-insensitively.
pub const EXIT_SENTINEL: &str = "exit";

const RULE_WIDTH: usize = 80;

/// What a [`LineReader`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line of input, without the trailing newline.
    Line(String),
    /// The user pressed Ctrl-C.
    Interrupted,
    /// Input is exhausted (Ctrl-D or closed stdin).
    Closed,
}

/// A source of user input lines.
pub trait LineReader {
    /// Show `prompt` and read one line.
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;
}

/// Something that answers questions.
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Answer one question.
    async fn answer(&self, question: &str) -> policy_rag::Result<QueryResult>;
}

#[async_trait]
impl Answerer for RagPipeline {
    async fn answer(&self, question: &str) -> policy_rag::Result<QueryResult> {
        self.query(question).await
    }
}

/// Where the interactive state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next question.
    AwaitingInput,
    /// A question is being answered.
    Processing,
    /// The session has ended.
    Terminated,
}

/// Counts kept over one interactive session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Questions answered successfully.
    pub answered: usize,
    /// Questions whose turn failed.
    pub failed: usize,
}

/// Drives the interactive question loop over a reader and a writer.
pub struct Session<R, W> {
    reader: R,
    out: W,
    state: SessionState,
    summary: SessionSummary,
}

impl<R: LineReader, W: Write> Session<R, W> {
    /// A session reading from `reader` and printing to `out`.
    pub fn new(reader: R, out: W) -> Self {
        Self {
            reader,
            out,
            state: SessionState::AwaitingInput,
            summary: SessionSummary::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Consume the session, returning the writer.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until the exit sentinel, an interrupt, or end of input.
    ///
    /// # Errors
    ///
    /// Only fails if writing to the output fails. Answer failures are
    /// printed and the loop continues.
    pub async fn run(&mut self, answerer: &dyn Answerer) -> io::Result<SessionSummary> {
        writeln!(self.out, "\n{BANNER}")?;
        writeln!(self.out, "{EXIT_HINT}")?;

        while self.state != SessionState::Terminated {
            self.turn(answerer).await?;
        }
        Ok(self.summary)
    }

    async fn turn(&mut self, answerer: &dyn Answerer) -> io::Result<()> {
        self.out.flush()?;
        let question = match self.reader.read_line(QUESTION_PROMPT) {
            ReadOutcome::Line(line) => line.trim().to_string(),
            ReadOutcome::Interrupted | ReadOutcome::Closed => return self.terminate(),
        };

        if question.eq_ignore_ascii_case(EXIT_SENTINEL) {
            return self.terminate();
        }
        if question.is_empty() {
            return Ok(());
        }

        self.state = SessionState::Processing;
        let outcome = answerer.answer(&question).await;
        self.state = SessionState::AwaitingInput;

        match outcome {
            Ok(result) => {
                self.summary.answered += 1;
                write_answer(&mut self.out, &result)?;
                self.out.flush()?;
                match self.reader.read_line(SOURCES_PROMPT) {
                    ReadOutcome::Line(reply) if reply.trim().eq_ignore_ascii_case("y") => {
                        write_sources(&mut self.out, &result)?;
                    }
                    ReadOutcome::Line(_) => {}
                    ReadOutcome::Interrupted | ReadOutcome::Closed => return self.terminate(),
                }
            }
            Err(e) => {
                self.summary.failed += 1;
                warn!(error = %e, "question failed");
                writeln!(self.out, "Error: {e}")?;
            }
        }
        Ok(())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.state = SessionState::Terminated;
        writeln!(self.out, "\nGoodbye!")
    }
}

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Print the `Answer:` block.
pub fn write_answer(out: &mut impl Write, result: &QueryResult) -> io::Result<()> {
    writeln!(out, "\nAnswer:")?;
    writeln!(out, "{}", rule())?;
    writeln!(out, "{}", result.answer)?;
    writeln!(out, "{}", rule())
}

/// Print the `Sources:` block.
pub fn write_sources(out: &mut impl Write, result: &QueryResult) -> io::Result<()> {
    writeln!(out, "\nSources:")?;
    writeln!(out, "{}", rule())?;
    if result.sources.is_empty() {
        writeln!(out, "No sources were retrieved.")
    } else {
        write!(out, "{}", result.format_sources())
    }
}
