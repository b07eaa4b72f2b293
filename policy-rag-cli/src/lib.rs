//! Launcher support for the `policy-rag` binary: terminal input, the
//! interactive session, and logging setup.

pub mod console;
pub mod session;
pub mod telemetry;

pub use console::Console;
pub use session::{
    Answerer, LineReader, ReadOutcome, Session, SessionState, SessionSummary, write_answer,
    write_sources,
};
