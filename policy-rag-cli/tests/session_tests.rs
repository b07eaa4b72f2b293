//! Interactive session behavior with scripted input.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use policy_rag::mock::{HashEmbeddingProvider, MockLanguageModel};
use policy_rag::{
    InMemoryVectorStore, QueryResult, RagConfig, RagError, RagPipeline, Result, Source,
};
use policy_rag_cli::session::{QUESTION_PROMPT, SOURCES_PROMPT};
use policy_rag_cli::{Answerer, LineReader, ReadOutcome, Session, SessionState, SessionSummary};

struct Script {
    inputs: VecDeque<ReadOutcome>,
    prompts: Vec<String>,
}

impl Script {
    fn new(lines: &[&str]) -> Self {
        Self {
            inputs: lines.iter().map(|l| ReadOutcome::Line(l.to_string())).collect(),
            prompts: Vec::new(),
        }
    }

    fn then(mut self, outcome: ReadOutcome) -> Self {
        self.inputs.push_back(outcome);
        self
    }
}

impl LineReader for &mut Script {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        self.prompts.push(prompt.to_string());
        self.inputs.pop_front().unwrap_or(ReadOutcome::Closed)
    }
}

/// Fails the first question, answers the rest.
struct FlakyAnswerer {
    calls: AtomicUsize,
}

#[async_trait]
impl Answerer for FlakyAnswerer {
    async fn answer(&self, question: &str) -> Result<QueryResult> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(RagError::SynthesisError {
                model: "flaky".into(),
                message: "upstream returned 500".into(),
            });
        }
        Ok(QueryResult {
            answer: format!("Answer to: {question}"),
            sources: vec![Source { content: "Policy text.".into(), metadata: Default::default() }],
        })
    }
}

fn flaky() -> FlakyAnswerer {
    FlakyAnswerer { calls: AtomicUsize::new(0) }
}

async fn run(script: &mut Script, answerer: &dyn Answerer) -> (SessionSummary, String) {
    let mut session = Session::new(script, Vec::new());
    let summary = session.run(answerer).await.unwrap();
    assert_eq!(session.state(), SessionState::Terminated);
    (summary, String::from_utf8(session.into_output()).unwrap())
}

#[tokio::test]
async fn failed_turn_does_not_end_session() {
    let mut script = Script::new(&["Is dental covered?", "Is vision covered?", "n", "exit"]);
    let answerer = flaky();
    let (summary, output) = run(&mut script, &answerer).await;

    assert_eq!(summary, SessionSummary { answered: 1, failed: 1 });
    assert!(output.contains("Error: Synthesis error (flaky): upstream returned 500"));
    assert!(output.contains("Answer to: Is vision covered?"));
    assert!(!output.contains("Sources:"));
}

#[tokio::test]
async fn banner_and_prompts_are_shown() {
    let mut script = Script::new(&["EXIT"]);
    let (summary, output) = run(&mut script, &flaky()).await;
    assert_eq!(summary, SessionSummary::default());
    assert!(output.starts_with("\nInsurance Policy RAG System\nType 'exit' to quit the program\n"));
    assert_eq!(script.prompts, vec![QUESTION_PROMPT.to_string()]);
}

#[tokio::test]
async fn empty_input_is_ignored() {
    let mut script = Script::new(&["", "   ", "  exit  "]);
    let answerer = flaky();
    let (summary, _) = run(&mut script, &answerer).await;
    assert_eq!(summary, SessionSummary::default());
    assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(script.prompts.len(), 3);
}

#[tokio::test]
async fn sources_shown_only_on_yes() {
    let answerer = flaky();
    answerer.calls.store(1, Ordering::SeqCst);
    let mut script = Script::new(&["What is covered?", "Y", "And towing?", "no", "exit"]);
    let (summary, output) = run(&mut script, &answerer).await;

    assert_eq!(summary.answered, 2);
    assert_eq!(output.matches("\nSources:\n").count(), 1);
    assert!(output.contains("Source 1:\nContent: Policy text.\n"));
    assert_eq!(script.prompts.iter().filter(|p| p.as_str() == SOURCES_PROMPT).count(), 2);
}

#[tokio::test]
async fn interrupt_terminates_immediately() {
    let mut script = Script::new(&[]).then(ReadOutcome::Interrupted);
    let answerer = flaky();
    let (summary, output) = run(&mut script, &answerer).await;
    assert_eq!(summary, SessionSummary::default());
    assert!(output.ends_with("\nGoodbye!\n"));
}

#[tokio::test]
async fn interrupt_at_sources_prompt_terminates() {
    let answerer = flaky();
    answerer.calls.store(1, Ordering::SeqCst);
    let mut script = Script::new(&["What is covered?"]).then(ReadOutcome::Interrupted);
    let (summary, _) = run(&mut script, &answerer).await;
    assert_eq!(summary.answered, 1);
    assert_eq!(script.prompts.len(), 2);
}

#[tokio::test]
async fn pipeline_recovers_after_model_failure() {
    let model = Arc::new(MockLanguageModel::new("I don't know."));
    model.push(Err(RagError::SynthesisError {
        model: "mock".into(),
        message: "overloaded".into(),
    }));
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(HashEmbeddingProvider::new(32)))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .language_model(model.clone())
        .build()
        .unwrap();

    let mut script = Script::new(&["Is hail covered?", "Is hail covered?", "y", "exit"]);
    let (summary, output) = run(&mut script, &pipeline).await;

    assert_eq!(summary, SessionSummary { answered: 1, failed: 1 });
    assert!(output.contains("Error: Synthesis error (mock): overloaded"));
    assert!(output.contains("\nAnswer:\n"));
    assert!(output.contains("I don't know."));
    assert!(output.contains("No sources were retrieved."));
    assert_eq!(model.prompts().len(), 2);
}
