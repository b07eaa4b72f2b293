//! Answer synthesis: fill the prompt template, call the model once, and
//! return the answer together with the exact chunks that were in the prompt.

use std::sync::Arc;

use tracing::{error, info};

use crate::context::assemble;
use crate::document::{QueryResult, SearchResult, Source};
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::retry::CallPolicy;

/// The default insurance question-answering prompt.
pub const DEFAULT_TEMPLATE: &str = "\
You are an insurance expert assistant. Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
Always provide the source of your information from the context.

Context: {context}

Question: {question}

Answer: Let me help you with that information from the insurance policy documents.
";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Context,
    Question,
}

/// A prompt template with `{context}` and `{question}` slots.
///
/// Slots are substituted in a single pass, so slot markers that appear inside
/// the question or the context are left as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless both slots occur.
    pub fn new(template: &str) -> Result<Self> {
        let segments = parse_segments(template);
        let required = [(CONTEXT_SLOT, Segment::Context), (QUESTION_SLOT, Segment::Question)];
        for (slot, segment) in required {
            if !segments.contains(&segment) {
                return Err(RagError::ConfigError(format!("prompt template is missing {slot}")));
            }
        }
        Ok(Self { segments })
    }

    /// Fill the slots.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut prompt = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => prompt.push_str(text),
                Segment::Context => prompt.push_str(context),
                Segment::Question => prompt.push_str(question),
            }
        }
        prompt
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { segments: parse_segments(DEFAULT_TEMPLATE) }
    }
}

fn parse_segments(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;
    loop {
        let next = [(CONTEXT_SLOT, Segment::Context), (QUESTION_SLOT, Segment::Question)]
            .into_iter()
            .filter_map(|(slot, segment)| rest.find(slot).map(|pos| (pos, slot, segment)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, slot, segment)) => {
                if pos > 0 {
                    segments.push(Segment::Text(rest[..pos].to_string()));
                }
                segments.push(segment);
                rest = &rest[pos + slot.len()..];
            }
            None => {
                if !rest.is_empty() {
                    segments.push(Segment::Text(rest.to_string()));
                }
                return segments;
            }
        }
    }
}

/// Sends context and question to a language model and pairs the answer with
/// its sources.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    policy: CallPolicy,
}

impl AnswerSynthesizer {
    /// Create a synthesizer using [`DEFAULT_TEMPLATE`].
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model, template: PromptTemplate::default(), policy: CallPolicy::default() }
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Set the timeout/retry policy for the model call.
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The prompt that [`answer`](Self::answer) sends for these inputs.
    pub fn prompt(&self, question: &str, results: &[SearchResult]) -> String {
        self.template.render(&assemble(results), question)
    }

    /// Answer `question` from `results`.
    ///
    /// The returned sources are the chunks of `results`, in the same order,
    /// with their text and metadata unchanged. An empty `results` produces an
    /// empty context; the model is still called and is expected to say it
    /// does not know.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SynthesisError`] if the model call fails or the
    /// answer is blank, and [`RagError::Timeout`] if it does not finish in time.
    pub async fn answer(&self, question: &str, results: &[SearchResult]) -> Result<QueryResult> {
        let prompt = self.prompt(question, results);
        let model_name = self.model.name().to_string();

        let answer = self
            .policy
            .run("chat completion", || self.model.complete(&prompt))
            .await
            .map_err(|e| {
                error!(model = %model_name, error = %e, "language model call failed");
                e
            })?;

        if answer.trim().is_empty() {
            error!(model = %model_name, "language model returned an empty answer");
            return Err(RagError::SynthesisError {
                model: model_name,
                message: "model returned an empty answer".to_string(),
            });
        }

        info!(model = %model_name, source_count = results.len(), "synthesized answer");
        let sources = results.iter().map(|r| Source::from(&r.chunk)).collect();
        Ok(QueryResult { answer, sources })
    }
}
