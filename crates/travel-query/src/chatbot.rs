//! Question answering over a retriever.

use serde::Serialize;
use tracing::debug;

use travel_core::{CandidateDocument, Retriever};

use crate::format::format_answer;

/// Words that end a chat session, compared case-insensitively.
pub const EXIT_WORDS: &[&str] = &["exit", "quit", "bye"];

/// A formatted answer and the documents behind it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Rendered answer text.
    pub text: String,

    /// Documents in ordinal order: `#n` in `text` is `documents[n - 1]`.
    pub documents: Vec<CandidateDocument>,
}

/// One line of chat input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput<'a> {
    /// End the session.
    Exit,
    /// Blank line; prompt again.
    Skip,
    /// A question, trimmed.
    Question(&'a str),
}

impl<'a> ChatInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self::Skip
        } else if EXIT_WORDS.iter().any(|w| trimmed.eq_ignore_ascii_case(w)) {
            Self::Exit
        } else {
            Self::Question(trimmed)
        }
    }
}

/// Travel chatbot: retrieves landmarks for a question and formats them.
pub struct TravelChatbot<R> {
    retriever: R,
}

impl<R: Retriever> TravelChatbot<R> {
    pub fn new(retriever: R) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Answer a question, keeping the documents alongside the text.
    pub async fn answer(&self, question: &str) -> Answer {
        let documents = self.retriever.retrieve(question).await;
        debug!("Formatting {} documents", documents.len());
        Answer {
            text: format_answer(&documents),
            documents,
        }
    }

    /// Answer a question as text.
    pub async fn answer_question(&self, question: &str) -> String {
        self.answer(question).await.text
    }
}
