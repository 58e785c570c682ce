use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chatgpt::client::ChatGPT;
use chatgpt::types::{ChatMessage, CompletionResponse, Role};
use log::debug;

use crate::quiz::topics::{Topic, BLANK_MARKER};
use crate::tutor::{dictionary_prompt, TutorService};
use crate::vocab::VocabEntry;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("ChatGPT request failed: {0}")]
    ChatGpt(#[from] chatgpt::err::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("empty response")]
    Empty,
}

/// Fills the blank marker of a skeleton sentence.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, skeleton: &str) -> Result<String, ServiceError>;
}

/// Turns the learner's own chat messages into a raw JSON digest.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, user_texts: &[String]) -> Result<String, ServiceError>;
}

/// One-sentence rationale for a correct answer.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, sentence: &str, answer: &str, topic: Topic) -> Result<String, ServiceError>;
}

/// Awaits `call` for at most `limit`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(limit)),
    }
}

const COMPLETION_PROMPT: &str = "You fill in blanks in English sentences for grammar exercises.
Replace the <BLANK> marker with the single most natural word.
Reply with the full completed sentence only. No quotes, no explanations.";

const SUMMARIZER_PROMPT: &str = "You analyze English ability.

Output ONLY this JSON:
{
  \"vocab_weakness\": [...],
  \"grammar_patterns\": [...],
  \"common_mistakes\": [...],
  \"overall_skill\": \"...\"
}
Use these grammar labels where they apply: article, subject-verb-agreement, tense, preposition, comparative, wh-question.
overall_skill is one of Basic, Intermediate, Advanced.
If unsure, return empty lists and \"N/A\".";

const EXPLAIN_PROMPT: &str = "You are an English tutor. Explain grammar clearly and concisely.";

const TUTOR_PROMPT: &str = "English-learning assistant. Be simple and clear.
Only correct/explain grammar when asked.";

const INTENT_PROMPT: &str = "Intent analyzer for English-learning chatbot.

Intents:
- \"vocab_lookup\": asking word/phrase meaning
- \"grammar_correction\": asking sentence correction
- \"general_chat\": anything else

Extract targets:
- vocab_lookup: extract word/phrase as vocab_target
- grammar_correction: extract sentence as grammar_target
- general_chat: both null
- Prefer quoted text

Output JSON only (no markdown/backticks):
{
  \"intent\": \"vocab_lookup\" | \"grammar_correction\" | \"general_chat\",
  \"vocab_target\": string | null,
  \"grammar_target\": string | null
}";

const GRAMMAR_PROMPT: &str = "You are a grammar tutor. Follow this EXACT format:

Original: <original sentence>
Corrected: <corrected sentence>

Explanation:
1. Error Type: <1 sentence>
2. Why wrong: <1-2 sentences>
3. Correct Rule: <short rule>

No extra notes/examples.";

const VOCAB_PROMPT: &str = "You are an English vocabulary tutor. Use this exact format:

Word: <target>
Part of Speech: <pos>
Definition: <simple definition in 1-2 sentences>

Examples:
1. <full sentence>
2. <full sentence>

Synonyms: <list or \"None\">

Rules: No markdown, no phonetics, no translations. Fill all fields.
Prefer the dictionary data when it is given.";

pub struct QuizHelper {
    chat_gpt: ChatGPT,
}

impl QuizHelper {
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }

    async fn ask(&self, system: &str, user: String) -> Result<String, ServiceError> {
        let history = vec![
            ChatMessage {
                role: Role::System,
                content: system.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: user,
            },
        ];
        let response: CompletionResponse = self.chat_gpt.send_history(&history).await?;
        let content = response.message().content.trim().to_string();

        debug!("Completion: {:?}", content);

        if content.is_empty() {
            return Err(ServiceError::Empty);
        }
        Ok(content)
    }
}

#[async_trait]
impl Completer for QuizHelper {
    async fn complete(&self, skeleton: &str) -> Result<String, ServiceError> {
        debug!("Filling blank in: {:?}", skeleton);
        let prompt = format!("Sentence: {}\nThe blank is written as {}.", skeleton, BLANK_MARKER);
        let sentence = self.ask(COMPLETION_PROMPT, prompt).await?;
        // the model likes to wrap the sentence in quotes
        Ok(sentence.trim_matches('"').to_string())
    }
}

#[async_trait]
impl Summarizer for QuizHelper {
    async fn summarize(&self, user_texts: &[String]) -> Result<String, ServiceError> {
        debug!("Summarizing {} user messages", user_texts.len());
        self.ask(SUMMARIZER_PROMPT, format!("Messages:\n{}", user_texts.join("\n")))
            .await
    }
}

#[async_trait]
impl Explainer for QuizHelper {
    async fn explain(&self, sentence: &str, answer: &str, topic: Topic) -> Result<String, ServiceError> {
        debug!("Explaining {:?} in {:?}", answer, sentence);
        let prompt = format!(
            "Sentence: {}
Correct answer: {}
Grammar topic: {}

Give a short 1 sentence explanation of why this answer is correct.
Do NOT use headings, bullet points, or markdown.
Keep it concise and clear.",
            sentence, answer, topic
        );
        self.ask(EXPLAIN_PROMPT, prompt).await
    }
}

#[async_trait]
impl TutorService for QuizHelper {
    async fn classify(&self, message: &str) -> Result<String, ServiceError> {
        self.ask(INTENT_PROMPT, message.to_string()).await
    }

    async fn correct(&self, sentence: &str) -> Result<String, ServiceError> {
        debug!("Correcting {:?}", sentence);
        self.ask(GRAMMAR_PROMPT, format!("Original: {}", sentence)).await
    }

    async fn define(&self, target: &str, entry: Option<&VocabEntry>) -> Result<String, ServiceError> {
        self.ask(VOCAB_PROMPT, dictionary_prompt(target, entry)).await
    }

    async fn chat(&self, message: &str) -> Result<String, ServiceError> {
        self.ask(TUTOR_PROMPT, message.to_string()).await
    }
}

#[cfg(test)]
pub mod mock {
    //! Scripted services for engine tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned completions, then repeats the last one.
    #[derive(Default)]
    pub struct ScriptedCompleter {
        responses: Mutex<VecDeque<Result<String, ()>>>,
        last: Mutex<Option<Result<String, ()>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedCompleter {
        pub fn always(response: &str) -> Self {
            Self::scripted(vec![Ok(response.to_string())])
        }

        pub fn failing() -> Self {
            Self::scripted(vec![Err(())])
        }

        pub fn scripted(responses: Vec<Result<String, ()>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Completer for ScriptedCompleter {
        async fn complete(&self, _skeleton: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut responses = self.responses.lock().unwrap();
                let mut last = self.last.lock().unwrap();
                if let Some(response) = responses.pop_front() {
                    *last = Some(response);
                }
                last.clone()
            };
            match next {
                Some(Ok(sentence)) => Ok(sentence),
                _ => Err(ServiceError::Empty),
            }
        }
    }

    /// Fills the blank with a fixed word.
    pub struct EchoCompleter {
        pub word: String,
        pub calls: AtomicUsize,
    }

    impl EchoCompleter {
        pub fn new(word: &str) -> Self {
            Self {
                word: word.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Completer for EchoCompleter {
        async fn complete(&self, skeleton: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(skeleton.replace(BLANK_MARKER, &self.word))
        }
    }

    pub struct StaticSummarizer {
        pub response: Option<String>,
        pub calls: AtomicUsize,
    }

    impl StaticSummarizer {
        pub fn new(response: Option<&str>) -> Self {
            Self {
                response: response.map(str::to_string),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Summarizer for StaticSummarizer {
        async fn summarize(&self, _user_texts: &[String]) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone().ok_or(ServiceError::Empty)
        }
    }

    pub struct StaticExplainer(pub Option<String>);

    #[async_trait]
    impl Explainer for StaticExplainer {
        async fn explain(&self, _sentence: &str, answer: &str, _topic: Topic) -> Result<String, ServiceError> {
            match &self.0 {
                Some(text) => Ok(format!("{} ({})", text, answer)),
                None => Err(ServiceError::Empty),
            }
        }
    }
}
