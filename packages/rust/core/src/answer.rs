//! Grounded question answering over a ranked context.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use reglens_llm::{ChatClient, ChatRequest, Embedder};
use reglens_shared::{DocumentSection, RankedContext};

use crate::retrieval::ContextRanker;

/// Fill the answer instruction with the rendered context and the question.
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question  based on the article below. Answer must contain text from the article only. \
         If the question can't be answered from the text in the article, then tell the user that you don't know. \
         article: {context} Question: {question} Provide the response in below format.\n\
         \"Answer\": str \"article_id\": str \"article_text\": str"
    )
}

/// Asks the reasoning collaborator to answer from a context window only.
#[derive(Clone)]
pub struct AnswerRequester {
    client: Arc<dyn ChatClient>,
    temperature: f32,
}

impl AnswerRequester {
    pub fn new(client: Arc<dyn ChatClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    /// Answer `question` from `context`. Any failure yields an empty string.
    #[instrument(skip_all, fields(sections = context.sections.len()))]
    pub async fn answer(&self, context: &RankedContext, question: &str) -> String {
        let request = ChatRequest::new()
            .user(answer_prompt(&context.render(), question))
            .temperature(self.temperature);

        match self.client.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "answer unavailable");
                String::new()
            }
        }
    }
}

/// Outcome of one question: the context it was answered from and the raw answer.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub context: RankedContext,
    /// Empty when no answer could be produced.
    pub answer: String,
}

impl AskOutcome {
    fn unavailable() -> Self {
        Self {
            context: RankedContext::default(),
            answer: String::new(),
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.answer.trim().is_empty()
    }

    pub fn grounded(&self) -> GroundedAnswer {
        GroundedAnswer::parse(&self.answer)
    }
}

/// Embed the question, rank `sections` against it and ask for an answer.
/// A failed question embedding or an unrankable query yields an empty answer.
#[instrument(skip_all, fields(sections = sections.len()))]
pub async fn ask(
    question: &str,
    sections: &[DocumentSection],
    embedder: &dyn Embedder,
    ranker: &ContextRanker,
    answerer: &AnswerRequester,
) -> AskOutcome {
    let query = match embedder.embed(question).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "question embedding failed, answer unavailable");
            return AskOutcome::unavailable();
        }
    };

    let context = match ranker.rank(&query, sections) {
        Ok(context) => context,
        Err(e) => {
            warn!(error = %e, "ranking failed, answer unavailable");
            return AskOutcome::unavailable();
        }
    };
    info!(selected = ?context.ids(), tokens = context.total_tokens, "context ranked");
    let answer = answerer.answer(&context, question).await;
    AskOutcome { context, answer }
}

/// Best-effort parse of the `"Answer"` / `"article_id"` / `"article_text"`
/// response format. The raw text is always kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroundedAnswer {
    pub raw: String,
    pub answer: Option<String>,
    pub article_id: Option<String>,
    pub article_text: Option<String>,
}

#[derive(Deserialize)]
struct JsonAnswer {
    #[serde(rename = "Answer", alias = "answer")]
    answer: Option<String>,
    article_id: Option<String>,
    article_text: Option<String>,
}

/// A field key either quoted or at the start of a line.
static FIELD_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)(?:"(answer|article_id|article_text)"|^[ \t]*(answer|article_id|article_text))\s*:"#)
        .expect("valid regex")
});

impl GroundedAnswer {
    pub fn parse(raw: &str) -> Self {
        let mut parsed = Self {
            raw: raw.to_string(),
            ..Self::default()
        };

        let trimmed = raw.trim();
        if let Ok(json) = serde_json::from_str::<JsonAnswer>(trimmed) {
            parsed.answer = json.answer;
            parsed.article_id = json.article_id;
            parsed.article_text = json.article_text;
            return parsed;
        }

        let keys: Vec<_> = FIELD_KEY
            .captures_iter(trimmed)
            .filter_map(|c| {
                let name = c.get(1).or_else(|| c.get(2))?;
                Some((c.get(0)?, name.as_str().to_ascii_lowercase()))
            })
            .collect();

        for (i, (whole, name)) in keys.iter().enumerate() {
            let end = keys.get(i + 1).map_or(trimmed.len(), |(next, _)| next.start());
            let value = clean_value(&trimmed[whole.end()..end]);
            if value.is_empty() {
                continue;
            }
            let slot = match name.as_str() {
                "answer" => &mut parsed.answer,
                "article_id" => &mut parsed.article_id,
                _ => &mut parsed.article_text,
            };
            slot.get_or_insert(value);
        }
        parsed
    }
}

fn clean_value(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| c == ',' || c == '{' || c == '}' || c.is_whitespace())
        .trim_matches('"')
        .trim()
        .to_string()
}
