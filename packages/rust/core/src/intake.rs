//! Regulation intake: clean raw input, extract the regulation text, and
//! either store it as a new regulation or fold it into the stored one.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use reglens_llm::{ChatClient, ChatRequest};
use reglens_shared::{Chunk, MergeResult, RegLensError, Regulation, Result};
use reglens_storage::RegulationRepository;
use reglens_text::preprocess;

use crate::merge::MergeRequester;

/// System role for the extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a data scientist.";

/// Marker that identifies a standalone new regulation.
pub const NEW_REGULATION_MARKER: &str = "Addendum";

/// How an extracted text is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeKind {
    NewRegulation,
    Amendment,
}

/// Texts mentioning "Addendum" are new regulations; everything else amends
/// the regulation stored under the same key.
pub fn classify(text: &str) -> IntakeKind {
    if text.contains(NEW_REGULATION_MARKER) {
        IntakeKind::NewRegulation
    } else {
        IntakeKind::Amendment
    }
}

/// What the repository ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeAction {
    /// Stored as a new regulation.
    Inserted,
    /// An amendment whose key was unknown, stored as a new regulation.
    InsertedUnknownKey,
    /// Merged into the stored body and recorded in the history.
    Amended,
    /// Merge kept the stored body; nothing written.
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub kind: IntakeKind,
    pub action: IntakeAction,
    pub regulation: Regulation,
    /// Present when an amendment was merged against a stored body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeResult>,
}

/// Runs the intake workflow against a [`RegulationRepository`].
pub struct RegulationIntake {
    client: Arc<dyn ChatClient>,
    merger: MergeRequester,
}

impl RegulationIntake {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        let merger = MergeRequester::new(client.clone());
        Self { client, merger }
    }

    /// Ask the reasoning collaborator for the regulation text contained in `data`.
    pub async fn extract(&self, data: &str) -> Result<String> {
        let request = ChatRequest::new().system(EXTRACTION_SYSTEM_PROMPT).user(format!(
            "Extract the regulation or amendment text from the data below. \
             Return only that text.\n\n{data}"
        ));
        let extracted = self.client.complete(&request).await?;
        let extracted = extracted.trim();
        if extracted.is_empty() {
            return Err(RegLensError::ExternalCall(
                "malformed response: empty extraction".into(),
            ));
        }
        Ok(extracted.to_string())
    }

    /// Preprocess `raw`, optionally extract, classify and persist under `key`.
    #[instrument(skip_all, fields(key = key, extract = extract))]
    pub async fn ingest(
        &self,
        repo: &dyn RegulationRepository,
        key: &str,
        title: Option<&str>,
        raw: &str,
        extract: bool,
    ) -> Result<IntakeOutcome> {
        let cleaned = preprocess(raw);
        if cleaned.is_empty() {
            return Err(RegLensError::validation("input contains no text"));
        }
        let text = if extract {
            self.extract(&cleaned).await?
        } else {
            cleaned
        };

        let kind = classify(&text);
        let existing = repo.find_by_key(key).await?;
        info!(?kind, exists = existing.is_some(), "classified intake");

        match (kind, existing) {
            (IntakeKind::NewRegulation, Some(_)) => Err(RegLensError::validation(format!(
                "regulation `{key}` already exists; choose another key for a new regulation"
            ))),
            (IntakeKind::NewRegulation, None) => Ok(IntakeOutcome {
                kind,
                action: IntakeAction::Inserted,
                regulation: repo.insert(key, title, &text).await?,
                merge: None,
            }),
            (IntakeKind::Amendment, None) => {
                warn!(key, "amendment for unknown regulation, storing as new");
                Ok(IntakeOutcome {
                    kind,
                    action: IntakeAction::InsertedUnknownKey,
                    regulation: repo.insert(key, title, &text).await?,
                    merge: None,
                })
            }
            (IntakeKind::Amendment, Some(current)) => {
                let merge = self
                    .merger
                    .merge_pair(&Chunk::new(0, current.body.as_str()), &Chunk::new(0, text.as_str()))
                    .await;

                if !merge.changed() {
                    if merge.fallback {
                        warn!(key, "merge failed, stored regulation kept");
                    }
                    return Ok(IntakeOutcome {
                        kind,
                        action: IntakeAction::Unchanged,
                        regulation: current,
                        merge: Some(merge),
                    });
                }

                let regulation = repo.update(key, &merge.updated.text, &text).await?;
                info!(key, hash = %regulation.content_hash, "regulation amended");
                Ok(IntakeOutcome {
                    kind,
                    action: IntakeAction::Amended,
                    regulation,
                    merge: Some(merge),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChat;
    use reglens_storage::Storage;
    use reglens_llm::Role;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("rl_intake_{}.db", uuid::Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[test]
    fn addendum_marks_new_regulation() {
        assert_eq!(classify("Addendum 3: capital buffers"), IntakeKind::NewRegulation);
        assert_eq!(classify("Article 2 is replaced by"), IntakeKind::Amendment);
        assert_eq!(classify("addendum in lower case"), IntakeKind::Amendment);
    }

    #[tokio::test]
    async fn extraction_uses_data_scientist_role() {
        let chat = Arc::new(ScriptedChat::fixed("  Article 1. Scope.  "));
        let intake = RegulationIntake::new(chat.clone());
        assert_eq!(intake.extract("<p>Article 1. Scope.</p>").await.unwrap(), "Article 1. Scope.");

        let req = &chat.requests()[0];
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].content, "You are a data scientist.");
        assert!(req.messages[1].content.ends_with("<p>Article 1. Scope.</p>"));
    }

    #[tokio::test]
    async fn new_regulation_is_inserted_from_html() {
        let repo = test_storage().await;
        let intake = RegulationIntake::new(Arc::new(ScriptedChat::failing()));

        let outcome = intake
            .ingest(&repo, "reg-1", Some("Buffers"), "<h1>Addendum 1</h1><p>Banks hold buffers.</p>", false)
            .await
            .unwrap();
        assert_eq!(outcome.kind, IntakeKind::NewRegulation);
        assert_eq!(outcome.action, IntakeAction::Inserted);
        assert!(!outcome.regulation.body.contains('<'));
        assert!(repo.find_by_key("reg-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_new_regulation_rejected() {
        let repo = test_storage().await;
        repo.insert("reg-1", None, "Addendum 1").await.unwrap();
        let intake = RegulationIntake::new(Arc::new(ScriptedChat::failing()));
        let err = intake
            .ingest(&repo, "reg-1", None, "Addendum 2", false)
            .await
            .unwrap_err();
        assert!(matches!(err, RegLensError::Validation { .. }));
    }

    #[tokio::test]
    async fn amendment_is_merged_and_recorded() {
        let repo = test_storage().await;
        let original = repo.insert("reg-1", None, "Fees are 5%.").await.unwrap();
        let intake = RegulationIntake::new(Arc::new(ScriptedChat::fixed("Fees are 7%.")));

        let outcome = intake
            .ingest(&repo, "reg-1", None, "Fees change to 7%.", false)
            .await
            .unwrap();
        assert_eq!(outcome.action, IntakeAction::Amended);
        assert_eq!(outcome.regulation.body, "Fees are 7%.");

        let history = repo.amendments(&original.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "Fees change to 7%.");
        assert_eq!(history[0].previous_hash, original.content_hash);
    }

    #[tokio::test]
    async fn failed_merge_leaves_repository_untouched() {
        let repo = test_storage().await;
        let original = repo.insert("reg-1", None, "Fees are 5%.").await.unwrap();
        let intake = RegulationIntake::new(Arc::new(ScriptedChat::failing()));

        let outcome = intake
            .ingest(&repo, "reg-1", None, "Fees change to 7%.", false)
            .await
            .unwrap();
        assert_eq!(outcome.action, IntakeAction::Unchanged);
        assert!(outcome.merge.as_ref().is_some_and(|m| m.fallback));
        assert_eq!(repo.find_by_key("reg-1").await.unwrap().unwrap().body, "Fees are 5%.");
        assert!(repo.amendments(&original.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn amendment_for_unknown_key_is_inserted() {
        let repo = test_storage().await;
        let intake = RegulationIntake::new(Arc::new(ScriptedChat::failing()));
        let outcome = intake
            .ingest(&repo, "reg-9", None, "Article 2 is replaced.", false)
            .await
            .unwrap();
        assert_eq!(outcome.action, IntakeAction::InsertedUnknownKey);
    }

    #[tokio::test]
    async fn empty_input_rejected() {
        let repo = test_storage().await;
        let intake = RegulationIntake::new(Arc::new(ScriptedChat::failing()));
        assert!(intake.ingest(&repo, "k", None, "<p>  </p>", false).await.is_err());
    }
}
