//! Admin edit sessions, one per collection.
//!
//! `Idle -> Editing -> Submitting -> Idle` on success, or back to `Editing`
//! with the draft and error kept on failure. Every submit is numbered; a
//! result for any number other than the latest is ignored.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::Collection;

const INTERRUPTED: &str = "submission was interrupted before it completed";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("a submission is already in progress")]
    SubmissionInProgress,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditState {
    #[default]
    Idle,
    Editing {
        draft: Value,
        error: Option<String>,
    },
    Submitting {
        draft: Value,
    },
}

#[derive(Debug, Default)]
pub struct EditSession {
    state: EditState,
    generation: u64,
}

impl EditSession {
    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn open(&mut self, draft: Value) -> Result<(), EditorError> {
        if matches!(self.state, EditState::Submitting { .. }) {
            return Err(EditorError::SubmissionInProgress);
        }
        self.state = EditState::Editing { draft, error: None };
        Ok(())
    }

    /// Moves to `Submitting` and returns the number of this submit.
    pub fn begin_submit(&mut self, draft: Value) -> Result<u64, EditorError> {
        if matches!(self.state, EditState::Submitting { .. }) {
            return Err(EditorError::SubmissionInProgress);
        }
        self.generation += 1;
        self.state = EditState::Submitting { draft };
        Ok(self.generation)
    }

    /// Applies the result of submit `generation`. Returns `false` when the
    /// result is stale and was ignored.
    pub fn settle(&mut self, generation: u64, result: Result<(), String>) -> bool {
        if generation != self.generation {
            return false;
        }
        let EditState::Submitting { draft } = std::mem::take(&mut self.state) else {
            return false;
        };

        self.state = match result {
            Ok(()) => EditState::Idle,
            Err(error) => EditState::Editing {
                draft,
                error: Some(error),
            },
        };
        true
    }

    /// Drops the draft. An in-flight submit is orphaned: its result will be
    /// ignored.
    pub fn cancel(&mut self) {
        if matches!(self.state, EditState::Submitting { .. }) {
            self.generation += 1;
        }
        self.state = EditState::Idle;
    }
}

/// Edit sessions for every collection, shared across requests.
#[derive(Clone, Default)]
pub struct Editors {
    sessions: Arc<Mutex<HashMap<Collection, EditSession>>>,
}

impl Editors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, collection: Collection) -> EditState {
        self.sessions
            .lock()
            .get(&collection)
            .map(|session| session.state().clone())
            .unwrap_or_default()
    }

    pub fn open(&self, collection: Collection, draft: Value) -> Result<EditState, EditorError> {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(collection).or_default();
        session.open(draft)?;
        Ok(session.state().clone())
    }

    pub fn cancel(&self, collection: Collection) -> EditState {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(collection).or_default();
        session.cancel();
        session.state().clone()
    }

    pub fn begin_submit(
        &self,
        collection: Collection,
        draft: Value,
    ) -> Result<SubmitTicket, EditorError> {
        let generation = self
            .sessions
            .lock()
            .entry(collection)
            .or_default()
            .begin_submit(draft)?;

        debug!(%collection, generation, "Submission started");
        Ok(SubmitTicket {
            editors: self.clone(),
            collection,
            generation,
            settled: false,
        })
    }

    fn settle(&self, collection: Collection, generation: u64, result: Result<(), String>) {
        let applied = self
            .sessions
            .lock()
            .get_mut(&collection)
            .is_some_and(|session| session.settle(generation, result));

        if !applied {
            debug!(%collection, generation, "Ignoring stale submission result");
        }
    }
}

/// An in-flight submit. Dropping it unsettled counts as a failure, so the
/// session never stays stuck in `Submitting`.
pub struct SubmitTicket {
    editors: Editors,
    collection: Collection,
    generation: u64,
    settled: bool,
}

impl SubmitTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.editors.settle(self.collection, self.generation, Ok(()));
    }

    pub fn fail(mut self, error: impl Into<String>) {
        self.settled = true;
        self.editors
            .settle(self.collection, self.generation, Err(error.into()));
    }
}

impl Drop for SubmitTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.editors
                .settle(self.collection, self.generation, Err(INTERRUPTED.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_successful_submit_returns_to_idle() {
        let mut session = EditSession::default();
        session.open(json!({ "title": "Draft" })).unwrap();

        let generation = session.begin_submit(json!({ "title": "Draft" })).unwrap();
        assert!(session.settle(generation, Ok(())));
        assert_eq!(session.state(), &EditState::Idle);
    }

    #[test]
    fn test_failed_submit_keeps_draft_and_error() {
        let mut session = EditSession::default();
        let draft = json!({ "title": "" });

        let generation = session.begin_submit(draft.clone()).unwrap();
        session.settle(generation, Err("title cannot be blank".to_string()));

        assert_eq!(
            session.state(),
            &EditState::Editing {
                draft,
                error: Some("title cannot be blank".to_string()),
            }
        );
    }

    #[test]
    fn test_second_submit_is_rejected() {
        let mut session = EditSession::default();
        session.begin_submit(json!({})).unwrap();

        assert_eq!(
            session.begin_submit(json!({})),
            Err(EditorError::SubmissionInProgress)
        );
        assert_eq!(session.open(json!({})), Err(EditorError::SubmissionInProgress));
    }

    #[test]
    fn test_results_after_cancel_are_ignored() {
        let mut session = EditSession::default();
        let generation = session.begin_submit(json!({ "name": "Deck chair" })).unwrap();

        session.cancel();
        assert!(!session.settle(generation, Err("late failure".to_string())));
        assert_eq!(session.state(), &EditState::Idle);

        let next = session.begin_submit(json!({})).unwrap();
        assert!(!session.settle(generation, Ok(())));
        assert!(session.settle(next, Ok(())));
    }

    #[test]
    fn test_dropped_ticket_fails_the_submit() {
        let editors = Editors::new();
        let ticket = editors
            .begin_submit(Collection::Articles, json!({ "title": "Eid" }))
            .unwrap();
        assert!(matches!(
            editors.state(Collection::Articles),
            EditState::Submitting { .. }
        ));

        drop(ticket);
        assert!(matches!(
            editors.state(Collection::Articles),
            EditState::Editing { error: Some(_), .. }
        ));
    }

    #[test]
    fn test_collections_are_independent() {
        let editors = Editors::new();
        let ticket = editors
            .begin_submit(Collection::Products, json!({}))
            .unwrap();

        assert!(editors.open(Collection::Schedules, json!({})).is_ok());
        assert_eq!(
            editors.begin_submit(Collection::Products, json!({})).err(),
            Some(EditorError::SubmissionInProgress)
        );

        ticket.succeed();
        assert_eq!(editors.state(Collection::Products), EditState::Idle);
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let state = EditState::Submitting {
            draft: json!({ "title": "Eid" }),
        };
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({ "state": "submitting", "draft": { "title": "Eid" } })
        );
    }
}
