//! Draft/published/searchable state machine for envelopes.
//!
//! The draft and published slots are independent: a document may have both,
//! either, or neither. Transitions are pure functions on [`PublicationSlots`];
//! the database layer loads the slots under a row lock, applies a transition,
//! and writes the result back in the same transaction. An invalid transition
//! is always reported as [`Error::InvalidState`] and never silently ignored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Which slots of an envelope are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
    Empty,
    DraftOnly,
    PublishedOnly,
    DraftAndPublished,
}

/// What `create_standalone_draft` has to do for the current slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    /// A draft already exists; hand it back unchanged.
    Existing(Uuid),
    /// Clone this published version into a new draft version.
    CloneFrom(Uuid),
}

/// Draft and published pointers plus the searchable flag.
///
/// `searchable` is scoped to the published slot; it is cleared whenever the
/// published slot is cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationSlots {
    pub draft_version_id: Option<Uuid>,
    pub published_version_id: Option<Uuid>,
    pub searchable: bool,
}

impl PublicationSlots {
    /// Slots for a new envelope whose first version starts out as the draft.
    pub fn with_draft(draft_version_id: Uuid) -> Self {
        Self {
            draft_version_id: Some(draft_version_id),
            ..Self::default()
        }
    }

    pub fn state(&self) -> PublicationState {
        match (self.draft_version_id, self.published_version_id) {
            (None, None) => PublicationState::Empty,
            (Some(_), None) => PublicationState::DraftOnly,
            (None, Some(_)) => PublicationState::PublishedOnly,
            (Some(_), Some(_)) => PublicationState::DraftAndPublished,
        }
    }

    /// True when the published version should be exposed to search.
    pub fn is_indexed(&self) -> bool {
        self.published_version_id.is_some() && self.searchable
    }

    /// Copy the draft into the published slot. The draft slot is kept.
    pub fn publish(self, version_id: Uuid, make_searchable: bool) -> Result<Self> {
        match self.draft_version_id {
            Some(draft) if draft == version_id => Ok(Self {
                published_version_id: Some(version_id),
                searchable: make_searchable,
                ..self
            }),
            Some(_) => Err(Error::InvalidState(format!(
                "version {} is not the current draft",
                version_id
            ))),
            None => Err(Error::InvalidState(format!(
                "cannot publish version {}: envelope has no draft",
                version_id
            ))),
        }
    }

    /// Clear the published slot and the searchable flag. The draft is kept.
    pub fn unpublish(self) -> Result<Self> {
        if self.published_version_id.is_none() {
            return Err(Error::InvalidState(
                "envelope is not published".to_string(),
            ));
        }
        Ok(Self {
            published_version_id: None,
            searchable: false,
            ..self
        })
    }

    pub fn toggle_searchable(self) -> Result<Self> {
        if self.published_version_id.is_none() {
            return Err(Error::InvalidState(
                "searchable can only be toggled on a published envelope".to_string(),
            ));
        }
        Ok(Self {
            searchable: !self.searchable,
            ..self
        })
    }

    /// Decide how a standalone draft is obtained.
    pub fn draft_source(&self) -> Result<DraftSource> {
        match (self.draft_version_id, self.published_version_id) {
            (Some(draft), _) => Ok(DraftSource::Existing(draft)),
            (None, Some(published)) => Ok(DraftSource::CloneFrom(published)),
            (None, None) => Err(Error::InvalidState(
                "envelope has neither a draft nor a published version".to_string(),
            )),
        }
    }

    /// Install a newly cloned draft. Only valid when the draft slot is empty.
    pub fn set_draft(self, version_id: Uuid) -> Result<Self> {
        if let Some(existing) = self.draft_version_id {
            return Err(Error::InvalidState(format!(
                "envelope already has draft {}",
                existing
            )));
        }
        Ok(Self {
            draft_version_id: Some(version_id),
            ..self
        })
    }

    /// Remove the draft pointer. The version row itself stays in history.
    pub fn discard_draft(self) -> Result<Self> {
        if self.draft_version_id.is_none() {
            return Err(Error::InvalidState("envelope has no draft".to_string()));
        }
        Ok(Self {
            draft_version_id: None,
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_state_covers_all_slot_combinations() {
        let (a, b) = ids();
        assert_eq!(PublicationSlots::default().state(), PublicationState::Empty);
        assert_eq!(
            PublicationSlots::with_draft(a).state(),
            PublicationState::DraftOnly
        );
        let published_only = PublicationSlots {
            published_version_id: Some(b),
            ..Default::default()
        };
        assert_eq!(published_only.state(), PublicationState::PublishedOnly);
        let both = PublicationSlots {
            draft_version_id: Some(a),
            published_version_id: Some(b),
            searchable: false,
        };
        assert_eq!(both.state(), PublicationState::DraftAndPublished);
    }

    #[test]
    fn test_publish_keeps_draft_and_sets_searchable() {
        let (draft, _) = ids();
        let slots = PublicationSlots::with_draft(draft)
            .publish(draft, true)
            .unwrap();
        assert_eq!(slots.draft_version_id, Some(draft));
        assert_eq!(slots.published_version_id, Some(draft));
        assert!(slots.searchable);
        assert!(slots.is_indexed());
    }

    #[test]
    fn test_publish_non_draft_is_invalid_state() {
        let (draft, other) = ids();
        let before = PublicationSlots::with_draft(draft);
        let err = before.publish(other, true).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        // Original value is untouched (Copy), published slot still empty.
        assert!(before.published_version_id.is_none());
    }

    #[test]
    fn test_publish_without_draft_is_invalid_state() {
        let (v, _) = ids();
        let err = PublicationSlots::default().publish(v, false).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_publish_replaces_previous_published() {
        let (old, new) = ids();
        let slots = PublicationSlots {
            draft_version_id: Some(new),
            published_version_id: Some(old),
            searchable: true,
        };
        let slots = slots.publish(new, false).unwrap();
        assert_eq!(slots.published_version_id, Some(new));
        assert!(!slots.searchable);
    }

    #[test]
    fn test_publish_then_toggle_searchable() {
        let (draft, _) = ids();
        let published = PublicationSlots::with_draft(draft)
            .publish(draft, true)
            .unwrap();
        let toggled = published.toggle_searchable().unwrap();
        assert!(!toggled.searchable);
        assert_eq!(toggled.published_version_id, Some(draft));
    }

    #[test]
    fn test_toggle_searchable_without_published_is_invalid_state() {
        let (draft, _) = ids();
        let err = PublicationSlots::with_draft(draft)
            .toggle_searchable()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_unpublish_clears_published_and_searchable_only() {
        let (draft, _) = ids();
        let slots = PublicationSlots::with_draft(draft)
            .publish(draft, true)
            .unwrap()
            .unpublish()
            .unwrap();
        assert_eq!(slots.draft_version_id, Some(draft));
        assert!(slots.published_version_id.is_none());
        assert!(!slots.searchable);
    }

    #[test]
    fn test_unpublish_when_not_published_is_invalid_state() {
        let err = PublicationSlots::default().unpublish().unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_draft_source_prefers_existing_draft() {
        let (draft, published) = ids();
        let slots = PublicationSlots {
            draft_version_id: Some(draft),
            published_version_id: Some(published),
            searchable: true,
        };
        assert_eq!(slots.draft_source().unwrap(), DraftSource::Existing(draft));
    }

    #[test]
    fn test_draft_source_clones_published() {
        let (_, published) = ids();
        let slots = PublicationSlots {
            published_version_id: Some(published),
            ..Default::default()
        };
        assert_eq!(
            slots.draft_source().unwrap(),
            DraftSource::CloneFrom(published)
        );
    }

    #[test]
    fn test_draft_source_empty_is_invalid_state() {
        assert!(matches!(
            PublicationSlots::default().draft_source(),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_set_draft_rejects_occupied_slot() {
        let (a, b) = ids();
        assert!(PublicationSlots::with_draft(a).set_draft(b).is_err());
        let slots = PublicationSlots::default().set_draft(b).unwrap();
        assert_eq!(slots.draft_version_id, Some(b));
    }

    #[test]
    fn test_discard_draft_keeps_published() {
        let (draft, _) = ids();
        let slots = PublicationSlots::with_draft(draft)
            .publish(draft, true)
            .unwrap()
            .discard_draft()
            .unwrap();
        assert!(slots.draft_version_id.is_none());
        assert_eq!(slots.published_version_id, Some(draft));
        assert!(slots.searchable);
    }

    #[test]
    fn test_discard_draft_without_draft_is_invalid_state() {
        assert!(matches!(
            PublicationSlots::default().discard_draft(),
            Err(Error::InvalidState(_))
        ));
    }
}
