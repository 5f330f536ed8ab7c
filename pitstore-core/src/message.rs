//! Change messages and their interpretation as PIT changes.
//!
//! Parsing happens in two stages. [`Message`] checks the envelope shape only.
//! [`PitChange::from_message`] then interprets the action and payload, but
//! only for messages of the `pit` kind; other kinds are never inspected, so
//! an action outside `create`, `update` and `delete` is only an error on a
//! `pit` message.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::PitEntity;

/// Message kind handled by this pipeline.
pub const PIT_KIND: &str = "pit";

/// Errors raised while parsing or interpreting a change message.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The message was not valid JSON or lacked envelope fields.
    #[error("failed to parse message: {0}")]
    Json(#[from] serde_json::Error),
    /// The action is outside the recognised set.
    #[error("unsupported action {action:?}; expected create, update or delete")]
    UnsupportedAction {
        /// Action text as received.
        action: String,
    },
    /// A PIT message carried no `meta.dataset`.
    #[error("{action} message has no meta.dataset")]
    MissingDataset {
        /// Action of the offending message.
        action: Action,
    },
    /// A PIT payload lacked required fields or had the wrong shape.
    #[error("invalid {action} payload: {source}")]
    InvalidPayload {
        /// Action of the offending message.
        action: Action,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// What a message asks the store to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Insert a new entity.
    Create,
    /// Replace an existing entity.
    Update,
    /// Remove an entity.
    Delete,
}

impl Action {
    /// Wire representation of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(MessageError::UnsupportedAction {
                action: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Partition key grouping entities from a common source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
}

/// A change message as received from the stream.
///
/// The action is kept as received. It is only checked for `pit` messages,
/// so other kinds pass through whatever vocabulary they use.
///
/// # Examples
/// ```
/// use pitstore_core::{Action, Message, MessageError, PitChange};
///
/// let message = Message::from_json(
///     r#"{"action": "create", "type": "pit", "meta": {"dataset": "d1"},
///         "payload": {"id": "a1", "type": "x"}}"#,
/// )?;
/// assert_eq!(message.action()?, Action::Create);
/// assert!(message.is_pit());
///
/// let merge = Message::from_json(r#"{"action": "merge", "type": "pit"}"#)?;
/// let err = PitChange::from_message(&merge).unwrap_err();
/// assert!(matches!(err, MessageError::UnsupportedAction { .. }));
/// # Ok::<(), pitstore_core::MessageError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Requested action as received.
    pub action: String,
    /// Kind of entity the payload describes.
    #[serde(rename = "type")]
    pub kind: String,
    /// Envelope metadata.
    #[serde(default)]
    pub meta: MessageMeta,
    /// Entity payload, interpreted according to `kind` and `action`.
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    /// Assemble a message from its parts.
    pub fn new(
        action: Action,
        kind: impl Into<String>,
        dataset: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            action: action.as_str().to_owned(),
            kind: kind.into(),
            meta: MessageMeta {
                dataset: Some(dataset.into()),
            },
            payload,
        }
    }

    /// Parse a message from JSON text.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a message from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        Ok(serde_json::from_value(value)?)
    }

    /// The action as a recognised [`Action`].
    ///
    /// Fails with [`MessageError::UnsupportedAction`] for any other text.
    pub fn action(&self) -> Result<Action, MessageError> {
        self.action.parse()
    }

    /// Whether this message belongs to the PIT pipeline.
    #[must_use]
    pub fn is_pit(&self) -> bool {
        self.kind == PIT_KIND
    }

    /// Dataset named in the envelope.
    #[must_use]
    pub fn dataset(&self) -> Option<&str> {
        self.meta.dataset.as_deref()
    }
}

#[derive(Deserialize)]
struct DeleteKey {
    id: String,
}

/// A PIT message reduced to what the store needs.
#[derive(Debug, Clone, PartialEq)]
pub enum PitChange {
    /// Insert or overwrite an entity (`create` and `update`).
    Upsert {
        /// Partition key.
        dataset: String,
        /// Full entity.
        entity: PitEntity,
    },
    /// Remove the entity with this key.
    Delete {
        /// Partition key.
        dataset: String,
        /// Entity identifier.
        id: String,
    },
}

impl PitChange {
    /// Interpret a message, returning `None` for kinds other than `pit`.
    ///
    /// The action is checked first, then the dataset, then the payload.
    ///
    /// Deletes only read `payload.id`; any other payload field is ignored.
    pub fn from_message(message: &Message) -> Result<Option<Self>, MessageError> {
        if !message.is_pit() {
            return Ok(None);
        }
        let action = message.action()?;
        let dataset = message
            .dataset()
            .ok_or(MessageError::MissingDataset { action })?
            .to_owned();
        let change = match action {
            Action::Create | Action::Update => Self::Upsert {
                dataset,
                entity: PitEntity::deserialize(&message.payload)
                    .map_err(|source| MessageError::InvalidPayload { action, source })?,
            },
            Action::Delete => Self::Delete {
                dataset,
                id: DeleteKey::deserialize(&message.payload)
                    .map_err(|source| MessageError::InvalidPayload { action, source })?
                    .id,
            },
        };
        Ok(Some(change))
    }

    /// Partition key of the change.
    #[must_use]
    pub fn dataset(&self) -> &str {
        match self {
            Self::Upsert { dataset, .. } | Self::Delete { dataset, .. } => dataset,
        }
    }

    /// Identifier of the affected entity.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Upsert { entity, .. } => &entity.id,
            Self::Delete { id, .. } => id,
        }
    }
}
