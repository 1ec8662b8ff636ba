//! Chat sessions, their messages, and the typing indicator.
//!
//! [`ChatState`] is the value; [`ChatAction`] lists every way it can change;
//! [`ChatStore`] is the handle the application holds.  Actions naming a
//! session that does not exist are silent no-ops: the store reports `false`
//! and leaves the state untouched.
//!
//! Sessions are held behind `Arc`, so applying an action copies only the
//! session it touches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::client::{ChatClient, StreamSummary};
use crate::error::Result;
use crate::ids::TimeOrderedIds;
use crate::store::{Reducer, Store, Subscription};
use crate::types::{Message, Sender, Session, SessionPatch};
use crate::utils::time::now;

/// Every chat session the application knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    /// Sessions in creation order, unique by id.
    pub sessions: Vec<Arc<Session>>,

    /// The session the UI is focused on.
    pub active_session_id: Option<String>,

    /// True while a streamed bot response is in flight.
    pub is_bot_typing: bool,
}

/// The actions understood by [`ChatState`].
///
/// Actions carry their own timestamps and ids so that applying them is
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    /// Append a new empty session and make it active.
    CreateSession {
        /// Id of the new session; must not be in use.
        id: String,
        /// Title of the new session.
        title: String,
        /// Creation time.
        now: OffsetDateTime,
    },
    /// Append a message to a session.
    AddMessage {
        /// Target session.
        session_id: String,
        /// The message to append.
        message: Message,
        /// Update time.
        now: OffsetDateTime,
    },
    /// Point the UI at a session, or at nothing.
    SetActiveSession(Option<String>),
    /// Raise or lower the typing indicator.
    SetBotTyping(bool),
    /// Shallow-merge fields into a session.
    UpdateSession {
        /// Target session.
        session_id: String,
        /// Fields to replace.
        patch: SessionPatch,
        /// Update time.
        now: OffsetDateTime,
    },
    /// Remove a session.
    DeleteSession(String),
    /// Flip a session's archived flag.
    ArchiveSession {
        /// Target session.
        session_id: String,
        /// Update time.
        now: OffsetDateTime,
    },
    /// Replace the whole collection, e.g. with the backend's listing.
    ReplaceSessions(Vec<Session>),
    /// Rebuild the last message of a session with extra text at the end.
    AppendToLastMessage {
        /// Target session.
        session_id: String,
        /// Text to append.
        fragment: String,
        /// Update time.
        now: OffsetDateTime,
    },
    /// Rebuild one message of a session with extra text at the end.
    AppendToMessage {
        /// Target session.
        session_id: String,
        /// Target message; no-op once it is gone.
        message_id: String,
        /// Text to append.
        fragment: String,
        /// Update time.
        now: OffsetDateTime,
    },
}

impl ChatState {
    /// Look up a session by id.
    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.id == session_id)
            .map(Arc::as_ref)
    }

    /// The active session, if the pointer resolves.
    pub fn active_session(&self) -> Option<&Session> {
        self.active_session_id
            .as_deref()
            .and_then(|id| self.session(id))
    }

    /// Sessions whose title or any message text contains `query`, ignoring
    /// case, in their original order.
    pub fn search(&self, query: &str) -> Vec<Session> {
        let needle = query.to_lowercase();
        self.sessions
            .iter()
            .filter(|s| s.matches(&needle))
            .map(|s| Session::clone(s))
            .collect()
    }

    fn position(&self, session_id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == session_id)
    }

    fn with_session(&self, session_id: &str, f: impl FnOnce(&mut Session) -> bool) -> Option<Self> {
        let idx = self.position(session_id)?;
        let mut next = self.clone();
        if f(Arc::make_mut(&mut next.sessions[idx])) {
            Some(next)
        } else {
            None
        }
    }
}

impl Reducer for ChatState {
    type Action = ChatAction;

    fn apply(&self, action: ChatAction) -> Option<Self> {
        match action {
            ChatAction::CreateSession { id, title, now } => {
                if self.position(&id).is_some() {
                    return None;
                }
                let mut next = self.clone();
                next.active_session_id = Some(id.clone());
                next.sessions.push(Arc::new(Session::new(id, title, now)));
                Some(next)
            }
            ChatAction::AddMessage {
                session_id,
                message,
                now,
            } => self.with_session(&session_id, |session| {
                session.messages.push(message);
                session.updated_at = now;
                true
            }),
            ChatAction::SetActiveSession(session_id) => {
                if self.active_session_id == session_id {
                    return None;
                }
                let mut next = self.clone();
                next.active_session_id = session_id;
                Some(next)
            }
            ChatAction::SetBotTyping(typing) => {
                if self.is_bot_typing == typing {
                    return None;
                }
                let mut next = self.clone();
                next.is_bot_typing = typing;
                Some(next)
            }
            ChatAction::UpdateSession {
                session_id,
                patch,
                now,
            } => self.with_session(&session_id, |session| {
                session.apply_patch(patch, now);
                true
            }),
            ChatAction::DeleteSession(session_id) => {
                let idx = self.position(&session_id)?;
                let mut next = self.clone();
                next.sessions.remove(idx);
                if next.active_session_id.as_deref() == Some(session_id.as_str()) {
                    next.active_session_id = None;
                }
                Some(next)
            }
            ChatAction::ArchiveSession { session_id, now } => {
                self.with_session(&session_id, |session| {
                    session.is_archived = !session.is_archived;
                    session.updated_at = now;
                    true
                })
            }
            ChatAction::ReplaceSessions(sessions) => {
                let mut next = self.clone();
                next.sessions = Vec::with_capacity(sessions.len());
                for session in sessions {
                    if next.position(&session.id).is_none() {
                        next.sessions.push(Arc::new(session));
                    }
                }
                if next.active_session().is_none() {
                    next.active_session_id = None;
                }
                Some(next)
            }
            ChatAction::AppendToLastMessage {
                session_id,
                fragment,
                now,
            } => self.with_session(&session_id, |session| {
                let Some(last) = session.messages.last_mut() else {
                    return false;
                };
                *last = last.extended(&fragment);
                session.updated_at = now;
                true
            }),
            ChatAction::AppendToMessage {
                session_id,
                message_id,
                fragment,
                now,
            } => {
                let session = self.session(&session_id)?;
                session.messages.iter().position(|m| m.id == message_id)?;
                self.with_session(&session_id, |session| {
                    let Some(message) = session.messages.iter_mut().find(|m| m.id == message_id)
                    else {
                        return false;
                    };
                    *message = message.extended(&fragment);
                    session.updated_at = now;
                    true
                })
            }
        }
    }
}

/// Handle to the application's chat state.
///
/// Create one per application and pass it to whatever needs it.
#[derive(Debug)]
pub struct ChatStore {
    store: Store<ChatState>,
    ids: TimeOrderedIds,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_state(ChatState::default())
    }

    /// Create a store seeded with `state`.
    pub fn with_state(state: ChatState) -> Self {
        Self {
            store: Store::new(state),
            ids: TimeOrderedIds::new(),
        }
    }

    /// Create a session, make it active, and return its id.
    pub fn create_session(&self, title: impl Into<String>) -> String {
        let title = title.into();
        loop {
            let id = self.ids.next_id();
            let created = self.store.dispatch(ChatAction::CreateSession {
                id: id.clone(),
                title: title.clone(),
                now: now(),
            });
            // Only fails if a hydrated session already owns this token.
            if created {
                return id;
            }
        }
    }

    /// Append `message` to a session.  No-op if the session does not exist.
    pub fn add_message(&self, session_id: &str, message: Message) -> bool {
        self.store.dispatch(ChatAction::AddMessage {
            session_id: session_id.to_string(),
            message,
            now: now(),
        })
    }

    /// Point the UI at `session_id`.  The id is not checked.
    pub fn set_active_session(&self, session_id: Option<&str>) -> bool {
        self.store
            .dispatch(ChatAction::SetActiveSession(session_id.map(String::from)))
    }

    /// Raise or lower the typing indicator.
    pub fn set_is_bot_typing(&self, typing: bool) -> bool {
        self.store.dispatch(ChatAction::SetBotTyping(typing))
    }

    /// Shallow-merge `patch` into a session.  No-op if it does not exist.
    pub fn update_session(&self, session_id: &str, patch: SessionPatch) -> bool {
        self.store.dispatch(ChatAction::UpdateSession {
            session_id: session_id.to_string(),
            patch,
            now: now(),
        })
    }

    /// Remove a session, clearing the active pointer if it pointed there.
    pub fn delete_session(&self, session_id: &str) -> bool {
        self.store
            .dispatch(ChatAction::DeleteSession(session_id.to_string()))
    }

    /// Toggle a session's archived flag.
    pub fn archive_session(&self, session_id: &str) -> bool {
        self.store.dispatch(ChatAction::ArchiveSession {
            session_id: session_id.to_string(),
            now: now(),
        })
    }

    /// Replace every session, typically with the backend's listing.
    pub fn replace_sessions(&self, sessions: Vec<Session>) -> bool {
        self.store.dispatch(ChatAction::ReplaceSessions(sessions))
    }

    /// Append a streamed fragment to the last message of a session.
    pub fn append_to_last_message(&self, session_id: &str, fragment: &str) -> bool {
        self.store.dispatch(ChatAction::AppendToLastMessage {
            session_id: session_id.to_string(),
            fragment: fragment.to_string(),
            now: now(),
        })
    }

    /// Append a streamed fragment to message `message_id` of a session.
    /// No-op if either is gone.
    pub fn append_to_message(&self, session_id: &str, message_id: &str, fragment: &str) -> bool {
        self.store.dispatch(ChatAction::AppendToMessage {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            fragment: fragment.to_string(),
            now: now(),
        })
    }

    /// Sessions matching `query` in title or message text, ignoring case.
    pub fn search_sessions(&self, query: &str) -> Vec<Session> {
        self.store.with(|state| state.search(query))
    }

    /// A clone of one session.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.store.with(|state| state.session(session_id).cloned())
    }

    /// A clone of the active session, if the pointer resolves.
    pub fn active_session(&self) -> Option<Session> {
        self.store.with(|state| state.active_session().cloned())
    }

    /// The active session id, resolved or not.
    pub fn active_session_id(&self) -> Option<String> {
        self.store.with(|state| state.active_session_id.clone())
    }

    /// All sessions in order.
    pub fn sessions(&self) -> Vec<Session> {
        self.store
            .with(|state| state.sessions.iter().map(|s| Session::clone(s)).collect())
    }

    /// Whether the typing indicator is raised.
    pub fn is_bot_typing(&self) -> bool {
        self.store.with(|state| state.is_bot_typing)
    }

    /// A clone of the whole state.
    pub fn snapshot(&self) -> ChatState {
        self.store.snapshot()
    }

    /// Observe future changes.
    pub fn subscribe(&self) -> Subscription<ChatState> {
        self.store.subscribe()
    }

    /// Build a message with a fresh id and the current time.
    pub fn new_message(&self, text: impl Into<String>, sender: Sender) -> Message {
        Message::new(self.ids.next_id(), text, sender).with_timestamp(now())
    }

    /// Run one streamed exchange for `session_id` through the store.
    ///
    /// Appends the user's message and an empty bot message, raises the
    /// typing indicator, appends every streamed chunk to that bot message,
    /// and lowers the indicator when the stream ends for any reason.  Other
    /// messages added to the session meanwhile are left alone.  The partial
    /// bot message is kept when the stream fails.
    pub async fn ingest_stream(
        &self,
        client: &ChatClient,
        session_id: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<StreamSummary> {
        self.add_message(session_id, self.new_message(text, Sender::User));
        let reply = self.new_message("", Sender::Bot);
        let reply_id = reply.id.clone();
        self.add_message(session_id, reply);
        self.set_is_bot_typing(true);
        let result = client
            .stream_message_with_cancel(session_id, text, cancel, |chunk| {
                self.append_to_message(session_id, &reply_id, chunk);
            })
            .await;
        self.set_is_bot_typing(false);
        result
    }
}
