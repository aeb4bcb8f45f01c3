//! The conversation session manager.
//!
//! [`ChatManager`] owns the saved history and the state of the current turn.
//! Every mutation goes through its methods, so a presentation layer only
//! renders snapshots and issues commands.
//!
//! A turn moves `Idle -> Sending -> Revealing -> Idle`, or `Idle -> Sending ->
//! Idle` when the request fails.  Each turn carries a token; work that resumes
//! after an await checks the token first and gives up when the turn has been
//! replaced, so a stale reply can never write into a conversation that was
//! reset underneath it.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Provider, Selection};
use crate::chat::config::ChatConfig;
use crate::chat::render::Renderer;
use crate::client::CompletionClient;
use crate::error::{Error, Result};
use crate::indicator::{ActivityIndicator, IndicatorHandle};
use crate::observability::{
    REVEAL_FRAMES, TURNS_CANCELLED, TURNS_COMMITTED, TURNS_FAILED, TURNS_IGNORED, TURNS_STARTED,
};
use crate::reveal::Reveal;
use crate::store::{FileStorage, SessionStore};
use crate::types::{ChatRequest, Message, Session};

/// Content of the assistant message recorded when a request fails.
pub const BACKEND_ERROR_MESSAGE: &str = "Error: Could not reach backend.";

/// Where the current turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    /// No turn in progress.
    #[default]
    Idle,
    /// Waiting on the completion request.
    Sending,
    /// Revealing a received response.
    Revealing,
}

/// How a call to [`ChatManager::submit`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing happened: the draft was blank or a request was in flight.
    Ignored,
    /// The response was revealed in full and saved.
    Committed(Session),
    /// The request failed; the error message was saved in place of a reply.
    Failed(Session),
    /// The turn was interrupted or replaced and nothing was saved.
    Cancelled,
}

/// Everything a presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub messages: Vec<Message>,
    pub reveal_buffer: String,
    pub draft: String,
    pub busy: bool,
    pub phase: TurnPhase,
    pub glyph: &'static str,
    pub history: Vec<Session>,
    pub provider: Provider,
    pub model: &'static str,
    pub current_id: Option<String>,
}

struct ActiveTurn {
    token: u64,
    cancel: CancellationToken,
    rollback_len: usize,
    indicator: IndicatorHandle,
}

struct TurnState {
    store: SessionStore,
    selection: Selection,
    current_id: Option<String>,
    messages: Vec<Message>,
    draft: String,
    reveal_buffer: String,
    phase: TurnPhase,
    last_token: u64,
    active: Option<ActiveTurn>,
}

impl TurnState {
    fn owns(&self, token: u64) -> bool {
        self.active.as_ref().is_some_and(|turn| turn.token == token)
    }

    fn ensure_not_sending(&self, action: &str) -> Result<()> {
        if self.phase == TurnPhase::Sending {
            return Err(Error::busy(format!(
                "cannot {action} while a request is in flight"
            )));
        }
        Ok(())
    }

    /// Ends the active turn without saving it.
    fn cancel_active(&mut self) -> bool {
        let Some(turn) = self.active.take() else {
            return false;
        };
        turn.cancel.cancel();
        turn.indicator.stop();
        self.messages.truncate(turn.rollback_len);
        self.reveal_buffer.clear();
        self.phase = TurnPhase::Idle;
        tracing::debug!(token = turn.token, "turn cancelled");
        true
    }

    /// Saves the conversation and ends the active turn.
    fn commit(&mut self) -> Result<Session> {
        let saved = self
            .store
            .upsert_session(self.current_id.as_deref(), &self.messages);
        if let Some(turn) = self.active.take() {
            turn.indicator.stop();
        }
        self.reveal_buffer.clear();
        self.phase = TurnPhase::Idle;
        let session = saved?;
        self.current_id = Some(session.id.clone());
        Ok(session)
    }

    fn reset_conversation(&mut self) {
        self.cancel_active();
        self.messages.clear();
        self.draft.clear();
        self.reveal_buffer.clear();
        self.current_id = None;
    }
}

/// Ends a turn whose `submit` future is dropped before the turn finishes.
///
/// A committed, failed or replaced turn no longer owns the state, so dropping
/// the guard after those is a no-op.
struct TurnGuard<'a> {
    state: &'a Mutex<TurnState>,
    token: u64,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.owns(self.token) {
            TURNS_CANCELLED.click();
            tracing::info!(token = self.token, "turn abandoned");
            state.cancel_active();
        }
    }
}

/// Owns the history and orchestrates one turn at a time.
///
/// All methods take `&self`; the manager is meant to be shared (for example
/// behind an `Arc`) between the task driving a turn and whatever issues
/// commands or interrupts.  Internal locks are never held across an await.
pub struct ChatManager<C: CompletionClient> {
    client: C,
    reveal_interval: Duration,
    indicator: ActivityIndicator,
    state: Mutex<TurnState>,
}

impl<C: CompletionClient> ChatManager<C> {
    /// Creates a manager over an already opened store.
    pub fn new(client: C, store: SessionStore, config: &ChatConfig) -> Self {
        Self {
            client,
            reveal_interval: config.reveal_interval,
            indicator: ActivityIndicator::new(config.indicator_interval),
            state: Mutex::new(TurnState {
                store,
                selection: config.selection.clone(),
                current_id: None,
                messages: Vec::new(),
                draft: String::new(),
                reveal_buffer: String::new(),
                phase: TurnPhase::Idle,
                last_token: 0,
                active: None,
            }),
        }
    }

    /// Opens the file-backed history in `config.history_dir`.
    pub fn open(client: C, config: &ChatConfig) -> Result<Self> {
        let store = SessionStore::open(FileStorage::new(&config.history_dir))?;
        Ok(Self::new(client, store, config))
    }

    fn state(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one turn for `draft`.
    ///
    /// Blank drafts and submissions while a request is in flight are ignored.
    /// Submitting while a previous response is still revealing discards that
    /// response.  A failed request is not an error: it is recorded as an
    /// assistant message and the turn reports [`TurnOutcome::Failed`].  Errors
    /// are returned only when the history cannot be saved.
    pub async fn submit(&self, draft: &str, renderer: &mut dyn Renderer) -> Result<TurnOutcome> {
        let (token, cancel, request, model) = {
            let mut state = self.state();
            if draft.trim().is_empty() || state.phase == TurnPhase::Sending {
                TURNS_IGNORED.click();
                return Ok(TurnOutcome::Ignored);
            }
            state.cancel_active();

            let rollback_len = state.messages.len();
            state.messages.push(Message::user(draft));
            state.draft.clear();
            state.phase = TurnPhase::Sending;
            state.last_token += 1;
            let token = state.last_token;
            let cancel = CancellationToken::new();
            state.active = Some(ActiveTurn {
                token,
                cancel: cancel.clone(),
                rollback_len,
                indicator: self.indicator.start(),
            });
            let model = state.selection.model();
            let request =
                ChatRequest::new(&state.messages, state.selection.provider(), model);
            (token, cancel, request, model)
        };
        let _guard = TurnGuard {
            state: &self.state,
            token,
        };
        TURNS_STARTED.click();
        tracing::info!(
            token,
            provider = %request.provider,
            model,
            messages = request.messages.len(),
            "turn started"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            response = self.client.complete(&request) => Some(response),
        };
        let Some(response) = response else {
            return Ok(self.cancelled(token, renderer));
        };

        let text = match response {
            Ok(response) => response.response,
            Err(err) => {
                tracing::warn!(token, error = %err, "turn failed");
                let message = Message::assistant(BACKEND_ERROR_MESSAGE, model);
                let session = {
                    let mut state = self.state();
                    if !state.owns(token) {
                        drop(state);
                        return Ok(self.cancelled(token, renderer));
                    }
                    state.messages.push(message.clone());
                    state.commit()?
                };
                TURNS_FAILED.click();
                renderer.finish_response(&message);
                return Ok(TurnOutcome::Failed(session));
            }
        };

        {
            let mut state = self.state();
            if !state.owns(token) {
                drop(state);
                return Ok(self.cancelled(token, renderer));
            }
            state.phase = TurnPhase::Revealing;
        }

        let reveal = Reveal::new(text, self.reveal_interval);
        let message = Message::assistant(reveal.text(), model);
        let mut frames = std::pin::pin!(reveal.into_stream());
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(token, renderer)),
                frame = frames.next() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            {
                let mut state = self.state();
                if !state.owns(token) {
                    drop(state);
                    return Ok(self.cancelled(token, renderer));
                }
                state.reveal_buffer.clone_from(&frame);
            }
            REVEAL_FRAMES.click();
            renderer.print_reveal(&frame);
        }

        let session = {
            let mut state = self.state();
            if !state.owns(token) {
                drop(state);
                return Ok(self.cancelled(token, renderer));
            }
            state.messages.push(message.clone());
            state.commit()?
        };
        TURNS_COMMITTED.click();
        tracing::info!(token, session_id = %session.id, "turn committed");
        renderer.finish_response(&message);
        Ok(TurnOutcome::Committed(session))
    }

    fn cancelled(&self, token: u64, renderer: &mut dyn Renderer) -> TurnOutcome {
        TURNS_CANCELLED.click();
        tracing::info!(token, "turn discarded");
        renderer.print_interrupted();
        TurnOutcome::Cancelled
    }

    /// Replaces the draft input.
    pub fn set_draft(&self, draft: impl Into<String>) {
        self.state().draft = draft.into();
    }

    /// The current draft input.
    pub fn draft(&self) -> String {
        self.state().draft.clone()
    }

    /// Submits the current draft.
    pub async fn submit_draft(&self, renderer: &mut dyn Renderer) -> Result<TurnOutcome> {
        let draft = self.draft();
        self.submit(&draft, renderer).await
    }

    /// Interrupts the active turn, discarding it and its user message.
    ///
    /// Returns false when no turn was active.  Safe to call from any thread.
    pub fn interrupt(&self) -> bool {
        self.state().cancel_active()
    }

    /// Starts a fresh, unsaved conversation.
    pub fn start_new_chat(&self) -> Result<()> {
        let mut state = self.state();
        state.ensure_not_sending("start a new chat")?;
        state.reset_conversation();
        Ok(())
    }

    /// Makes a saved session current.
    pub fn load_session(&self, id: &str) -> Result<Session> {
        let mut state = self.state();
        state.ensure_not_sending("load a session")?;
        let session = state.store.get(id).cloned().ok_or_else(|| {
            Error::not_found(format!("no session with id {id}"), Some(id.to_string()))
        })?;
        state.reset_conversation();
        state.messages = session.messages.clone();
        state.current_id = Some(session.id.clone());
        tracing::debug!(session_id = %session.id, "session loaded");
        Ok(session)
    }

    /// Deletes a saved session.  Unknown ids are not an error.
    ///
    /// Deleting the current session starts a new chat.
    pub fn delete_session(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        let is_current = state.current_id.as_deref() == Some(id);
        if is_current {
            state.ensure_not_sending("delete the current session")?;
        }
        state.store.delete_session(id)?;
        if is_current {
            state.reset_conversation();
        }
        Ok(())
    }

    /// Switches provider, selecting its first model and starting a new chat.
    pub fn switch_provider(&self, provider: Provider) -> Result<()> {
        let mut state = self.state();
        state.ensure_not_sending("switch provider")?;
        state.selection.switch_provider(provider);
        state.reset_conversation();
        Ok(())
    }

    /// Switches model within the current provider and starts a new chat.
    ///
    /// Models the provider does not offer are rejected without touching the
    /// conversation.
    pub fn switch_model(&self, model: &str) -> Result<()> {
        let mut state = self.state();
        state.ensure_not_sending("switch model")?;
        state.selection.switch_model(model)?;
        state.reset_conversation();
        Ok(())
    }

    /// Messages of the current conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    /// The part of the response revealed so far.
    pub fn reveal_buffer(&self) -> String {
        self.state().reveal_buffer.clone()
    }

    /// The saved history, newest first.
    pub fn history(&self) -> Vec<Session> {
        self.state().store.list_sessions().to_vec()
    }

    /// Id of the current session, `None` while it is unsaved.
    pub fn current_id(&self) -> Option<String> {
        self.state().current_id.clone()
    }

    /// The active provider and model.
    pub fn selection(&self) -> Selection {
        self.state().selection.clone()
    }

    pub fn phase(&self) -> TurnPhase {
        self.state().phase
    }

    /// True while a turn is sending or revealing.
    pub fn is_busy(&self) -> bool {
        self.phase() != TurnPhase::Idle
    }

    /// The indicator glyph to show while busy.
    pub fn glyph(&self) -> &'static str {
        self.indicator.glyph()
    }

    /// Subscribes to indicator glyph changes.
    pub fn subscribe_indicator(&self) -> watch::Receiver<&'static str> {
        self.indicator.subscribe()
    }

    /// Number of indicator clocks still running.
    pub fn running_timers(&self) -> usize {
        self.indicator.running()
    }

    /// A consistent snapshot of everything observable.
    pub fn view(&self) -> ChatView {
        let state = self.state();
        ChatView {
            messages: state.messages.clone(),
            reveal_buffer: state.reveal_buffer.clone(),
            draft: state.draft.clone(),
            busy: state.phase != TurnPhase::Idle,
            phase: state.phase,
            glyph: self.indicator.glyph(),
            history: state.store.list_sessions().to_vec(),
            provider: state.selection.provider(),
            model: state.selection.model(),
            current_id: state.current_id.clone(),
        }
    }
}
