//! The session controller
//!
//! Owns the registry of sessions and is the only thing that mutates it.
//! Background turn tasks and save tasks report through an update queue,
//! and the controller applies those updates one at a time, so fragments
//! for a turn land in the order they were produced and never after the
//! turn (or its session) is gone.

use std::{collections::HashMap, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    app::{
        agent::{Agent, TurnOptions},
        events::{AppEvent, TurnId},
        turn::TurnState,
    },
    llm::{LlmError, LlmProvider},
    session::{ChatSession, SessionStore, SkippedRecord, StorageError},
};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("a reply is still in progress for session {id}")]
    TurnInProgress { id: Uuid },

    #[error("session {id} has never been saved")]
    NotPersisted { id: Uuid },

    #[error("no session with id {id}")]
    UnknownSession { id: Uuid },

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotPersisted { id } => ControllerError::NotPersisted { id },
            other => ControllerError::Storage(other),
        }
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// A session plus everything the controller tracks about it
#[derive(Debug)]
pub struct SessionEntry {
    pub session: ChatSession,
    pub turn: TurnState,
    /// Operator-visible failures (saves, deletes) shown under the transcript
    pub notices: Vec<String>,
}

/// Notices kept per session; older ones are dropped first
const MAX_NOTICES: usize = 3;

impl SessionEntry {
    fn new(session: ChatSession) -> Self {
        Self {
            session,
            turn: TurnState::Idle,
            notices: Vec::new(),
        }
    }

    fn push_notice(&mut self, notice: String) {
        if self.notices.len() >= MAX_NOTICES {
            self.notices.remove(0);
        }
        self.notices.push(notice);
    }
}

/// Text appended to a placeholder when its turn fails
fn failure_annotation(existing: &str, err: &LlmError) -> String {
    let body = match err {
        LlmError::Cancelled => "[cancelled]".to_string(),
        other => format!("Error: {}", other),
    };
    if existing.is_empty() {
        body
    } else {
        format!("\n\n{}", body)
    }
}

/// Coordinates send-turns, registry changes and persistence
pub struct SessionController {
    store: SessionStore,
    agent: Agent,
    registry: HashMap<Uuid, SessionEntry>,
    order: Vec<Uuid>,
    active: Option<Uuid>,
    next_turn: u64,
    pending_saves: usize,
    autosave: bool,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl SessionController {
    /// Create a controller with an empty registry
    pub fn new(store: SessionStore, provider: Arc<dyn LlmProvider>, options: TurnOptions) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let agent = Agent::new(provider, event_tx.clone(), options);

        Self {
            store,
            agent,
            registry: HashMap::new(),
            order: Vec::new(),
            active: None,
            next_turn: 1,
            pending_saves: 0,
            autosave: true,
            event_tx,
            event_rx,
        }
    }

    /// Finish turns without writing them to the store
    pub fn without_autosave(mut self) -> Self {
        self.autosave = false;
        self
    }

    /// Fill the registry from the store.
    ///
    /// Returns the records that could not be loaded; they are logged and
    /// otherwise left alone.
    pub async fn load(&mut self) -> ControllerResult<Vec<SkippedRecord>> {
        let report = self.store.load_all().await?;

        let mut loaded: Vec<ChatSession> = report.sessions.into_values().collect();
        loaded.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        for session in loaded {
            if self.registry.contains_key(&session.id) {
                continue;
            }
            self.order.push(session.id);
            self.registry.insert(session.id, SessionEntry::new(session));
        }

        Ok(report.skipped)
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Sessions in display order: loaded ones by creation time, then new ones
    pub fn sessions(&self) -> impl Iterator<Item = &SessionEntry> + '_ {
        self.order.iter().filter_map(|id| self.registry.get(id))
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn entry(&self, id: &Uuid) -> Option<&SessionEntry> {
        self.registry.get(id)
    }

    pub fn session(&self, id: &Uuid) -> Option<&ChatSession> {
        self.registry.get(id).map(|e| &e.session)
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    pub fn active_entry(&self) -> Option<&SessionEntry> {
        self.active.and_then(|id| self.registry.get(&id))
    }

    /// True while any turn is in flight or any save hasn't reported back
    pub fn is_busy(&self) -> bool {
        self.pending_saves > 0 || self.registry.values().any(|e| !e.turn.is_idle())
    }

    /// Create a new empty session and select it
    pub fn new_session(&mut self) -> Uuid {
        let session = ChatSession::new(format!("Chat {}", self.registry.len() + 1));
        let id = session.id;
        info!(session_id = %id, "Created session '{}'", session.title);

        self.order.push(id);
        self.registry.insert(id, SessionEntry::new(session));
        self.switch_to(Some(id));
        id
    }

    /// Make `id` the selected session
    pub fn select_session(&mut self, id: Uuid) -> ControllerResult<()> {
        if !self.registry.contains_key(&id) {
            return Err(ControllerError::UnknownSession { id });
        }
        self.switch_to(Some(id));
        Ok(())
    }

    /// Select nothing; the next submit starts a new session
    pub fn clear_selection(&mut self) {
        self.switch_to(None);
    }

    fn switch_to(&mut self, next: Option<Uuid>) {
        if self.active == next {
            return;
        }
        if let Some(previous) = self.active {
            if self.cancel_turn(previous) {
                info!(session_id = %previous, "Cancelled reply when switching sessions");
            }
        }
        self.active = next;
    }

    /// Start a turn on `id`: append the user message and a placeholder, then
    /// fetch the reply in the background.
    pub fn submit(&mut self, id: Uuid, text: impl Into<String>) -> ControllerResult<TurnId> {
        let turn = TurnId(self.next_turn);
        let entry = self
            .registry
            .get_mut(&id)
            .ok_or(ControllerError::UnknownSession { id })?;

        if !entry.turn.is_idle() {
            debug!(session_id = %id, state = entry.turn.label(), "Rejected submit");
            return Err(ControllerError::TurnInProgress { id });
        }
        self.next_turn += 1;

        // Nothing else runs between opening the placeholder and starting the
        // fetch, so the turn goes straight to Streaming.
        let placeholder = entry.session.open_turn(text);
        let history = entry.session.history_before(placeholder);

        let cancel = CancellationToken::new();
        entry.turn = TurnState::Streaming {
            turn,
            placeholder,
            cancel: cancel.clone(),
        };
        info!(session_id = %id, %turn, messages = history.len(), "Turn started");

        self.agent.spawn_turn(id, turn, history, cancel);
        Ok(turn)
    }

    /// Submit to the selected session, creating one if nothing is selected
    pub fn submit_to_active(&mut self, text: impl Into<String>) -> ControllerResult<(Uuid, TurnId)> {
        let id = match self.active {
            Some(id) => id,
            None => self.new_session(),
        };
        let turn = self.submit(id, text)?;
        Ok((id, turn))
    }

    /// Stop the streaming turn of `id`, if any.
    ///
    /// The turn is finalized right away as failed-by-cancellation and saved;
    /// fragments still queued for it are dropped.
    pub fn cancel_turn(&mut self, id: Uuid) -> bool {
        let Some(entry) = self.registry.get_mut(&id) else {
            return false;
        };
        let (turn, placeholder) = match &entry.turn {
            TurnState::Streaming {
                turn,
                placeholder,
                cancel,
            } => {
                cancel.cancel();
                (*turn, *placeholder)
            }
            _ => return false,
        };

        self.fail_turn(id, turn, placeholder, &LlmError::Cancelled);
        true
    }

    /// Delete a session from the registry and from storage.
    ///
    /// A streaming turn on it is cancelled and its remaining fragments are
    /// dropped. Deleting while a save is pending is refused, as is deleting
    /// a session that was never saved.
    pub async fn delete_session(&mut self, id: Uuid) -> ControllerResult<()> {
        let entry = self
            .registry
            .get_mut(&id)
            .ok_or(ControllerError::UnknownSession { id })?;

        if entry.turn.is_persisting() {
            return Err(ControllerError::TurnInProgress { id });
        }
        if !entry.session.is_persisted() {
            return Err(ControllerError::NotPersisted { id });
        }

        if let Err(e) = self.store.delete(&entry.session).await {
            error!(session_id = %id, "Failed to delete session: {}", e);
            entry.push_notice(format!("Error deleting chat: {}", e));
            return Err(e.into());
        }

        if let Some(entry) = self.registry.remove(&id) {
            if let TurnState::Streaming { cancel, .. } = &entry.turn {
                cancel.cancel();
            }
        }
        self.order.retain(|other| *other != id);
        if self.active == Some(id) {
            self.active = None;
        }

        info!(session_id = %id, "Deleted session");
        Ok(())
    }

    fn fail_turn(&mut self, id: Uuid, turn: TurnId, placeholder: usize, err: &LlmError) {
        if let Some(entry) = self.registry.get_mut(&id) {
            let existing = entry
                .session
                .messages
                .get(placeholder)
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            let annotation = failure_annotation(existing, err);
            entry.session.append_to_placeholder(placeholder, &annotation);
            entry.turn = TurnState::Failed { turn };
        }
        self.persist(id, turn);
    }

    fn persist(&mut self, id: Uuid, turn: TurnId) {
        let Some(entry) = self.registry.get_mut(&id) else {
            return;
        };
        if !self.autosave {
            entry.turn = TurnState::Idle;
            return;
        }
        let snapshot = entry.session.clone();
        let store = self.store.clone();
        let event_tx = self.event_tx.clone();
        self.pending_saves += 1;

        tokio::spawn(async move {
            let result = store.save(&snapshot).await;
            let _ = event_tx.send(AppEvent::Persisted {
                session_id: snapshot.id,
                turn,
                result,
            });
        });
    }

    /// Apply one queued update.
    ///
    /// Returns the session whose visible state changed, if any.
    pub fn apply(&mut self, event: AppEvent) -> Option<Uuid> {
        let id = event.session_id();

        if let AppEvent::Persisted { .. } = &event {
            self.pending_saves = self.pending_saves.saturating_sub(1);
        }

        let Some(entry) = self.registry.get_mut(&id) else {
            debug!(session_id = %id, turn = %event.turn(), "Dropped update for deleted session");
            return None;
        };

        match event {
            AppEvent::Fragment { turn, text, .. } => {
                let placeholder = entry.turn.streaming_placeholder(turn)?;
                entry.session.append_to_placeholder(placeholder, &text);
                Some(id)
            }

            AppEvent::TurnEnded { turn, error, .. } => {
                let placeholder = entry.turn.streaming_placeholder(turn)?;
                match error {
                    None => {
                        entry.turn = TurnState::Completed { turn };
                        self.persist(id, turn);
                    }
                    Some(err) => self.fail_turn(id, turn, placeholder, &err),
                }
                Some(id)
            }

            AppEvent::Persisted { turn, result, .. } => {
                match result {
                    Ok(path) => {
                        entry.session.bind(path);
                        entry.notices.clear();
                    }
                    Err(e) => {
                        error!(session_id = %id, %turn, "Failed to save session: {}", e);
                        entry.push_notice(format!("Error saving chat: {}", e));
                    }
                }
                if entry.turn.is_persisting() && entry.turn.turn() == Some(turn) {
                    entry.turn = TurnState::Idle;
                }
                Some(id)
            }
        }
    }

    /// Wait for the next queued update
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.event_rx.recv().await
    }

    /// Apply everything already queued without waiting.
    ///
    /// Returns true if anything visible changed.
    pub fn drain(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.event_rx.try_recv() {
            changed |= self.apply(event).is_some();
        }
        changed
    }

    /// Apply updates until no turn is in flight and every save has reported
    pub async fn run_until_idle(&mut self) {
        while self.is_busy() {
            match self.next_event().await {
                Some(event) => {
                    self.apply(event);
                }
                None => break,
            }
        }
    }

    /// Cancel every in-flight turn and wait (up to `grace`) for their saves
    pub async fn shutdown(&mut self, grace: Duration) {
        let streaming: Vec<Uuid> = self
            .registry
            .iter()
            .filter(|(_, e)| e.turn.is_streaming())
            .map(|(id, _)| *id)
            .collect();
        for id in streaming {
            self.cancel_turn(id);
        }

        if tokio::time::timeout(grace, self.run_until_idle()).await.is_err() {
            warn!(pending = self.pending_saves, "Gave up waiting for saves at shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FragmentStream, LlmResult, Message, MessageRole};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use futures::{stream, StreamExt};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    enum Script {
        Reply {
            fragments: Vec<&'static str>,
            delays_ms: Vec<u64>,
            then: Option<LlmError>,
        },
        Refuse(LlmError),
        Hang,
    }

    impl Script {
        fn reply(fragments: &[&'static str]) -> Self {
            Script::Reply {
                fragments: fragments.to_vec(),
                delays_ms: Vec::new(),
                then: None,
            }
        }

        fn jittered(fragments: &[&'static str], delays_ms: &[u64]) -> Self {
            Script::Reply {
                fragments: fragments.to_vec(),
                delays_ms: delays_ms.to_vec(),
                then: None,
            }
        }
    }

    /// Replies keyed by the prompt they answer
    #[derive(Default)]
    struct ScriptedProvider {
        scripts: Mutex<HashMap<String, Script>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<(&str, Script)>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(prompt, script)| (prompt.to_string(), script))
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn take_script(&self, history: Vec<Message>) -> Script {
            let prompt = history
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            self.requests.lock().unwrap().push(history);
            self.scripts
                .lock()
                .unwrap()
                .remove(&prompt)
                .unwrap_or_else(|| Script::reply(&[]))
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat_completion_stream(
            &self,
            history: Vec<Message>,
            cancel: CancellationToken,
        ) -> LlmResult<FragmentStream> {
            match self.take_script(history) {
                Script::Refuse(err) => Err(err),
                Script::Hang => Ok(Box::pin(stream::once(async move {
                    cancel.cancelled().await;
                    Err(LlmError::Cancelled)
                }))),
                Script::Reply {
                    fragments,
                    delays_ms,
                    then,
                } => {
                    let delays = delays_ms.into_iter().chain(std::iter::repeat(0));
                    let items: Vec<(LlmResult<String>, u64)> = fragments
                        .into_iter()
                        .zip(delays)
                        .map(|(fragment, delay)| (Ok(fragment.to_string()), delay))
                        .chain(then.map(|err| (Err(err), 0)))
                        .collect();

                    Ok(Box::pin(stream::iter(items).then(|(item, delay)| async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        item
                    })))
                }
            }
        }

        async fn chat_completion(&self, history: Vec<Message>) -> LlmResult<String> {
            match self.take_script(history) {
                Script::Reply { fragments, .. } => Ok(fragments.concat()),
                Script::Refuse(err) => Err(err),
                Script::Hang => Err(LlmError::Cancelled),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn controller(dir: &TempDir, provider: Arc<ScriptedProvider>) -> SessionController {
        SessionController::new(SessionStore::new(dir.path()), provider, TurnOptions::default())
    }

    async fn settle(controller: &mut SessionController) {
        tokio::time::timeout(Duration::from_secs(5), controller.run_until_idle())
            .await
            .expect("controller never went idle");
    }

    fn assistant(content: &str) -> Message {
        Message::new(MessageRole::Assistant, content)
    }

    fn last_content(controller: &SessionController, id: &Uuid) -> String {
        controller
            .session(id)
            .and_then(|s| s.last_message())
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_hello_turn_streams_and_persists() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![("Hello", Script::reply(&["Hi", " there"]))]);
        let mut controller = controller(&dir, provider.clone());

        let (id, _) = controller.submit_to_active("Hello").unwrap();
        assert_eq!(controller.len(), 1);
        assert_eq!(
            controller.session(&id).unwrap().messages,
            vec![Message::user("Hello"), Message::placeholder()]
        );
        assert!(controller.entry(&id).unwrap().turn.is_streaming());

        settle(&mut controller).await;

        let session = controller.session(&id).unwrap();
        assert_eq!(
            session.messages,
            vec![Message::user("Hello"), assistant("Hi there")]
        );
        assert!(session.is_persisted());
        assert!(controller.entry(&id).unwrap().turn.is_idle());

        // The request carried the user message only, not the placeholder.
        assert_eq!(provider.requests(), vec![vec![Message::user("Hello")]]);

        let report = SessionStore::new(dir.path()).load_all().await.unwrap();
        let reloaded = &report.sessions[&id];
        assert_eq!(reloaded.title, session.title);
        assert_eq!(reloaded.messages, session.messages);
    }

    #[tokio::test]
    async fn test_fragments_concatenate_in_order_under_jitter() {
        let dir = tempdir().unwrap();
        let fragments = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let provider = ScriptedProvider::new(vec![(
            "go",
            Script::jittered(&fragments, &[3, 0, 7, 1, 0, 5, 2, 0, 4, 1]),
        )]);
        let mut controller = controller(&dir, provider);

        let (id, _) = controller.submit_to_active("go").unwrap();
        settle(&mut controller).await;

        assert_eq!(last_content(&controller, &id), fragments.concat());
    }

    #[tokio::test]
    async fn test_submit_while_streaming_is_rejected() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![("first", Script::Hang)]);
        let mut controller = controller(&dir, provider);

        let (id, _) = controller.submit_to_active("first").unwrap();
        let err = controller.submit(id, "second").unwrap_err();
        assert!(matches!(err, ControllerError::TurnInProgress { id: busy } if busy == id));
        assert_eq!(controller.session(&id).unwrap().message_count(), 2);

        assert!(controller.cancel_turn(id));
        let err = controller.submit(id, "third").unwrap_err();
        assert!(matches!(err, ControllerError::TurnInProgress { .. }));

        settle(&mut controller).await;
        assert_eq!(last_content(&controller, &id), "[cancelled]");
        assert!(controller.session(&id).unwrap().is_persisted());
        controller.submit(id, "fourth").unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_before_any_fragment() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![(
            "Hello",
            Script::Refuse(LlmError::Transport("connection refused".to_string())),
        )]);
        let mut controller = controller(&dir, provider);

        let (id, _) = controller.submit_to_active("Hello").unwrap();
        settle(&mut controller).await;

        let content = last_content(&controller, &id);
        assert_eq!(content, "Error: request failed: connection refused");
        assert!(controller.entry(&id).unwrap().turn.is_idle());

        let session = controller.session(&id).unwrap();
        let path = session.binding().expect("failed turn is still saved");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_error_after_partial_text_keeps_the_text() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![(
            "Hello",
            Script::Reply {
                fragments: vec!["Hal", "f"],
                delays_ms: Vec::new(),
                then: Some(LlmError::Protocol("bad record".to_string())),
            },
        )]);
        let mut controller = controller(&dir, provider);

        let (id, _) = controller.submit_to_active("Hello").unwrap();
        settle(&mut controller).await;

        assert_eq!(
            last_content(&controller, &id),
            "Half\n\nError: malformed response record: bad record"
        );
    }

    #[tokio::test]
    async fn test_second_turn_sends_full_history() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            ("Hello", Script::reply(&["Hi"])),
            ("Again", Script::reply(&["Sure"])),
        ]);
        let mut controller = controller(&dir, provider.clone());

        let (id, _) = controller.submit_to_active("Hello").unwrap();
        settle(&mut controller).await;
        controller.submit(id, "Again").unwrap();
        settle(&mut controller).await;

        let requests = provider.requests();
        assert_eq!(
            requests[1],
            vec![Message::user("Hello"), assistant("Hi"), Message::user("Again")]
        );
        assert_eq!(controller.session(&id).unwrap().message_count(), 4);
    }

    #[tokio::test]
    async fn test_delete_requires_save_and_is_final() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![("Hello", Script::reply(&["Hi"]))]);
        let mut controller = controller(&dir, provider);

        let id = controller.new_session();
        let err = controller.delete_session(id).await.unwrap_err();
        assert!(matches!(err, ControllerError::NotPersisted { .. }));
        assert!(controller.session(&id).is_some());

        controller.submit(id, "Hello").unwrap();
        settle(&mut controller).await;
        let path = controller.session(&id).unwrap().binding().unwrap().to_path_buf();

        controller.delete_session(id).await.unwrap();
        assert!(controller.session(&id).is_none());
        assert!(controller.is_empty());
        assert_eq!(controller.active_id(), None);
        assert!(!path.exists());

        let mut reloaded = SessionController::new(
            SessionStore::new(dir.path()),
            ScriptedProvider::new(Vec::new()),
            TurnOptions::default(),
        );
        reloaded.load().await.unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_streaming_session_drops_its_fragments() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            ("one", Script::reply(&["first"])),
            ("two", Script::Hang),
        ]);
        let mut controller = controller(&dir, provider);

        let (id, _) = controller.submit_to_active("one").unwrap();
        settle(&mut controller).await;
        controller.submit(id, "two").unwrap();

        controller.delete_session(id).await.unwrap();
        assert!(controller.session(&id).is_none());
        assert!(!controller.is_busy());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!controller.drain());

        let report = SessionStore::new(dir.path()).load_all().await.unwrap();
        assert!(report.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_switching_away_cancels_the_stream() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![("long", Script::Hang)]);
        let mut controller = controller(&dir, provider);

        let (first, _) = controller.submit_to_active("long").unwrap();
        let second = controller.new_session();

        assert_eq!(controller.active_id(), Some(second));
        assert!(controller.entry(&first).unwrap().turn.is_persisting());
        assert_eq!(last_content(&controller, &first), "[cancelled]");

        settle(&mut controller).await;
        assert!(controller.entry(&first).unwrap().turn.is_idle());
        assert!(controller.session(&first).unwrap().is_persisted());
    }

    #[tokio::test]
    async fn test_concurrent_sessions_never_cross() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            ("left", Script::jittered(&["L1", "L2", "L3"], &[2, 0, 3])),
            ("right", Script::jittered(&["R1", "R2"], &[1, 2])),
        ]);
        let mut controller = controller(&dir, provider);

        let left = controller.new_session();
        let right = controller.new_session();
        controller.submit(left, "left").unwrap();
        controller.submit(right, "right").unwrap();
        settle(&mut controller).await;

        assert_eq!(last_content(&controller, &left), "L1L2L3");
        assert_eq!(last_content(&controller, &right), "R1R2");
    }

    #[tokio::test]
    async fn test_save_failure_becomes_a_notice() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let provider = ScriptedProvider::new(vec![("Hello", Script::reply(&["Hi"]))]);
        let mut controller = SessionController::new(
            SessionStore::new(blocker.join("chats")),
            provider,
            TurnOptions::default(),
        );

        let (id, _) = controller.submit_to_active("Hello").unwrap();
        settle(&mut controller).await;

        let entry = controller.entry(&id).unwrap();
        assert!(entry.turn.is_idle());
        assert!(!entry.session.is_persisted());
        assert_eq!(entry.session.messages, vec![Message::user("Hello"), assistant("Hi")]);
        assert_eq!(entry.notices.len(), 1);
        assert!(entry.notices[0].starts_with("Error saving chat"));
    }

    #[tokio::test]
    async fn test_single_shot_mode_with_system_message() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![("Hello", Script::reply(&["Hi", " there"]))]);
        let mut controller = SessionController::new(
            SessionStore::new(dir.path()),
            provider.clone(),
            TurnOptions {
                stream: false,
                system_message: Some("Be brief.".to_string()),
            },
        );

        let (id, _) = controller.submit_to_active("Hello").unwrap();
        settle(&mut controller).await;

        assert_eq!(last_content(&controller, &id), "Hi there");
        assert_eq!(
            provider.requests()[0],
            vec![Message::system("Be brief."), Message::user("Hello")]
        );
        assert_eq!(controller.session(&id).unwrap().message_count(), 2);
    }

    #[tokio::test]
    async fn test_load_orders_sessions_by_creation() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let mut later = ChatSession::new("Later");
        later.created_at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let mut earlier = ChatSession::new("Earlier");
        earlier.created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        store.save(&later).await.unwrap();
        store.save(&earlier).await.unwrap();

        let mut controller = controller(&dir, ScriptedProvider::new(Vec::new()));
        let skipped = controller.load().await.unwrap();
        assert!(skipped.is_empty());

        let titles: Vec<&str> = controller.sessions().map(|e| e.session.title.as_str()).collect();
        assert_eq!(titles, vec!["Earlier", "Later"]);

        let id = controller.new_session();
        assert_eq!(controller.session(&id).unwrap().title, "Chat 3");
        assert!(matches!(
            controller.select_session(Uuid::new_v4()),
            Err(ControllerError::UnknownSession { .. })
        ));
    }

    #[tokio::test]
    async fn test_notices_are_capped_and_cleared_by_a_good_save() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let provider = ScriptedProvider::new(Vec::new());
        let mut controller = SessionController::new(
            SessionStore::new(blocker.join("chats")),
            provider,
            TurnOptions::default(),
        );

        let (id, _) = controller.submit_to_active("try 0").unwrap();
        settle(&mut controller).await;
        for n in 1..=MAX_NOTICES + 1 {
            controller.submit(id, format!("try {}", n)).unwrap();
            settle(&mut controller).await;
        }
        assert_eq!(controller.entry(&id).unwrap().notices.len(), MAX_NOTICES);

        std::fs::remove_file(&blocker).unwrap();
        controller.submit(id, "try again").unwrap();
        settle(&mut controller).await;

        let entry = controller.entry(&id).unwrap();
        assert!(entry.notices.is_empty());
        assert!(entry.session.is_persisted());
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_text() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![(
            "long",
            Script::jittered(&["Half", " never"], &[0, 60_000]),
        )]);
        let mut controller = controller(&dir, provider);

        let (id, _) = controller.submit_to_active("long").unwrap();
        while last_content(&controller, &id).is_empty() {
            let event = controller.next_event().await.unwrap();
            controller.apply(event);
        }
        assert_eq!(last_content(&controller, &id), "Half");

        assert!(controller.cancel_turn(id));
        assert_eq!(last_content(&controller, &id), "Half\n\n[cancelled]");
        settle(&mut controller).await;

        let report = SessionStore::new(dir.path()).load_all().await.unwrap();
        let saved = &report.sessions[&id];
        assert_eq!(saved.messages[1].content, "Half\n\n[cancelled]");
    }

    #[tokio::test]
    async fn test_delete_waits_for_pending_save() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            ("one", Script::reply(&["first"])),
            ("two", Script::Hang),
        ]);
        let mut controller = controller(&dir, provider);

        let (id, _) = controller.submit_to_active("one").unwrap();
        settle(&mut controller).await;
        controller.submit(id, "two").unwrap();
        assert!(controller.cancel_turn(id));
        assert!(controller.entry(&id).unwrap().turn.is_persisting());

        let err = controller.delete_session(id).await.unwrap_err();
        assert!(matches!(err, ControllerError::TurnInProgress { id: busy } if busy == id));
        assert_eq!(controller.len(), 1);

        settle(&mut controller).await;
        controller.delete_session(id).await.unwrap();
        let report = SessionStore::new(dir.path()).load_all().await.unwrap();
        assert!(report.sessions.is_empty());
    }
}
