//! Background fetch for one send-turn

use futures::StreamExt;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    app::events::{AppEvent, TurnId},
    llm::{LlmError, LlmProvider, LlmResult, Message},
};

/// How turns talk to the backend
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Use the streaming chat request; `false` falls back to the legacy
    /// single-shot request, delivered as one fragment
    pub stream: bool,

    /// Prepended to every outgoing history, never stored
    pub system_message: Option<String>,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            stream: true,
            system_message: None,
        }
    }
}

/// Runs turns against the provider and reports back through the update queue
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    options: TurnOptions,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        event_tx: mpsc::UnboundedSender<AppEvent>,
        options: TurnOptions,
    ) -> Self {
        Self {
            provider,
            event_tx,
            options,
        }
    }

    /// Spawn the fetch for one turn.
    ///
    /// Every fragment becomes an [`AppEvent::Fragment`] in arrival order, and
    /// exactly one [`AppEvent::TurnEnded`] follows the last of them.
    pub fn spawn_turn(
        &self,
        session_id: Uuid,
        turn: TurnId,
        history: Vec<Message>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let agent = self.clone();

        tokio::spawn(async move {
            let result = agent.run_turn(session_id, turn, history, cancel).await;

            match &result {
                Ok(()) => info!(session_id = %session_id, %turn, "Turn stream finished"),
                Err(LlmError::Cancelled) => debug!(session_id = %session_id, %turn, "Turn cancelled"),
                Err(e) if e.is_transport() => warn!(
                    session_id = %session_id,
                    %turn,
                    provider = agent.provider.name(),
                    "Backend unreachable: {}", e
                ),
                Err(e) => warn!(session_id = %session_id, %turn, "Turn failed: {}", e),
            }

            let _ = agent.event_tx.send(AppEvent::TurnEnded {
                session_id,
                turn,
                error: result.err(),
            });
        })
    }

    async fn run_turn(
        &self,
        session_id: Uuid,
        turn: TurnId,
        mut history: Vec<Message>,
        cancel: CancellationToken,
    ) -> LlmResult<()> {
        if let Some(system) = &self.options.system_message {
            history.insert(0, Message::system(system.clone()));
        }

        debug!(
            session_id = %session_id,
            %turn,
            provider = self.provider.name(),
            model = self.provider.model(),
            messages = history.len(),
            "Sending turn"
        );

        if !self.options.stream {
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                reply = self.provider.chat_completion(history) => reply?,
            };
            if !reply.is_empty() {
                self.emit(session_id, turn, reply);
            }
            return Ok(());
        }

        let mut fragments = self
            .provider
            .chat_completion_stream(history, cancel.clone())
            .await?;

        while let Some(fragment) = fragments.next().await {
            let text = fragment?;
            if !self.emit(session_id, turn, text) {
                // Controller is gone; nobody is left to read the rest.
                cancel.cancel();
                break;
            }
        }

        Ok(())
    }

    fn emit(&self, session_id: Uuid, turn: TurnId, text: String) -> bool {
        self.event_tx
            .send(AppEvent::Fragment {
                session_id,
                turn,
                text,
            })
            .is_ok()
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        self.provider.model()
    }
}
