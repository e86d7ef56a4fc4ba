//! Client-side turn protocol.
//!
//! One turn in flight at a time. A submission optimistically appends the user
//! message; the outcome either appends the assistant reply or rolls the user
//! message back, so the transcript never shows an unanswered user turn.
//! Rate-limit failures start a cooldown that blocks input until it counts down.

use std::time::Duration;

use super::transport::TurnTransport;
use crate::engine::types::{
    AnalysisRequest, AssistantTurn, ConversationMessage, ErrorKind, ErrorState, ImagePayload, Role,
};

/// Starter prompts offered on an empty transcript.
pub const QUICK_OPTIONS: [&str; 4] = [
    "Tengo un problema con el celular",
    "Tengo un problema con la computadora",
    "Tengo un problema con el televisor",
    "Tengo un problema con otro aparato",
];

pub const NEEDS_PHOTO_HINT: &str = "📸 Sacá una foto para que pueda ayudarte";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingResponse,
    Cooldown { seconds_remaining: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejection {
    #[error("nothing to send")]
    EmptyInput,
    #[error("a turn is already in flight")]
    Busy,
    #[error("cooling down for {seconds_remaining}s")]
    CoolingDown { seconds_remaining: u64 },
}

#[derive(Debug, Clone)]
pub struct ConversationStateMachine {
    phase: Phase,
    transcript: Vec<ConversationMessage>,
    needs_photo: bool,
    error: Option<ErrorState>,
}

impl Default for ConversationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStateMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            transcript: Vec::new(),
            needs_photo: false,
            error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    pub fn needs_photo(&self) -> bool {
        self.needs_photo
    }

    pub fn error(&self) -> Option<&ErrorState> {
        self.error.as_ref()
    }

    pub fn is_input_enabled(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Starter prompts, only while the transcript is empty.
    pub fn quick_options(&self) -> &'static [&'static str] {
        if self.transcript.is_empty() {
            &QUICK_OPTIONS
        } else {
            &[]
        }
    }

    /// Current banner text, with the live countdown during cooldown.
    pub fn banner(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        let remaining = match self.phase {
            Phase::Cooldown { seconds_remaining } => Some(seconds_remaining),
            _ => None,
        };
        Some(error.banner(remaining))
    }

    /// Hide the banner. A rate-limit banner stays up while its cooldown runs.
    pub fn dismiss_error(&mut self) {
        if !matches!(self.phase, Phase::Cooldown { .. }) {
            self.error = None;
        }
    }

    /// Validate a submission and append the user turn optimistically.
    ///
    /// The returned request carries the transcript as it was before the append.
    pub fn begin_submit(
        &mut self,
        message: &str,
        image: Option<ImagePayload>,
    ) -> Result<AnalysisRequest, SubmitRejection> {
        match self.phase {
            Phase::Cooldown { seconds_remaining } => {
                return Err(SubmitRejection::CoolingDown { seconds_remaining })
            }
            Phase::AwaitingResponse => return Err(SubmitRejection::Busy),
            Phase::Idle => {}
        }

        let message = message.trim();
        if message.is_empty() && image.is_none() {
            return Err(SubmitRejection::EmptyInput);
        }

        let request = AnalysisRequest {
            message: message.to_string(),
            image: image.clone(),
            conversation_history: self.transcript.clone(),
        };

        self.transcript.push(ConversationMessage::user(message, image));
        self.phase = Phase::AwaitingResponse;
        self.error = None;
        self.needs_photo = false;
        Ok(request)
    }

    /// Apply the outcome of the in-flight turn. Ignored unless a turn is pending.
    pub fn resolve(&mut self, outcome: Result<AssistantTurn, ErrorState>) {
        if self.phase != Phase::AwaitingResponse {
            tracing::debug!(phase = ?self.phase, "Outcome without a pending turn ignored");
            return;
        }

        match outcome {
            Ok(turn) => {
                self.needs_photo = turn.needs_image;
                self.transcript.push(turn.to_message());
                self.phase = Phase::Idle;
            }
            Err(error) => {
                self.rollback_pending_user_turn();
                self.phase = match (error.kind, error.retry_after_seconds) {
                    (ErrorKind::RateLimit, Some(secs)) if secs > 0 => {
                        Phase::Cooldown { seconds_remaining: secs }
                    }
                    _ => Phase::Idle,
                };
                tracing::debug!(kind = ?error.kind, phase = ?self.phase, "Turn failed");
                self.error = Some(error);
            }
        }
    }

    fn rollback_pending_user_turn(&mut self) {
        if matches!(self.transcript.last(), Some(m) if m.role == Role::User) {
            self.transcript.pop();
        }
    }

    /// Advance the cooldown by one second. Returns true while still cooling down.
    pub fn tick(&mut self) -> bool {
        let Phase::Cooldown { seconds_remaining } = self.phase else {
            return false;
        };
        let remaining = seconds_remaining.saturating_sub(1);
        if remaining == 0 {
            self.phase = Phase::Idle;
            self.error = None;
            false
        } else {
            self.phase = Phase::Cooldown {
                seconds_remaining: remaining,
            };
            true
        }
    }

    /// Submit one turn through `transport` and apply the outcome.
    pub async fn submit<T>(
        &mut self,
        transport: &T,
        message: &str,
        image: Option<ImagePayload>,
    ) -> Result<(), SubmitRejection>
    where
        T: TurnTransport + ?Sized,
    {
        let request = self.begin_submit(message, image)?;
        let outcome = transport.send_turn(&request).await;
        self.resolve(outcome);
        Ok(())
    }

    /// Count the cooldown down once per second until input is re-enabled.
    /// `on_tick` sees the machine after every step, e.g. to redraw the banner.
    pub async fn run_cooldown<F>(&mut self, mut on_tick: F)
    where
        F: FnMut(&Self),
    {
        if !matches!(self.phase, Phase::Cooldown { .. }) {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // First tick fires immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let cooling = self.tick();
            on_tick(self);
            if !cooling {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeTransport {
        outcomes: Mutex<Vec<Result<AssistantTurn, ErrorState>>>,
        calls: AtomicUsize,
        last_request: Mutex<Option<AnalysisRequest>>,
    }

    impl FakeTransport {
        fn new(outcomes: Vec<Result<AssistantTurn, ErrorState>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TurnTransport for FakeTransport {
        async fn send_turn(&self, request: &AnalysisRequest) -> Result<AssistantTurn, ErrorState> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Err(ErrorState::connection())
            } else {
                outcomes.remove(0)
            }
        }
    }

    fn turn(reply: &str) -> AssistantTurn {
        AssistantTurn {
            reply: reply.into(),
            needs_image: false,
            is_solution: false,
            solution: None,
            icons: Vec::new(),
            generated_image: None,
        }
    }

    #[tokio::test]
    async fn test_successful_turn_appends_both_messages() {
        let transport = FakeTransport::new(vec![Ok(turn("¿Qué aparato es?"))]);
        let mut machine = ConversationStateMachine::new();

        machine.submit(&transport, "Hola", None).await.unwrap();

        assert_eq!(machine.phase(), Phase::Idle);
        assert_eq!(machine.transcript().len(), 2);
        assert_eq!(machine.transcript()[1].content, "¿Qué aparato es?");
        assert!(machine.error().is_none());
    }

    #[tokio::test]
    async fn test_history_excludes_current_message() {
        let transport = FakeTransport::new(vec![Ok(turn("uno")), Ok(turn("dos"))]);
        let mut machine = ConversationStateMachine::new();
        machine.submit(&transport, "primero", None).await.unwrap();
        machine.submit(&transport, "segundo", None).await.unwrap();

        let request = transport.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.message, "segundo");
        assert_eq!(request.conversation_history.len(), 2);
        assert!(request.conversation_history.iter().all(|m| m.content != "segundo"));
    }

    #[tokio::test]
    async fn test_general_failure_rolls_back_user_turn() {
        let transport = FakeTransport::new(vec![
            Ok(turn("uno")),
            Ok(turn("dos")),
            Err(ErrorState::general()),
        ]);
        let mut machine = ConversationStateMachine::new();
        machine.submit(&transport, "a", None).await.unwrap();
        machine.submit(&transport, "b", None).await.unwrap();
        let before = machine.transcript().to_vec();

        machine.submit(&transport, "c", None).await.unwrap();

        assert_eq!(machine.transcript(), before.as_slice());
        assert_eq!(machine.error().map(|e| e.kind), Some(ErrorKind::General));
        assert_eq!(machine.phase(), Phase::Idle);
        assert!(machine.banner().unwrap().contains("No se pudo procesar"));
    }

    #[tokio::test]
    async fn test_connection_failure_rolls_back() {
        let transport = FakeTransport::new(vec![Err(ErrorState::connection())]);
        let mut machine = ConversationStateMachine::new();
        machine.submit(&transport, "hola", None).await.unwrap();
        assert!(machine.transcript().is_empty());
        assert!(machine.banner().unwrap().contains("internet"));
        machine.dismiss_error();
        assert!(machine.error().is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_enters_cooldown_and_blocks_submissions() {
        let transport = FakeTransport::new(vec![Err(ErrorState::rate_limit(3))]);
        let mut machine = ConversationStateMachine::new();
        machine.submit(&transport, "hola", None).await.unwrap();

        assert_eq!(machine.phase(), Phase::Cooldown { seconds_remaining: 3 });
        assert!(machine.transcript().is_empty());
        assert!(!machine.is_input_enabled());

        let rejected = machine.submit(&transport, "otra vez", None).await;
        assert_eq!(rejected, Err(SubmitRejection::CoolingDown { seconds_remaining: 3 }));
        assert_eq!(transport.calls(), 1);
        assert!(machine.transcript().is_empty());

        // Rate-limit banners cannot be dismissed early.
        machine.dismiss_error();
        assert!(machine.banner().unwrap().contains("3 segundos"));
    }

    #[test]
    fn test_tick_counts_down_and_clears_error() {
        let mut machine = ConversationStateMachine::new();
        machine.begin_submit("hola", None).unwrap();
        machine.resolve(Err(ErrorState::rate_limit(2)));

        assert!(machine.tick());
        assert_eq!(machine.phase(), Phase::Cooldown { seconds_remaining: 1 });
        assert!(machine.banner().unwrap().contains("1 segundos"));

        assert!(!machine.tick());
        assert_eq!(machine.phase(), Phase::Idle);
        assert!(machine.error().is_none());
        assert!(!machine.tick());
    }

    #[test]
    fn test_zero_second_rate_limit_is_idle_and_dismissible() {
        let mut machine = ConversationStateMachine::new();
        machine.begin_submit("hola", None).unwrap();
        machine.resolve(Err(ErrorState::rate_limit(0)));

        assert_eq!(machine.phase(), Phase::Idle);
        assert!(machine.is_input_enabled());
        assert_eq!(machine.error().map(|e| e.kind), Some(ErrorKind::RateLimit));

        machine.dismiss_error();
        assert!(machine.error().is_none());
        assert!(machine.banner().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cooldown_takes_retry_after_seconds() {
        let mut machine = ConversationStateMachine::new();
        machine.begin_submit("hola", None).unwrap();
        machine.resolve(Err(ErrorState::rate_limit(5)));

        let started = tokio::time::Instant::now();
        let mut seen = Vec::new();
        machine
            .run_cooldown(|m| {
                if let Phase::Cooldown { seconds_remaining } = m.phase() {
                    seen.push(seconds_remaining);
                }
            })
            .await;

        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(seen, vec![4, 3, 2, 1]);
        assert!(machine.is_input_enabled());
        assert!(machine.error().is_none());
    }

    #[test]
    fn test_busy_and_empty_rejections() {
        let mut machine = ConversationStateMachine::new();
        assert_eq!(machine.begin_submit("   ", None), Err(SubmitRejection::EmptyInput));
        machine.begin_submit("hola", None).unwrap();
        assert_eq!(machine.begin_submit("otra", None), Err(SubmitRejection::Busy));
    }

    #[test]
    fn test_image_only_submission_allowed() {
        let mut machine = ConversationStateMachine::new();
        let request = machine
            .begin_submit("", Some(ImagePayload::new("iVBORw0KGgoAAAA")))
            .unwrap();
        assert!(request.message.is_empty());
        assert!(machine.transcript()[0].image.is_some());
    }

    #[test]
    fn test_needs_photo_flag_follows_reply() {
        let mut machine = ConversationStateMachine::new();
        machine.begin_submit("no anda", None).unwrap();
        let mut reply = turn("¿Le sacás una foto?");
        reply.needs_image = true;
        machine.resolve(Ok(reply));
        assert!(machine.needs_photo());

        machine.begin_submit("listo", None).unwrap();
        assert!(!machine.needs_photo());
    }

    #[test]
    fn test_quick_options_only_on_empty_transcript() {
        let mut machine = ConversationStateMachine::new();
        assert_eq!(machine.quick_options().len(), 4);
        assert_eq!(machine.quick_options()[0], "Tengo un problema con el celular");
        machine.begin_submit(QUICK_OPTIONS[1], None).unwrap();
        assert!(machine.quick_options().is_empty());
    }

    #[test]
    fn test_resolve_without_pending_turn_is_ignored() {
        let mut machine = ConversationStateMachine::new();
        machine.resolve(Ok(turn("huérfano")));
        assert!(machine.transcript().is_empty());
    }
}
