use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{AgentError, ConfigError};
use crate::fallback::{FallbackEngine, TargetContext};
use crate::llm::Generator;
use crate::prompt;
use crate::protocol::{Packet, Request, Role};
use crate::respond::{self, CleanVerdict};
use crate::roles::{ActionKind, RoleProfile};
use crate::settings::Settings;
use crate::state::AgentState;

/// How one request ended, from the dispatcher's point of view. A timed-out
/// handler may still be running detached when `kill_on_timeout` is off; the
/// flag records whether it was forcibly aborted instead.
#[derive(Debug)]
pub enum ActionOutcome {
    Completed(Option<String>),
    Failed(AgentError),
    TimedOut { killed: bool },
}

impl ActionOutcome {
    /// The response to put on the wire, if any. Failures and timeouts have
    /// already been logged and yield silence.
    pub fn into_response(self) -> Option<String> {
        match self {
            ActionOutcome::Completed(response) => response,
            ActionOutcome::Failed(_) | ActionOutcome::TimedOut { .. } => None,
        }
    }
}

/// One autonomous player for the lifetime of one game. Requests are
/// processed strictly one at a time (`act` takes `&mut self`); the only
/// internal concurrency is the bounded race between a handler task and the
/// deadline timer.
pub struct Agent {
    settings: Arc<Settings>,
    state: Arc<Mutex<AgentState>>,
    generator: Option<Arc<Generator>>,
    fallback: Arc<Mutex<FallbackEngine>>,
    request: Option<Request>,
}

impl Agent {
    pub fn new(settings: Arc<Settings>, role: Role) -> Result<Self, ConfigError> {
        let generator = Generator::from_settings(&settings)?.map(Arc::new);
        Ok(Self::assemble(settings, role, generator, FallbackEngine::new()))
    }

    /// Assembly seam for tests and custom providers.
    pub fn with_parts(
        settings: Arc<Settings>,
        role: Role,
        generator: Option<Arc<Generator>>,
        fallback: FallbackEngine,
    ) -> Self {
        Self::assemble(settings, role, generator, fallback)
    }

    fn assemble(
        settings: Arc<Settings>,
        role: Role,
        generator: Option<Arc<Generator>>,
        fallback: FallbackEngine,
    ) -> Self {
        let state = AgentState::new(settings.agent.name.clone(), role);
        Agent {
            settings,
            state: Arc::new(Mutex::new(state)),
            generator,
            fallback: Arc::new(Mutex::new(fallback)),
            request: None,
        }
    }

    /// A copy of the current game state, for inspection.
    pub fn snapshot(&self) -> AgentState {
        self.state.lock().unwrap().clone()
    }

    /// Fold an incoming packet into the game state. Runs between actions,
    /// never concurrently with one.
    pub fn absorb_packet(&mut self, packet: &Packet) {
        self.request = Some(packet.request);
        self.state.lock().unwrap().absorb_packet(packet);
        log::debug!("{:?}", packet);
    }

    /// Execute the handler for the most recently absorbed request under the
    /// server's action deadline.
    pub async fn act(&mut self) -> ActionOutcome {
        let Some(request) = self.request else {
            return ActionOutcome::Completed(None);
        };
        let deadline = self.state.lock().unwrap().action_deadline();
        let turn = Turn {
            request,
            state: Arc::clone(&self.state),
            generator: self.generator.clone(),
            fallback: Arc::clone(&self.fallback),
        };
        self.drive(request, turn, deadline).await
    }

    // The handler runs on its own task so the caller's timeline is free to
    // give up at the deadline. Without forced kill the loser of that race
    // keeps running detached; every state write inside a handler happens in
    // a single lock scope with no await point, so a late finish can never
    // leave partial state behind.
    async fn drive(
        &self,
        request: Request,
        turn: Turn,
        deadline: Option<Duration>,
    ) -> ActionOutcome {
        let mut handle = tokio::spawn(turn.run());

        let Some(deadline) = deadline else {
            return match handle.await {
                Ok(response) => ActionOutcome::Completed(response),
                Err(e) => ActionOutcome::Failed(e.into()),
            };
        };

        match timeout(deadline, &mut handle).await {
            Ok(Ok(response)) => ActionOutcome::Completed(response),
            Ok(Err(e)) => ActionOutcome::Failed(e.into()),
            Err(_) => {
                log::warn!("action timed out after {:?}: {}", deadline, request);
                let killed = self.settings.agent.kill_on_timeout;
                if killed {
                    handle.abort();
                    log::warn!("action task aborted: {}", request);
                }
                ActionOutcome::TimedOut { killed }
            }
        }
    }
}

// Request-scoped handler context. Owns clones of the shared pieces so the
// spawned task is free of borrowed lifetimes.
struct Turn {
    request: Request,
    state: Arc<Mutex<AgentState>>,
    generator: Option<Arc<Generator>>,
    fallback: Arc<Mutex<FallbackEngine>>,
}

impl Turn {
    async fn run(self) -> Option<String> {
        match self.request {
            Request::Name => Some(self.state.lock().unwrap().connection_name.clone()),
            Request::Talk => Some(self.free_text(ActionKind::Talk).await),
            Request::Whisper => Some(self.free_text(ActionKind::Whisper).await),
            Request::Vote => Some(self.targeted(ActionKind::Vote).await),
            Request::Divine => Some(self.targeted(ActionKind::Divine).await),
            Request::Guard => Some(self.targeted(ActionKind::Guard).await),
            Request::Attack => Some(self.targeted(ActionKind::Attack).await),
            Request::Initialize => {
                self.state.lock().unwrap().start_game();
                None
            }
            Request::DailyInitialize => {
                self.state.lock().unwrap().fold_day_start();
                None
            }
            Request::DailyFinish => {
                self.state.lock().unwrap().fold_day_end();
                None
            }
            Request::Finish => {
                self.finish();
                None
            }
        }
    }

    // Talk and whisper: generate, sanitize, fall back on anything invalid.
    // An empty cleaned line degrades to the Over control token.
    async fn free_text(&self, kind: ActionKind) -> String {
        let snapshot = self.state.lock().unwrap().clone();
        let candidates = snapshot.alive_agents();

        let raw = match self.generate(&snapshot, kind, &candidates).await {
            Some(text) => text,
            None => self.fallback_utterance(&snapshot, kind),
        };

        let known = snapshot.known_names();
        let text = match respond::clean_utterance(&raw, &known) {
            CleanVerdict::Text(t) => t,
            CleanVerdict::Rejected(reason) => {
                log::warn!("discarding generated {} ({:?}): {}", kind, reason, raw);
                self.fallback_utterance(&snapshot, kind)
            }
        };

        if text.is_empty() {
            respond::OVER.to_string()
        } else {
            text
        }
    }

    // Vote, divine, guard, attack: generate, extract an exact candidate,
    // fall back on a miss. The result is always a member of the candidate
    // set computed for this request, or the agent's own name once every
    // degradation step is exhausted.
    async fn targeted(&self, kind: ActionKind) -> String {
        let snapshot = self.state.lock().unwrap().clone();

        if !snapshot.role.supports(kind) {
            log::warn!(
                "{} request for a {} without that ability; answering with fallback",
                kind,
                snapshot.role
            );
            return self.fallback_target(&snapshot, kind);
        }

        let candidates = Self::candidates_for(&snapshot, kind);
        if let Some(raw) = self.generate(&snapshot, kind, &candidates).await
            && let Some(target) = respond::extract_target(&raw, &candidates)
        {
            // Even a well-formed generation never gets to hit a teammate.
            if snapshot.role.knows_teammates() && snapshot.teammates().contains(&target) {
                log::debug!("generated target {} is a teammate; using fallback", target);
            } else {
                return target;
            }
        }

        self.fallback_target(&snapshot, kind)
    }

    fn candidates_for(snapshot: &AgentState, kind: ActionKind) -> Vec<String> {
        match kind {
            ActionKind::Vote => snapshot.vote_candidates(),
            ActionKind::Divine => snapshot.divine_candidates(),
            ActionKind::Guard => snapshot.guard_candidates(),
            ActionKind::Attack => snapshot.attack_candidates(),
            ActionKind::Talk | ActionKind::Whisper => snapshot.alive_agents(),
        }
    }

    async fn generate(
        &self,
        snapshot: &AgentState,
        kind: ActionKind,
        candidates: &[String],
    ) -> Option<String> {
        let generator = self.generator.as_ref()?;

        let system = prompt::system_prompt(snapshot);
        let context = prompt::game_context(snapshot);
        let task = prompt::action_prompt(snapshot, kind, candidates);
        let user = prompt::user_prompt(&context, &task);

        match generator.generate(&system, &user).await {
            Ok(text) => {
                log::debug!("generation response for {}: {}", kind, text);
                Some(text)
            }
            Err(e) => {
                log::warn!("generation failed for {}: {}", kind, e);
                None
            }
        }
    }

    fn fallback_utterance(&self, snapshot: &AgentState, kind: ActionKind) -> String {
        self.fallback
            .lock()
            .unwrap()
            .utterance(snapshot.role.talk_pools(), kind, snapshot.day)
    }

    fn fallback_target(&self, snapshot: &AgentState, kind: ActionKind) -> String {
        let candidates = Self::candidates_for(snapshot, kind);
        let alive = snapshot.alive_agents();
        let me = snapshot.my_name();
        let teammates = snapshot.teammates();
        let claimed_seers = snapshot.seer_claimers();
        let likely_wolves = snapshot.likely_werewolves();

        let ctx = TargetContext {
            candidates: &candidates,
            alive: &alive,
            me: &me,
            teammates: &teammates,
            claimed_seers: &claimed_seers,
            likely_wolves: &likely_wolves,
        };
        self.fallback.lock().unwrap().target(snapshot.role, kind, &ctx)
    }

    fn finish(&self) {
        let state = self.state.lock().unwrap();

        log::info!("========== GAME FINISHED ==========");
        if state.info.is_some() {
            let me = state.my_name();
            let alive = state.alive_agents();
            log::info!(
                "Final status: {} (role: {})",
                if alive.contains(&me) { "ALIVE" } else { "DEAD" },
                state.role
            );
            if let Some(info) = &state.info
                && !info.role_map.is_empty()
            {
                log::info!("Final role map: {:?}", info.role_map);
            }
        }
        log::info!("Game lasted {} days", state.day);
        log::info!(
            "Total talks: {} / total whispers: {}",
            state.talk_history.len(),
            state.whisper_history.len()
        );
        if !state.executed.is_empty() {
            log::info!("Executed agents: {:?}", state.executed);
        }
        if !state.attacked.is_empty() {
            log::info!("Attacked agents: {:?}", state.attacked);
        }
        if !state.divine_results.is_empty() {
            log::info!("Divinations performed: {}", state.divine_results.len());
        }
        if !state.medium_results.is_empty() {
            log::info!("Inquests performed: {}", state.medium_results.len());
        }
    }
}
