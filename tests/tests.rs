use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use howl::agent::{ActionOutcome, Agent};
use howl::error::{ConfigError, LlmError};
use howl::fallback::{FallbackEngine, RECENT_TALK_WINDOW, TargetContext};
use howl::llm::{Generator, LlmClient};
use howl::protocol::{
    GameSetting, Info, Judge, Packet, Request, Role, Species, Status, Talk, TimeoutSetting,
    VoteSetting,
};
use howl::respond::{CleanVerdict, OVER, RejectReason, SKIP, clean_utterance, extract_target};
use howl::roles::{ActionKind, RoleProfile};
use howl::settings::Settings;

// ---------------------------------------------------------------------------
// Test doubles and builders

/// Generation backend that replays a fixed script of results, optionally
/// sleeping before each one. Counts fully finished attempts.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    delay: Option<Duration>,
    completions: Arc<AtomicU32>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        ScriptedClient {
            responses: Mutex::new(responses.into()),
            delay: None,
            completions: Arc::new(AtomicU32::new(0)),
        }
    }

    fn slow(text: &str, delay: Duration) -> Self {
        ScriptedClient {
            responses: Mutex::new(VecDeque::from(vec![Ok(text.to_string())])),
            delay: Some(delay),
            completions: Arc::new(AtomicU32::new(0)),
        }
    }

    fn completions(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.completions)
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string())));
        self.completions.fetch_add(1, Ordering::SeqCst);
        result
    }
}

fn test_settings(kill_on_timeout: bool) -> Arc<Settings> {
    let mut settings = Settings::default();
    settings.agent.name = "howl1".to_string();
    settings.agent.kill_on_timeout = kill_on_timeout;
    settings.llm.enabled = false;
    Arc::new(settings)
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn init_packet(
    me: &str,
    players: &[&str],
    role_map: &[(&str, Role)],
    action_timeout_ms: u64,
) -> Packet {
    let status_map: HashMap<String, Status> = players
        .iter()
        .map(|name| (name.to_string(), Status::Alive))
        .collect();
    let role_map: HashMap<String, Role> = role_map
        .iter()
        .map(|(name, role)| (name.to_string(), *role))
        .collect();
    Packet {
        request: Request::Initialize,
        info: Some(Info {
            game_id: "01".to_string(),
            day: 0,
            agent: me.to_string(),
            status_map,
            role_map,
            ..Default::default()
        }),
        setting: Some(GameSetting {
            agent_count: players.len() as u32,
            vote: VoteSetting::default(),
            timeout: TimeoutSetting {
                action: action_timeout_ms,
                response: 120_000,
            },
        }),
        talk_history: None,
        whisper_history: None,
    }
}

fn request_packet(request: Request) -> Packet {
    Packet {
        request,
        info: None,
        setting: None,
        talk_history: None,
        whisper_history: None,
    }
}

fn scripted_agent(
    settings: Arc<Settings>,
    role: Role,
    client: ScriptedClient,
    seed: u64,
) -> Agent {
    let generator = Generator::new(Arc::new(client), 0, Duration::from_millis(10));
    Agent::with_parts(
        settings,
        role,
        Some(Arc::new(generator)),
        FallbackEngine::seeded(seed),
    )
}

async fn play(agent: &mut Agent, request: Request) -> ActionOutcome {
    agent.absorb_packet(&request_packet(request));
    agent.act().await
}

// ---------------------------------------------------------------------------
// Target extraction

#[test]
fn extract_exact_candidate_from_sentence() {
    let candidates = names(&["Alice", "Bob"]);
    assert_eq!(
        extract_target("I choose Bob.", &candidates),
        Some("Bob".to_string())
    );
}

#[test]
fn extract_exact_trimmed_and_quoted() {
    let candidates = names(&["Alice", "Bob"]);
    assert_eq!(
        extract_target("  \"Alice\"\n", &candidates),
        Some("Alice".to_string())
    );
}

#[test]
fn extract_leading_mention() {
    let candidates = names(&["Alice", "Bob"]);
    assert_eq!(extract_target("@Alice", &candidates), Some("Alice".to_string()));
}

#[test]
fn extract_prefers_longer_name_on_overlap() {
    let candidates = names(&["Mina", "Minato"]);
    // Only the longer name appears: the shorter must not fire inside it.
    assert_eq!(
        extract_target("My vote goes to Minato tonight.", &candidates),
        Some("Minato".to_string())
    );
    // Only the shorter name appears.
    assert_eq!(
        extract_target("Mina has been quiet.", &candidates),
        Some("Mina".to_string())
    );
}

#[test]
fn extract_requires_word_boundary_for_plain_names() {
    let candidates = names(&["Bob"]);
    assert_eq!(extract_target("Bobby is suspicious.", &candidates), None);
    assert_eq!(
        extract_target("I suspect Bob!", &candidates),
        Some("Bob".to_string())
    );
}

#[test]
fn extract_decorated_name_matches_by_substring() {
    let candidates = names(&["Agent[01]", "Agent[02]"]);
    assert_eq!(
        extract_target("Definitely Agent[02] for me.", &candidates),
        Some("Agent[02]".to_string())
    );
}

#[test]
fn extract_returns_none_on_garbage() {
    let candidates = names(&["Alice", "Bob"]);
    assert_eq!(extract_target("nobody in particular", &candidates), None);
    assert_eq!(extract_target("", &candidates), None);
    assert_eq!(extract_target("Alice", &[]), None);
}

// ---------------------------------------------------------------------------
// Free-text sanitizing

#[test]
fn clean_collapses_to_single_comma_free_line() {
    let verdict = clean_utterance("  Hello\neveryone,\r\nwelcome  ", &[]);
    match verdict {
        CleanVerdict::Text(text) => {
            assert!(!text.contains(','));
            assert!(!text.contains('\n'));
            assert_eq!(text, "Hello everyone welcome");
        }
        other => panic!("expected cleaned text, got {:?}", other),
    }
}

#[test]
fn clean_strips_phase_label_and_fullwidth_commas() {
    assert_eq!(
        clean_utterance("talk: I agree with that、mostly，yes", &[]),
        CleanVerdict::Text("I agree with thatmostlyyes".to_string())
    );
}

#[test]
fn clean_passes_control_tokens_verbatim() {
    assert_eq!(clean_utterance("Skip", &[]), CleanVerdict::Text(SKIP.to_string()));
    assert_eq!(clean_utterance("\"Over\"", &[]), CleanVerdict::Text(OVER.to_string()));
}

#[test]
fn clean_rejects_protocol_keywords() {
    assert_eq!(
        clean_utterance("I say we VOTE Alice out", &[]),
        CleanVerdict::Rejected(RejectReason::ProtocolToken)
    );
    // Lowercase is ordinary conversation.
    assert!(matches!(
        clean_utterance("we should vote carefully", &[]),
        CleanVerdict::Text(_)
    ));
}

#[test]
fn clean_rejects_foreign_script_unless_it_is_a_name() {
    assert_eq!(
        clean_utterance("私は村人です", &[]),
        CleanVerdict::Rejected(RejectReason::ForeignScript)
    );
    let known = names(&["ケンジ"]);
    assert_eq!(
        clean_utterance("I trust ケンジ today", &known),
        CleanVerdict::Text("I trust ケンジ today".to_string())
    );
}

// ---------------------------------------------------------------------------
// Fallback engine

#[test]
fn fallback_utterances_do_not_repeat_within_window() {
    let pools = Role::Werewolf.talk_pools();
    let mut engine = FallbackEngine::seeded(11);
    let mut picks: Vec<String> = Vec::new();
    for _ in 0..60 {
        let pick = engine.utterance(pools, ActionKind::Talk, 1);
        let window: Vec<&String> = picks.iter().rev().take(RECENT_TALK_WINDOW).collect();
        assert!(
            !window.iter().any(|p| **p == pick),
            "{pick:?} repeated within a window of {RECENT_TALK_WINDOW}"
        );
        picks.push(pick);
    }
}

#[test]
fn fallback_small_pool_resets_instead_of_starving() {
    // The greeting pool is smaller than the anti-repetition window, so the
    // memory must reset rather than leave nothing to say.
    let pools = Role::Villager.talk_pools();
    let mut engine = FallbackEngine::seeded(3);
    for _ in 0..20 {
        let pick = engine.utterance(pools, ActionKind::Talk, 0);
        assert!(pools.day_zero.contains(&pick.as_str()));
    }
}

#[test]
fn fallback_whisper_draws_from_whisper_pool() {
    let pools = Role::Werewolf.talk_pools();
    let mut engine = FallbackEngine::seeded(5);
    let pick = engine.utterance(pools, ActionKind::Whisper, 2);
    assert!(pools.whisper.contains(&pick.as_str()));
}

#[test]
fn fallback_target_never_selects_teammate() {
    let candidates = names(&["Alice", "Bob", "Rex"]);
    let alive = names(&["Alice", "Bob", "Rex", "Wolfie"]);
    let teammates = names(&["Rex"]);
    for seed in 0..50 {
        let mut engine = FallbackEngine::seeded(seed);
        let ctx = TargetContext {
            candidates: &candidates,
            alive: &alive,
            me: "Wolfie",
            teammates: &teammates,
            claimed_seers: &[],
            likely_wolves: &[],
        };
        let target = engine.target(Role::Werewolf, ActionKind::Vote, &ctx);
        assert_ne!(target, "Rex");
        assert!(candidates.contains(&target));
    }
}

#[test]
fn fallback_target_prefers_seer_claimer() {
    let candidates = names(&["Alice", "Bob", "Carol"]);
    let claimed = names(&["Carol"]);
    for seed in 0..10 {
        let mut engine = FallbackEngine::seeded(seed);
        let ctx = TargetContext {
            candidates: &candidates,
            alive: &candidates,
            me: "Wolfie",
            teammates: &[],
            claimed_seers: &claimed,
            likely_wolves: &[],
        };
        assert_eq!(engine.target(Role::Werewolf, ActionKind::Vote, &ctx), "Carol");
        assert_eq!(engine.target(Role::Possessed, ActionKind::Vote, &ctx), "Carol");
    }
}

#[test]
fn fallback_possessed_avoids_likely_wolves() {
    let candidates = names(&["Alice", "Bob", "Carol"]);
    let wolves = names(&["Alice", "Carol"]);
    for seed in 0..20 {
        let mut engine = FallbackEngine::seeded(seed);
        let ctx = TargetContext {
            candidates: &candidates,
            alive: &candidates,
            me: "Maddy",
            teammates: &[],
            claimed_seers: &[],
            likely_wolves: &wolves,
        };
        assert_eq!(engine.target(Role::Possessed, ActionKind::Vote, &ctx), "Bob");
    }
}

#[test]
fn fallback_target_degrades_to_alive_then_self() {
    let alive = names(&["Dana"]);
    let mut engine = FallbackEngine::seeded(0);
    let ctx = TargetContext {
        candidates: &[],
        alive: &alive,
        me: "howl1",
        teammates: &[],
        claimed_seers: &[],
        likely_wolves: &[],
    };
    assert_eq!(engine.target(Role::Villager, ActionKind::Vote, &ctx), "Dana");

    let ctx = TargetContext {
        candidates: &[],
        alive: &[],
        me: "howl1",
        teammates: &[],
        claimed_seers: &[],
        likely_wolves: &[],
    };
    assert_eq!(engine.target(Role::Villager, ActionKind::Vote, &ctx), "howl1");
}

#[test]
fn seeded_engines_are_reproducible() {
    let pools = Role::Werewolf.talk_pools();
    let mut a = FallbackEngine::seeded(42);
    let mut b = FallbackEngine::seeded(42);
    for _ in 0..10 {
        assert_eq!(
            a.utterance(pools, ActionKind::Talk, 1),
            b.utterance(pools, ActionKind::Talk, 1)
        );
    }
}

// ---------------------------------------------------------------------------
// Invocation pipeline

#[tokio::test(start_paused = true)]
async fn generator_succeeds_on_third_attempt_with_doubling_backoff() {
    let client = ScriptedClient::new(vec![
        Err(LlmError::Api("boom".to_string())),
        Err(LlmError::Timeout(Duration::from_millis(50))),
        Ok("Bob".to_string()),
    ]);
    let completions = client.completions();
    let generator = Generator::new(Arc::new(client), 2, Duration::from_millis(100));

    let start = tokio::time::Instant::now();
    let text = generator.generate("system", "user").await.expect("third attempt");
    assert_eq!(text, "Bob");
    assert_eq!(completions.load(Ordering::SeqCst), 3);
    // One backoff unit after the first failure, two after the second.
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn generator_raises_last_error_after_exhausting_retries() {
    let client = ScriptedClient::new(vec![
        Err(LlmError::Api("first".to_string())),
        Err(LlmError::Timeout(Duration::from_millis(50))),
    ]);
    let completions = client.completions();
    let generator = Generator::new(Arc::new(client), 1, Duration::from_millis(100));

    let err = generator.generate("system", "user").await.expect_err("exhausted");
    assert!(matches!(err, LlmError::Timeout(_)));
    assert_eq!(completions.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Dispatcher and handlers

#[tokio::test]
async fn vote_uses_extracted_candidate() {
    let client = ScriptedClient::new(vec![Ok("I choose Bob.".to_string())]);
    let mut agent = scripted_agent(test_settings(false), Role::Villager, client, 1);
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let outcome = play(&mut agent, Request::Vote).await;
    assert_eq!(outcome.into_response(), Some("Bob".to_string()));
}

#[tokio::test]
async fn vote_falls_back_to_legal_candidate_on_miss() {
    let client = ScriptedClient::new(vec![Ok("nobody in particular".to_string())]);
    let mut agent = scripted_agent(test_settings(false), Role::Villager, client, 2);
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let response = play(&mut agent, Request::Vote).await.into_response().unwrap();
    assert!(["Alice", "Bob"].contains(&response.as_str()));
}

#[tokio::test]
async fn werewolf_vote_rejects_generated_teammate() {
    let client = ScriptedClient::new(vec![Ok("Rex".to_string())]);
    let mut agent = scripted_agent(test_settings(false), Role::Werewolf, client, 3);
    agent.absorb_packet(&init_packet(
        "Wolfie",
        &["Wolfie", "Rex", "Alice", "Bob"],
        &[("Wolfie", Role::Werewolf), ("Rex", Role::Werewolf)],
        0,
    ));
    agent.act().await.into_response();

    let response = play(&mut agent, Request::Vote).await.into_response().unwrap();
    assert_ne!(response, "Rex");
    assert!(["Alice", "Bob"].contains(&response.as_str()));
}

#[tokio::test]
async fn talk_discards_protocol_keyword_and_uses_canned_line() {
    let client = ScriptedClient::new(vec![Ok("We should VOTE Alice today".to_string())]);
    let mut agent = scripted_agent(test_settings(false), Role::Villager, client, 4);
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let response = play(&mut agent, Request::Talk).await.into_response().unwrap();
    let pools = Role::Villager.talk_pools();
    assert!(pools.day_zero.contains(&response.as_str()));
    assert!(!response.contains(','));
}

#[tokio::test]
async fn talk_without_generator_uses_canned_pool() {
    let mut agent = Agent::with_parts(
        test_settings(false),
        Role::Villager,
        None,
        FallbackEngine::seeded(9),
    );
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let response = play(&mut agent, Request::Talk).await.into_response().unwrap();
    assert!(Role::Villager.talk_pools().day_zero.contains(&response.as_str()));
}

#[tokio::test]
async fn unsupported_ability_request_still_returns_legal_target() {
    let mut agent = Agent::with_parts(
        test_settings(false),
        Role::Villager,
        None,
        FallbackEngine::seeded(8),
    );
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let response = play(&mut agent, Request::Divine).await.into_response().unwrap();
    assert!(["Alice", "Bob"].contains(&response.as_str()));
}

#[tokio::test]
async fn name_request_answers_connection_name() {
    let mut agent = Agent::with_parts(
        test_settings(false),
        Role::Villager,
        None,
        FallbackEngine::seeded(0),
    );
    let outcome = play(&mut agent, Request::Name).await;
    assert_eq!(outcome.into_response(), Some("howl1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn deadline_without_kill_lets_handler_finish_in_background() {
    let client = ScriptedClient::slow("Hello there", Duration::from_millis(500));
    let completions = client.completions();
    let mut agent = scripted_agent(test_settings(false), Role::Villager, client, 6);
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 100));
    agent.act().await.into_response();

    let outcome = play(&mut agent, Request::Talk).await;
    assert!(matches!(outcome, ActionOutcome::TimedOut { killed: false }));
    assert_eq!(completions.load(Ordering::SeqCst), 0);

    // The loser of the race keeps running and finishes on its own.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // Shared state is intact and the next request proceeds normally.
    let snapshot = agent.snapshot();
    assert_eq!(snapshot.day, 0);
    assert_eq!(snapshot.alive_agents().len(), 3);
    let outcome = play(&mut agent, Request::Name).await;
    assert_eq!(outcome.into_response(), Some("howl1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn deadline_with_kill_aborts_handler() {
    let client = ScriptedClient::slow("Hello there", Duration::from_millis(500));
    let completions = client.completions();
    let mut agent = scripted_agent(test_settings(true), Role::Villager, client, 7);
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 100));
    agent.act().await.into_response();

    let outcome = play(&mut agent, Request::Talk).await;
    assert!(matches!(outcome, ActionOutcome::TimedOut { killed: true }));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// State aggregation

fn day_start_packet(me: &str, players: &[&str], day: u32) -> Packet {
    let status_map: HashMap<String, Status> = players
        .iter()
        .map(|name| (name.to_string(), Status::Alive))
        .collect();
    Packet {
        request: Request::DailyInitialize,
        info: Some(Info {
            day,
            agent: me.to_string(),
            status_map,
            divine_result: Some(Judge {
                day,
                agent: me.to_string(),
                target: "Alice".to_string(),
                result: Species::Human,
            }),
            executed_agent: Some("Carol".to_string()),
            ..Default::default()
        }),
        setting: None,
        talk_history: None,
        whisper_history: None,
    }
}

#[tokio::test]
async fn day_snapshot_folds_idempotently() {
    let mut agent = Agent::with_parts(
        test_settings(false),
        Role::Seer,
        None,
        FallbackEngine::seeded(0),
    );
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let packet = day_start_packet("howl1", &["howl1", "Alice", "Bob"], 1);
    agent.absorb_packet(&packet);
    agent.act().await.into_response();
    agent.absorb_packet(&packet);
    agent.act().await.into_response();

    let snapshot = agent.snapshot();
    assert_eq!(snapshot.day, 1);
    assert_eq!(snapshot.divine_results.len(), 1);
    assert_eq!(snapshot.executed, vec!["Carol".to_string()]);
}

#[tokio::test]
async fn talk_deltas_deduplicate_by_day_and_idx() {
    let mut agent = Agent::with_parts(
        test_settings(false),
        Role::Villager,
        None,
        FallbackEngine::seeded(0),
    );
    agent.absorb_packet(&init_packet("howl1", &["howl1", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let talk = Talk {
        idx: 0,
        day: 1,
        agent: "Alice".to_string(),
        text: "I am the Seer and I divined Bob.".to_string(),
    };
    let mut packet = request_packet(Request::Talk);
    packet.talk_history = Some(vec![talk.clone()]);
    agent.absorb_packet(&packet);
    agent.act().await.into_response();
    agent.absorb_packet(&packet);
    agent.act().await.into_response();

    let snapshot = agent.snapshot();
    assert_eq!(snapshot.talk_history.len(), 1);
    // The claim scanner sees Alice's seer claim exactly once.
    assert_eq!(snapshot.seer_claimers(), vec!["Alice".to_string()]);
}

#[tokio::test]
async fn attack_candidates_exclude_self_and_known_wolves() {
    let mut agent = Agent::with_parts(
        test_settings(false),
        Role::Werewolf,
        None,
        FallbackEngine::seeded(0),
    );
    agent.absorb_packet(&init_packet(
        "Wolfie",
        &["Wolfie", "Rex", "Alice", "Bob"],
        &[("Wolfie", Role::Werewolf), ("Rex", Role::Werewolf)],
        0,
    ));
    agent.act().await.into_response();

    let snapshot = agent.snapshot();
    assert_eq!(snapshot.attack_candidates(), names(&["Alice", "Bob"]));
    assert_eq!(snapshot.teammates(), names(&["Rex"]));
}

#[tokio::test]
async fn accusation_patterns_mark_likely_wolves() {
    let mut agent = Agent::with_parts(
        test_settings(false),
        Role::Possessed,
        None,
        FallbackEngine::seeded(0),
    );
    agent.absorb_packet(&init_packet("Maddy", &["Maddy", "Alice", "Bob"], &[], 0));
    agent.act().await.into_response();

    let mut packet = request_packet(Request::Talk);
    packet.talk_history = Some(vec![Talk {
        idx: 0,
        day: 1,
        agent: "Carol".to_string(),
        text: "I divined Alice and she is a werewolf".to_string(),
    }]);
    agent.absorb_packet(&packet);
    agent.act().await.into_response();

    assert!(agent.snapshot().likely_werewolves().contains(&"Alice".to_string()));
}

// ---------------------------------------------------------------------------
// Settings

#[test]
fn settings_round_trip_through_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("settings.json");
    let path = path.to_str().expect("utf8 path");

    let mut settings = Settings::default();
    settings.agent.name = "howl7".to_string();
    settings.llm.max_retries = 5;
    settings.save_to_file(path).expect("save settings");

    let loaded = Settings::load_from_file(path).expect("load settings");
    assert_eq!(loaded.agent.name, "howl7");
    assert_eq!(loaded.llm.max_retries, 5);
}

#[test]
fn missing_api_key_is_a_config_error() {
    unsafe { std::env::remove_var("OPENAI_API_KEY") };
    let settings = Settings::default();
    assert!(matches!(
        settings.resolve_api_key(),
        Err(ConfigError::MissingApiKey(_))
    ));

    let mut with_key = Settings::default();
    with_key.llm.openai_api_key = Some("sk-test".to_string());
    assert_eq!(with_key.resolve_api_key().expect("key"), "sk-test");
}
