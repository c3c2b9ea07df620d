use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use crate::protocol::Role;
use crate::roles::{ActionKind, TalkPools};

/// How many recent canned utterances are held back from reselection.
pub const RECENT_TALK_WINDOW: usize = 5;

/// Read-only inputs for one targeted-action fallback decision. Computed
/// fresh per action and never stored.
pub struct TargetContext<'a> {
    pub candidates: &'a [String],
    pub alive: &'a [String],
    pub me: &'a str,
    pub teammates: &'a [String],
    pub claimed_seers: &'a [String],
    pub likely_wolves: &'a [String],
}

/// Safe defaults for when generation is unavailable or invalid.
/// Deterministic in structure, randomized in selection; the randomness
/// source is injected so tests can seed it. Selection never fails: the
/// worst case is a canned sentence or the agent's own name.
pub struct FallbackEngine {
    rng: StdRng,
    recent_talks: VecDeque<String>, // anti-repetition memory, one per agent
}

impl FallbackEngine {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic engine for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        FallbackEngine {
            rng,
            recent_talks: VecDeque::with_capacity(RECENT_TALK_WINDOW),
        }
    }

    /// Pick a canned utterance from the pool matching the phase: greeting
    /// pool on day zero, discussion pool afterwards, whisper pool for the
    /// private channel. Recently used sentences are excluded until the pool
    /// is exhausted, at which point the memory resets.
    pub fn utterance(&mut self, pools: &TalkPools, kind: ActionKind, day: u32) -> String {
        let pool: &[&str] = match kind {
            ActionKind::Whisper => pools.whisper,
            _ if day == 0 => pools.day_zero,
            _ => pools.discussion,
        };

        let mut available: Vec<&str> = pool
            .iter()
            .copied()
            .filter(|&c| !self.recent_talks.iter().any(|r| r == c))
            .collect();
        if available.is_empty() {
            self.recent_talks.clear();
            available = pool.to_vec();
        }

        let selected = available[self.rng.random_range(0..available.len())].to_string();

        self.recent_talks.push_back(selected.clone());
        if self.recent_talks.len() > RECENT_TALK_WINDOW {
            self.recent_talks.pop_front();
        }
        selected
    }

    /// Role-aware target fallback. Always returns a concrete name.
    pub fn target(&mut self, role: Role, kind: ActionKind, ctx: &TargetContext) -> String {
        match (role, kind) {
            (Role::Werewolf, ActionKind::Vote | ActionKind::Attack) => self.werewolf_target(ctx),
            (Role::Possessed, ActionKind::Vote) => self.possessed_target(ctx),
            _ => self.uniform_target(ctx),
        }
    }

    // Uniform choice over the candidates, degrading to the alive list and
    // finally to the agent's own identity.
    fn uniform_target(&mut self, ctx: &TargetContext) -> String {
        self.choose(ctx.candidates)
            .or_else(|| self.choose(ctx.alive))
            .unwrap_or_else(|| ctx.me.to_string())
    }

    // A werewolf never selects a known teammate. If exclusion empties the
    // pool the exclusion is dropped with a logged warning, which is the
    // observable degenerate case rather than a silent one.
    fn werewolf_target(&mut self, ctx: &TargetContext) -> String {
        let safe: Vec<String> = ctx
            .candidates
            .iter()
            .filter(|c| !ctx.teammates.contains(*c))
            .cloned()
            .collect();

        if safe.is_empty() {
            if !ctx.candidates.is_empty() {
                log::warn!("only teammates left to target; dropping teammate exclusion");
            }
            return self.uniform_target(ctx);
        }

        let claimers: Vec<String> = ctx
            .claimed_seers
            .iter()
            .filter(|c| safe.contains(*c))
            .cloned()
            .collect();
        if let Some(target) = self.choose(&claimers) {
            log::debug!("targeting seer claimer: {}", target);
            return target;
        }

        self.choose(&safe).unwrap_or_else(|| ctx.me.to_string())
    }

    // The possessed votes out seer claimers first and otherwise avoids
    // players the accusation heuristic marks as probable wolves.
    fn possessed_target(&mut self, ctx: &TargetContext) -> String {
        let claimers: Vec<String> = ctx
            .claimed_seers
            .iter()
            .filter(|c| ctx.candidates.contains(*c))
            .cloned()
            .collect();
        if let Some(target) = self.choose(&claimers) {
            log::debug!("voting for seer claimer: {}", target);
            return target;
        }

        let safe: Vec<String> = ctx
            .candidates
            .iter()
            .filter(|c| !ctx.likely_wolves.contains(*c))
            .cloned()
            .collect();
        if let Some(target) = self.choose(&safe) {
            return target;
        }

        self.uniform_target(ctx)
    }

    fn choose(&mut self, items: &[String]) -> Option<String> {
        if items.is_empty() {
            return None;
        }
        Some(items[self.rng.random_range(0..items.len())].clone())
    }
}

impl Default for FallbackEngine {
    fn default() -> Self {
        Self::new()
    }
}
