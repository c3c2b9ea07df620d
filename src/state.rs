use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;

use crate::protocol::{GameSetting, Info, Judge, Packet, Request, Role, Status, Talk, Vote};

// Self-claim phrases for the seer role, as they tend to appear in talk text.
static SEER_CLAIM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(I am the Seer|I am Seer|Seer here|I divined|my divination|divination result)\b")
        .expect("seer claim pattern")
});

// Accusation shapes that name a player as a werewolf. Group 1 captures the name.
static WOLF_ACCUSATION: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)(\w+) is (?:a |the )?(?:werewolf|wolf)").expect("accusation pattern"),
        Regex::new(r"(?i)divined (\w+).*(?:werewolf|wolf)").expect("accusation pattern"),
        Regex::new(r"(?i)(\w+).*is (?:the )?wolf").expect("accusation pattern"),
    ]
});

/// Everything one agent knows about the current game. Owned by a single
/// agent instance for the lifetime of one game and mutated only between
/// requests; the histories are append-only and reset exactly once, at
/// game start.
#[derive(Debug, Clone)]
pub struct AgentState {
    /// Connection name used for the name request.
    pub connection_name: String,
    pub role: Role,
    /// In-game identity, known only after the first snapshot arrives.
    pub game_name: Option<String>,
    pub profile: Option<String>,
    pub day: u32,
    pub info: Option<Info>,
    pub setting: Option<GameSetting>,
    pub talk_history: Vec<Talk>,
    pub whisper_history: Vec<Talk>,
    pub divine_results: Vec<Judge>,
    pub medium_results: Vec<Judge>,
    pub executed: Vec<String>,
    pub attacked: Vec<String>,
    pub vote_history: Vec<Vec<Vote>>,
    folded_day: Option<u32>,
    tallied_day: Option<u32>,
}

impl AgentState {
    pub fn new(connection_name: impl Into<String>, role: Role) -> Self {
        AgentState {
            connection_name: connection_name.into(),
            role,
            game_name: None,
            profile: None,
            day: 0,
            info: None,
            setting: None,
            talk_history: Vec::new(),
            whisper_history: Vec::new(),
            divine_results: Vec::new(),
            medium_results: Vec::new(),
            executed: Vec::new(),
            attacked: Vec::new(),
            vote_history: Vec::new(),
            folded_day: None,
            tallied_day: None,
        }
    }

    /// Fold one incoming packet. Talk deltas are keyed by (day, idx) so a
    /// replayed packet never duplicates history.
    pub fn absorb_packet(&mut self, packet: &Packet) {
        if let Some(info) = &packet.info {
            self.game_name = Some(info.agent.clone());
            if packet.request == Request::Initialize
                && let Some(profile) = info.profile.as_deref()
                && !profile.trim().is_empty()
            {
                self.profile = Some(profile.to_string());
            }
            self.info = Some(info.clone());
        }

        if let Some(setting) = &packet.setting {
            self.setting = Some(setting.clone());
        }

        if let Some(delta) = &packet.talk_history {
            Self::merge_talks(&mut self.talk_history, delta);
        }
        if let Some(delta) = &packet.whisper_history {
            Self::merge_talks(&mut self.whisper_history, delta);
        }

        if packet.request == Request::Initialize {
            self.talk_history.clear();
            self.whisper_history.clear();
        }
    }

    fn merge_talks(history: &mut Vec<Talk>, delta: &[Talk]) {
        for talk in delta {
            if !history.iter().any(|t| t.day == talk.day && t.idx == talk.idx) {
                history.push(talk.clone());
            }
        }
    }

    /// Reset per-game tracking. Runs once, on the game start request.
    pub fn start_game(&mut self) {
        self.day = 0;
        self.divine_results.clear();
        self.medium_results.clear();
        self.executed.clear();
        self.attacked.clear();
        self.vote_history.clear();
        self.folded_day = None;
        self.tallied_day = None;

        if let Some(setting) = &self.setting {
            log::info!(
                "Game initialized: {} players, role={}",
                setting.agent_count,
                self.role
            );
        }
        if let Some(info) = &self.info {
            log::info!(
                "In-game name: {}, role map visible: {}",
                info.agent,
                !info.role_map.is_empty()
            );
        }
    }

    /// Fold the morning snapshot into the histories. Idempotent per day:
    /// replaying the same day's snapshot appends nothing.
    pub fn fold_day_start(&mut self) {
        let Some(info) = self.info.clone() else {
            return;
        };
        if self.folded_day == Some(info.day) {
            log::debug!("day {} already folded, skipping", info.day);
            return;
        }

        self.day = info.day;
        log::info!("=== Day {} started ===", self.day);

        if let Some(judge) = &info.divine_result {
            self.divine_results.push(judge.clone());
            log::info!("Divine result: {} is {}", judge.target, judge.result);
        }
        if let Some(judge) = &info.medium_result {
            self.medium_results.push(judge.clone());
            log::info!("Medium result: {} was {}", judge.target, judge.result);
        }
        if let Some(executed) = &info.executed_agent {
            self.executed.push(executed.clone());
            log::info!("Executed yesterday: {}", executed);
        }
        if let Some(attacked) = &info.attacked_agent {
            self.attacked.push(attacked.clone());
            log::info!("Attacked last night: {}", attacked);
        }

        let alive = self.alive_agents();
        log::info!("Alive agents: {:?} ({})", alive, alive.len());

        self.folded_day = Some(info.day);
    }

    /// Fold the evening vote tally. Idempotent per day like `fold_day_start`.
    pub fn fold_day_end(&mut self) {
        let Some(info) = self.info.clone() else {
            return;
        };
        if self.tallied_day == Some(info.day) {
            log::debug!("day {} votes already tallied, skipping", info.day);
            return;
        }

        log::info!("=== Day {} finished ===", self.day);

        if !info.vote_list.is_empty() {
            self.vote_history.push(info.vote_list.clone());
            let mut counts: HashMap<&str, u32> = HashMap::new();
            for vote in &info.vote_list {
                *counts.entry(vote.target.as_str()).or_default() += 1;
            }
            log::info!("Vote summary: {:?}", counts);
        }

        let today = self.talk_history.iter().filter(|t| t.day == self.day).count();
        log::info!("Total talks today: {}", today);

        self.tallied_day = Some(info.day);
    }

    /// In-game name, falling back to the connection name until the first
    /// snapshot tells us who we are.
    pub fn my_name(&self) -> String {
        if let Some(info) = &self.info {
            return info.agent.clone();
        }
        self.game_name
            .clone()
            .unwrap_or_else(|| self.connection_name.clone())
    }

    /// Living players, sorted for deterministic iteration.
    pub fn alive_agents(&self) -> Vec<String> {
        let Some(info) = &self.info else {
            return Vec::new();
        };
        let mut alive: Vec<String> = info
            .status_map
            .iter()
            .filter(|(_, status)| **status == Status::Alive)
            .map(|(name, _)| name.clone())
            .collect();
        alive.sort();
        alive
    }

    pub fn vote_candidates(&self) -> Vec<String> {
        let me = self.my_name();
        let allow_self = self
            .setting
            .as_ref()
            .map(|s| s.vote.allow_self_vote)
            .unwrap_or(false);
        self.alive_agents()
            .into_iter()
            .filter(|c| allow_self || *c != me)
            .collect()
    }

    pub fn divine_candidates(&self) -> Vec<String> {
        let me = self.my_name();
        self.alive_agents().into_iter().filter(|c| *c != me).collect()
    }

    pub fn guard_candidates(&self) -> Vec<String> {
        self.divine_candidates()
    }

    /// Attack candidates exclude self and every known werewolf.
    pub fn attack_candidates(&self) -> Vec<String> {
        let me = self.my_name();
        let wolves = self.known_role_holders(Role::Werewolf);
        self.alive_agents()
            .into_iter()
            .filter(|c| *c != me && !wolves.contains(c))
            .collect()
    }

    /// Players sharing this agent's hidden team, per the revealed role map.
    pub fn teammates(&self) -> Vec<String> {
        let me = self.my_name();
        self.known_role_holders(self.role)
            .into_iter()
            .filter(|name| *name != me)
            .collect()
    }

    fn known_role_holders(&self, role: Role) -> Vec<String> {
        let Some(info) = &self.info else {
            return Vec::new();
        };
        let mut holders: Vec<String> = info
            .role_map
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(name, _)| name.clone())
            .collect();
        holders.sort();
        holders
    }

    /// Players whose talk matched a seer self-claim phrase, in claim order.
    pub fn seer_claimers(&self) -> Vec<String> {
        let mut claimers: Vec<String> = Vec::new();
        for talk in &self.talk_history {
            if !talk.agent.is_empty()
                && SEER_CLAIM.is_match(&talk.text)
                && !claimers.contains(&talk.agent)
            {
                claimers.push(talk.agent.clone());
            }
        }
        claimers
    }

    /// Players the public accusations mark as probable werewolves. Captured
    /// names are only kept when they belong to a known player.
    pub fn likely_werewolves(&self) -> Vec<String> {
        let Some(info) = &self.info else {
            return Vec::new();
        };
        let mut suspects: Vec<String> = Vec::new();
        for talk in &self.talk_history {
            for pattern in WOLF_ACCUSATION.iter() {
                for caps in pattern.captures_iter(&talk.text) {
                    if let Some(name) = caps.get(1).map(|m| m.as_str().to_string())
                        && info.status_map.contains_key(&name)
                        && !suspects.contains(&name)
                    {
                        suspects.push(name);
                    }
                }
            }
        }
        suspects
    }

    /// Names of every known player, dead or alive.
    pub fn known_names(&self) -> Vec<String> {
        self.info
            .as_ref()
            .map(|info| info.status_map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Server deadline for one action. `None` means unbounded.
    pub fn action_deadline(&self) -> Option<Duration> {
        self.setting
            .as_ref()
            .map(|s| s.timeout.action)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
