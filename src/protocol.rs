use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::Display;

// Wire model of the game server protocol. The connection itself (websocket,
// reconnection, handshake) lives in the launcher; the engine only ever sees
// already-decoded packets.

/// Request kinds the server can send. Every packet carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Name,
    Initialize,
    DailyInitialize,
    Talk,
    Whisper,
    Vote,
    Divine,
    Guard,
    Attack,
    DailyFinish,
    Finish,
}

/// The six playable roles. A closed set: the server never sends anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Villager,
    Seer,
    Medium,
    Bodyguard,
    Werewolf,
    Possessed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Alive,
    Dead,
}

/// Two-valued outcome of a divination or an inquest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Species {
    Human,
    Werewolf,
}

/// One public or whispered utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Talk {
    pub idx: u32,
    pub day: u32,
    pub agent: String,
    pub text: String,
}

/// A divine or medium verdict. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judge {
    pub day: u32,
    pub agent: String,
    pub target: String,
    pub result: Species,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub day: u32,
    pub agent: String,
    pub target: String,
}

/// Per-day game snapshot. Optional fields are present only when the day
/// produced them (a divine result exists only for the seer, and so on).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    #[serde(default)]
    pub game_id: String,
    pub day: u32,
    /// This player's in-game name. May differ from the connection name.
    pub agent: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub status_map: HashMap<String, Status>,
    /// Partial role knowledge. Werewolves see each other here.
    #[serde(default)]
    pub role_map: HashMap<String, Role>,
    #[serde(default)]
    pub divine_result: Option<Judge>,
    #[serde(default)]
    pub medium_result: Option<Judge>,
    #[serde(default)]
    pub executed_agent: Option<String>,
    #[serde(default)]
    pub attacked_agent: Option<String>,
    #[serde(default)]
    pub vote_list: Vec<Vote>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSetting {
    #[serde(default)]
    pub allow_self_vote: bool,
}

/// Deadlines in milliseconds. Zero means unbounded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSetting {
    #[serde(default)]
    pub action: u64,
    #[serde(default)]
    pub response: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSetting {
    #[serde(default)]
    pub agent_count: u32,
    #[serde(default)]
    pub vote: VoteSetting,
    #[serde(default)]
    pub timeout: TimeoutSetting,
}

/// One decoded server message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    pub request: Request,
    #[serde(default)]
    pub info: Option<Info>,
    #[serde(default)]
    pub setting: Option<GameSetting>,
    #[serde(default)]
    pub talk_history: Option<Vec<Talk>>,
    #[serde(default)]
    pub whisper_history: Option<Vec<Talk>>,
}
