use crate::protocol::Status;
use crate::roles::{ActionKind, RoleProfile};
use crate::state::AgentState;

// Prompt assembly: one system prompt (rules + role guidance + character
// profile), one serialized game-context block, and one action-specific
// instruction, combined into a single request.

const TALK_WINDOW: usize = 20;
const WHISPER_WINDOW: usize = 10;

const BASE_SYSTEM_PROMPT: &str = "\
You are an AI agent playing a werewolf social deduction game.

Rules of the game:
- Players are split into the village team and the werewolf team.
- During the day everyone discusses and then votes to execute one player.
- During the night the werewolves attack one villager.
- The village wins by executing every werewolf. The wolves win once they
  equal or outnumber the remaining villagers.

Roles:
- Villager: no special ability.
- Seer: divines one player each night and learns if they are a werewolf.
- Medium: learns whether the executed player was a werewolf.
- Bodyguard: protects one player each night from the attack.
- Werewolf: attacks one villager each night and whispers with fellow wolves.
- Possessed: counts as human but wins with the werewolf team.

Important instructions:
- Always play toward your own team's victory.
- Reason from what other players say and do.
- Answer concisely and in English in the format the task asks for.";

pub fn system_prompt(state: &AgentState) -> String {
    let mut prompt = format!("{}\n\n{}", BASE_SYSTEM_PROMPT, state.role.system_guidance());
    if let Some(profile) = state.profile.as_deref() {
        prompt.push_str(&format!(
            "\n\nCharacter profile (must be reflected in your speaking style):\n{profile}"
        ));
    }
    prompt
}

/// Serialize what this agent knows into a textual block for the generator.
/// History windows are bounded so the request stays a sane size.
pub fn game_context(state: &AgentState) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("Your name: {}", state.my_name()));
    parts.push(format!("Your role: {}", state.role));

    if let Some(info) = &state.info {
        parts.push(format!("Current day: {}", info.day));

        let mut alive: Vec<&str> = Vec::new();
        let mut dead: Vec<&str> = Vec::new();
        for (name, status) in &info.status_map {
            match status {
                Status::Alive => alive.push(name.as_str()),
                Status::Dead => dead.push(name.as_str()),
            }
        }
        alive.sort();
        dead.sort();
        parts.push(format!("\n[Survival]\nAlive: {}", alive.join(", ")));
        if !dead.is_empty() {
            parts.push(format!("Dead: {}", dead.join(", ")));
        }

        if !info.role_map.is_empty() {
            parts.push("\n[Known roles]".to_string());
            let mut known: Vec<(&String, &crate::protocol::Role)> = info.role_map.iter().collect();
            known.sort_by(|a, b| a.0.cmp(b.0));
            for (name, role) in known {
                parts.push(format!("  {name}: {role}"));
            }
        }
    }

    if !state.divine_results.is_empty() {
        parts.push("\n[Divine results]".to_string());
        for judge in &state.divine_results {
            parts.push(format!("  day {}: {} is {}", judge.day, judge.target, judge.result));
        }
    }

    if !state.medium_results.is_empty() {
        parts.push("\n[Medium results]".to_string());
        for judge in &state.medium_results {
            parts.push(format!("  day {}: {} was {}", judge.day, judge.target, judge.result));
        }
    }

    if !state.executed.is_empty() {
        parts.push(format!("\nExecuted players: {}", state.executed.join(", ")));
    }
    if !state.attacked.is_empty() {
        parts.push(format!("Attacked players: {}", state.attacked.join(", ")));
    }

    if let Some(votes) = state.vote_history.last()
        && !votes.is_empty()
    {
        parts.push("\n[Latest votes]".to_string());
        for vote in votes {
            parts.push(format!("  {} voted for {}", vote.agent, vote.target));
        }
    }

    if !state.talk_history.is_empty() {
        parts.push("\n[Talk history]".to_string());
        let start = state.talk_history.len().saturating_sub(TALK_WINDOW);
        for talk in &state.talk_history[start..] {
            parts.push(format!("  {}: {}", talk.agent, talk.text));
        }
    }

    if !state.whisper_history.is_empty() {
        parts.push("\n[Werewolf whispers]".to_string());
        let start = state.whisper_history.len().saturating_sub(WHISPER_WINDOW);
        for whisper in &state.whisper_history[start..] {
            parts.push(format!("  {}: {}", whisper.agent, whisper.text));
        }
    }

    parts.join("\n")
}

pub fn action_prompt(state: &AgentState, kind: ActionKind, candidates: &[String]) -> String {
    let names = candidates.join(", ");
    let example = candidates.first().map(String::as_str).unwrap_or("Kenji");

    let mut prompt = match kind {
        ActionKind::Talk => "Speak to the other players. Discuss, share information \
             or state your reasoning. One or two short natural sentences. \
             Return only the utterance itself."
            .to_string(),
        ActionKind::Whisper => "Whisper to your fellow werewolves. Share strategy with your \
             teammates. One or two short natural sentences. Return only the \
             utterance itself."
            .to_string(),
        ActionKind::Vote => format!(
            "Choose the player to execute.\nLiving candidates: {names}\n\n\
             Pick whoever seems most suspicious or most strategically valuable \
             to remove. Return only the player name (for example: {example})."
        ),
        ActionKind::Divine => format!(
            "Choose the player to divine tonight.\nLiving candidates: {names}\n\n\
             Pick whoever is most worth investigating. Return only the player \
             name (for example: {example})."
        ),
        ActionKind::Guard => format!(
            "Choose the player to protect tonight.\nLiving candidates: {names}\n\n\
             Pick whoever is most worth protecting. Return only the player name \
             (for example: {example})."
        ),
        ActionKind::Attack => format!(
            "Choose the player to attack tonight.\nLiving candidates: {names}\n\n\
             Prefer whoever contributes most to the village team. Return only \
             the player name (for example: {example})."
        ),
    };

    if let Some(extra) = state.role.action_guidance(kind) {
        prompt.push_str("\n\n[Role-specific context]\n");
        prompt.push_str(extra);
    }
    prompt
}

pub fn user_prompt(context: &str, task: &str) -> String {
    format!("[Game state]\n{context}\n\n[Task]\n{task}")
}
