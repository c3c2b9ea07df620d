use strum_macros::Display;

use crate::protocol::Role;

// Role-specific behavior is nothing but data: a system-prompt fragment, an
// action-prompt fragment per action kind, canned talk pools, and a small
// capability table saying which handlers the role exposes. The handlers
// themselves are shared.

/// The actions a handler can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Talk,
    Whisper,
    Vote,
    Divine,
    Guard,
    Attack,
}

/// Canned utterances used when generation is unavailable. Pools are split by
/// game phase; everything is comma-free by construction.
pub struct TalkPools {
    pub day_zero: &'static [&'static str],
    pub discussion: &'static [&'static str],
    pub whisper: &'static [&'static str],
}

const BASE_WHISPER: &[&str] = &[
    "We should keep calm and watch reactions.",
    "Let us coordinate our votes and keep a consistent story.",
    "I will follow the flow and avoid drawing attention.",
];

static BASE_POOLS: TalkPools = TalkPools {
    day_zero: &[
        "Hello everyone.",
        "Nice to meet you all.",
        "I am looking forward to the discussion.",
        "Let us work together today.",
    ],
    discussion: &[
        "I want to hear your reasoning.",
        "Let us discuss who seems suspicious.",
        "I am not sure yet but I will share my thoughts soon.",
        "We should compare notes before the vote.",
    ],
    whisper: BASE_WHISPER,
};

static WEREWOLF_POOLS: TalkPools = TalkPools {
    day_zero: &[
        "Hello everyone. I hope we can work together.",
        "Nice to meet you all. Let us find the wolves.",
        "I am looking forward to hearing everyone's thoughts.",
        "Greetings. I want to help the village win.",
    ],
    discussion: &[
        "I find the quiet ones most suspicious.",
        "We should vote carefully today.",
        "Does anyone have solid information?",
        "Something feels off about this situation.",
        "I am not fully convinced by that claim.",
        "We need to think about who benefits from this.",
        "That reasoning does not add up to me.",
        "I want to hear more before I decide.",
        "The real wolf is probably hiding in plain sight.",
        "We should focus on finding the werewolf.",
        "I have been observing everyone closely.",
        "Let us think about who has been acting strange.",
    ],
    whisper: &[
        "Let us target someone influential tonight.",
        "We should avoid the obvious targets.",
        "I will follow your lead on the attack.",
        "Stay calm and blend in tomorrow.",
        "The Seer is dangerous. We should consider attacking them.",
        "Who do you think is the Bodyguard?",
        "Let us split our votes to avoid suspicion.",
        "I will act suspicious to draw attention away from you.",
    ],
};

static POSSESSED_POOLS: TalkPools = TalkPools {
    day_zero: &[
        "Hello everyone. I look forward to finding the truth.",
        "Nice to meet you all. I have a keen sense for danger.",
        "Greetings. I will be watching everyone carefully.",
        "Hello. Something tells me this will be interesting.",
    ],
    discussion: &[
        "I have a bad feeling about someone here.",
        "I sensed something suspicious last night.",
        "I have information that might change things.",
        "I noticed something important during the night.",
        "There is something I need to share with everyone.",
        "Something does not add up with the claims.",
        "We might be making a mistake with our suspicions.",
        "I think we should reconsider who we trust.",
        "The real threat might be hiding in plain sight.",
        "I am not sure the Seer is telling the truth.",
        "The most trusted person could be the wolf.",
        "We should question those who seem too helpful.",
        "The Seer might be lying to protect someone.",
        "I doubt the divination results we heard.",
    ],
    whisper: BASE_WHISPER,
};

pub trait RoleProfile {
    /// The ability action this role exposes beyond talk and vote, if any.
    fn ability(self) -> Option<ActionKind>;
    fn can_whisper(self) -> bool;
    /// Whether the server reveals this role's teammates in the role map.
    fn knows_teammates(self) -> bool;
    fn supports(self, kind: ActionKind) -> bool;
    fn system_guidance(self) -> &'static str;
    fn action_guidance(self, kind: ActionKind) -> Option<&'static str>;
    fn talk_pools(self) -> &'static TalkPools;
}

impl RoleProfile for Role {
    fn ability(self) -> Option<ActionKind> {
        match self {
            Role::Seer => Some(ActionKind::Divine),
            Role::Bodyguard => Some(ActionKind::Guard),
            Role::Werewolf => Some(ActionKind::Attack),
            Role::Villager | Role::Medium | Role::Possessed => None,
        }
    }

    fn can_whisper(self) -> bool {
        self == Role::Werewolf
    }

    fn knows_teammates(self) -> bool {
        self == Role::Werewolf
    }

    fn supports(self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Talk | ActionKind::Vote => true,
            ActionKind::Whisper => self.can_whisper(),
            other => self.ability() == Some(other),
        }
    }

    fn system_guidance(self) -> &'static str {
        match self {
            Role::Villager => VILLAGER_GUIDANCE,
            Role::Seer => SEER_GUIDANCE,
            Role::Medium => MEDIUM_GUIDANCE,
            Role::Bodyguard => BODYGUARD_GUIDANCE,
            Role::Werewolf => WEREWOLF_GUIDANCE,
            Role::Possessed => POSSESSED_GUIDANCE,
        }
    }

    fn action_guidance(self, kind: ActionKind) -> Option<&'static str> {
        match (self, kind) {
            (Role::Seer, ActionKind::Divine) => Some(SEER_DIVINE_CONTEXT),
            (Role::Bodyguard, ActionKind::Guard) => Some(BODYGUARD_GUARD_CONTEXT),
            (Role::Werewolf, ActionKind::Attack) => Some(WEREWOLF_ATTACK_CONTEXT),
            (Role::Werewolf, ActionKind::Whisper) => Some(WEREWOLF_WHISPER_CONTEXT),
            (Role::Werewolf, ActionKind::Talk) => Some(WEREWOLF_TALK_CONTEXT),
            (Role::Werewolf, ActionKind::Vote) => Some(WEREWOLF_VOTE_CONTEXT),
            (Role::Possessed, ActionKind::Talk) => Some(POSSESSED_TALK_CONTEXT),
            (Role::Possessed, ActionKind::Vote) => Some(POSSESSED_VOTE_CONTEXT),
            (Role::Medium, ActionKind::Talk) => Some(MEDIUM_TALK_CONTEXT),
            _ => None,
        }
    }

    fn talk_pools(self) -> &'static TalkPools {
        match self {
            Role::Werewolf => &WEREWOLF_POOLS,
            Role::Possessed => &POSSESSED_POOLS,
            _ => &BASE_POOLS,
        }
    }
}

// Strategy fragments below are persuasive content consumed verbatim by the
// prompt layer. The engine never interprets them.

const VILLAGER_GUIDANCE: &str = "\
[Villager Role Guidance]
You are a VILLAGER with no special ability. Your weapons are observation and logic.
- Track who claims which role and whether their stories stay consistent.
- Watch voting patterns; wolves often vote together or shield each other.
- Share your suspicions openly; an informed village is a winning village.
- Do not follow the loudest voice blindly. Ask for reasons.";

const SEER_GUIDANCE: &str = "\
[Seer Role Guidance]
You are the SEER. Each night you divine one player and learn whether they are WEREWOLF or HUMAN.
- Prioritize divining suspicious or influential players over quiet ones already doomed.
- Decide carefully when to reveal yourself; early claims build trust but paint a target on you.
- Share WEREWOLF results to lead votes. Stay consistent; contradictions expose you as fake.
- Expect a fake seer to counter-claim. Keep your result history straight.";

const MEDIUM_GUIDANCE: &str = "\
[Medium Role Guidance]
You are the MEDIUM. Each morning you learn whether yesterday's executed player was WEREWOLF or HUMAN.
- Your results verify or destroy other players' claims. Track every claim against them.
- A fake seer is exposed the moment their verdicts contradict your inquest results.
- Decide when to reveal yourself; your word carries weight once trusted.";

const BODYGUARD_GUIDANCE: &str = "\
[Bodyguard Role Guidance]
You are the BODYGUARD. Each night you protect one player from the werewolf attack.
- Protect confirmed or likely information roles first; the seer matters more than you.
- Do not reveal yourself casually. A known bodyguard is worked around or eliminated.
- A night with no death often means your guard succeeded. Use that knowledge quietly.";

const WEREWOLF_GUIDANCE: &str = "\
[Werewolf Role Guidance]
You are a WEREWOLF. Eliminate villagers until wolves equal or outnumber them.
- By day act like an innocent villager. Participate naturally; silence draws suspicion.
- Never reveal your role. Deflect accusations calmly with logical arguments.
- Do not defend fellow wolves too obviously; it links you together.
- At night coordinate with your teammates and remove the most dangerous players first.
- A claimed seer or medium is a priority threat.";

const POSSESSED_GUIDANCE: &str = "\
[Possessed Role Guidance]
You are the POSSESSED. You are human but you win with the werewolf team.
- You do not know who the wolves are and they do not know you. You divine as HUMAN.
- Sow confusion: a fake seer claim with invented results is your strongest play.
- Protect players you suspect are wolves and steer votes toward real villagers.
- Your execution wastes a village vote. Dying can be a win.";

const SEER_DIVINE_CONTEXT: &str = "\
Pick the player whose hidden alignment matters most right now. Prefer players
you have not divined yet. Suspicious or influential players first.";

const BODYGUARD_GUARD_CONTEXT: &str = "\
Guard the player the wolves most want dead tonight. A claimed seer or medium
is the usual target. Avoid guarding yourself unless nothing else makes sense.";

const WEREWOLF_ATTACK_CONTEXT: &str = "\
Priority targets: a claimed seer, then a claimed medium, then the bodyguard,
then influential villagers leading the discussion against you. Consider who
the bodyguard is likely to protect tonight and go around them.";

const WEREWOLF_WHISPER_CONTEXT: &str = "\
This is secret communication with your fellow wolves. Coordinate tonight's
attack target, share suspicions about the seer and bodyguard, and agree on
tomorrow's votes and cover stories.";

const WEREWOLF_TALK_CONTEXT: &str = "\
You must sound like a villager. Do not reveal your role. Participate
naturally and subtly direct suspicion toward real villagers. If a seer claim
names you as WEREWOLF, deny it calmly.";

const WEREWOLF_VOTE_CONTEXT: &str = "\
Vote with the village majority to blend in, steering it toward a claimed seer
or medium when you can. Never pile onto a fellow wolf unless sacrificing them
buys real trust.";

const POSSESSED_TALK_CONTEXT: &str = "\
Your goal is confusion. Consider claiming seer with invented results, casting
doubt on real claims, or quietly defending players you suspect are wolves.
Stay consistent with any fake claim you have already made.";

const POSSESSED_VOTE_CONTEXT: &str = "\
Vote against real villagers, ideally a claimed seer or medium. Avoid voting
for players you suspect are werewolves.";

const MEDIUM_TALK_CONTEXT: &str = "\
Weigh your inquest results against every claim made so far. If a claimed
seer's verdict contradicts what you learned, say so plainly.";
