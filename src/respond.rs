use once_cell::sync::Lazy;
use regex::Regex;

// Turning raw generated text into something the wire protocol accepts:
// either an exact candidate name for targeted actions, or a cleaned
// single-line utterance for talk and whisper.

/// Control token: say nothing this turn.
pub const SKIP: &str = "Skip";
/// Control token: done speaking today.
pub const OVER: &str = "Over";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

// Generators like to echo the phase label back ("talk: hello").
static LABEL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(talk|whisper)\s*[:\-]\s*").expect("label pattern"));

// Protocol verbs that must never appear inside a natural utterance. The
// server reads them as commands, so a single leaked token corrupts the turn.
static PROTOCOL_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(VOTE|DIVINE|GUARD|ATTACK|COMINGOUT|ESTIMATE|AGREE|DISAGREE)\b")
        .expect("protocol token pattern")
});

// CJK punctuation, kana and unified ideographs. Output language is English;
// in-game names are masked before this check so a Japanese name alone does
// not trip it.
static FOREIGN_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{3000}-\u{303F}\u{3040}-\u{30FF}\u{3400}-\u{9FFF}]")
        .expect("script pattern")
});

/// Why an utterance was thrown away instead of sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ProtocolToken,
    ForeignScript,
}

/// Outcome of cleaning one free-text response. `Rejected` means the caller
/// must substitute a fallback utterance; cleaning itself never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanVerdict {
    Text(String),
    Rejected(RejectReason),
}

/// Collapse a raw response to one trimmed line with wrapping quotes removed.
pub fn normalize_line(raw: &str) -> String {
    let unified = raw.replace(['\r', '\n'], " ");
    let trimmed = unified.trim().trim_matches(|c| c == '"' || c == '\'');
    WHITESPACE.replace_all(trimmed, " ").trim().to_string()
}

/// Clean a talk/whisper response into a protocol-legal line.
///
/// Steps, in order: single-line normalization, phase-label strip, comma
/// removal (the wire format uses commas as field separators), control-token
/// passthrough, protocol-keyword rejection, and a foreign-script check with
/// known player names masked out first.
pub fn clean_utterance(raw: &str, known_names: &[String]) -> CleanVerdict {
    let normalized = normalize_line(raw);
    let unlabeled = LABEL_PREFIX.replace(&normalized, "");
    let cleaned = unlabeled.replace([',', '，', '、'], "").trim().to_string();

    if cleaned == SKIP || cleaned == OVER {
        return CleanVerdict::Text(cleaned);
    }

    if PROTOCOL_TOKENS.is_match(&cleaned) {
        return CleanVerdict::Rejected(RejectReason::ProtocolToken);
    }

    let mut masked = cleaned.clone();
    for name in known_names {
        masked = masked.replace(&format!("@{name}"), "");
        masked = masked.replace(name.as_str(), "");
    }
    if FOREIGN_SCRIPT.is_match(&masked) {
        return CleanVerdict::Rejected(RejectReason::ForeignScript);
    }

    CleanVerdict::Text(cleaned)
}

/// Pull exactly one candidate name out of a raw response.
///
/// Matching order, first hit wins: exact trimmed match, a leading
/// `@`-mention, then substring search longest-first so a short name never
/// shadows a longer one that contains it. Purely alphanumeric names only
/// match on non-alphanumeric boundaries; decorated names match anywhere.
pub fn extract_target(raw: &str, candidates: &[String]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    let cleaned = normalize_line(raw);

    if candidates.iter().any(|c| *c == cleaned) {
        return Some(cleaned);
    }

    if let Some(mention) = cleaned.strip_prefix('@')
        && candidates.iter().any(|c| c == mention)
    {
        return Some(mention.to_string());
    }

    let mut by_length: Vec<&String> = candidates.iter().collect();
    by_length.sort_by_key(|c| std::cmp::Reverse(c.len()));

    for name in by_length {
        if !cleaned.contains(name.as_str()) {
            continue;
        }
        if name.chars().all(|c| c.is_ascii_alphanumeric()) {
            if bounded_match(&cleaned, name) {
                return Some(name.clone());
            }
            continue;
        }
        return Some(name.clone());
    }

    None
}

// True when `name` occurs in `text` with no ASCII alphanumeric character
// touching either side of the match.
fn bounded_match(text: &str, name: &str) -> bool {
    for (pos, _) in text.match_indices(name) {
        let before_ok = text[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_ascii_alphanumeric());
        let after_ok = text[pos + name.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
    }
    false
}
