//! Verdict parsing for the moderator's sentinel protocol.
//!
//! The moderator signals discussion state with a sentinel prefix on its
//! reply. The grammar is a case-insensitive match of
//! `^(CONSENSUS_REACHED|CONTINUE_DISCUSSION|CONSENSUS_FAILED)\s*:\s*(.*)`
//! against the trimmed reply, with the payload captured across embedded
//! line breaks and trimmed. This is pure domain logic — no I/O, just text
//! pattern matching.
//!
//! The parser is deliberately permissive and non-enforcing: it does not
//! validate that a `CONSENSUS_REACHED` claim is truthful, only that it is
//! syntactically tagged that way. A reply that matches nothing is
//! [`Verdict::Unparseable`] and the round loop treats it exactly like an
//! explicit continue.

/// Parsed outcome of one moderator reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The group agreed; payload is the final answer
    Reached(String),
    /// Keep discussing; payload is the moderator's guidance
    Continue(String),
    /// The moderator declared failure; payload is its summary
    Failed(String),
    /// The reply carried no recognized sentinel
    Unparseable,
}

/// Sentinel prefix announcing consensus
pub const CONSENSUS_REACHED: &str = "CONSENSUS_REACHED";
/// Sentinel prefix asking for another round
pub const CONTINUE_DISCUSSION: &str = "CONTINUE_DISCUSSION";
/// Sentinel prefix declaring the discussion failed
pub const CONSENSUS_FAILED: &str = "CONSENSUS_FAILED";

impl Verdict {
    /// Parse a raw moderator reply into a verdict
    pub fn parse(raw: &str) -> Verdict {
        let trimmed = raw.trim();

        // Longest sentinel first: CONSENSUS_REACHED and CONSENSUS_FAILED
        // share a prefix but differ before either ends, so order is only
        // about clarity here.
        for sentinel in [CONSENSUS_REACHED, CONTINUE_DISCUSSION, CONSENSUS_FAILED] {
            let Some(payload) = split_sentinel(trimmed, sentinel) else {
                continue;
            };
            let payload = payload.to_string();
            return match sentinel {
                CONSENSUS_REACHED => Verdict::Reached(payload),
                CONTINUE_DISCUSSION => Verdict::Continue(payload),
                _ => Verdict::Failed(payload),
            };
        }
        Verdict::Unparseable
    }

    /// The payload carried by the verdict, if any
    pub fn payload(&self) -> Option<&str> {
        match self {
            Verdict::Reached(s) | Verdict::Continue(s) | Verdict::Failed(s) => Some(s),
            Verdict::Unparseable => None,
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, Verdict::Reached(_))
    }
}

/// Match `^SENTINEL\s*:\s*(rest)` case-insensitively; payload is trimmed
fn split_sentinel<'a>(text: &'a str, sentinel: &str) -> Option<&'a str> {
    let head = text.get(..sentinel.len())?;
    if !head.eq_ignore_ascii_case(sentinel) {
        return None;
    }
    let rest = text[sentinel.len()..].trim_start();
    let payload = rest.strip_prefix(':')?;
    Some(payload.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reached_with_payload() {
        let verdict = Verdict::parse("CONSENSUS_REACHED: 42");
        assert_eq!(verdict, Verdict::Reached("42".to_string()));
        assert!(verdict.is_reached());
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            Verdict::parse("consensus_reached: fine"),
            Verdict::Reached("fine".to_string())
        );
        assert_eq!(
            Verdict::parse("Continue_Discussion: keep going"),
            Verdict::Continue("keep going".to_string())
        );
    }

    #[test]
    fn test_multiline_payload() {
        let verdict = Verdict::parse("consensus_reached:\nLine1\nLine2");
        assert_eq!(verdict, Verdict::Reached("Line1\nLine2".to_string()));
    }

    #[test]
    fn test_whitespace_around_colon() {
        assert_eq!(
            Verdict::parse("CONSENSUS_FAILED \t : no agreement"),
            Verdict::Failed("no agreement".to_string())
        );
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        assert_eq!(
            Verdict::parse("  CONTINUE_DISCUSSION: focus on costs  \n"),
            Verdict::Continue("focus on costs".to_string())
        );
    }

    #[test]
    fn test_unrecognized_reply() {
        assert_eq!(Verdict::parse("I think we're close"), Verdict::Unparseable);
        assert_eq!(Verdict::parse(""), Verdict::Unparseable);
    }

    #[test]
    fn test_sentinel_without_colon_is_unparseable() {
        assert_eq!(Verdict::parse("CONSENSUS_REACHED 42"), Verdict::Unparseable);
    }

    #[test]
    fn test_sentinel_mid_text_is_unparseable() {
        assert_eq!(
            Verdict::parse("I believe CONSENSUS_REACHED: 42"),
            Verdict::Unparseable
        );
    }

    #[test]
    fn test_empty_payload_is_kept() {
        assert_eq!(
            Verdict::parse("CONTINUE_DISCUSSION:"),
            Verdict::Continue(String::new())
        );
    }

    #[test]
    fn test_payload_accessor() {
        assert_eq!(Verdict::parse("CONSENSUS_FAILED: stuck").payload(), Some("stuck"));
        assert_eq!(Verdict::Unparseable.payload(), None);
    }
}
