//! Retry classification.
//!
//! # Responsibilities
//! - Recognise node errors that mean "this nonce is no longer usable"
//! - Keep the matching rules in one place so every call site agrees
//!
//! # Design Decisions
//! - Nodes report nonce problems only as free text, so matching is on
//!   lowercase substrings of the error message
//! - Geth, Erigon, Nethermind and Besu phrasings are all covered

/// Substrings (lowercase) that identify a stale or conflicting nonce.
const NONCE_CONFLICT_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce has already been used",
    "already known",
    "replacement transaction underpriced",
    "replacement fee too low",
    "oldnonce",
];

/// True if the node's error text reports a used nonce or a rejected
/// same-nonce replacement.
pub fn is_nonce_conflict(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    NONCE_CONFLICT_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_conflict_messages() {
        assert!(is_nonce_conflict(
            "server returned an error response: error code -32000: nonce too low"
        ));
        assert!(is_nonce_conflict("Nonce has already been used"));
        assert!(is_nonce_conflict("replacement transaction underpriced"));
        assert!(is_nonce_conflict("ReplacementNotAllowed: replacement fee too low"));
        assert!(is_nonce_conflict("already known"));
        assert!(is_nonce_conflict("OldNonce"));
    }

    #[test]
    fn test_other_errors_are_not_nonce_conflicts() {
        assert!(!is_nonce_conflict("insufficient funds for gas * price + value"));
        assert!(!is_nonce_conflict("execution reverted"));
        assert!(!is_nonce_conflict("connection refused"));
        assert!(!is_nonce_conflict("nonce too high"));
        // Below the pool's minimum price, not a replacement.
        assert!(!is_nonce_conflict("transaction underpriced"));
    }
}
