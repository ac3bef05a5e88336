//! Context Window Selection
//!
//! Chooses the subset of a session's turn history that is actually sent
//! to the backend, bounded by a token budget. The most recent turns win;
//! the window is always a contiguous chronological suffix of the history.
//!
//! Token cost is estimated from character count (four characters per
//! token). The system turn is prepended by the orchestrator afterwards
//! and never counts against the budget.

use crate::session::Turn;

/// Estimated token cost of a piece of content: ceil(chars / 4)
pub fn estimated_tokens(content: &str) -> u64 {
    (content.chars().count() as u64 + 3) / 4
}

/// Select the trailing window of `turns` that fits within `budget` tokens
///
/// Walks the history newest to oldest, accumulating estimated cost, and
/// stops at the first turn that would push the running total past the
/// budget. Older turns beyond that point are dropped even if they would
/// individually fit; there is no backfill. The returned slice preserves
/// chronological order.
///
/// An empty history yields an empty window. A single turn whose own cost
/// exceeds the budget is excluded outright; turns are never truncated to
/// fit.
pub fn select_window(turns: &[Turn], budget: u64) -> &[Turn] {
    let mut used: u64 = 0;
    let mut start = turns.len();

    for (idx, turn) in turns.iter().enumerate().rev() {
        let cost = estimated_tokens(&turn.content);
        if used + cost > budget {
            break;
        }
        used += cost;
        start = idx;
    }

    &turns[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_estimated_tokens_rounds_up() {
        assert_eq!(estimated_tokens(""), 0);
        assert_eq!(estimated_tokens("a"), 1);
        assert_eq!(estimated_tokens("abcd"), 1);
        assert_eq!(estimated_tokens("abcde"), 2);
    }

    #[test]
    fn test_empty_history_yields_empty_window() {
        let window = select_window(&[], 1000);
        assert!(window.is_empty());
    }

    #[test]
    fn test_window_is_chronological_suffix() {
        let turns = vec![
            Turn::user("first"),
            Turn::assistant("second"),
            Turn::user("third"),
        ];
        let window = select_window(&turns, 1000);
        assert_eq!(window, &turns[..]);

        // Budget that only covers the last two turns (2 tokens each)
        let window = select_window(&turns, 4);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "second");
        assert_eq!(window[1].content, "third");
    }

    #[test]
    fn test_oversized_single_turn_is_excluded() {
        // 400 chars = 100 tokens, budget of 50 can never include it
        let turns = vec![Turn::user("x".repeat(400))];
        let window = select_window(&turns, 50);
        assert!(window.is_empty());
    }

    #[test]
    fn test_no_backfill_past_first_exceeding_turn() {
        // Newest-first walk: "new" fits, the big middle turn does not,
        // and the small old turn must NOT be picked up behind it.
        let turns = vec![
            Turn::user("old"),                     // 1 token, individually fits
            Turn::assistant("y".repeat(4000)),    // 1000 tokens, exceeds
            Turn::user("new"),                     // 1 token
        ];
        let window = select_window(&turns, 10);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content, "new");
    }

    #[test]
    fn test_budget_scenario_from_history() {
        // u1 (40 chars), a1 (40000 chars = 10000 tokens), u2 (30 chars);
        // budget 20000 tokens covers all three.
        let turns = vec![
            Turn::user("u".repeat(40)),
            Turn::assistant("a".repeat(40_000)),
            Turn::user("q".repeat(30)),
        ];
        let window = select_window(&turns, 20_000);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content.len(), 40);
        assert_eq!(window[1].content.len(), 40_000);
        assert_eq!(window[2].content.len(), 30);

        // With a budget below the assistant turn's cost, only the
        // newest user turn survives.
        let window = select_window(&turns, 9_000);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content.len(), 30);
    }

    #[test]
    fn test_cumulative_cost_within_budget() {
        let turns: Vec<Turn> = (0..20).map(|i| Turn::user(format!("message number {i}"))).collect();
        for budget in [0u64, 3, 7, 25, 1000] {
            let window = select_window(&turns, budget);
            let total: u64 = window.iter().map(|t| estimated_tokens(&t.content)).sum();
            assert!(total <= budget, "total {total} exceeds budget {budget}");
        }
    }
}
