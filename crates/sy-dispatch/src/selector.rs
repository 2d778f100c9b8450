//! Winner selection over a ranked candidate list.
//!
//! Two-tier rule: a candidate far ahead of the runner-up wins outright;
//! otherwise the leading few are compared on live load so near-ties spread
//! across agents instead of always landing on the single best scorer.

use std::fmt;

use sy_core::config::SelectionConfig;

use crate::scoring::ScoredCandidate;

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Why a candidate won, carried into the assignment reasoning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionRule {
    /// Top score led the runner-up by more than the clear-winner margin.
    ClearWinner { gap: f64 },
    /// A near-tied candidate displaced the top on strictly lower load.
    LoadBalanced { score_gap: f64 },
    /// Top score kept; no near-tied candidate carried less load.
    TopScore,
}

impl fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionRule::ClearWinner { gap } => write!(f, "clear winner by {gap:.3}"),
            SelectionRule::LoadBalanced { score_gap } => {
                write!(f, "load-balance tie-break within {score_gap:.3}")
            }
            SelectionRule::TopScore => write!(f, "top score"),
        }
    }
}

/// Index into the ranked slice plus the rule that chose it.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub index: usize,
    pub rule: SelectionRule,
}

// ---------------------------------------------------------------------------
// Selection rule
// ---------------------------------------------------------------------------

/// Pick the winner from a best-first ranked list. Returns `None` on an empty
/// list; the caller decides whether that is fatal.
///
/// A challenger displaces the current pick only when its score sits within
/// the tie-break window of the pick's and its load is strictly lower, so a
/// chain of near-ties can walk the choice down to the least-loaded of the
/// leading pool.
pub fn select(ranked: &[ScoredCandidate], cfg: &SelectionConfig) -> Option<Selection> {
    let top = ranked.first()?;

    if let Some(runner_up) = ranked.get(1) {
        let gap = top.total() - runner_up.total();
        if gap > cfg.clear_winner_margin {
            return Some(Selection {
                index: 0,
                rule: SelectionRule::ClearWinner { gap },
            });
        }
    } else {
        return Some(Selection {
            index: 0,
            rule: SelectionRule::TopScore,
        });
    }

    let mut pick = 0;
    for (index, challenger) in ranked.iter().enumerate().take(cfg.tie_break_pool).skip(1) {
        let score_gap = ranked[pick].total() - challenger.total();
        if score_gap < cfg.tie_break_window
            && challenger.agent.current_load_pct < ranked[pick].agent.current_load_pct
        {
            pick = index;
        }
    }

    if pick == 0 {
        Some(Selection {
            index: 0,
            rule: SelectionRule::TopScore,
        })
    } else {
        let score_gap = top.total() - ranked[pick].total();
        Some(Selection {
            index: pick,
            rule: SelectionRule::LoadBalanced { score_gap },
        })
    }
}
