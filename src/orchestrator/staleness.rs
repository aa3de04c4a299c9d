//! Rebasing suggestions computed against an older text onto the live text.
//!
//! The user's intervening change is recovered as `Edit::diff(base, live)`.
//! Suggestion replacements clear of the user's change are shifted. A
//! replacement that touches the user's change survives only while the user
//! is typing it. Every user replacement touching it must stay inside the
//! replaced range, so no text the suggestion keeps was deleted, and the live
//! text of that range must be a subsequence of the suggested text. Once the
//! range reads exactly like the suggestion the replacement is spent and
//! dropped. Anything else makes the whole suggestion stale.

use crate::text::{Edit, Replacement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The live text still equals the base.
    Unchanged(Edit),
    /// The suggestion was carried over to the live text; may be empty when the
    /// user already typed all of it.
    Rebased(Edit),
    Stale,
}

impl RebaseOutcome {
    pub fn into_edit(self) -> Option<Edit> {
        match self {
            RebaseOutcome::Unchanged(edit) | RebaseOutcome::Rebased(edit) => Some(edit),
            RebaseOutcome::Stale => None,
        }
    }
}

/// Carry `suggestion`, expressed over `base`, onto `live`.
pub fn rebase(suggestion: &Edit, base: &str, live: &str) -> RebaseOutcome {
    if base == live {
        return RebaseOutcome::Unchanged(suggestion.clone());
    }
    if suggestion.validate(base).is_err() {
        return RebaseOutcome::Stale;
    }
    let user = Edit::diff(base, live);
    let user_edits = user.replacements();
    let mut rebased = Vec::with_capacity(suggestion.len());

    for r in suggestion.replacements() {
        let conflicts: Vec<&Replacement> = user_edits
            .iter()
            .filter(|u| u.range.intersects_or_touches(&r.range))
            .collect();
        let delta_before: isize = user_edits
            .iter()
            .filter(|u| u.range.end < r.range.start)
            .map(|u| u.delta())
            .sum();

        if conflicts.is_empty() {
            let start = r.range.start.saturating_add_signed(delta_before);
            rebased.push(Replacement::new(
                start,
                start + r.range.len(),
                r.new_text.clone(),
            ));
            continue;
        }

        if let Some(outside) = conflicts
            .iter()
            .find(|u| u.range.start < r.range.start || u.range.end > r.range.end)
        {
            log::debug!(
                target: "tsugi::orchestrator",
                "Suggestion at {} conflicts with user edit at {}",
                r.range,
                outside.range
            );
            return RebaseOutcome::Stale;
        }

        let suggested = r.new_text.as_str();
        let conflict_delta: isize = conflicts.iter().map(|u| u.delta()).sum();
        let live_start = r.range.start.saturating_add_signed(delta_before);
        let live_end = r.range.end.saturating_add_signed(delta_before + conflict_delta);
        let Some(current) = live.get(live_start..live_end) else {
            return RebaseOutcome::Stale;
        };

        if current == suggested {
            continue;
        }
        if !is_subsequence(current, suggested) {
            log::debug!(
                target: "tsugi::orchestrator",
                "Suggestion at {} conflicts with user edit; {:?} does not lead to {:?}",
                r.range,
                current,
                suggested
            );
            return RebaseOutcome::Stale;
        }
        rebased.push(Replacement::new(live_start, live_end, suggested));
    }

    match Edit::new(rebased) {
        Ok(edit) => RebaseOutcome::Rebased(edit),
        Err(_) => RebaseOutcome::Stale,
    }
}

/// Whether `needle`'s chars appear in `haystack` in order.
fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut haystack = haystack.chars();
    needle.chars().all(|c| haystack.any(|h| h == c))
}
