//! Repeat-avoiding pick over the organisation content library.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::content::ContentItem;

/// Uniform random choice among candidates not in `recently_used`.
/// `None` means every candidate was used inside the window.
pub fn pick_avoiding_repeats<R: Rng + ?Sized>(
    candidates: &[ContentItem],
    recently_used: &HashSet<i64>,
    rng: &mut R,
) -> Option<ContentItem> {
    let eligible: Vec<&ContentItem> = candidates
        .iter()
        .filter(|item| !recently_used.contains(&item.id))
        .collect();
    eligible.choose(rng).map(|item| (*item).clone())
}
