//! Source rotation: deterministic round-robin and usage-weighted random draws.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::content::ContentItem;
use crate::selection::cursor::SelectionCursor;

/// Picks up to `count` items after the cursor, wrapping around.
/// `items` must be sorted by id. Returns the items and the advanced cursor.
pub fn round_robin(
    items: &[ContentItem],
    cursor: Option<SelectionCursor>,
    count: usize,
) -> (Vec<ContentItem>, Option<SelectionCursor>) {
    if items.is_empty() || count == 0 {
        return (Vec::new(), cursor);
    }

    let start = match cursor {
        Some(c) => items.iter().position(|i| i.id > c.last_id).unwrap_or(0),
        None => 0,
    };
    let take = count.min(items.len());

    let picked: Vec<ContentItem> = (0..take)
        .map(|offset| items[(start + offset) % items.len()].clone())
        .collect();
    let next = picked.last().map(|i| SelectionCursor::new(i.id));
    (picked, next)
}

/// Draws up to `count` distinct items, favoring less-used ones with weight
/// `1 / (1 + use_count)`.
pub fn weighted_random<R: Rng + ?Sized>(
    items: &[ContentItem],
    count: usize,
    rng: &mut R,
) -> Vec<ContentItem> {
    let take = count.min(items.len());
    if take == 0 {
        return Vec::new();
    }
    match items.choose_multiple_weighted(rng, take, |item| {
        1.0 / (1.0 + item.use_count.max(0) as f64)
    }) {
        Ok(picked) => picked.cloned().collect(),
        Err(_) => items.iter().take(take).cloned().collect(),
    }
}
