//! Visibility booster
//!
//! Guarantees a minimum share of low-engagement posts per batch so new or
//! unnoticed content surfaces, and spreads them between high-engagement
//! posts instead of clustering them at the end.

use crate::engagement::is_low_engagement;
use crate::models::FeedPost;
use crate::shuffle::Shuffler;
use std::sync::Arc;

pub struct VisibilityBooster {
    shuffler: Arc<Shuffler>,
}

impl VisibilityBooster {
    pub fn new(shuffler: Arc<Shuffler>) -> Self {
        Self { shuffler }
    }

    /// Select up to `batch_size` posts out of `queued` (already in fairness order).
    ///
    /// `floor(batch_size * boost_fraction)` shuffled low-engagement posts are
    /// interleaved one-for-one with high-engagement posts taken in queue order.
    /// Free slots left after `high` runs dry are backfilled with the rest of
    /// the low-engagement posts.
    pub fn boost<'a, P: FeedPost>(
        &self,
        queued: &[&'a P],
        batch_size: usize,
        boost_fraction: f64,
    ) -> Vec<&'a P> {
        let limit = batch_size.min(queued.len());
        if limit == 0 {
            return Vec::new();
        }

        let (mut low, high): (Vec<&'a P>, Vec<&'a P>) =
            queued.iter().copied().partition(|post| is_low_engagement(*post));

        self.shuffler.shuffle(&mut low);

        let boosted_count = target_low_count(batch_size, boost_fraction)
            .min(low.len())
            .min(limit);
        let leftover_low = low.split_off(boosted_count);
        let high_count = (limit - boosted_count).min(high.len());
        let backfill_count = limit - boosted_count - high_count;

        let mut batch = Vec::with_capacity(limit);
        let mut boosted = low.into_iter();
        let mut selected_high = high.into_iter().take(high_count);
        loop {
            let next_low = boosted.next();
            let next_high = selected_high.next();
            if next_low.is_none() && next_high.is_none() {
                break;
            }
            batch.extend(next_low);
            batch.extend(next_high);
        }
        batch.extend(leftover_low.into_iter().take(backfill_count));

        batch
    }
}

/// Number of low-engagement slots reserved in a batch
pub fn target_low_count(batch_size: usize, boost_fraction: f64) -> usize {
    if !boost_fraction.is_finite() || boost_fraction <= 0.0 {
        return 0;
    }
    let fraction = boost_fraction.min(1.0);
    (batch_size as f64 * fraction).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidatePost, EngagementSignal};
    use std::collections::{HashMap, HashSet};

    fn high(id: &str) -> CandidatePost {
        let counts: HashMap<String, u64> = [("like".to_string(), 10)].into_iter().collect();
        CandidatePost::new(id, "author").with_engagement(EngagementSignal::new(counts, 3))
    }

    fn low(id: &str) -> CandidatePost {
        CandidatePost::new(id, "author").with_engagement(EngagementSignal::default())
    }

    fn booster() -> VisibilityBooster {
        VisibilityBooster::new(Arc::new(Shuffler::seeded(11)))
    }

    fn ids<'a>(batch: &[&'a CandidatePost]) -> Vec<&'a str> {
        batch.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_target_low_count() {
        assert_eq!(target_low_count(30, 0.2), 6);
        assert_eq!(target_low_count(7, 0.2), 1);
        assert_eq!(target_low_count(30, 0.0), 0);
        assert_eq!(target_low_count(30, f64::NAN), 0);
        assert_eq!(target_low_count(30, 3.0), 30);
    }

    #[test]
    fn test_pure_high_keeps_order() {
        let posts: Vec<CandidatePost> = (0..10).map(|i| high(&format!("h{}", i))).collect();
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let batch = booster().boost(&refs, 5, 0.2);
        assert_eq!(ids(&batch), vec!["h0", "h1", "h2", "h3", "h4"]);
    }

    #[test]
    fn test_pure_low_returns_shuffled_low() {
        let posts: Vec<CandidatePost> = (0..6).map(|i| low(&format!("l{}", i))).collect();
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let batch = booster().boost(&refs, 10, 0.2);
        let got: HashSet<&str> = ids(&batch).into_iter().collect();
        assert_eq!(batch.len(), 6);
        assert_eq!(got.len(), 6);
    }

    #[test]
    fn test_low_posts_are_interleaved() {
        let mut posts: Vec<CandidatePost> = (0..24).map(|i| high(&format!("h{}", i))).collect();
        posts.extend((0..16).map(|i| low(&format!("l{}", i))));
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let batch = booster().boost(&refs, 30, 0.2);
        assert_eq!(batch.len(), 30);

        let low_positions: Vec<usize> = batch
            .iter()
            .enumerate()
            .filter(|(_, p)| is_low_engagement(**p))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(low_positions, vec![0, 2, 4, 6, 8, 10]);

        // High-engagement posts keep their queue order
        let highs: Vec<&str> = batch
            .iter()
            .filter(|p| !is_low_engagement(**p))
            .map(|p| p.id.as_str())
            .collect();
        let expected: Vec<String> = (0..24).map(|i| format!("h{}", i)).collect();
        assert_eq!(highs, expected);
    }

    #[test]
    fn test_backfills_low_when_high_runs_out() {
        let mut posts: Vec<CandidatePost> = (0..2).map(|i| high(&format!("h{}", i))).collect();
        posts.extend((0..10).map(|i| low(&format!("l{}", i))));
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let batch = booster().boost(&refs, 10, 0.2);
        assert_eq!(batch.len(), 10);
        let low_count = batch.iter().filter(|p| is_low_engagement(**p)).count();
        assert_eq!(low_count, 8);

        let unique: HashSet<&str> = ids(&batch).into_iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn test_small_window_returns_everything() {
        let posts = vec![high("h0"), low("l0"), high("h1")];
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let batch = booster().boost(&refs, 30, 0.2);
        assert_eq!(batch.len(), 3);
        assert_eq!(ids(&batch), vec!["l0", "h0", "h1"]);
    }

    #[test]
    fn test_zero_batch_size() {
        let posts = vec![high("h0")];
        let refs: Vec<&CandidatePost> = posts.iter().collect();
        assert!(booster().boost(&refs, 0, 0.2).is_empty());
    }
}
