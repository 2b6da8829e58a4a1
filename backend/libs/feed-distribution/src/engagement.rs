use crate::models::{EngagementSignal, FeedPost};

/// Interaction total at or below which a post counts as low engagement
pub const LOW_ENGAGEMENT_MAX_INTERACTIONS: u64 = 1;

/// Low engagement: no reactions and no comments, or at most one interaction
/// overall. Posts without engagement data are treated as having zero counts.
pub fn is_low_engagement<P: FeedPost + ?Sized>(post: &P) -> bool {
    match post.engagement() {
        Some(signal) => is_low_signal(signal),
        None => true,
    }
}

pub fn is_low_signal(signal: &EngagementSignal) -> bool {
    let reactions = signal.total_reactions();
    (reactions == 0 && signal.comment_count == 0)
        || reactions.saturating_add(signal.comment_count) <= LOW_ENGAGEMENT_MAX_INTERACTIONS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidatePost;
    use std::collections::HashMap;

    fn post_with(reactions: &[(&str, u64)], comments: u64) -> CandidatePost {
        let counts: HashMap<String, u64> = reactions
            .iter()
            .map(|(kind, count)| (kind.to_string(), *count))
            .collect();
        CandidatePost::new("p", "a").with_engagement(EngagementSignal::new(counts, comments))
    }

    #[test]
    fn test_zero_interactions_is_low() {
        assert!(is_low_engagement(&post_with(&[], 0)));
        assert!(is_low_engagement(&post_with(&[("like", 0)], 0)));
    }

    #[test]
    fn test_single_interaction_is_low() {
        assert!(is_low_engagement(&post_with(&[("like", 1)], 0)));
        assert!(is_low_engagement(&post_with(&[], 1)));
    }

    #[test]
    fn test_two_interactions_is_not_low() {
        assert!(!is_low_engagement(&post_with(&[("like", 1)], 1)));
        assert!(!is_low_engagement(&post_with(&[("like", 1), ("heart", 1)], 0)));
        assert!(!is_low_engagement(&post_with(&[], 5)));
    }

    #[test]
    fn test_missing_engagement_is_low() {
        assert!(is_low_engagement(&CandidatePost::new("p", "a")));
    }
}
