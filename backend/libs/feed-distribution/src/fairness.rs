//! Fair distribution queue builder
//!
//! Turns a candidate set into an ordered queue of post ids where authors are
//! round-robined instead of clustered:
//! 1. Group posts by author and shuffle each author's posts
//! 2. Fill chunks of `chunk_size` by pulling one post per author per round,
//!    starting after the author the previous chunk stopped at
//! 3. Cap every author at `ceil(chunk_size / active_authors)` posts per chunk;
//!    anything over the cap overflows into later chunks
//! 4. Shuffle each chunk so the round-robin pattern is not visible
//!
//! The result is always a permutation of the distinct input ids.

use crate::models::FeedPost;
use crate::shuffle::Shuffler;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

pub struct FairQueueBuilder {
    shuffler: Arc<Shuffler>,
}

impl FairQueueBuilder {
    pub fn new(shuffler: Arc<Shuffler>) -> Self {
        Self { shuffler }
    }

    /// Build the flattened distribution queue (post ids only)
    pub fn build_queue<P: FeedPost>(&self, posts: &[&P], chunk_size: usize) -> Vec<String> {
        self.build_chunks(posts, chunk_size)
            .into_iter()
            .flatten()
            .collect()
    }

    /// Build the queue keeping chunk boundaries visible
    pub fn build_chunks<P: FeedPost>(&self, posts: &[&P], chunk_size: usize) -> Vec<Vec<String>> {
        let chunk_size = chunk_size.max(1);
        let mut groups = self.group_by_author(posts);

        let total: usize = groups.iter().map(VecDeque::len).sum();
        let mut chunks: Vec<Vec<String>> = Vec::with_capacity(total.div_ceil(chunk_size));
        // Group index the next chunk starts from
        let mut cursor = 0usize;

        loop {
            let active: Vec<usize> = (0..groups.len())
                .filter(|&g| !groups[g].is_empty())
                .collect();
            if active.is_empty() {
                break;
            }

            let per_author_cap = chunk_size.div_ceil(active.len());
            let order: Vec<usize> = active
                .iter()
                .filter(|&&g| g >= cursor)
                .chain(active.iter().filter(|&&g| g < cursor))
                .copied()
                .collect();

            let mut taken: HashMap<usize, usize> = HashMap::with_capacity(order.len());
            let mut chunk: Vec<String> = Vec::with_capacity(chunk_size);
            let mut last_pulled = order[0];

            'fill: loop {
                let mut pulled_any = false;
                for &g in &order {
                    if chunk.len() >= chunk_size {
                        break 'fill;
                    }
                    let count = taken.entry(g).or_insert(0);
                    if *count >= per_author_cap {
                        continue;
                    }
                    if let Some(id) = groups[g].pop_front() {
                        chunk.push(id);
                        *count += 1;
                        last_pulled = g;
                        pulled_any = true;
                    }
                }
                if !pulled_any {
                    break;
                }
            }

            self.shuffler.shuffle(&mut chunk);
            chunks.push(chunk);
            cursor = last_pulled + 1;
        }

        debug!(
            posts = total,
            authors = groups.len(),
            chunks = chunks.len(),
            chunk_size = chunk_size,
            "Built fair distribution queue"
        );

        chunks
    }

    /// Group distinct posts by author, shuffling both the author order and
    /// each author's own posts.
    fn group_by_author<P: FeedPost>(&self, posts: &[&P]) -> Vec<VecDeque<String>> {
        let mut author_slots: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::with_capacity(posts.len());

        for post in posts {
            let id = post.post_id();
            if !seen.insert(id) {
                continue;
            }
            let slot = *author_slots.entry(post.author_key()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(id.to_string());
        }

        for group in groups.iter_mut() {
            self.shuffler.shuffle(group);
        }
        self.shuffler.shuffle(&mut groups);

        groups.into_iter().map(VecDeque::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidatePost;

    fn posts_for(authors: &[(&str, usize)]) -> Vec<CandidatePost> {
        let mut posts = Vec::new();
        for (author, count) in authors {
            for i in 0..*count {
                posts.push(CandidatePost::new(format!("{}-{}", author, i), *author));
            }
        }
        posts
    }

    fn builder(seed: u64) -> FairQueueBuilder {
        FairQueueBuilder::new(Arc::new(Shuffler::seeded(seed)))
    }

    fn author_of(id: &str) -> &str {
        id.split('-').next().unwrap_or(id)
    }

    #[test]
    fn test_queue_is_permutation_of_input() {
        let posts = posts_for(&[("a", 7), ("b", 1), ("c", 3), ("d", 12)]);
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let mut queue = builder(1).build_queue(&refs, 5);
        let mut expected: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();

        assert_eq!(queue.len(), expected.len());
        queue.sort();
        expected.sort();
        assert_eq!(queue, expected);
    }

    #[test]
    fn test_duplicate_ids_are_collapsed() {
        let mut posts = posts_for(&[("a", 2)]);
        posts.push(CandidatePost::new("a-0", "a"));
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let queue = builder(2).build_queue(&refs, 12);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let refs: Vec<&CandidatePost> = Vec::new();
        assert!(builder(3).build_queue(&refs, 12).is_empty());
    }

    #[test]
    fn test_fairness_bound_per_chunk() {
        let posts = posts_for(&[("a", 4), ("b", 4), ("c", 4), ("d", 4), ("e", 4)]);
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        for seed in 0..20 {
            let chunks = builder(seed).build_chunks(&refs, 12);
            let mut remaining: HashMap<&str, usize> =
                ["a", "b", "c", "d", "e"].iter().map(|a| (*a, 4)).collect();

            for chunk in &chunks {
                let active = remaining.values().filter(|&&n| n > 0).count();
                let cap = 12usize.div_ceil(active);

                let mut per_author: HashMap<&str, usize> = HashMap::new();
                for id in chunk {
                    *per_author.entry(author_of(id)).or_insert(0) += 1;
                }
                for (author, count) in per_author {
                    assert!(
                        count <= cap,
                        "author {} has {} posts in a chunk, cap {}",
                        author,
                        count,
                        cap
                    );
                    *remaining.get_mut(author).unwrap() -= count;
                }
            }
        }
    }

    #[test]
    fn test_dominant_author_overflows_to_later_chunks() {
        let mut authors = vec![("big", 30)];
        let small = ["s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9"];
        for name in small.iter() {
            authors.push((*name, 1));
        }
        let posts = posts_for(&authors);
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let chunks = builder(4).build_chunks(&refs, 12);
        let first = &chunks[0];

        // 10 authors active: every small author lands in the first chunk,
        // the dominant author gets at most ceil(12 / 10) = 2 slots.
        let big_in_first = first.iter().filter(|id| author_of(id) == "big").count();
        assert!(big_in_first <= 2);
        for name in small.iter() {
            assert!(first.iter().any(|id| author_of(id) == *name));
        }

        let total: usize = chunks.iter().map(Vec::len).sum();
        assert_eq!(total, 39);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 12));
    }

    #[test]
    fn test_more_authors_than_chunk_slots_rotates() {
        let authors: Vec<String> = (0..8).map(|i| format!("u{}", i)).collect();
        let spec: Vec<(&str, usize)> = authors.iter().map(|a| (a.as_str(), 2)).collect();
        let posts = posts_for(&spec);
        let refs: Vec<&CandidatePost> = posts.iter().collect();

        let chunks = builder(5).build_chunks(&refs, 3);

        // Cap of one per author: the first three chunks walk past every author.
        let first_pass: HashSet<&str> = chunks
            .iter()
            .take(3)
            .flatten()
            .map(|id| author_of(id))
            .collect();
        assert!(chunks[0].len() == 3 && chunks[1].len() == 3);
        assert_eq!(first_pass.len(), 8);
    }
}
