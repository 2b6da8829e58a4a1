use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Anything the distributor can order: it only needs an id, an author key
/// and (optionally) engagement counts. The post itself is never mutated.
pub trait FeedPost {
    fn post_id(&self) -> &str;

    /// Key used for author fairness (author id or author session id)
    fn author_key(&self) -> &str;

    /// `None` when the post carried no engagement data at all
    fn engagement(&self) -> Option<&EngagementSignal>;
}

/// Reaction/comment counters as delivered by the content store.
///
/// Missing, negative or non-numeric counters deserialize to 0 so a single
/// malformed post never fails a whole feed request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSignal {
    #[serde(default, deserialize_with = "lenient_count_map")]
    pub reaction_counts: HashMap<String, u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub comment_count: u64,
}

impl EngagementSignal {
    pub fn new(reaction_counts: HashMap<String, u64>, comment_count: u64) -> Self {
        Self {
            reaction_counts,
            comment_count,
        }
    }

    pub fn total_reactions(&self) -> u64 {
        self.reaction_counts
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }

    pub fn total_interactions(&self) -> u64 {
        self.total_reactions().saturating_add(self.comment_count)
    }
}

/// Post as handed over by the serving layer.
///
/// Unknown fields are kept in `extra` so the caller gets back exactly the
/// object it passed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePost {
    pub id: String,
    #[serde(default)]
    pub author_session_id: String,
    #[serde(default)]
    pub engagement: Option<EngagementSignal>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl CandidatePost {
    pub fn new(id: impl Into<String>, author_session_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author_session_id: author_session_id.into(),
            engagement: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_engagement(mut self, engagement: EngagementSignal) -> Self {
        self.engagement = Some(engagement);
        self
    }
}

impl FeedPost for CandidatePost {
    fn post_id(&self) -> &str {
        &self.id
    }

    fn author_key(&self) -> &str {
        &self.author_session_id
    }

    fn engagement(&self) -> Option<&EngagementSignal> {
        self.engagement.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    New,
    Hot,
    Top,
    Trending,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::New => "new",
            SortMode::Hot => "hot",
            SortMode::Top => "top",
            SortMode::Trending => "trending",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(SortMode::New),
            "hot" => Ok(SortMode::Hot),
            "top" => Ok(SortMode::Top),
            "trending" => Ok(SortMode::Trending),
            other => Err(format!("unknown sort mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedRequest<P> {
    pub session_id: String,
    /// Already filtered by context, not yet paginated
    pub candidate_posts: Vec<P>,
    pub context: String,
    pub sort_mode: SortMode,
    pub exclude_ids: HashSet<String>,
    /// Per-request batch size, clamped to `max_posts_per_batch`
    pub limit: Option<usize>,
}

impl<P> FeedRequest<P> {
    pub fn new(
        session_id: impl Into<String>,
        candidate_posts: Vec<P>,
        context: impl Into<String>,
        sort_mode: SortMode,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            candidate_posts,
            context: context.into(),
            sort_mode,
            exclude_ids: HashSet::new(),
            limit: None,
        }
    }

    pub fn with_exclude_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    /// First request for the session, queue built from scratch
    Created,
    /// Served from the existing queue (new candidates appended)
    Continued,
    /// Previous state went stale and was discarded
    Rebuilt,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Created => "created",
            SessionOutcome::Continued => "continued",
            SessionOutcome::Rebuilt => "rebuilt",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDiagnostics {
    pub smart_logic_applied: bool,
    pub session_outcome: Option<SessionOutcome>,
    pub candidate_count: usize,
    pub newly_queued: usize,
    pub low_engagement_served: usize,
    pub distinct_authors_served: usize,
    pub lookahead: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse<P> {
    pub batch: Vec<P>,
    pub has_more: bool,
    pub queued_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<FeedDiagnostics>,
}

impl<P> FeedResponse<P> {
    pub fn empty() -> Self {
        Self {
            batch: Vec::new(),
            has_more: false,
            queued_count: 0,
            diagnostics: None,
        }
    }

    pub fn post_ids(&self) -> Vec<&str>
    where
        P: FeedPost,
    {
        self.batch.iter().map(|post| post.post_id()).collect()
    }
}

fn value_to_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(count) = n.as_u64() {
                count
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f > 0.0 => f.floor() as u64,
                    _ => 0,
                }
            }
        }
        _ => 0,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_count(&value))
}

fn lenient_count_map<'de, D>(deserializer: D) -> Result<HashMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let counts = match value {
        Value::Object(map) => map
            .iter()
            .map(|(reaction, count)| (reaction.clone(), value_to_count(count)))
            .collect(),
        _ => HashMap::new(),
    };
    Ok(counts)
}
