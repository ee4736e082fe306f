//! Next-lesson recommendations from a candidate list.

use super::{
    check_confidence, default_confidence, out_of_range, require_text, Feature, FALLBACK_CONFIDENCE,
};
use crate::cache::{CacheKey, CacheableRequest};
use crate::transport::Prompt;
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_RECOMMENDATIONS: usize = 10;

/// A lesson the learner could be pointed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRef {
    pub id: String,
    pub title: String,
    pub category: String,
}

impl LessonRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub learner_id: String,
    pub completed_lesson_ids: Vec<String>,
    pub interests: Vec<String>,
    pub candidates: Vec<LessonRef>,
    pub limit: usize,
}

impl RecommendationRequest {
    pub fn new(learner_id: impl Into<String>, candidates: Vec<LessonRef>, limit: usize) -> Self {
        Self {
            learner_id: learner_id.into(),
            completed_lesson_ids: Vec::new(),
            interests: Vec::new(),
            candidates,
            limit,
        }
    }

    pub fn with_completed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed_lesson_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    fn normalized_interests(&self) -> HashSet<String> {
        self.interests
            .iter()
            .map(|i| i.trim().to_lowercase())
            .filter(|i| !i.is_empty())
            .collect()
    }
}

impl CacheableRequest for RecommendationRequest {
    fn validate(&self) -> Result<()> {
        require_text("recommendation_request", "learner_id", &self.learner_id)?;
        if self.candidates.is_empty() {
            return Err(crate::Error::missing_field(
                "recommendation_request",
                "candidates",
            ));
        }
        if !(1..=MAX_RECOMMENDATIONS).contains(&self.limit) {
            return Err(out_of_range(
                "recommendation_request",
                "limit",
                format!("expected 1..={}, got {}", MAX_RECOMMENDATIONS, self.limit),
            ));
        }
        Ok(())
    }

    fn cache_key(&self) -> CacheKey {
        // Candidate titles and categories reach both the prompt and the fallback.
        let mut candidates: Vec<(&str, &str, &str)> = self
            .candidates
            .iter()
            .map(|c| (c.id.as_str(), c.title.as_str(), c.category.as_str()))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        // Completion history and interests are sets; their order carries no meaning.
        CacheKey::builder(RecommendationFeature::NAME)
            .field("learner_id", &self.learner_id)
            .field_set("completed", &self.completed_lesson_ids)
            .field_set("interests", self.normalized_interests())
            .field("candidates", candidates)
            .field("limit", self.limit)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendation {
    pub lesson_id: String,
    pub title: String,
    pub reason: String,
    /// Relevance in `0..=1`, higher first.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecommendationList {
    pub items: Vec<Recommendation>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

pub struct RecommendationFeature;

impl Feature for RecommendationFeature {
    type Request = RecommendationRequest;
    type Artifact = RecommendationList;

    const NAME: &'static str = "recommendations";

    fn prompt(request: &RecommendationRequest) -> Prompt {
        let candidates = serde_json::to_string_pretty(&request.candidates).unwrap_or_default();
        let interests = if request.interests.is_empty() {
            "none given".to_string()
        } else {
            request.interests.join(", ")
        };
        let completed = if request.completed_lesson_ids.is_empty() {
            "none".to_string()
        } else {
            request.completed_lesson_ids.join(", ")
        };
        Prompt::new(
            "You are a learning advisor. Recommend only lessons from the candidate list.",
            format!(
                "Pick at most {} lessons for the learner to take next, best first. Use the \
                 candidate `id` as `lesson_id`, give a one-sentence reason and a score between \
                 0 and 1.\nInterests: {}\nAlready completed: {}\nCandidates:\n{}",
                request.limit, interests, completed, candidates,
            ),
        )
    }

    fn fallback(request: &RecommendationRequest) -> RecommendationList {
        let completed: HashSet<&str> = request
            .completed_lesson_ids
            .iter()
            .map(String::as_str)
            .collect();
        let interests = request.normalized_interests();

        let open = request
            .candidates
            .iter()
            .filter(|c| !completed.contains(c.id.as_str()));
        let (matching, other): (Vec<&LessonRef>, Vec<&LessonRef>) =
            open.partition(|c| interests.contains(&c.category.trim().to_lowercase()));

        let mut seen = HashSet::new();
        let items = matching
            .into_iter()
            .map(|c| (c, true))
            .chain(other.into_iter().map(|c| (c, false)))
            .filter(|&(c, _)| seen.insert(c.id.as_str()))
            .take(request.limit)
            .map(|(c, interested)| Recommendation {
                lesson_id: c.id.clone(),
                title: c.title.clone(),
                reason: if interested {
                    format!("Matches your interest in {}.", c.category)
                } else {
                    format!("Next open lesson in {}.", c.category)
                },
                score: if interested { 0.6 } else { 0.4 },
            })
            .collect();

        RecommendationList {
            items,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    fn check(
        request: &RecommendationRequest,
        list: &RecommendationList,
    ) -> std::result::Result<(), String> {
        if list.items.len() > request.limit {
            return Err(format!(
                "{} items exceed the limit of {}",
                list.items.len(),
                request.limit
            ));
        }
        let candidates: HashSet<&str> = request.candidates.iter().map(|c| c.id.as_str()).collect();
        let mut seen = HashSet::new();
        for item in &list.items {
            if !candidates.contains(item.lesson_id.as_str()) {
                return Err(format!("`{}` is not a candidate lesson", item.lesson_id));
            }
            if request.completed_lesson_ids.contains(&item.lesson_id) {
                return Err(format!("`{}` is already completed", item.lesson_id));
            }
            if !seen.insert(item.lesson_id.as_str()) {
                return Err(format!("`{}` is recommended twice", item.lesson_id));
            }
            if !(0.0..=1.0).contains(&item.score) {
                return Err(format!("score {} for `{}` is outside 0..=1", item.score, item.lesson_id));
            }
        }
        check_confidence(list.confidence)
    }
}
