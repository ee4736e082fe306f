//! Study pacing suggestions for a learner on a track.

use super::{
    check_confidence, default_confidence, out_of_range, require_text, Feature, FALLBACK_CONFIDENCE,
};
use crate::cache::{CacheKey, CacheableRequest};
use crate::transport::Prompt;
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Weekly pace suggested when there is no history and no target.
pub const DEFAULT_LESSONS_PER_WEEK: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingRequest {
    pub learner_id: String,
    pub track_id: String,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub days_active: u32,
    /// Days the learner wants to finish within, counted from now.
    pub target_days: Option<u32>,
}

impl PacingRequest {
    pub fn new(
        learner_id: impl Into<String>,
        track_id: impl Into<String>,
        completed_lessons: u32,
        total_lessons: u32,
        days_active: u32,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            track_id: track_id.into(),
            completed_lessons,
            total_lessons,
            days_active,
            target_days: None,
        }
    }

    pub fn with_target_days(mut self, days: u32) -> Self {
        self.target_days = Some(days);
        self
    }

    pub fn remaining_lessons(&self) -> u32 {
        self.total_lessons.saturating_sub(self.completed_lessons)
    }
}

impl CacheableRequest for PacingRequest {
    fn validate(&self) -> Result<()> {
        require_text("pacing_request", "learner_id", &self.learner_id)?;
        require_text("pacing_request", "track_id", &self.track_id)?;
        if self.total_lessons == 0 {
            return Err(out_of_range(
                "pacing_request",
                "total_lessons",
                "track has no lessons".to_string(),
            ));
        }
        if self.completed_lessons > self.total_lessons {
            return Err(out_of_range(
                "pacing_request",
                "completed_lessons",
                format!(
                    "{} completed of {} total",
                    self.completed_lessons, self.total_lessons
                ),
            ));
        }
        if self.target_days == Some(0) {
            return Err(out_of_range(
                "pacing_request",
                "target_days",
                "target must be at least one day".to_string(),
            ));
        }
        Ok(())
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::builder(PacingFeature::NAME)
            .field("learner_id", &self.learner_id)
            .field("track_id", &self.track_id)
            .field("completed_lessons", self.completed_lessons)
            .field("total_lessons", self.total_lessons)
            .field("days_active", self.days_active)
            .field("target_days", self.target_days)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PacingSuggestion {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PacingPlan {
    pub lessons_per_week: u32,
    pub estimated_days_remaining: u32,
    pub suggestions: Vec<PacingSuggestion>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

pub struct PacingFeature;

impl Feature for PacingFeature {
    type Request = PacingRequest;
    type Artifact = PacingPlan;

    const NAME: &'static str = "pacing";

    fn prompt(request: &PacingRequest) -> Prompt {
        let target = match request.target_days {
            Some(days) => format!("They want to finish within {} days.", days),
            None => "They have not set a target date.".to_string(),
        };
        Prompt::new(
            "You are a study coach. Suggest a realistic, encouraging pace.",
            format!(
                "A learner has completed {} of {} lessons in the track \"{}\" over {} active days. {}\n\
                 Suggest lessons per week, estimate the days remaining and give two to four \
                 short, concrete suggestions.",
                request.completed_lessons,
                request.total_lessons,
                request.track_id,
                request.days_active,
                target,
            ),
        )
    }

    fn fallback(request: &PacingRequest) -> PacingPlan {
        let remaining = request.remaining_lessons();
        if remaining == 0 {
            return PacingPlan {
                lessons_per_week: 0,
                estimated_days_remaining: 0,
                suggestions: vec![PacingSuggestion {
                    title: "Track complete".to_string(),
                    detail: "Every lesson in this track is done. Revisit the quizzes to keep \
                             the material fresh."
                        .to_string(),
                }],
                confidence: FALLBACK_CONFIDENCE,
            };
        }

        let observed = observed_weekly_pace(request);
        let lessons_per_week = match request.target_days {
            Some(days) => per_period(remaining, 7, days),
            None if observed > 0 => observed,
            None => DEFAULT_LESSONS_PER_WEEK,
        }
        .max(1);
        let estimated_days_remaining = per_period(remaining, 7, lessons_per_week);

        let mut suggestions = vec![
            PacingSuggestion {
                title: "Keep a steady rhythm".to_string(),
                detail: format!(
                    "Aim for {} lessons per week to finish the remaining {} in about {} days.",
                    lessons_per_week, remaining, estimated_days_remaining
                ),
            },
            PacingSuggestion {
                title: "Review before moving on".to_string(),
                detail: "Read the summary of each lesson again before starting the next one."
                    .to_string(),
            },
        ];
        if request.target_days.is_some() && observed < lessons_per_week {
            suggestions.push(PacingSuggestion {
                title: "Catch up gradually".to_string(),
                detail: "Your target needs a faster pace than your recent one. Add one extra \
                         session per week rather than cramming."
                    .to_string(),
            });
        }

        PacingPlan {
            lessons_per_week,
            estimated_days_remaining,
            suggestions,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    fn check(_: &PacingRequest, plan: &PacingPlan) -> std::result::Result<(), String> {
        if plan.suggestions.is_empty() {
            return Err("no suggestions".to_string());
        }
        if plan.suggestions.iter().any(|s| s.title.trim().is_empty()) {
            return Err("suggestion with a blank title".to_string());
        }
        check_confidence(plan.confidence)
    }
}

/// Lessons per week so far, rounded up. Zero without history.
fn observed_weekly_pace(request: &PacingRequest) -> u32 {
    if request.days_active == 0 || request.completed_lessons == 0 {
        return 0;
    }
    per_period(request.completed_lessons, 7, request.days_active)
}

/// `ceil(count * scale / divisor)` in 64 bits, saturating at `u32::MAX`.
fn per_period(count: u32, scale: u32, divisor: u32) -> u32 {
    let scaled = u64::from(count) * u64::from(scale);
    u32::try_from(scaled.div_ceil(u64::from(divisor.max(1)))).unwrap_or(u32::MAX)
}
