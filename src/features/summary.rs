//! Lesson summaries.

use super::{check_confidence, default_confidence, require_text, Feature, FALLBACK_CONFIDENCE};
use crate::cache::{CacheKey, CacheableRequest};
use crate::transport::Prompt;
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const WORDS_PER_MINUTE: usize = 200;
const MAX_KEY_POINT_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLength {
    Brief,
    #[default]
    Standard,
    Detailed,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Brief => "brief",
            SummaryLength::Standard => "standard",
            SummaryLength::Detailed => "detailed",
        }
    }

    /// Upper bound on key points for this length.
    pub fn max_key_points(&self) -> usize {
        match self {
            SummaryLength::Brief => 3,
            SummaryLength::Standard => 5,
            SummaryLength::Detailed => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub lesson_id: String,
    pub title: String,
    pub content: String,
    pub length: SummaryLength,
}

impl SummaryRequest {
    pub fn new(
        lesson_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            title: title.into(),
            content: content.into(),
            length: SummaryLength::default(),
        }
    }

    pub fn with_length(mut self, length: SummaryLength) -> Self {
        self.length = length;
        self
    }
}

impl CacheableRequest for SummaryRequest {
    fn validate(&self) -> Result<()> {
        require_text("summary_request", "lesson_id", &self.lesson_id)?;
        require_text("summary_request", "title", &self.title)?;
        require_text("summary_request", "content", &self.content)
    }

    fn cache_key(&self) -> CacheKey {
        // Edited lesson text must produce a new summary.
        CacheKey::builder(SummaryFeature::NAME)
            .field("lesson_id", &self.lesson_id)
            .field("title", self.title.trim())
            .field_digest("content", &self.content)
            .field("length", self.length)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LessonSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub estimated_read_minutes: u32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

pub struct SummaryFeature;

impl Feature for SummaryFeature {
    type Request = SummaryRequest;
    type Artifact = LessonSummary;

    const NAME: &'static str = "summary";

    fn prompt(request: &SummaryRequest) -> Prompt {
        Prompt::new(
            "You are a teaching assistant who writes clear, accurate lesson summaries for learners.",
            format!(
                "Write a {} summary of the lesson \"{}\" with at most {} key points and an \
                 estimate of the reading time in minutes.\n\nLesson content:\n{}",
                request.length.as_str(),
                request.title,
                request.length.max_key_points(),
                request.content,
            ),
        )
    }

    fn fallback(request: &SummaryRequest) -> LessonSummary {
        let mut key_points: Vec<String> = sentences(&request.content)
            .take(request.length.max_key_points())
            .collect();
        if key_points.is_empty() {
            key_points.push(format!("Review the material in \"{}\".", request.title));
        }
        LessonSummary {
            summary: format!("This lesson covers {}.", request.title.trim()),
            key_points,
            estimated_read_minutes: read_minutes(&request.content),
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    fn check(request: &SummaryRequest, summary: &LessonSummary) -> std::result::Result<(), String> {
        if summary.summary.trim().is_empty() {
            return Err("summary is blank".to_string());
        }
        if summary.key_points.is_empty() {
            return Err("no key points".to_string());
        }
        if summary.key_points.len() > request.length.max_key_points() {
            return Err(format!(
                "{} key points exceed the {} limit of {}",
                summary.key_points.len(),
                request.length.as_str(),
                request.length.max_key_points()
            ));
        }
        check_confidence(summary.confidence)
    }
}

fn sentences(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(|s| {
            if s.chars().count() > MAX_KEY_POINT_CHARS {
                let cut: String = s.chars().take(MAX_KEY_POINT_CHARS).collect();
                format!("{}...", cut.trim_end())
            } else {
                s.to_string()
            }
        })
}

fn read_minutes(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}
