//! Multiple-choice quizzes for a lesson.

use super::{
    check_confidence, default_confidence, out_of_range, require_text, Feature, FALLBACK_CONFIDENCE,
};
use crate::cache::{content_digest, CacheKey, CacheableRequest};
use crate::transport::Prompt;
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Largest quiz a single request may ask for.
pub const MAX_QUESTIONS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub title: String,
    pub topic: String,
    /// Lesson text to ground the questions in, when available.
    pub content: Option<String>,
    pub difficulty: Difficulty,
    pub count: u32,
}

impl QuizRequest {
    pub fn new(
        title: impl Into<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
        count: u32,
    ) -> Self {
        Self {
            title: title.into(),
            topic: topic.into(),
            content: None,
            difficulty,
            count,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

impl CacheableRequest for QuizRequest {
    fn validate(&self) -> Result<()> {
        require_text("quiz_request", "title", &self.title)?;
        require_text("quiz_request", "topic", &self.topic)?;
        if !(1..=MAX_QUESTIONS).contains(&self.count) {
            return Err(out_of_range(
                "quiz_request",
                "count",
                format!("expected 1..={}, got {}", MAX_QUESTIONS, self.count),
            ));
        }
        Ok(())
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::builder(QuizFeature::NAME)
            .field("title", self.title.trim())
            .field("topic", self.topic.trim())
            .field("difficulty", self.difficulty)
            .field("count", self.count)
            .field("content", self.content.as_deref().map(content_digest))
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quiz {
    #[serde(default = "new_quiz_id")]
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn new_quiz_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct QuizFeature;

impl Feature for QuizFeature {
    type Request = QuizRequest;
    type Artifact = Quiz;

    const NAME: &'static str = "quiz";

    fn prompt(request: &QuizRequest) -> Prompt {
        let mut user = format!(
            "Write a multiple-choice quiz with exactly {} questions of {} difficulty for the \
             lesson \"{}\" on {}.\n\
             Each question needs at least two options, the zero-based index of the correct \
             option and a one-sentence explanation. Use \"{}\" as the quiz title and \"{}\" \
             as the difficulty.",
            request.count,
            request.difficulty,
            request.title,
            request.topic,
            request.title,
            request.difficulty,
        );
        if let Some(content) = &request.content {
            user.push_str("\n\nLesson content:\n");
            user.push_str(content);
        }
        Prompt::new(
            "You are a teaching assistant who writes fair, unambiguous quiz questions.",
            user,
        )
    }

    fn fallback(request: &QuizRequest) -> Quiz {
        let questions = (0..request.count as usize)
            .map(|i| practice_question(request, i))
            .collect();
        Quiz {
            id: new_quiz_id(),
            title: request.title.clone(),
            difficulty: request.difficulty,
            questions,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    fn check(request: &QuizRequest, quiz: &Quiz) -> std::result::Result<(), String> {
        if quiz.questions.len() != request.count as usize {
            return Err(format!(
                "expected {} questions, got {}",
                request.count,
                quiz.questions.len()
            ));
        }
        if quiz.difficulty != request.difficulty {
            return Err(format!(
                "expected difficulty {}, got {}",
                request.difficulty, quiz.difficulty
            ));
        }
        for (i, q) in quiz.questions.iter().enumerate() {
            if q.question.trim().is_empty() {
                return Err(format!("question {} is blank", i + 1));
            }
            if q.options.len() < 2 {
                return Err(format!("question {} has fewer than two options", i + 1));
            }
            if q.correct_index >= q.options.len() {
                return Err(format!(
                    "question {} marks option {} correct but has {} options",
                    i + 1,
                    q.correct_index,
                    q.options.len()
                ));
            }
        }
        check_confidence(quiz.confidence)
    }
}

fn practice_question(request: &QuizRequest, index: usize) -> QuizQuestion {
    let title = &request.title;
    let topic = &request.topic;
    let n = index + 1;
    let explanation = format!(
        "Practice question. Revisit \"{}\" for a full explanation of {}.",
        title, topic
    );
    match index % 3 {
        0 => QuizQuestion {
            question: format!("Practice {}: Which topic does the lesson \"{}\" focus on?", n, title),
            options: vec![
                topic.clone(),
                "An unrelated subject".to_string(),
                "None of the above".to_string(),
            ],
            correct_index: 0,
            explanation,
        },
        1 => QuizQuestion {
            question: format!("Practice {}: True or false: \"{}\" covers {}.", n, title, topic),
            options: vec!["True".to_string(), "False".to_string()],
            correct_index: 0,
            explanation,
        },
        _ => QuizQuestion {
            question: format!("Practice {}: What is the best way to master {}?", n, topic),
            options: vec![
                format!("Review the material in \"{}\" and try the examples", title),
                "Skip the lesson".to_string(),
                "Guess at random".to_string(),
            ],
            correct_index: 0,
            explanation,
        },
    }
}
