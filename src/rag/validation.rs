//! Question screening before retrieval.

use regex::Regex;
use std::sync::OnceLock;

pub const GUIDANCE_MESSAGE: &str =
    "Please provide a more detailed question about HR policies or procedures.";

pub const REJECTION_MESSAGE: &str = "I can only assist with legitimate HR policy questions.";

pub const SCOPE_REMINDER: &str = "I'll do my best to help with your question. For the most accurate information, please ensure your question relates to HR policies or workplace procedures.";

/// Terms that mark a question as an attempt at misuse.
const DENYLIST: &[&str] = &["hack", "bypass", "circumvent", "illegal", "fraud"];

/// Words that place a question inside the HR domain.
const HR_KEYWORDS: &[&str] = &[
    "policy",
    "policies",
    "leave",
    "vacation",
    "sick",
    "benefit",
    "salary",
    "promotion",
    "training",
    "performance",
    "disciplinary",
    "harassment",
    "compliance",
    "onboarding",
    "termination",
    "resignation",
    "hr",
    "human resources",
    "employee",
    "workplace",
    "code of conduct",
    "ethics",
];

const MIN_QUESTION_CHARS: usize = 3;
const REMINDER_MIN_WORDS: usize = 4;

/// Verdict on a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    /// Answer it, but prefix the answer with a reminder.
    AcceptedWithReminder(String),
    /// Do not answer; reply with the guidance text instead.
    Rejected(String),
}

/// Decides whether a question should be answered.
pub trait QuestionPolicy: Send + Sync {
    fn validate(&self, question: &str) -> Validation;
}

/// Length check, misuse denylist and HR-scope reminder.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQuestionPolicy;

impl DefaultQuestionPolicy {
    fn keyword_pattern() -> Option<&'static Regex> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        PATTERN
            .get_or_init(|| {
                let alternatives = HR_KEYWORDS
                    .iter()
                    .map(|k| regex::escape(k))
                    .collect::<Vec<_>>()
                    .join("|");
                // Word start only, so plurals and inflections still match.
                Regex::new(&format!(r"(?i)\b(?:{})", alternatives)).ok()
            })
            .as_ref()
    }

    fn is_hr_related(question: &str) -> bool {
        match Self::keyword_pattern() {
            Some(pattern) => pattern.is_match(question),
            None => {
                let lower = question.to_lowercase();
                HR_KEYWORDS.iter().any(|k| lower.contains(k))
            }
        }
    }
}

impl QuestionPolicy for DefaultQuestionPolicy {
    fn validate(&self, question: &str) -> Validation {
        let trimmed = question.trim();
        if trimmed.chars().count() < MIN_QUESTION_CHARS {
            return Validation::Rejected(GUIDANCE_MESSAGE.to_string());
        }

        let lower = trimmed.to_lowercase();
        if DENYLIST.iter().any(|term| lower.contains(term)) {
            return Validation::Rejected(REJECTION_MESSAGE.to_string());
        }

        let words = trimmed.split_whitespace().count();
        if words >= REMINDER_MIN_WORDS && !Self::is_hr_related(trimmed) {
            return Validation::AcceptedWithReminder(SCOPE_REMINDER.to_string());
        }

        Validation::Accepted
    }
}
