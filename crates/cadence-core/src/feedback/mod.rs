//! Coaching feedback produced by an external text generator.
//!
//! The generator is unreliable, so everything here is built to always end
//! in a well-formed [`FeedbackResult`]: generated text is repaired and parsed
//! ([`repair`], [`parse`]), the request is retried a bounded number of times,
//! and a fixed fallback is returned when every attempt fails
//! ([`orchestrator`]).

pub mod orchestrator;
pub mod parse;
pub mod prompt;
pub mod repair;

use serde::{Deserialize, Serialize};

use crate::scoring::Category;

pub use orchestrator::{FeedbackConfig, FeedbackOrchestrator, FeedbackOutcome, Terminal};
pub use parse::{parse_feedback, ParsedFeedback};

/// Number of sentences requested per tip list.
pub const TIPS_PER_CATEGORY: usize = 3;

/// Four tip lists, one per scored category.
///
/// Serialized with the wire keys `speed_tip`, `clarity_tip`,
/// `articulation_tip` and `rythm_tip`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub speed_tip: Vec<String>,
    pub clarity_tip: Vec<String>,
    pub articulation_tip: Vec<String>,
    #[serde(rename = "rythm_tip", alias = "rhythm_tip")]
    pub rhythm_tip: Vec<String>,
}

impl FeedbackResult {
    /// Returned when no attempt produced usable feedback.
    pub fn fallback() -> Self {
        Self {
            speed_tip: vec!["We're sorry, no feedback was generated.".to_string()],
            clarity_tip: vec!["Please try again later.".to_string()],
            articulation_tip: Vec::new(),
            rhythm_tip: Vec::new(),
        }
    }

    pub fn tips(&self, category: Category) -> &[String] {
        match category {
            Category::Speed => &self.speed_tip,
            Category::Clarity => &self.clarity_tip,
            Category::Articulation => &self.articulation_tip,
            Category::Rhythm => &self.rhythm_tip,
        }
    }

    pub fn tips_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Speed => &mut self.speed_tip,
            Category::Clarity => &mut self.clarity_tip,
            Category::Articulation => &mut self.articulation_tip,
            Category::Rhythm => &mut self.rhythm_tip,
        }
    }
}

/// Wire key of a category's tip list.
pub fn tip_key(category: Category) -> &'static str {
    match category {
        Category::Speed => "speed_tip",
        Category::Clarity => "clarity_tip",
        Category::Articulation => "articulation_tip",
        Category::Rhythm => "rythm_tip",
    }
}

/// Tip lists in the order they appear on the wire.
pub const TIP_ORDER: [Category; 4] = [
    Category::Speed,
    Category::Clarity,
    Category::Articulation,
    Category::Rhythm,
];
