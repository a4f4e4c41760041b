use serde::{Deserialize, Serialize};

use super::catalog::{Question, QuestionCatalog, QuestionKind};
use super::domain::{Answer, AnswerState};

pub const HOT_THRESHOLD: u32 = 15;
pub const WARM_THRESHOLD: u32 = 10;

/// Lead classification of a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadTier {
    Hot,
    Warm,
    Cold,
}

impl LeadTier {
    /// Lower bounds are inclusive: 15 is Hot, 10 is Warm.
    pub const fn classify(final_score: u32) -> Self {
        if final_score >= HOT_THRESHOLD {
            LeadTier::Hot
        } else if final_score >= WARM_THRESHOLD {
            LeadTier::Warm
        } else {
            LeadTier::Cold
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LeadTier::Hot => "Hot",
            LeadTier::Warm => "Warm",
            LeadTier::Cold => "Cold",
        }
    }
}

/// Contribution of one question to the raw score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub question_id: String,
    pub contribution: u32,
}

/// Derived score for a session; recomputed on demand, never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub raw_score: u32,
    pub postcode_score: u32,
    pub final_score: u32,
    pub tier: LeadTier,
    pub components: Vec<ScoreComponent>,
}

/// Stateless scorer over a question catalog.
pub struct ScoringEngine<'a> {
    catalog: &'a QuestionCatalog,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(catalog: &'a QuestionCatalog) -> Self {
        Self { catalog }
    }

    pub fn raw_score(&self, answers: &AnswerState) -> u32 {
        self.components(answers)
            .iter()
            .fold(0u32, |total, component| {
                total.saturating_add(component.contribution)
            })
    }

    pub fn components(&self, answers: &AnswerState) -> Vec<ScoreComponent> {
        self.catalog
            .questions()
            .iter()
            .map(|question| ScoreComponent {
                question_id: question.id.clone(),
                contribution: question_contribution(question, answers.get(&question.id)),
            })
            .collect()
    }

    /// Combines the raw score with the postcode score (0 while unresolved).
    pub fn score(&self, answers: &AnswerState, postcode_score: Option<u32>) -> ScoreResult {
        let components = self.components(answers);
        let raw_score = components.iter().fold(0u32, |total, component| {
            total.saturating_add(component.contribution)
        });
        let postcode_score = postcode_score.unwrap_or(0);
        let final_score = raw_score.saturating_add(postcode_score);

        ScoreResult {
            raw_score,
            postcode_score,
            final_score,
            tier: LeadTier::classify(final_score),
            components,
        }
    }
}

fn question_contribution(question: &Question, answer: Option<&Answer>) -> u32 {
    let weight_of = |value: &str| question.option(value).map(|option| option.weight);

    match (question.kind, answer) {
        (QuestionKind::SingleChoice, Some(Answer::Single(Some(value)))) => {
            weight_of(value).unwrap_or(0)
        }
        // Highest selected weight, not the sum.
        (QuestionKind::MultiChoice, Some(Answer::Multi(values))) => values
            .iter()
            .filter_map(|value| weight_of(value))
            .max()
            .unwrap_or(0),
        _ => 0,
    }
}
