//! # Evaluation Engine
//!
//! Scores one interview answer against the rubric and writes feedback.
//! Evaluation is pure: it never touches the speech engines, and identical
//! requests always produce identical results.

use super::request::{EvaluationError, InterviewRequest, RequestLimits};
use super::rubric::{self, AnswerStats, Assessment};
use serde::Serialize;

/// One rubric line in the response `breakdown`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionScore {
    pub criterion: &'static str,
    /// Criterion score in [0, 1], two decimals
    pub score: f64,
    pub weight: f64,
}

/// Outcome of evaluating one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Overall score in [0, 100]
    pub score: u32,
    pub feedback_text: String,
    pub breakdown: Vec<CriterionScore>,
}

#[derive(Debug, Default, Clone)]
pub struct EvaluationEngine;

impl EvaluationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate and score `request`.
    ///
    /// ## Scoring:
    /// `score = round(100 × Σ wᵢ·sᵢ / Σ wᵢ)` over the criteria that apply;
    /// relevance is skipped when there are no keywords to check.
    pub fn evaluate(
        &self,
        request: &InterviewRequest,
        limits: &RequestLimits,
    ) -> Result<Evaluation, EvaluationError> {
        request.validate(limits)?;

        let stats = AnswerStats::analyze(&request.candidate_text);
        let difficulty = request.difficulty();

        let explicit = request.keywords();
        let relevance = if !explicit.is_empty() {
            rubric::relevance(&stats, &explicit, false)
        } else {
            request
                .question_text()
                .map(rubric::derive_keywords)
                .and_then(|derived| rubric::relevance(&stats, &derived, true))
        };

        let mut criteria: Vec<(&'static str, f64, Assessment)> = vec![(
            "substance",
            rubric::SUBSTANCE_WEIGHT,
            rubric::substance(&stats, difficulty),
        )];
        if let Some(assessment) = relevance {
            criteria.push(("relevance", rubric::RELEVANCE_WEIGHT, assessment));
        }
        criteria.push(("structure", rubric::STRUCTURE_WEIGHT, rubric::structure(&stats)));
        criteria.push(("clarity", rubric::CLARITY_WEIGHT, rubric::clarity(&stats)));

        let total_weight: f64 = criteria.iter().map(|(_, weight, _)| weight).sum();
        let weighted: f64 = criteria
            .iter()
            .map(|(_, weight, assessment)| weight * assessment.score.clamp(0.0, 1.0))
            .sum();
        let score = (100.0 * weighted / total_weight).round().clamp(0.0, 100.0) as u32;

        let tips: Vec<&str> = criteria
            .iter()
            .filter(|(_, _, assessment)| assessment.score < rubric::TIP_THRESHOLD)
            .map(|(_, _, assessment)| assessment.tip.as_str())
            .filter(|tip| !tip.is_empty())
            .collect();

        let mut feedback_text = verdict(score).to_string();
        for tip in tips {
            feedback_text.push(' ');
            feedback_text.push_str(tip);
        }

        tracing::debug!(
            question_id = request.question_id.as_deref().unwrap_or("-"),
            words = stats.word_count(),
            difficulty = difficulty.label(),
            score,
            "Answer evaluated"
        );

        Ok(Evaluation {
            score,
            feedback_text,
            breakdown: criteria
                .into_iter()
                .map(|(criterion, weight, assessment)| CriterionScore {
                    criterion,
                    score: (assessment.score.clamp(0.0, 1.0) * 100.0).round() / 100.0,
                    weight,
                })
                .collect(),
        })
    }
}

fn verdict(score: u32) -> &'static str {
    match score {
        85..=100 => "Excellent answer: clear, relevant and well supported.",
        70..=84 => "Strong answer with a few gaps.",
        50..=69 => "A reasonable start, but the answer needs more development.",
        _ => "This answer needs significant work.",
    }
}
