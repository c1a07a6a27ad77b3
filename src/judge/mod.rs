//! Judge adapter: per-exchange scoring and cumulative aggregation.
//!
//! One evaluation scores both sides of an exchange across five fixed criteria.
//! The winner is always derived here from the recomputed totals — whatever the
//! model claimed is ignored. Evaluations are derived data: recorded per
//! session for aggregation, recomputable from message history, never
//! authoritative state.

use crate::agent::{AgentClient, prompts};
use crate::error::{ArenaError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-side scores for one exchange. Each criterion is 0-10; the total is
/// recomputed from the criteria (max 50).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreCard {
    pub logic: u8,
    pub factual_accuracy: u8,
    pub rhetoric: u8,
    pub relevance: u8,
    pub rebuttal: u8,
    pub total: u32,
}

impl ScoreCard {
    fn with_total(mut self) -> Self {
        self.total = u32::from(self.logic)
            + u32::from(self.factual_accuracy)
            + u32::from(self.rhetoric)
            + u32::from(self.relevance)
            + u32::from(self.rebuttal);
        self
    }
}

/// A fact-check record attached to an evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactCheck {
    #[serde(default)]
    pub claim: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub verdict: String,
    #[serde(default)]
    pub evidence: String,
}

/// The judge's narrative analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reasoning {
    #[serde(default)]
    pub user_analysis: String,
    #[serde(default)]
    pub ai_analysis: String,
    #[serde(default)]
    pub key_strengths: String,
    #[serde(default)]
    pub key_weaknesses: String,
}

/// Winner of a single exchange, by strict total comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeWinner {
    User,
    Ai,
    Tie,
}

/// One scored exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEvaluation {
    pub user_scores: ScoreCard,
    pub ai_scores: ScoreCard,
    #[serde(default)]
    pub fact_checks: Vec<FactCheck>,
    #[serde(default)]
    pub reasoning: Reasoning,
    pub winner: ExchangeWinner,
    #[serde(default)]
    pub winner_reason: String,
}

/// Running aggregate of a session's evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CumulativeScores {
    pub user_cumulative_score: u32,
    pub ai_cumulative_score: u32,
    pub overall_winner: ExchangeWinner,
    pub score_difference: u32,
    pub exchanges_evaluated: usize,
}

// ─── Upstream response parsing ──────────────────────────────

/// First `{` to last `}` across lines — judges wrap JSON in prose and fences.
static JSON_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

#[derive(Deserialize, Default)]
struct RawScores {
    #[serde(default)]
    logic: f64,
    #[serde(default)]
    factual_accuracy: f64,
    #[serde(default)]
    rhetoric: f64,
    #[serde(default)]
    relevance: f64,
    #[serde(default)]
    rebuttal: f64,
}

#[derive(Deserialize)]
struct RawEvaluation {
    user_scores: RawScores,
    ai_scores: RawScores,
    #[serde(default)]
    fact_checks: Vec<FactCheck>,
    #[serde(default)]
    reasoning: Reasoning,
    #[serde(default)]
    winner_reason: String,
}

fn clamp_criterion(value: f64) -> u8 {
    value.clamp(0.0, 10.0).round() as u8
}

impl From<RawScores> for ScoreCard {
    fn from(raw: RawScores) -> Self {
        ScoreCard {
            logic: clamp_criterion(raw.logic),
            factual_accuracy: clamp_criterion(raw.factual_accuracy),
            rhetoric: clamp_criterion(raw.rhetoric),
            relevance: clamp_criterion(raw.relevance),
            rebuttal: clamp_criterion(raw.rebuttal),
            total: 0,
        }
        .with_total()
    }
}

/// Parse a judge completion into an evaluation. The winner comes from the
/// recomputed totals, not from the model's own `winner` field.
pub fn parse_evaluation(completion: &str) -> Result<ExchangeEvaluation> {
    let json = JSON_BLOCK
        .find(completion)
        .ok_or_else(|| ArenaError::Evaluation("no JSON object in judge response".to_string()))?
        .as_str();

    let raw: RawEvaluation = serde_json::from_str(json)
        .map_err(|e| ArenaError::Evaluation(format!("malformed judge response: {}", e)))?;

    let user_scores = ScoreCard::from(raw.user_scores);
    let ai_scores = ScoreCard::from(raw.ai_scores);
    let winner = match user_scores.total.cmp(&ai_scores.total) {
        std::cmp::Ordering::Greater => ExchangeWinner::User,
        std::cmp::Ordering::Less => ExchangeWinner::Ai,
        std::cmp::Ordering::Equal => ExchangeWinner::Tie,
    };

    Ok(ExchangeEvaluation {
        user_scores,
        ai_scores,
        fact_checks: raw.fact_checks,
        reasoning: raw.reasoning,
        winner,
        winner_reason: raw.winner_reason,
    })
}

// ─── Judge service ──────────────────────────────────────────

/// Scores exchanges through the agent client and keeps the per-session record
/// used for cumulative aggregation.
pub struct JudgeService {
    agent: Arc<AgentClient>,
    evaluations: RwLock<HashMap<String, Vec<ExchangeEvaluation>>>,
}

impl JudgeService {
    pub fn new(agent: Arc<AgentClient>) -> Self {
        Self {
            agent,
            evaluations: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate one exchange and record the result for the session.
    /// `context` carries earlier exchanges as (user, ai) pairs.
    pub async fn evaluate_exchange(
        &self,
        session_id: &str,
        topic: &str,
        user_argument: &str,
        ai_argument: &str,
        context: &[(String, String)],
    ) -> Result<ExchangeEvaluation> {
        tracing::info!("Evaluating debate exchange on topic: {}", topic);

        let prompt = prompts::judge_evaluation_prompt(topic, user_argument, ai_argument, context);
        let completion = self.agent.judge_completion(&prompt).await?;
        let evaluation = parse_evaluation(&completion)?;

        self.evaluations
            .write()
            .expect("evaluation table lock poisoned")
            .entry(session_id.to_string())
            .or_default()
            .push(evaluation.clone());

        tracing::info!(
            "Judge evaluation completed: user={} ai={} winner={:?}",
            evaluation.user_scores.total,
            evaluation.ai_scores.total,
            evaluation.winner
        );
        Ok(evaluation)
    }

    /// Fold all recorded evaluations for a session. Pure aggregation.
    pub fn cumulative(&self, session_id: &str) -> CumulativeScores {
        let table = self
            .evaluations
            .read()
            .expect("evaluation table lock poisoned");
        let evaluations = table.get(session_id).map(Vec::as_slice).unwrap_or(&[]);

        let user_total: u32 = evaluations.iter().map(|e| e.user_scores.total).sum();
        let ai_total: u32 = evaluations.iter().map(|e| e.ai_scores.total).sum();
        let overall_winner = match user_total.cmp(&ai_total) {
            std::cmp::Ordering::Greater => ExchangeWinner::User,
            std::cmp::Ordering::Less => ExchangeWinner::Ai,
            std::cmp::Ordering::Equal => ExchangeWinner::Tie,
        };

        CumulativeScores {
            user_cumulative_score: user_total,
            ai_cumulative_score: ai_total,
            overall_winner,
            score_difference: user_total.abs_diff(ai_total),
            exchanges_evaluated: evaluations.len(),
        }
    }

    /// Drop a session's evaluation record (on session delete).
    pub fn forget_session(&self, session_id: &str) {
        self.evaluations
            .write()
            .expect("evaluation table lock poisoned")
            .remove(session_id);
    }
}
