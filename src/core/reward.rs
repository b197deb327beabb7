use crate::core::classification::{reward_points, DEFAULT_POINTS_SCALE};
use crate::domain::model::{CaptureMethod, IneligibleReason, RewardDecision, SubmissionAttempt};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardPolicy {
    /// Minimum top-prediction confidence, inclusive.
    pub confidence_threshold: f64,
    pub points_scale: f64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            points_scale: DEFAULT_POINTS_SCALE,
        }
    }
}

impl RewardPolicy {
    /// Checks run in a fixed order; the first failing check is the reason.
    pub fn decide(&self, attempt: &SubmissionAttempt) -> RewardDecision {
        if attempt.capture_method != CaptureMethod::Gps {
            return Self::ineligible(IneligibleReason::DemoMode);
        }

        if !attempt.is_inside_zone() {
            return Self::ineligible(IneligibleReason::LocationUnverified);
        }

        let confidence = attempt.top_prediction().map(|p| p.confidence).unwrap_or(0.0);
        if !(confidence >= self.confidence_threshold) {
            return Self::ineligible(IneligibleReason::LowConfidence);
        }

        RewardDecision {
            eligible: true,
            reason: None,
            points: reward_points(confidence, self.points_scale),
        }
    }

    fn ineligible(reason: IneligibleReason) -> RewardDecision {
        RewardDecision {
            eligible: false,
            reason: Some(reason),
            points: 0,
        }
    }
}
