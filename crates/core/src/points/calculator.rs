use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multiplicative speed bonus applied when work lands within
/// [`SPEED_BONUS_HOURS`] of being opened.
pub const SPEED_BONUS_RATE: f64 = 0.20;
pub const SPEED_BONUS_HOURS: i64 = 24;
/// Flat bonus applied every [`STREAK_BONUS_INTERVAL`] consecutive days.
pub const STREAK_BONUS_POINTS: i64 = 10;
pub const STREAK_BONUS_INTERVAL: u32 = 5;
pub const FIRST_TIMER_BONUS: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown priority `{0}` (expected LOW|MEDIUM|HIGH|CRITICAL)")]
pub struct UnknownPriority(pub String);

impl Priority {
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Low | Self::Medium => 1.0,
            Self::High => 2.0,
            Self::Critical => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(UnknownPriority(other.to_string())),
        }
    }
}

/// One applied adjustment, kept for the award trail shown to contributors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusStep {
    pub label: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AwardBreakdown {
    pub base_points: i64,
    pub multiplier: f64,
    pub flat_bonus: i64,
    pub final_points: i64,
    pub steps: Vec<BonusStep>,
}

impl AwardBreakdown {
    /// Human-readable summary of every applied bonus.
    pub fn bonus_summary(&self) -> String {
        if self.steps.is_empty() {
            return "No bonuses".to_string();
        }
        self.steps
            .iter()
            .map(|step| step.detail.clone())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Builder over one award. Multiplicative adjustments stack on the base;
/// flat bonuses land after the multiplied total is truncated.
#[derive(Debug)]
pub struct PointsCalculator {
    base_points: i64,
    multiplier: f64,
    steps: Vec<BonusStep>,
}

impl PointsCalculator {
    pub fn new(base_points: i64) -> Self {
        Self { base_points, multiplier: 1.0, steps: Vec::new() }
    }

    pub fn apply_priority(mut self, priority: Priority) -> Self {
        self.multiplier *= priority.multiplier();
        if matches!(priority, Priority::High | Priority::Critical) {
            self.steps.push(BonusStep {
                label: "priority".to_string(),
                detail: format!("{} Priority (x{})", priority.as_str(), priority.multiplier()),
            });
        }
        self
    }

    pub fn apply_speed_bonus(
        mut self,
        created_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let elapsed = completed_at.signed_duration_since(created_at);
        if elapsed.num_seconds() <= SPEED_BONUS_HOURS * 3600 {
            self.multiplier *= 1.0 + SPEED_BONUS_RATE;
            self.steps.push(BonusStep {
                label: "speed".to_string(),
                detail: format!("Speed Bonus (+{}%)", (SPEED_BONUS_RATE * 100.0) as i64),
            });
        }
        self
    }

    pub fn finish(mut self, current_streak: u32, is_first_timer: bool) -> AwardBreakdown {
        let multiplied = (self.base_points as f64 * self.multiplier) as i64;

        let mut flat_bonus = 0;
        if current_streak > 0 && current_streak % STREAK_BONUS_INTERVAL == 0 {
            flat_bonus += STREAK_BONUS_POINTS;
            self.steps.push(BonusStep {
                label: "streak".to_string(),
                detail: format!("Streak Bonus (+{STREAK_BONUS_POINTS} points)"),
            });
        }
        if is_first_timer {
            flat_bonus += FIRST_TIMER_BONUS;
            self.steps.push(BonusStep {
                label: "first_timer".to_string(),
                detail: format!("First Timer Bonus (+{FIRST_TIMER_BONUS} points)"),
            });
        }

        AwardBreakdown {
            base_points: self.base_points,
            multiplier: self.multiplier,
            flat_bonus,
            final_points: multiplied + flat_bonus,
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{AwardBreakdown, PointsCalculator, Priority};

    #[test]
    fn critical_priority_triples_base_points() {
        let breakdown =
            PointsCalculator::new(10).apply_priority(Priority::Critical).finish(0, false);

        assert_eq!(breakdown.final_points, 30);
        assert_eq!(breakdown.multiplier, 3.0);
        assert_eq!(breakdown.flat_bonus, 0);
    }

    #[test]
    fn medium_priority_leaves_points_unchanged() {
        let breakdown = PointsCalculator::new(7).apply_priority(Priority::Medium).finish(0, false);

        assert_eq!(breakdown.final_points, 7);
        assert_eq!(breakdown.bonus_summary(), "No bonuses");
    }

    #[test]
    fn speed_bonus_applies_inside_the_window_only() {
        let created = Utc::now();

        let fast = PointsCalculator::new(10)
            .apply_speed_bonus(created, created + Duration::hours(23))
            .finish(0, false);
        assert_eq!(fast.final_points, 12);

        let slow = PointsCalculator::new(10)
            .apply_speed_bonus(created, created + Duration::hours(25))
            .finish(0, false);
        assert_eq!(slow.final_points, 10);
    }

    #[test]
    fn multiplied_total_truncates_before_flat_bonuses() {
        // 3 * 1.2 = 3.6 truncates to 3, then +5 first-timer.
        let created = Utc::now();
        let breakdown = PointsCalculator::new(3)
            .apply_speed_bonus(created, created + Duration::hours(1))
            .finish(0, true);

        assert_eq!(breakdown.final_points, 8);
        assert_eq!(breakdown.flat_bonus, 5);
    }

    #[test]
    fn streak_bonus_lands_on_multiples_of_five() {
        assert_eq!(PointsCalculator::new(10).finish(5, false).final_points, 20);
        assert_eq!(PointsCalculator::new(10).finish(4, false).final_points, 10);
        assert_eq!(PointsCalculator::new(10).finish(0, false).final_points, 10);
    }

    #[test]
    fn stacked_bonuses_compose_in_order() {
        // 10 base, HIGH x2, speed x1.2 -> 24, +10 streak, +5 first-timer.
        let created = Utc::now();
        let breakdown = PointsCalculator::new(10)
            .apply_priority(Priority::High)
            .apply_speed_bonus(created, created + Duration::hours(2))
            .finish(10, true);

        assert_eq!(breakdown.final_points, 39);
        let summary = breakdown.bonus_summary();
        assert!(summary.contains("HIGH Priority"));
        assert!(summary.contains("Speed Bonus"));
        assert!(summary.contains("Streak Bonus"));
        assert!(summary.contains("First Timer Bonus"));
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("critical".parse::<Priority>(), Ok(Priority::Critical));
        assert_eq!("Medium".parse::<Priority>(), Ok(Priority::Medium));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn breakdown_serializes_for_the_award_trail() {
        let breakdown = PointsCalculator::new(5).finish(0, true);
        let json = serde_json::to_string(&breakdown).unwrap();
        let decoded: AwardBreakdown = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, breakdown);
    }
}
