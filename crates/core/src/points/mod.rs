pub mod badges;
pub mod calculator;
pub mod streak;

pub use badges::{BadgeCriteria, BadgeTier, ContributorSnapshot};
pub use calculator::{
    AwardBreakdown, BonusStep, PointsCalculator, Priority, UnknownPriority, FIRST_TIMER_BONUS,
    SPEED_BONUS_HOURS, SPEED_BONUS_RATE, STREAK_BONUS_INTERVAL, STREAK_BONUS_POINTS,
};
pub use streak::next_streak;
