// common/src/models/usage.rs
use serde::{Deserialize, Serialize};

/// Reply quota counters reported by `GET /usage`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub usage_count: u64,
    pub daily_used: u64,
    pub daily_goal: u64,
    pub daily_remaining: u64,
    pub weekly_used: u64,
    pub weekly_goal: u64,
    pub weekly_remaining: u64,
}

impl UsageStats {
    pub fn daily_percent(&self) -> f64 {
        percent(self.daily_used, self.daily_goal)
    }

    pub fn weekly_percent(&self) -> f64 {
        percent(self.weekly_used, self.weekly_goal)
    }

    /// Plans with more than ten daily replies are paid
    pub fn plan_label(&self) -> &'static str {
        if self.daily_goal > 10 {
            "PRO"
        } else {
            "FREE"
        }
    }
}

/// Counters plus the figures the quota cards display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    #[serde(flatten)]
    pub stats: UsageStats,
    pub daily_percent: f64,
    pub weekly_percent: f64,
    pub plan: &'static str,
}

impl From<UsageStats> for UsageSummary {
    fn from(stats: UsageStats) -> Self {
        Self {
            daily_percent: stats.daily_percent(),
            weekly_percent: stats.weekly_percent(),
            plan: stats.plan_label(),
            stats,
        }
    }
}

fn percent(used: u64, goal: u64) -> f64 {
    if goal == 0 {
        return 0.0;
    }
    used as f64 / goal as f64 * 100.0
}
