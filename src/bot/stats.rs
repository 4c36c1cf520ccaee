use serde::Serialize;
use std::collections::HashSet;

/// Usage counters kept for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct BotStats {
    pub total_requests: u64,
    pub successful_generations: u64,
    pub failed_generations: u64,
    users: HashSet<i64>,
}

/// Point-in-time copy of [`BotStats`] suitable for serialization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub users: usize,
    pub total_requests: u64,
    pub successful_generations: u64,
    pub failed_generations: u64,
    /// Percentage of requests that produced a haiku
    pub success_rate: f64,
}

impl BotStats {
    pub fn record_user(&mut self, user_id: i64) {
        self.users.insert(user_id);
    }

    pub fn record_request(&mut self) {
        self.total_requests += 1;
    }

    pub fn record_success(&mut self) {
        self.successful_generations += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_generations += 1;
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// successful / max(1, total), as a percentage
    pub fn success_rate(&self) -> f64 {
        self.successful_generations as f64 / self.total_requests.max(1) as f64 * 100.0
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            users: self.user_count(),
            total_requests: self.total_requests,
            successful_generations: self.successful_generations,
            failed_generations: self.failed_generations,
            success_rate: self.success_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_without_requests() {
        assert_eq!(BotStats::default().success_rate(), 0.0);
    }

    #[test]
    fn test_counters() {
        let mut stats = BotStats::default();
        stats.record_user(1);
        stats.record_user(1);
        stats.record_user(2);
        for _ in 0..4 {
            stats.record_request();
        }
        stats.record_success();
        stats.record_success();
        stats.record_success();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.users, 2);
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.failed_generations, 1);
        assert_eq!(snapshot.success_rate, 75.0);
    }
}
