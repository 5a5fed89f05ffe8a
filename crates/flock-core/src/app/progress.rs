//! Progress calculator: task counters -> one 0..=100 percentage.
//!
//! Three phases with fixed weights (groups 0.10, posts 0.30, comments 0.60).
//! A phase with a known total contributes `min(processed / total, 1.0)`; a
//! known total of zero means there is nothing to do and counts as done.
//! A phase whose total is unknown contributes against an estimate, and an
//! estimated phase never reaches 1.0 on its own.
//!
//! An import task only does groups work, so its percentage is read from the
//! groups phase alone (`for_task`); posts and comments would otherwise count
//! as done before anything ran.

use serde::{Deserialize, Serialize};

use crate::config::EstimateConfig;
use crate::domain::{Counters, PhaseCounter, Task, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Groups,
    Posts,
    Comments,
}

/// Phase weights, in phase order. They sum to exactly 1.0.
pub const PHASE_WEIGHTS: [(Phase, f64); 3] = [
    (Phase::Groups, 0.10),
    (Phase::Posts, 0.30),
    (Phase::Comments, 0.60),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseDetail {
    pub phase: Phase,
    pub processed: u64,
    /// Known total, or the estimate when `estimated`.
    pub total: u64,
    pub estimated: bool,
    /// Always within `0.0..=1.0`.
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub percentage: u8,
    pub current_phase: Phase,
    pub processed: u64,
    pub total: u64,
    pub phases: Vec<PhaseDetail>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressCalculator {
    estimate: EstimateConfig,
}

impl ProgressCalculator {
    pub fn new(estimate: EstimateConfig) -> Self {
        Self { estimate }
    }

    /// Never fails; out-of-range counters are clamped.
    pub fn calculate(&self, counters: &Counters) -> Progress {
        self.calculate_over(counters, &[Phase::Groups, Phase::Posts, Phase::Comments])
    }

    /// Progress over the phases the task's kind actually runs.
    pub fn for_task(&self, task: &Task) -> Progress {
        match task.kind() {
            TaskKind::Import => self.calculate_over(task.counters(), &[Phase::Groups]),
            TaskKind::Collection => self.calculate(task.counters()),
        }
    }

    /// Weights of the phases in `scope` are rescaled to sum to 1.0.
    fn calculate_over(&self, counters: &Counters, scope: &[Phase]) -> Progress {
        let groups = self.detail(Phase::Groups, &counters.groups, counters.groups.processed);
        let posts = self.detail(
            Phase::Posts,
            &counters.posts,
            groups.total.saturating_mul(self.estimate.avg_posts_per_group),
        );
        let comments = self.detail(
            Phase::Comments,
            &counters.comments,
            posts.total.saturating_mul(self.estimate.avg_comments_per_post),
        );
        let phases: Vec<PhaseDetail> = [groups, posts, comments]
            .into_iter()
            .filter(|d| scope.contains(&d.phase))
            .collect();

        let (weighted, weight_sum) = phases
            .iter()
            .zip(PHASE_WEIGHTS.iter().filter(|(phase, _)| scope.contains(phase)))
            .fold((0.0, 0.0), |(acc, sum), (detail, (_, weight))| {
                (acc + weight * detail.fraction, sum + weight)
            });
        let ratio = if weight_sum > 0.0 { weighted / weight_sum } else { 1.0 };
        let percentage = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;

        let current_phase = phases
            .iter()
            .find(|d| d.fraction < 1.0)
            .or(phases.last())
            .map_or(Phase::Comments, |d| d.phase);

        Progress {
            percentage,
            current_phase,
            processed: phases.iter().fold(0, |acc, d| acc.saturating_add(d.processed)),
            total: phases.iter().fold(0, |acc, d| acc.saturating_add(d.total)),
            phases,
        }
    }

    fn detail(&self, phase: Phase, counter: &PhaseCounter, estimate_base: u64) -> PhaseDetail {
        let processed = counter.processed;
        match counter.total {
            Some(0) => PhaseDetail {
                phase,
                processed,
                total: 0,
                estimated: false,
                fraction: 1.0,
            },
            Some(total) => PhaseDetail {
                phase,
                processed: processed.min(total),
                total,
                estimated: false,
                fraction: (processed as f64 / total as f64).clamp(0.0, 1.0),
            },
            None => {
                let estimate = self.estimate_total(estimate_base).max(processed.saturating_add(1));
                PhaseDetail {
                    phase,
                    processed,
                    total: estimate,
                    estimated: true,
                    fraction: (processed as f64 / estimate as f64).clamp(0.0, 1.0),
                }
            }
        }
    }

    /// Capped by the user maximum, floored at the minimum estimate.
    fn estimate_total(&self, base: u64) -> u64 {
        let capped = match self.estimate.max_total {
            Some(max) => base.min(max),
            None => base,
        };
        capped.max(self.estimate.min_estimate).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParsedEntry, ParsedFile, TaskId};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use ulid::Ulid;

    fn counters(groups: (u64, Option<u64>), posts: (u64, Option<u64>), comments: (u64, Option<u64>)) -> Counters {
        let phase = |(processed, total): (u64, Option<u64>)| PhaseCounter { processed, total };
        Counters {
            groups: phase(groups),
            posts: phase(posts),
            comments: phase(comments),
            ..Counters::default()
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = PHASE_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fully_complete_is_exactly_100() {
        let p = ProgressCalculator::default().calculate(&counters(
            (3, Some(3)),
            (30, Some(30)),
            (600, Some(600)),
        ));
        assert_eq!(p.percentage, 100);
        assert_eq!(p.current_phase, Phase::Comments);
        assert_eq!((p.processed, p.total), (633, 633));
    }

    #[rstest]
    #[case::groups((10, Some(2)), (0, Some(0)), (0, Some(0)))]
    #[case::posts((1, Some(1)), (99, Some(3)), (0, Some(0)))]
    #[case::comments((1, Some(1)), (1, Some(1)), (u64::MAX, Some(5)))]
    fn processed_over_total_is_clamped(
        #[case] groups: (u64, Option<u64>),
        #[case] posts: (u64, Option<u64>),
        #[case] comments: (u64, Option<u64>),
    ) {
        let p = ProgressCalculator::default().calculate(&counters(groups, posts, comments));
        assert!(p.phases.iter().all(|d| (0.0..=1.0).contains(&d.fraction)));
        assert_eq!(p.percentage, 100);
    }

    #[rstest]
    #[case::posts_unknown((1, Some(1)), (u64::MAX, None), (0, None))]
    #[case::comments_unknown((1, Some(1)), (1, Some(1)), (u64::MAX, None))]
    #[case::all_unknown((u64::MAX, None), (u64::MAX, None), (u64::MAX, None))]
    fn saturated_unknown_totals_do_not_overflow(
        #[case] groups: (u64, Option<u64>),
        #[case] posts: (u64, Option<u64>),
        #[case] comments: (u64, Option<u64>),
    ) {
        let p = ProgressCalculator::default().calculate(&counters(groups, posts, comments));
        assert!(p.phases.iter().all(|d| (0.0..=1.0).contains(&d.fraction)));
        assert!(p.percentage <= 100);
    }

    #[test]
    fn zero_counters_start_in_groups_phase() {
        let p = ProgressCalculator::default().calculate(&Counters::default());
        assert_eq!(p.percentage, 0);
        assert_eq!(p.current_phase, Phase::Groups);
    }

    #[test]
    fn current_phase_is_first_incomplete() {
        let p = ProgressCalculator::default().calculate(&counters((4, Some(4)), (1, Some(8)), (0, None)));
        assert_eq!(p.current_phase, Phase::Posts);
    }

    #[test]
    fn unknown_totals_use_floored_estimate() {
        let calc = ProgressCalculator::new(EstimateConfig {
            avg_posts_per_group: 10,
            avg_comments_per_post: 20,
            min_estimate: 100,
            max_total: None,
        });
        let p = calc.calculate(&counters((2, Some(2)), (5, None), (50, None)));

        // posts: 2 groups * 10 = 20, floored to 100
        assert_eq!(p.phases[1].total, 100);
        assert!(p.phases[1].estimated);
        // comments: 100 posts * 20
        assert_eq!(p.phases[2].total, 2000);
        assert!(p.percentage > 10);
    }

    #[test]
    fn estimate_is_capped_by_user_maximum() {
        let calc = ProgressCalculator::new(EstimateConfig {
            avg_posts_per_group: 10,
            avg_comments_per_post: 100,
            min_estimate: 1,
            max_total: Some(500),
        });
        let p = calc.calculate(&counters((50, Some(50)), (0, None), (0, None)));
        assert_eq!(p.phases[1].total, 500);
        assert_eq!(p.phases[2].total, 500);
    }

    #[test]
    fn estimated_phase_never_reports_done() {
        let calc = ProgressCalculator::new(EstimateConfig {
            min_estimate: 10,
            max_total: Some(10),
            ..EstimateConfig::default()
        });
        let p = calc.calculate(&counters((1, Some(1)), (1, Some(1)), (1_000, None)));
        assert!(p.phases[2].fraction < 1.0);
        assert!(p.percentage <= 100);
        assert_eq!(p.current_phase, Phase::Comments);
    }

    fn import_task(entries: usize) -> Task {
        let parsed = ParsedFile {
            entries: (0..entries as u64).map(ParsedEntry::with_id).collect(),
            errors: Vec::new(),
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Task::new_import(TaskId::from_ulid(Ulid::new()), now, &parsed)
    }

    #[test]
    fn fresh_import_reads_zero() {
        let task = import_task(600);
        let p = ProgressCalculator::default().for_task(&task);
        assert_eq!(p.percentage, 0);
        assert_eq!(p.current_phase, Phase::Groups);
        assert_eq!(p.phases.len(), 1);
    }

    #[test]
    fn import_progress_follows_groups_only() {
        let calc = ProgressCalculator::default();
        let mut task = import_task(600);
        task.counters_mut().groups.set_total(600);

        let mut seen = Vec::new();
        for _ in 0..4 {
            task.counters_mut().groups.advance(150);
            seen.push(calc.for_task(&task).percentage);
        }
        assert_eq!(seen, vec![25, 50, 75, 100]);
    }

    #[test]
    fn collection_task_uses_all_phases() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let task = Task::new_collection(TaskId::from_ulid(Ulid::new()), now, vec![1, 2]);
        let p = ProgressCalculator::default().for_task(&task);
        assert_eq!(p.phases.len(), 3);
        assert_eq!(p.percentage, 0);
    }

    #[test]
    fn percentage_is_monotonic_as_processed_grows() {
        let calc = ProgressCalculator::default();
        let mut last = 0;
        let mut c = counters((0, Some(5)), (0, None), (0, None));

        for step in 0..400u64 {
            if step % 80 == 0 && c.groups.processed < 5 {
                c.groups.processed += 1;
            }
            c.posts.processed += step % 2;
            c.comments.processed += 3;

            let p = calc.calculate(&c).percentage;
            assert!(p >= last, "step {step}: {p} < {last}");
            last = p;
        }
    }
}
