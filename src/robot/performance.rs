//! Step timing against the per-step budget
//!
//! `PhaseTimer` measures one step's phases; `StepMonitor` keeps a rolling
//! window of step durations and turns them into a budget status.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Phases of a connected step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Admission attempt while no client is connected
    Accept,
    /// Draining inbound messages and applying commands
    Receive,
    /// Building the snapshot
    Build,
    /// Promoting pending subscriptions
    Update,
    /// Quota check and send
    Send,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Accept => "Accept time",
            Phase::Receive => "Receive time",
            Phase::Build => "Build time",
            Phase::Update => "Update time",
            Phase::Send => "Send time",
        }
    }
}

/// Phase durations of one step
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    start: Instant,
    last: Instant,
    phases: Vec<(Phase, Duration)>,
}

impl PhaseTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            phases: Vec::with_capacity(5),
        }
    }

    /// Close the current phase
    pub fn mark(&mut self, phase: Phase) {
        let now = Instant::now();
        self.phases.push((phase, now - self.last));
        self.last = now;
    }

    /// Time since `start`
    pub fn total(&self) -> Duration {
        self.last - self.start
    }

    pub fn phases(&self) -> &[(Phase, Duration)] {
        &self.phases
    }

    pub fn phase(&self, phase: Phase) -> Option<Duration> {
        self.phases.iter().find(|(p, _)| *p == phase).map(|(_, d)| *d)
    }

    /// Log the step according to the benchmark level
    ///
    /// Level 3 prints every phase, level 2 the step total; an overrun
    /// prints both at any level.
    pub fn report(&self, benchmark_level: u8, budget: Duration) {
        let over_budget = self.total() > budget;
        let (phases, total) = report_detail(benchmark_level, over_budget);
        if phases {
            for (phase, duration) in &self.phases {
                info!("\t{} {:.3} ms", phase.label(), ms(*duration));
            }
        }
        if over_budget {
            warn!(
                "Step time: {:.3} ms (budget {:.3} ms)",
                ms(self.total()),
                ms(budget)
            );
        } else if total {
            info!("Step time: {:.3} ms", ms(self.total()));
        }
    }
}

/// Whether a step report includes the phase lines and the total line
fn report_detail(benchmark_level: u8, over_budget: bool) -> (bool, bool) {
    (
        benchmark_level >= 3 || over_budget,
        benchmark_level >= 2 || over_budget,
    )
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Budget status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// Well within budget
    Healthy,
    /// Average above 70% of budget
    Strained,
    /// Average above budget
    Overrun,
}

/// Rolling monitor of step durations
pub struct StepMonitor {
    /// Rolling window of step durations
    durations: VecDeque<Duration>,
    /// Maximum samples to keep
    max_samples: usize,
    /// Allowed duration per step
    budget: Duration,
    /// Fraction of budget above which the gateway is strained
    strained_threshold: f64,
    status: BudgetStatus,
    /// Steps over budget since creation
    overruns: u64,
}

impl StepMonitor {
    pub fn new(budget: Duration, max_samples: usize) -> Self {
        Self {
            durations: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            budget,
            strained_threshold: 0.7,
            status: BudgetStatus::Healthy,
            overruns: 0,
        }
    }

    /// Record a step duration
    pub fn record(&mut self, duration: Duration) {
        if duration > self.budget {
            self.overruns += 1;
        }
        self.durations.push_back(duration);
        while self.durations.len() > self.max_samples {
            self.durations.pop_front();
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        let ratio = self.budget_usage_percent() / 100.0;
        self.status = if ratio > 1.0 {
            BudgetStatus::Overrun
        } else if ratio > self.strained_threshold {
            BudgetStatus::Strained
        } else {
            BudgetStatus::Healthy
        };
    }

    /// Get average step duration
    pub fn average(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.durations.iter().sum();
        sum / self.durations.len() as u32
    }

    /// Get the 95th percentile step duration
    pub fn p95(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<_> = self.durations.iter().copied().collect();
        sorted.sort();
        let idx = (sorted.len() as f32 * 0.95) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Average step duration as a percentage of the budget
    pub fn budget_usage_percent(&self) -> f64 {
        if self.budget.is_zero() {
            return 0.0;
        }
        self.average().as_secs_f64() / self.budget.as_secs_f64() * 100.0
    }

    pub fn status(&self) -> BudgetStatus {
        self.status
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn samples(&self) -> usize {
        self.durations.len()
    }

    /// Get a human-readable status message
    pub fn status_message(&self) -> String {
        format!(
            "{:?} - {:.1}% budget, p95 {:.3} ms, {} overruns",
            self.status,
            self.budget_usage_percent(),
            ms(self.p95()),
            self.overruns
        )
    }
}
