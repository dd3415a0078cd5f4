//! Monotonic search over (voltage, memory clock) candidates

use rig_core::{Error, Result, SearchPolicy, SearchState, TuningProgress};
use tracing::debug;

/// One search phase: mutates the progress and may end the search
type PhaseStep = fn(&SearchPolicy, &mut TuningProgress) -> Result<()>;

/// Phase guards in evaluation order. Every guard whose phase matches the
/// current state runs, so a phase that completes hands over to the next
/// phase within the same `advance` call.
const PHASES: [(SearchState, PhaseStep); 3] = [
    (SearchState::RaisingVoltage, raise_voltage),
    (SearchState::LoweringMemoryClock, lower_memory_clock),
    (SearchState::RaisingVoltage2, raise_voltage_again),
];

/// Search state machine for one device's operating point
#[derive(Debug, Clone)]
pub struct Tuner {
    policy: SearchPolicy,
}

impl Tuner {
    pub fn new(policy: SearchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Position a device starts from before its first advance
    pub fn initial_progress(&self) -> TuningProgress {
        self.policy.initial_progress()
    }

    /// Move `progress` to the next candidate.
    ///
    /// Returns [`Error::SearchExhausted`] when a bound is crossed; the
    /// progress is left clamped to that bound and must not be advanced again.
    pub fn advance(&self, progress: &mut TuningProgress) -> Result<()> {
        for (phase, step) in PHASES.iter() {
            if progress.state == *phase {
                step(&self.policy, progress)?;
            }
        }

        debug!(
            "Next candidate: {} mV / {} MHz ({})",
            progress.voltage, progress.memory_clock, progress.state
        );
        Ok(())
    }
}

fn raise_voltage(policy: &SearchPolicy, progress: &mut TuningProgress) -> Result<()> {
    progress.voltage = progress.voltage.saturating_add(policy.voltage_step);
    if progress.voltage > policy.max_voltage {
        progress.voltage = policy.max_voltage;
        progress.state = SearchState::LoweringMemoryClock;
    }
    Ok(())
}

fn lower_memory_clock(policy: &SearchPolicy, progress: &mut TuningProgress) -> Result<()> {
    progress.memory_clock = progress.memory_clock.saturating_sub(policy.memory_clock_step);
    if progress.memory_clock < policy.min_memory_clock {
        progress.memory_clock = policy.min_memory_clock;
        // No transition to the second voltage phase exists; the memory
        // clock floor ends the search.
        return Err(Error::exhausted("mem clk getting too low"));
    }
    Ok(())
}

fn raise_voltage_again(policy: &SearchPolicy, progress: &mut TuningProgress) -> Result<()> {
    progress.voltage = progress.voltage.saturating_add(policy.voltage_step);
    if progress.voltage > policy.max_voltage {
        progress.voltage = policy.max_voltage;
        return Err(Error::exhausted("GPU mV getting too high"));
    }
    Ok(())
}
