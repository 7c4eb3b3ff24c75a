//! Stagnation detection and persona selection (spec §4.6).
//!
//! Detection is a pure function over a caller-supplied `ExecutionHistory`;
//! there is no detector state to own. The domain crate holds the shared
//! vocabulary (`StagnationPattern`, `Persona`); this module holds the logic
//! that decides when a pattern fires and which persona responds to it.

use std::collections::HashSet;

use seedloop_domain::{Persona, StagnationPattern, StagnationSignal};

/// The slice of execution history the detector needs: a window of output
/// hashes and drift deltas, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ExecutionHistory {
    pub output_hashes: Vec<String>,
    pub drift_deltas: Vec<f64>,
    pub progress_rates: Vec<f64>,
}

const SPINNING_WINDOW: usize = 3;
const OSCILLATION_WINDOW: usize = 6;
const NO_DRIFT_WINDOW: usize = 5;
const NO_DRIFT_EPSILON: f64 = 0.01;
const DIMINISHING_WINDOW: usize = 3;
const DIMINISHING_RATIO: f64 = 0.10;

fn detect_spinning(history: &ExecutionHistory) -> Option<StagnationSignal> {
    let hashes = &history.output_hashes;
    if hashes.len() < SPINNING_WINDOW {
        return None;
    }
    let tail = &hashes[hashes.len() - SPINNING_WINDOW..];
    if tail.iter().all(|h| h == &tail[0]) {
        Some(StagnationSignal {
            pattern: StagnationPattern::Spinning,
            window: SPINNING_WINDOW as u32,
            evidence: format!("{} identical outputs in a row", SPINNING_WINDOW),
        })
    } else {
        None
    }
}

fn detect_oscillation(history: &ExecutionHistory) -> Option<StagnationSignal> {
    let hashes = &history.output_hashes;
    if hashes.len() < 4 {
        return None;
    }
    let window_start = hashes.len().saturating_sub(OSCILLATION_WINDOW);
    let window = &hashes[window_start..];
    for start in 0..window.len().saturating_sub(3) {
        let (a, b, a2, b2) = (&window[start], &window[start + 1], &window[start + 2], &window[start + 3]);
        if a == a2 && b == b2 && a != b {
            return Some(StagnationSignal {
                pattern: StagnationPattern::Oscillation,
                window: OSCILLATION_WINDOW as u32,
                evidence: format!("A→B→A→B detected: {a} → {b} → {a2} → {b2}"),
            });
        }
    }
    None
}

fn detect_no_drift(history: &ExecutionHistory) -> Option<StagnationSignal> {
    let deltas = &history.drift_deltas;
    if deltas.len() < NO_DRIFT_WINDOW {
        return None;
    }
    let tail = &deltas[deltas.len() - NO_DRIFT_WINDOW..];
    if tail.iter().all(|d| d.abs() < NO_DRIFT_EPSILON) {
        Some(StagnationSignal {
            pattern: StagnationPattern::NoDrift,
            window: NO_DRIFT_WINDOW as u32,
            evidence: format!("drift delta < {NO_DRIFT_EPSILON} for {NO_DRIFT_WINDOW} iterations"),
        })
    } else {
        None
    }
}

fn detect_diminishing_returns(history: &ExecutionHistory) -> Option<StagnationSignal> {
    let rates = &history.progress_rates;
    if rates.len() < DIMINISHING_WINDOW + 1 {
        return None;
    }
    let initial_rate = rates[0];
    if initial_rate <= 0.0 {
        return None;
    }
    let tail = &rates[rates.len() - DIMINISHING_WINDOW..];
    if tail.iter().all(|r| *r < DIMINISHING_RATIO * initial_rate) {
        Some(StagnationSignal {
            pattern: StagnationPattern::DiminishingReturns,
            window: DIMINISHING_WINDOW as u32,
            evidence: format!("progress rate below {DIMINISHING_RATIO} of initial for {DIMINISHING_WINDOW} iterations"),
        })
    } else {
        None
    }
}

/// Checks the four patterns in spec §4.6 table order, first match wins (this
/// workspace's tie-precedence decision, recorded in `DESIGN.md`).
pub fn detect(history: &ExecutionHistory) -> Option<StagnationSignal> {
    detect_spinning(history)
        .or_else(|| detect_oscillation(history))
        .or_else(|| detect_no_drift(history))
        .or_else(|| detect_diminishing_returns(history))
}

/// Picks the next persona to try for a stagnation episode: highest affinity
/// for the fired pattern, excluding personas already tried and failed this
/// episode. `None` means all five are exhausted — escalate to human
/// intervention (spec §4.6).
pub fn select_persona(pattern: StagnationPattern, failed_this_episode: &HashSet<Persona>) -> Option<Persona> {
    Persona::ALL
        .into_iter()
        .find(|persona| persona.affinity(pattern) && !failed_this_episode.contains(persona))
}
