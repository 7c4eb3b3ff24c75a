//! Stage 3 — Consensus (Frontier tier), spec §4.7.
//!
//! Two modes: `Simple` (three parallel voters, majority wins, degrading on
//! voter loss) and `Deliberative` (ADVOCATE + DEVIL'S ADVOCATE in round 1,
//! JUDGE synthesizes in round 2). Fan-out uses `futures::future::join_all`,
//! the same concurrency primitive the executor uses for AC-tree siblings.

use std::future::Future;
use std::pin::Pin;

use futures::future::join_all;
use seedloop_domain::{ConsensusMode, ConsensusOutcome, Verdict, VoterResult};
use tokio::time::{timeout, Duration};
use tracing::instrument;

use crate::errors::EvaluationError;

#[derive(Debug, Clone, Copy)]
pub struct VoterTimeouts {
    pub per_voter: Duration,
}

impl Default for VoterTimeouts {
    fn default() -> Self {
        Self {
            per_voter: Duration::from_secs(300),
        }
    }
}

/// One voter's async call, abstracted so the pipeline doesn't need to know
/// how a vote is actually produced (an LLM call in production, a canned
/// value in tests). Voters are fanned out as `dyn Voter` (the set is
/// heterogeneous — different models behind different clients), so `vote`
/// returns a boxed future rather than `impl Future`: RPITIT is not
/// dyn-compatible.
pub trait Voter: Send + Sync {
    fn name(&self) -> &str;
    fn vote(&self) -> Pin<Box<dyn Future<Output = VoterResult> + Send + '_>>;
}

/// Simple consensus: three voters in parallel, 2/3 majority. Losing one
/// voter to timeout degrades to a 2-voter vote requiring unanimity; losing
/// two or more aborts to human review (spec §4.7, end-to-end scenario 4).
#[instrument(skip(voters))]
pub async fn simple_consensus(
    voters: &[&(dyn Voter + Sync)],
    timeouts: VoterTimeouts,
) -> Result<ConsensusOutcome, EvaluationError> {
    let futures = voters.iter().map(|voter| {
        let name = voter.name().to_string();
        async move {
            match timeout(timeouts.per_voter, voter.vote()).await {
                Ok(result) => Some(result),
                Err(_) => {
                    tracing::warn!(voter = %name, "voter timed out");
                    None
                }
            }
        }
    });

    let results: Vec<Option<VoterResult>> = join_all(futures).await;
    let votes: Vec<VoterResult> = results.into_iter().flatten().collect();
    let lost = voters.len() - votes.len();

    let verdict = if lost >= 2 {
        return Err(EvaluationError::ConsensusAborted {
            reason: format!("{lost} of {} voters unreachable", voters.len()),
        });
    } else if lost == 1 {
        // Two-voter vote requires unanimity.
        if votes.len() == 2 && votes.iter().all(|v| v.approved) {
            Verdict::Approved
        } else if votes.len() == 2 && votes.iter().all(|v| !v.approved) {
            Verdict::Rejected
        } else {
            Verdict::Conditional
        }
    } else {
        let approvals = votes.iter().filter(|v| v.approved).count();
        if approvals * 3 >= votes.len() * 2 {
            Verdict::Approved
        } else {
            Verdict::Rejected
        }
    };

    Ok(ConsensusOutcome {
        mode: ConsensusMode::Simple,
        votes,
        verdict,
        conditions: vec![],
    })
}

/// The four ontological probes the DEVIL'S ADVOCATE applies in deliberative
/// consensus (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OntologicalProbe {
    Essence,
    RootCause,
    Prerequisites,
    HiddenAssumptions,
}

pub const ONTOLOGICAL_PROBES: [OntologicalProbe; 4] = [
    OntologicalProbe::Essence,
    OntologicalProbe::RootCause,
    OntologicalProbe::Prerequisites,
    OntologicalProbe::HiddenAssumptions,
];

#[derive(Debug, Clone)]
pub struct DevilsAdvocateResult {
    pub is_root_solution: bool,
    pub probe_notes: Vec<(OntologicalProbe, String)>,
}

pub trait DeliberativeRound: Send + Sync {
    fn advocate(&self) -> impl std::future::Future<Output = VoterResult> + Send;
    fn devils_advocate(&self) -> impl std::future::Future<Output = DevilsAdvocateResult> + Send;
    fn judge(
        &self,
        advocate: &VoterResult,
        devil: &DevilsAdvocateResult,
    ) -> impl std::future::Future<Output = Verdict> + Send;
}

/// Round 1 runs ADVOCATE and DEVIL'S ADVOCATE concurrently; round 2 the
/// JUDGE synthesizes (spec §4.7).
#[instrument(skip(round))]
pub async fn deliberative_consensus(
    round: &impl DeliberativeRound,
    timeouts: VoterTimeouts,
) -> Result<ConsensusOutcome, EvaluationError> {
    let advocate_fut = timeout(timeouts.per_voter, round.advocate());
    let devil_fut = timeout(timeouts.per_voter, round.devils_advocate());
    let (advocate_res, devil_res) = futures::join!(advocate_fut, devil_fut);

    let advocate = advocate_res.map_err(|_| EvaluationError::ConsensusAborted {
        reason: "advocate timed out".to_string(),
    })?;
    let devil = devil_res.map_err(|_| EvaluationError::ConsensusAborted {
        reason: "devil's advocate timed out".to_string(),
    })?;

    let verdict = timeout(timeouts.per_voter, round.judge(&advocate, &devil))
        .await
        .map_err(|_| EvaluationError::ConsensusAborted {
            reason: "judge timed out".to_string(),
        })?;

    Ok(ConsensusOutcome {
        mode: ConsensusMode::Deliberative,
        votes: vec![advocate],
        verdict,
        conditions: if verdict == Verdict::Conditional {
            vec!["judge flagged conditions pending devil's advocate review".to_string()]
        } else {
            vec![]
        },
    })
}
