//! Orchestration façade (spec §6, §4.9): `evolve_step` ties the router,
//! executor, evaluation pipeline, drift measurement, and stagnation detector
//! into the one call an external driver makes per generation.
//!
//! Every invocation is stateless over the process: the Seed, prior
//! generations, and the ontology's event log are all reconstructed from the
//! Event Store before anything runs. Grounded on `sr-governor/src/main.rs`'s
//! constructor-argument wiring style (collaborators passed in explicitly,
//! no global singletons) — the axum/NATS/health-server machinery that file
//! also contains is out of scope here (spec §1) and is not reused.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use seedloop_domain::{
    event_types, AcNode, AcStatus, AcTree, AggregateType, Checkpoint, CompressedContext, ContentHash,
    EffectiveOntology, Event, EvolutionAction, FilteredContext, LineageId, OntologyEvent, Persona, Seed,
    SeedDraft, TaskContext, Tier, VoterResult,
};
use seedloop_evaluator::{
    evaluate_trigger_conditions, run_mechanical_stage, run_semantic_stage, simple_consensus, TriggerInputs,
    Voter, VoterTimeouts,
};
use seedloop_ports::{EventStore, LlmClient, LlmMessage, LlmParams, LlmResponseFormat, LlmRole, ToolRunner};
use seedloop_router::{Outcome, RouterState};
use seedloop_store::{CheckpointError, CheckpointStore};

use crate::compressor::{estimate_tokens, CompressionRecord, ContextCompressor};
use crate::config::SeedLoopConfig;
use crate::error::EngineError;
use crate::executor::{execute_node, ExecutionError, PhaseOutput, PhaseRunner};
use crate::security::{self, SizeCheck};
use crate::stagnation::{self, ExecutionHistory};
use crate::{drift, loop_driver};

/// What the external driver passes per call (spec §6). `seed_path` is only
/// needed on the generation that introduces or replaces a lineage's Seed;
/// every later call reconstructs it from the `persistence.seed.frozen`
/// event. `server_command_override` names the out-of-process collaborator
/// that would spawn the target system under test (spec §1's CLI/MCP
/// façade, explicitly out of scope here) — accepted so the signature
/// matches the external interface, but otherwise unused by this core.
#[derive(Debug, Clone)]
pub struct EvolveStepRequest {
    pub lineage_id: LineageId,
    pub seed_path: Option<PathBuf>,
    pub server_command_override: Option<String>,
}

/// The JSON envelope spec §6 describes: `{action, generation, similarity,
/// drift, error?}`.
#[derive(Debug, Clone, Serialize)]
pub struct EvolveStepResponse {
    pub action: EvolutionAction,
    pub generation: u32,
    pub similarity: f64,
    pub drift: f64,
    pub error: Option<String>,
}

/// Runs one generation end to end and returns its outcome. Never panics and
/// never propagates an `Err`: any unrecoverable failure is reported as
/// `EvolutionAction::Failed` with `error` set, per spec §6 (the driver
/// script distinguishes failure modes by `action`, not by a transport-level
/// error).
#[instrument(skip(event_store, checkpoints, router, llm, tools, config), fields(lineage = %request.lineage_id))]
pub async fn evolve_step<ES, L, T>(
    request: EvolveStepRequest,
    event_store: &ES,
    checkpoints: &CheckpointStore,
    router: &RouterState,
    llm: &L,
    tools: &T,
    config: &SeedLoopConfig,
) -> EvolveStepResponse
where
    ES: EventStore,
    L: LlmClient,
    T: ToolRunner,
{
    let _ = &request.server_command_override;
    match run(request, event_store, checkpoints, router, llm, tools, config).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "evolve_step failed");
            EvolveStepResponse {
                action: EvolutionAction::Failed,
                generation: 0,
                similarity: 0.0,
                drift: 0.0,
                error: Some(e.to_string()),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GenerationRecord {
    generation_number: u32,
    seed_hash: String,
    ontology_version: u32,
    similarity_to_previous: f64,
    drift_score: f64,
    action: EvolutionAction,
    summary: String,
    stagnation_retry_count: u32,
    /// The persona rotated in to respond to this generation's stagnation
    /// signal, if any (spec §4.6). Read back on later calls to build the
    /// set of personas already tried and failed within an ongoing episode.
    rotated_persona: Option<Persona>,
}

/// Personas already rotated in during the stagnation episode still running
/// as of this generation, so `stagnation::select_persona` does not retry
/// one that already failed to resolve it. An episode is the run of the
/// most recent `stagnation_retry_count` generations, since the count resets
/// to zero the moment a generation's stagnation signal clears.
fn personas_failed_this_episode(past_generations: &[GenerationRecord], current_retry_count: u32) -> HashSet<Persona> {
    if current_retry_count == 0 {
        return HashSet::new();
    }
    past_generations
        .iter()
        .rev()
        .take(current_retry_count as usize)
        .filter_map(|g| g.rotated_persona)
        .collect()
}

async fn run<ES, L, T>(
    request: EvolveStepRequest,
    event_store: &ES,
    checkpoints: &CheckpointStore,
    router: &RouterState,
    llm: &L,
    tools: &T,
    config: &SeedLoopConfig,
) -> Result<EvolveStepResponse, EngineError>
where
    ES: EventStore,
    L: LlmClient,
    T: ToolRunner,
{
    let aggregate_id = request.lineage_id.as_str().to_string();
    let past_events = event_store.replay(&aggregate_id).await?;

    let seed = reconstruct_or_load_seed(&request, &past_events, &aggregate_id, event_store).await?;
    let seed_hash = seed.content_hash();

    let past_generations = reconstruct_generations(&past_events);
    let ontology_events = extract_ontology_events(&past_events);
    let effective_ontology = EffectiveOntology::replay(&seed.ontology_schema, &ontology_events);

    let generation_number = past_generations.last().map(|g| g.generation_number + 1).unwrap_or(1);
    let previous_summary = past_generations.last().map(|g| g.summary.clone()).unwrap_or_else(|| seed.goal.clone());
    let stagnation_retry_count = past_generations.last().map(|g| g.stagnation_retry_count).unwrap_or(0);

    // Checkpoint recovery (spec §4.2): a prior slot recovered with a
    // nonzero rollback depth means the most recent checkpoint(s) were
    // corrupted and the ring had to fall back to an older, valid one.
    let mut recovery_events = Vec::new();
    match checkpoints.load_latest_valid(seed.id.as_str()).await {
        Ok(recovered) if recovered.rollback_depth > 0 => {
            warn!(
                seed_id = %seed.id.as_str(),
                rollback_depth = recovered.rollback_depth,
                "checkpoint recovery rolled back to an older slot"
            );
            recovery_events.push(Event::new(
                AggregateType::Persistence,
                aggregate_id.clone(),
                event_types::CHECKPOINT_ROLLED_BACK,
                serde_json::json!({
                    "rollback_depth": recovered.rollback_depth,
                    "recovered_generation": recovered.checkpoint.generation,
                }),
                None,
            )?);
        }
        Ok(_) => {}
        Err(CheckpointError::NotFound { .. }) => {}
        Err(e) => warn!(error = %e, seed_id = %seed.id.as_str(), "checkpoint recovery failed"),
    }

    let fingerprint = seed.goal.split_whitespace().collect::<Vec<_>>().join(" ");
    let task_ctx = TaskContext {
        token_count: estimate_tokens(&seed.goal) + seed.acceptance_criteria.iter().map(|ac| estimate_tokens(ac)).sum::<u64>(),
        tool_count: 0,
        ac_depth: 0,
        fingerprint: fingerprint.clone(),
    };
    let prior_tier = router.snapshot(&fingerprint).await.map(|s| s.current_tier);
    let routing = router.route(&task_ctx).await;

    // Tier transitions and frontier exhaustion are observed here, not
    // inside `RouterState::route` (spec §4.4): the router only knows the
    // new tier, the façade is what turns a transition into an event.
    let mut routing_events = Vec::new();
    if let Some(prior) = prior_tier {
        if routing.tier.cost_multiplier() > prior.cost_multiplier() {
            routing_events.push(Event::new(
                AggregateType::Routing,
                aggregate_id.clone(),
                event_types::TIER_ESCALATED,
                serde_json::json!({ "from": prior, "to": routing.tier, "fingerprint": fingerprint, "rationale": routing.rationale }),
                None,
            )?);
        } else if routing.tier.cost_multiplier() < prior.cost_multiplier() {
            routing_events.push(Event::new(
                AggregateType::Routing,
                aggregate_id.clone(),
                event_types::TIER_DOWNGRADED,
                serde_json::json!({ "from": prior, "to": routing.tier, "fingerprint": fingerprint, "rationale": routing.rationale }),
                None,
            )?);
        }
    }
    if routing.frontier_exhausted {
        routing_events.push(Event::new(
            AggregateType::Resilience,
            aggregate_id.clone(),
            event_types::STAGNATION_DETECTED,
            serde_json::json!({ "source": "routing", "fingerprint": fingerprint, "rationale": routing.rationale }),
            None,
        )?);
    }

    let mut tree = AcTree::new();
    let roots: Vec<_> = seed
        .acceptance_criteria
        .iter()
        .map(|ac| tree.insert_root(AcNode::root(ac.clone())))
        .collect();

    let runner = LlmPhaseRunner { llm, tier: routing.tier };
    let mut execution_failed = false;
    let mut decomposition_exhausted = false;
    let mut compressions: Vec<CompressionRecord> = Vec::new();
    for root in &roots {
        match execute_node(&runner, &mut tree, root.clone(), &seed.goal, &[], &config.atomicity, config.ac_tree.compression_depth).await {
            Ok(recs) => compressions.extend(recs),
            Err(ExecutionError::Decomposition(e)) => {
                warn!(error = %e, node = %root, "AC root hit the decomposition hard limit");
                decomposition_exhausted = true;
            }
            Err(e) => {
                warn!(error = %e, node = %root, "AC root execution did not complete");
                execution_failed = true;
            }
        }
    }

    let all_done = roots.iter().all(|r| matches!(tree.node(r), Some(n) if n.status == AcStatus::Done));
    router.record_outcome(&fingerprint, if all_done { Outcome::Success } else { Outcome::Failure }).await;

    let current_summary = roots
        .iter()
        .filter_map(|r| tree.node(r))
        .map(|n| format!("{} [{:?}]", n.text, n.status))
        .collect::<Vec<_>>()
        .join("; ");

    let satisfied_acs: Vec<String> = roots
        .iter()
        .filter_map(|r| tree.node(r))
        .filter(|n| n.status == AcStatus::Done)
        .map(|n| n.text.clone())
        .collect();

    let mechanical = run_mechanical_stage(tools, &[], None).await;

    let goal_drift = drift::goal_drift(&seed.goal, &current_summary);
    let constraint_drift = drift::constraint_drift(&seed.acceptance_criteria, &satisfied_acs);
    let ontology_drift = drift::ontology_drift(&effective_ontology, &seed.ontology_schema);
    let drift_score = drift::drift(goal_drift, constraint_drift, ontology_drift);
    let similarity_to_previous = 1.0 - drift::goal_drift(&previous_summary, &current_summary);

    let mut history = history_from_generations(&past_generations);
    history.output_hashes.push(ContentHash::of_bytes(current_summary.as_bytes()).as_str().to_string());
    history
        .drift_deltas
        .push(drift_score - past_generations.last().map(|g| g.drift_score).unwrap_or(drift_score));
    history.progress_rates.push(1.0 - drift_score);

    let stagnation_signal = stagnation::detect(&history);
    let stagnation_retries_exhausted =
        stagnation_signal.is_some() && stagnation_retry_count + 1 > config.stagnation.max_retries;
    let new_retry_count = if stagnation_signal.is_some() { stagnation_retry_count + 1 } else { 0 };

    // Lateral-thinking engine (spec §4.6): a fired stagnation signal rotates
    // in the next persona with affinity for that pattern, excluding
    // personas already tried this episode. The rotation itself is what
    // feeds trigger-matrix row 6 below.
    let failed_this_episode = personas_failed_this_episode(&past_generations, stagnation_retry_count);
    let rotated_persona = stagnation_signal
        .as_ref()
        .and_then(|signal| stagnation::select_persona(signal.pattern, &failed_this_episode));

    let scorer_prompt = format!(
        "Goal: {}\nAcceptance criteria: {:?}\nCurrent state: {current_summary}",
        seed.goal, seed.acceptance_criteria
    );
    let semantic = run_semantic_stage(llm, &scorer_prompt).await?;

    let trigger_inputs = TriggerInputs {
        drift_threshold: config.drift.threshold,
        lateral_suggestion_adopted: rotated_persona.is_some(),
        ..Default::default()
    };
    let trigger_conditions = evaluate_trigger_conditions(&semantic, &trigger_inputs);

    let mut consensus_aborted = false;
    if trigger_conditions.any_fired() {
        let prompt = format!("Does this generation's result satisfy the goal?\n{current_summary}");
        let voters = [
            LlmVoter { name: "frugal-voter".to_string(), model: "frugal-voter", llm, prompt: prompt.clone() },
            LlmVoter { name: "standard-voter".to_string(), model: "standard-voter", llm, prompt: prompt.clone() },
            LlmVoter { name: "frontier-voter".to_string(), model: "frontier-voter", llm, prompt },
        ];
        let voter_refs: Vec<&(dyn Voter + Sync)> = voters.iter().map(|v| v as &(dyn Voter + Sync)).collect();
        match simple_consensus(&voter_refs, VoterTimeouts::default()).await {
            Ok(outcome) if outcome.verdict == seedloop_domain::Verdict::Rejected => execution_failed = true,
            Ok(_) => {}
            Err(_) => consensus_aborted = true,
        }
    }

    let retrospective_fired = drift::is_retrospective_iteration(generation_number, config.drift.retrospective_every)
        && drift_score > config.drift.threshold;

    let exit_conditions_satisfied =
        !seed.exit_conditions.is_empty() && mechanical.passed && semantic.passed && !execution_failed;

    let signals = loop_driver::StepSignals {
        generation_number,
        max_generations: config.evolution.max_generations,
        similarity_to_previous,
        convergence_similarity: config.evolution.convergence_similarity,
        exit_conditions_satisfied,
        stagnation_pattern: stagnation_signal.as_ref().map(|s| s.pattern),
        stagnation_retries_exhausted,
        consensus_aborted,
        unrecoverable: false,
        decomposition_exhausted,
    };
    let action = loop_driver::decide(signals);

    let record = GenerationRecord {
        generation_number,
        seed_hash: seed_hash.as_str().to_string(),
        ontology_version: effective_ontology.version,
        similarity_to_previous,
        drift_score,
        action,
        summary: current_summary,
        stagnation_retry_count: new_retry_count,
        rotated_persona,
    };

    let mut events_to_append = vec![Event::new(
        AggregateType::Evolution,
        aggregate_id.clone(),
        event_types::GENERATION_COMPLETED,
        serde_json::to_value(&record).expect("GenerationRecord serializes"),
        None,
    )?];

    events_to_append.extend(recovery_events);
    events_to_append.extend(routing_events);

    if let Some(signal) = &stagnation_signal {
        events_to_append.push(Event::new(
            AggregateType::Resilience,
            aggregate_id.clone(),
            event_types::STAGNATION_DETECTED,
            serde_json::json!({ "pattern": format!("{:?}", signal.pattern), "evidence": signal.evidence }),
            None,
        )?);
    }

    if let Some(persona) = rotated_persona {
        events_to_append.push(Event::new(
            AggregateType::Resilience,
            aggregate_id.clone(),
            event_types::PERSONA_ROTATED,
            serde_json::json!({ "persona": persona, "pattern": stagnation_signal.as_ref().map(|s| s.pattern) }),
            None,
        )?);
    }

    for compression in &compressions {
        events_to_append.push(crate::compressor::compression_event(
            &aggregate_id,
            compression.tokens_before,
            compression.tokens_after,
        )?);
    }

    events_to_append.push(Event::new(
        AggregateType::Evolution,
        aggregate_id.clone(),
        event_types::DRIFT_MEASURED,
        serde_json::json!({
            "generation": generation_number,
            "goal_drift": goal_drift,
            "constraint_drift": constraint_drift,
            "ontology_drift": ontology_drift,
            "drift_score": drift_score,
        }),
        None,
    )?);

    if retrospective_fired {
        warn!(generation = generation_number, drift = drift_score, "retrospective: drift remains high against the frozen seed");
        events_to_append.push(Event::new(
            AggregateType::Evolution,
            aggregate_id.clone(),
            event_types::RETROSPECTIVE_RUN,
            serde_json::json!({ "generation": generation_number, "drift_score": drift_score, "seed_goal": seed.goal }),
            None,
        )?);
    }

    events_to_append.push(Event::new(
        AggregateType::Persistence,
        aggregate_id.clone(),
        event_types::CHECKPOINT_ROTATED,
        serde_json::json!({ "seed_id": seed.id.as_str(), "generation": generation_number }),
        None,
    )?);

    let state_blob = serde_json::to_vec(&record).expect("GenerationRecord serializes");
    let checkpoint = Checkpoint::new(seed.id.as_str().to_string(), "deliver".to_string(), generation_number, state_blob);

    let mut uow = event_store.transaction(&aggregate_id);
    uow.stage_all(events_to_append);
    uow.commit(checkpoints, checkpoint).await?;

    Ok(EvolveStepResponse {
        action,
        generation: generation_number,
        similarity: similarity_to_previous,
        drift: drift_score,
        error: None,
    })
}

async fn reconstruct_or_load_seed<ES: EventStore>(
    request: &EvolveStepRequest,
    past_events: &[Event],
    aggregate_id: &str,
    event_store: &ES,
) -> Result<Seed, EngineError> {
    if let Some(path) = &request.seed_path {
        let bytes = std::fs::read(path).map_err(|e| EngineError::Validation {
            reason: format!("cannot read seed file {}: {e}", path.display()),
        })?;
        if security::check_seed_file(&bytes) != SizeCheck::Ok {
            return Err(EngineError::Validation {
                reason: format!("seed file exceeds {} bytes", security::MAX_SEED_BYTES),
            });
        }
        let raw = String::from_utf8(bytes).map_err(|e| EngineError::Validation {
            reason: format!("seed file is not valid UTF-8: {e}"),
        })?;
        let draft = SeedDraft::from_yaml(&raw)?;
        let seed = Seed::from_interview(draft)?;
        let event = Event::new(
            AggregateType::Persistence,
            aggregate_id,
            event_types::SEED_FROZEN,
            serde_json::to_value(&seed).expect("Seed serializes"),
            None,
        )?;
        let mut uow = event_store.transaction(aggregate_id);
        uow.stage(event);
        uow.commit_without_checkpoint().await?;
        Ok(seed)
    } else {
        past_events
            .iter()
            .rev()
            .find(|e| e.event_type == event_types::SEED_FROZEN)
            .and_then(|e| serde_json::from_value::<Seed>(e.payload.clone()).ok())
            .ok_or_else(|| EngineError::Validation {
                reason: "no seed_path given and no frozen seed on record for this lineage".to_string(),
            })
    }
}

fn reconstruct_generations(events: &[Event]) -> Vec<GenerationRecord> {
    events
        .iter()
        .filter(|e| e.event_type == event_types::GENERATION_COMPLETED)
        .filter_map(|e| serde_json::from_value::<GenerationRecord>(e.payload.clone()).ok())
        .collect()
}

fn extract_ontology_events(events: &[Event]) -> Vec<OntologyEvent> {
    events
        .iter()
        .filter(|e| e.event_type == event_types::ONTOLOGY_EVOLVED)
        .filter_map(|e| serde_json::from_value(e.payload.clone()).ok())
        .collect()
}

fn history_from_generations(generations: &[GenerationRecord]) -> ExecutionHistory {
    ExecutionHistory {
        output_hashes: generations
            .iter()
            .map(|g| ContentHash::of_bytes(g.summary.as_bytes()).as_str().to_string())
            .collect(),
        drift_deltas: generations.windows(2).map(|w| w[1].drift_score - w[0].drift_score).collect(),
        progress_rates: generations.iter().map(|g| 1.0 - g.drift_score).collect(),
    }
}

/// Wraps an `LlmClient` as a `PhaseRunner`, at the tier the router decided
/// for this generation. Every phase is one completion call, asked to return
/// the same JSON shape `PhaseOutput` needs.
struct LlmPhaseRunner<'a, L> {
    llm: &'a L,
    tier: Tier,
}

impl<L: LlmClient> PhaseRunner for LlmPhaseRunner<'_, L> {
    async fn run_phase(
        &self,
        phase: seedloop_domain::DiamondPhase,
        context: &seedloop_domain::FilteredContext,
    ) -> Result<PhaseOutput, ExecutionError> {
        let model = match self.tier {
            Tier::Frugal => "frugal-executor",
            Tier::Standard => "standard-executor",
            Tier::Frontier => "frontier-executor",
        };
        let prompt = format!(
            "Phase: {phase:?}\nGoal: {}\nCurrent AC: {}\nFacts: {}",
            context.seed_summary,
            context.current_ac.text,
            context.relevant_facts.join("; ")
        );
        let completion = self
            .llm
            .complete(
                vec![LlmMessage { role: LlmRole::User, content: prompt }],
                model,
                LlmParams { temperature: 0.2, max_tokens: 1024, response_format: LlmResponseFormat::Json },
            )
            .await
            .map_err(|e| ExecutionError::ProviderFailure(e.to_string()))?;

        let parsed: serde_json::Value = serde_json::from_str(&completion.content)
            .map_err(|e| ExecutionError::ProviderFailure(format!("malformed phase output: {e}")))?;

        Ok(PhaseOutput {
            complexity: parsed["complexity"].as_f64().unwrap_or(0.0),
            tool_count: parsed["tool_count"].as_u64().unwrap_or(0) as u32,
            estimated_duration_secs: parsed["estimated_duration_secs"].as_u64().unwrap_or(0),
            summary: parsed["summary"].as_str().unwrap_or_default().to_string(),
            structurally_complete: parsed["structurally_complete"].as_bool().unwrap_or(false),
            principle_compliant: parsed["principle_compliant"].as_bool().unwrap_or(false),
        })
    }
}

impl<L: LlmClient> ContextCompressor for LlmPhaseRunner<'_, L> {
    async fn compress_context(&self, ctx: &FilteredContext, tokens_before: u64) -> CompressedContext {
        crate::compressor::compress(self.llm, ctx, tokens_before).await
    }
}

/// Wraps an `LlmClient` as a consensus `Voter`. Three of these at three
/// different tiers is the facade's Simple-consensus voter panel.
struct LlmVoter<'a, L> {
    name: String,
    model: &'static str,
    llm: &'a L,
    prompt: String,
}

impl<L: LlmClient> Voter for LlmVoter<'_, L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn vote(&self) -> Pin<Box<dyn Future<Output = VoterResult> + Send + '_>> {
        Box::pin(async move {
            let result = self
                .llm
                .complete(
                    vec![LlmMessage { role: LlmRole::User, content: self.prompt.clone() }],
                    self.model,
                    LlmParams { temperature: 0.0, max_tokens: 512, response_format: LlmResponseFormat::Json },
                )
                .await;

            match result {
                Ok(completion) => {
                    let parsed: serde_json::Value =
                        serde_json::from_str(&completion.content).unwrap_or(serde_json::Value::Null);
                    VoterResult {
                        voter: self.name.clone(),
                        approved: parsed["approved"].as_bool().unwrap_or(false),
                        confidence: parsed["confidence"].as_f64().unwrap_or(0.0),
                        reasoning: parsed["reasoning"].as_str().unwrap_or_default().to_string(),
                    }
                }
                Err(e) => VoterResult {
                    voter: self.name.clone(),
                    approved: false,
                    confidence: 0.0,
                    reasoning: format!("provider error: {e}"),
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedloop_ports::{LlmCompletion, ProviderError, ToolError, ToolOutput};
    use seedloop_store::memory::InMemoryEventStore;
    use tempfile::NamedTempFile;

    struct ScriptedLlm;

    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            model: &str,
            _params: LlmParams,
        ) -> Result<LlmCompletion, ProviderError> {
            let content = if model.ends_with("-executor") {
                serde_json::json!({
                    "complexity": 0.1,
                    "tool_count": 1,
                    "estimated_duration_secs": 5,
                    "summary": "done",
                    "structurally_complete": true,
                    "principle_compliant": true,
                })
                .to_string()
            } else if model.ends_with("-voter") || model.contains("scorer") && model != "standard-scorer" && model != "frugal-scorer" {
                serde_json::json!({ "approved": true, "confidence": 0.9, "reasoning": "looks right" }).to_string()
            } else {
                serde_json::json!({
                    "ac_compliance": true,
                    "score": 0.95,
                    "goal_alignment": 0.9,
                    "drift": 0.05,
                    "uncertainty": 0.05,
                })
                .to_string()
            };
            Ok(LlmCompletion { content, model: model.to_string(), prompt_tokens: 10, completion_tokens: 10 })
        }
    }

    struct NoopTools;

    impl ToolRunner for NoopTools {
        async fn run(&self, _command: &str) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
        }
    }

    fn seed_file(goal: &str) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let yaml = format!(
            "goal: \"{goal}\"\nconstraints: []\nacceptance_criteria:\n  - \"prints hello to stdout\"\nontology_schema:\n  fields: []\nevaluation_principles: []\nexit_conditions:\n  - \"output matches expected\"\nmetadata:\n  ambiguity_score: 0.1\n  created_at: \"2024-01-01T00:00:00Z\"\n  version: 1\n  context_references: []\n"
        );
        std::fs::write(file.path(), yaml).unwrap();
        file
    }

    #[tokio::test]
    async fn first_call_freezes_the_seed_and_continues() {
        let store = InMemoryEventStore::new();
        let checkpoints = CheckpointStore::new();
        let router = RouterState::new();
        let config = SeedLoopConfig::default();
        let file = seed_file("print hello to stdout");

        let request = EvolveStepRequest {
            lineage_id: LineageId::new(),
            seed_path: Some(file.path().to_path_buf()),
            server_command_override: None,
        };

        let response = evolve_step(request, &store, &checkpoints, &router, &ScriptedLlm, &NoopTools, &config).await;
        assert!(response.error.is_none());
        assert_eq!(response.generation, 1);
        assert!(matches!(response.action, EvolutionAction::Continue | EvolutionAction::Converged));
    }

    #[tokio::test]
    async fn second_call_reconstructs_seed_without_a_path() {
        let store = InMemoryEventStore::new();
        let checkpoints = CheckpointStore::new();
        let router = RouterState::new();
        let config = SeedLoopConfig::default();
        let file = seed_file("ship the feature");
        let lineage_id = LineageId::new();

        let first = EvolveStepRequest {
            lineage_id: lineage_id.clone(),
            seed_path: Some(file.path().to_path_buf()),
            server_command_override: None,
        };
        evolve_step(first, &store, &checkpoints, &router, &ScriptedLlm, &NoopTools, &config).await;

        let second = EvolveStepRequest { lineage_id, seed_path: None, server_command_override: None };
        let response = evolve_step(second, &store, &checkpoints, &router, &ScriptedLlm, &NoopTools, &config).await;
        assert!(response.error.is_none());
        assert_eq!(response.generation, 2);
    }

    #[tokio::test]
    async fn missing_seed_and_no_history_fails_cleanly() {
        let store = InMemoryEventStore::new();
        let checkpoints = CheckpointStore::new();
        let router = RouterState::new();
        let config = SeedLoopConfig::default();

        let request = EvolveStepRequest { lineage_id: LineageId::new(), seed_path: None, server_command_override: None };
        let response = evolve_step(request, &store, &checkpoints, &router, &ScriptedLlm, &NoopTools, &config).await;
        assert_eq!(response.action, EvolutionAction::Failed);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn drift_measured_event_is_appended_every_generation() {
        let store = InMemoryEventStore::new();
        let checkpoints = CheckpointStore::new();
        let router = RouterState::new();
        let config = SeedLoopConfig::default();
        let file = seed_file("print hello to stdout");
        let lineage_id = LineageId::new();

        let request = EvolveStepRequest {
            lineage_id: lineage_id.clone(),
            seed_path: Some(file.path().to_path_buf()),
            server_command_override: None,
        };
        evolve_step(request, &store, &checkpoints, &router, &ScriptedLlm, &NoopTools, &config).await;

        let events = store.replay(lineage_id.as_str()).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == event_types::DRIFT_MEASURED));
        assert!(events.iter().any(|e| e.event_type == event_types::CHECKPOINT_ROTATED));
    }

    /// An `LlmClient` whose `-executor` responses always report an
    /// unfinished AC, so every generation for a fingerprint counts as a
    /// router failure without ever producing a hard `ExecutionError`.
    struct FailingValidationLlm;

    impl LlmClient for FailingValidationLlm {
        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            model: &str,
            _params: LlmParams,
        ) -> Result<LlmCompletion, ProviderError> {
            let content = if model.ends_with("-executor") {
                serde_json::json!({
                    "complexity": 0.1,
                    "tool_count": 1,
                    "estimated_duration_secs": 5,
                    "summary": "not yet done",
                    "structurally_complete": false,
                    "principle_compliant": true,
                })
                .to_string()
            } else if model.ends_with("-voter") {
                serde_json::json!({ "approved": false, "confidence": 0.9, "reasoning": "not satisfied" }).to_string()
            } else {
                serde_json::json!({
                    "ac_compliance": false,
                    "score": 0.2,
                    "goal_alignment": 0.2,
                    "drift": 0.5,
                    "uncertainty": 0.1,
                })
                .to_string()
            };
            Ok(LlmCompletion { content, model: model.to_string(), prompt_tokens: 10, completion_tokens: 10 })
        }
    }

    #[tokio::test]
    async fn tier_escalates_after_two_consecutive_failures_and_emits_an_event() {
        let store = InMemoryEventStore::new();
        let checkpoints = CheckpointStore::new();
        let router = RouterState::new();
        let config = SeedLoopConfig::default();
        let file = seed_file("escalate me");
        let lineage_id = LineageId::new();

        let first = EvolveStepRequest {
            lineage_id: lineage_id.clone(),
            seed_path: Some(file.path().to_path_buf()),
            server_command_override: None,
        };
        evolve_step(first, &store, &checkpoints, &router, &FailingValidationLlm, &NoopTools, &config).await;

        for _ in 0..2 {
            let request = EvolveStepRequest { lineage_id: lineage_id.clone(), seed_path: None, server_command_override: None };
            evolve_step(request, &store, &checkpoints, &router, &FailingValidationLlm, &NoopTools, &config).await;
        }

        let events = store.replay(lineage_id.as_str()).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == event_types::TIER_ESCALATED));
    }

    /// An `LlmClient` whose `-executor` responses always decompose (never
    /// atomic), so the AC tree grows without bound until the hard
    /// decomposition-depth limit trips.
    struct AlwaysDecomposeLlm;

    impl LlmClient for AlwaysDecomposeLlm {
        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            model: &str,
            _params: LlmParams,
        ) -> Result<LlmCompletion, ProviderError> {
            let content = if model.ends_with("-executor") {
                serde_json::json!({
                    "complexity": 0.9,
                    "tool_count": 5,
                    "estimated_duration_secs": 500,
                    "summary": "child one; child two",
                    "structurally_complete": true,
                    "principle_compliant": true,
                })
                .to_string()
            } else if model.ends_with("-voter") {
                serde_json::json!({ "approved": true, "confidence": 0.9, "reasoning": "ok" }).to_string()
            } else {
                serde_json::json!({
                    "ac_compliance": true,
                    "score": 0.95,
                    "goal_alignment": 0.9,
                    "drift": 0.05,
                    "uncertainty": 0.05,
                })
                .to_string()
            };
            Ok(LlmCompletion { content, model: model.to_string(), prompt_tokens: 10, completion_tokens: 10 })
        }
    }

    #[tokio::test]
    async fn decomposition_hard_limit_maps_to_exit_code_fourteen() {
        let store = InMemoryEventStore::new();
        let checkpoints = CheckpointStore::new();
        let router = RouterState::new();
        let config = SeedLoopConfig::default();
        let file = seed_file("decompose forever");

        let request = EvolveStepRequest {
            lineage_id: LineageId::new(),
            seed_path: Some(file.path().to_path_buf()),
            server_command_override: None,
        };
        let response = evolve_step(request, &store, &checkpoints, &router, &AlwaysDecomposeLlm, &NoopTools, &config).await;

        assert_eq!(response.action, EvolutionAction::DecompositionFailed);
        assert_eq!(response.action.exit_code(), Some(14));
    }

    #[tokio::test]
    async fn corrupted_checkpoint_rolls_back_and_emits_an_event_with_depth_one() {
        let store = InMemoryEventStore::new();
        let checkpoints = CheckpointStore::new();
        let router = RouterState::new();
        let config = SeedLoopConfig::default();
        let file = seed_file("recover me");
        let lineage_id = LineageId::new();

        let first = EvolveStepRequest {
            lineage_id: lineage_id.clone(),
            seed_path: Some(file.path().to_path_buf()),
            server_command_override: None,
        };
        evolve_step(first, &store, &checkpoints, &router, &ScriptedLlm, &NoopTools, &config).await;

        let events = store.replay(lineage_id.as_str()).await.unwrap();
        let seed_id = events
            .iter()
            .find(|e| e.event_type == event_types::SEED_FROZEN)
            .map(|e| e.payload["id"].as_str().unwrap().to_string())
            .unwrap();

        let mut corrupted = Checkpoint::new(seed_id, "deliver".to_string(), 99, b"original".to_vec());
        corrupted.state_blob = b"tampered".to_vec();
        checkpoints.write(corrupted).await;

        let second = EvolveStepRequest { lineage_id: lineage_id.clone(), seed_path: None, server_command_override: None };
        let response = evolve_step(second, &store, &checkpoints, &router, &ScriptedLlm, &NoopTools, &config).await;
        assert!(response.error.is_none());

        let events = store.replay(lineage_id.as_str()).await.unwrap();
        let rollback = events
            .iter()
            .find(|e| e.event_type == event_types::CHECKPOINT_ROLLED_BACK)
            .expect("rollback event recorded");
        assert_eq!(rollback.payload["rollback_depth"], 1);
    }
}
