//! Round protocol engine
//!
//! A [`Channel`] is a group chat between multiple LLM agents working
//! collaboratively on the same task. One special *moderator* agent drives
//! the conversation and decides when the group has reached consensus.
//!
//! The discussion runs for at most `max_rounds` exchanges. Every round,
//! each participant contributes a reply, the moderator sees the combined
//! contributions, and its parsed [`Verdict`] decides whether to stop or
//! continue. If the budget is exhausted without consensus, the moderator is
//! asked once for an explicit `CONSENSUS_FAILED:` summary.
//!
//! The engine instance, its transcript, and its round counter are
//! exclusively owned by one worker for the run's lifetime; nothing here is
//! shared between runs.

use crate::ports::agent_gateway::{AgentGateway, GatewayError};
use conclave_domain::channel::verdict::CONSENSUS_FAILED;
use conclave_domain::{
    AgentSlot, ChannelConfig, DomainError, Message, Model, PromptTemplate, Task, Transcript,
    Verdict,
};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Returned when the loop exits without any parsed payload to fall back on
const NO_CONSENSUS_FALLBACK: &str =
    "No consensus reached within the configured discussion limit.";

/// Errors that terminate a channel run
///
/// A participant failure is absorbed as an empty contribution and never
/// surfaces here; without a moderator verdict, though, the run cannot
/// continue.
#[derive(Error, Debug)]
pub enum ChannelRunError {
    #[error("Moderator call failed: {0}")]
    ModeratorFailed(#[from] GatewayError),
}

/// Orchestrates collaborative reasoning among multiple agents for one task
pub struct Channel<G: AgentGateway + 'static> {
    gateway: Arc<G>,
    task: Task,
    config: ChannelConfig,
    transcript: Transcript,
    rounds_executed: u32,
    stopped: bool,
}

impl<G: AgentGateway + 'static> Channel<G> {
    /// Create a new channel
    ///
    /// The moderator must not appear among the participants, participants
    /// must be non-empty and distinct.
    pub fn new(
        gateway: Arc<G>,
        task: Task,
        moderator: Model,
        participants: Vec<Model>,
        config: ChannelConfig,
    ) -> Result<Self, DomainError> {
        if participants.is_empty() {
            return Err(DomainError::NoParticipants);
        }
        if participants.contains(&moderator) {
            return Err(DomainError::ModeratorIsParticipant);
        }
        let distinct: HashSet<&Model> = participants.iter().collect();
        if distinct.len() != participants.len() {
            return Err(DomainError::DuplicateParticipants);
        }

        Ok(Self {
            gateway,
            task,
            transcript: Transcript::new(moderator, &participants),
            config,
            rounds_executed: 0,
            stopped: false,
        })
    }

    /// Execute the multi-agent conversation and return the final answer.
    ///
    /// Returns either the final agreed-upon answer, or a best-effort
    /// `CONSENSUS_FAILED:` summary if the round budget is exceeded.
    pub async fn run(&mut self) -> Result<String, ChannelRunError> {
        let mut last_payload: Option<String> = None;

        for round in 1..=self.config.max_rounds {
            self.rounds_executed = round;
            debug!("Starting round {}", round);

            // 1. Ask every participant for their latest contribution.
            let replies = self.collect_participant_replies(round).await;

            // 2. Ask the moderator to decide what happens next.
            let raw = self.request_verdict(&replies, round).await?;

            match Verdict::parse(&raw) {
                Verdict::Reached(answer) => {
                    info!("Consensus reached in round {}", round);
                    self.stopped = true;
                    return Ok(answer);
                }
                verdict => {
                    if let Some(payload) = verdict.payload()
                        && !payload.is_empty()
                    {
                        last_payload = Some(payload.to_string());
                    }

                    // If this was the last allowed round, we cannot iterate
                    // again.
                    if round == self.config.max_rounds {
                        warn!("Reached round limit without consensus, requesting failure summary");
                        self.stopped = true;
                        let summary = self.request_failure_summary(&replies).await?;
                        return Ok(ensure_failed_prefix(summary));
                    }

                    // Otherwise keep going: every participant sees the
                    // moderator's guidance verbatim next round.
                    let guidance = Message::assistant(raw);
                    for slot in self.transcript.participant_slots() {
                        self.transcript.append(slot, guidance.clone());
                    }
                }
            }
        }

        // Every terminal branch above returns, so this is only reachable
        // with a zero-round budget.
        warn!("Max rounds reached without consensus");
        self.stopped = true;
        Ok(last_payload.unwrap_or_else(|| NO_CONSENSUS_FALLBACK.to_string()))
    }

    /// Collect one contribution per participant for this round.
    ///
    /// Prompts are composed first from the previous round's state, then the
    /// gateway calls fan out concurrently - contributions are independent
    /// within a round. The moderator is not consulted until every
    /// participant future has resolved. Replies are appended in the fixed
    /// slot order so `Agent{k}` labeling stays reproducible.
    async fn collect_participant_replies(&mut self, round: u32) -> Vec<String> {
        let count = self.transcript.participant_count();
        if self.stopped {
            warn!("Channel stopped, no further participant responses will be collected");
            return Vec::new();
        }

        let mut jobs = Vec::with_capacity(count);
        for k in 0..count {
            let slot = AgentSlot::participant(k);
            let messages = self.build_participant_prompt(slot, round);
            jobs.push((k, self.transcript.model(slot).clone(), messages));
        }

        let mut join_set = JoinSet::new();
        for (k, model, messages) in jobs {
            let gateway = Arc::clone(&self.gateway);
            join_set.spawn(async move {
                let result = gateway.send(&model, &messages).await;
                (k, model, result)
            });
        }

        let mut replies = vec![String::new(); count];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((k, model, Ok(text))) => {
                    debug!("Response from {} in round {}", model, round);
                    replies[k] = text;
                }
                Ok((_, model, Err(e))) => {
                    // Fail-soft: an empty contribution, not a run failure
                    warn!("Participant {} failed in round {}: {}", model, round, e);
                }
                Err(e) => {
                    warn!("Participant task join error: {}", e);
                }
            }
        }

        for (k, reply) in replies.iter().enumerate() {
            self.transcript
                .append(AgentSlot::participant(k), Message::assistant(reply.clone()));
        }

        replies
    }

    /// Compose the message list for a participant for this round
    fn build_participant_prompt(&mut self, slot: AgentSlot, round: u32) -> Vec<Message> {
        let mut messages = Vec::new();

        // 1) System-level instructions, only once at the beginning
        if round == 1 {
            let system = self
                .config
                .participant_system_prompt
                .as_deref()
                .unwrap_or_else(|| PromptTemplate::participant_system());
            messages.push(Message::system(system));
            messages.push(Message::system(PromptTemplate::task_statement(
                self.task.content(),
            )));
        }

        // 2) This agent's own conversation history so far
        messages.extend_from_slice(self.transcript.messages(slot));

        // 3) Peripheral visibility: the most recent content from every
        //    other tracked agent (moderator included)
        if round > 1 {
            let latest: Vec<&str> = self
                .transcript
                .slots()
                .filter(|s| *s != slot)
                .filter_map(|s| self.transcript.latest(s))
                .map(|m| m.content.as_str())
                .collect();
            if !latest.is_empty() {
                messages.push(Message::system(PromptTemplate::peer_update(&latest)));
            }
        }

        // 4) End with a direct instruction, recorded in the agent's own
        //    history so repeated requests stay visible later
        let instruction = Message::user(PromptTemplate::round_instruction(round));
        messages.push(instruction.clone());
        self.transcript.append(slot, instruction);

        messages
    }

    /// Ask the moderator to judge this round's contributions
    async fn request_verdict(
        &mut self,
        replies: &[String],
        round: u32,
    ) -> Result<String, GatewayError> {
        let mut messages = Vec::new();

        if round == 1 {
            let system = self
                .config
                .moderator_system_prompt
                .as_deref()
                .unwrap_or_else(|| PromptTemplate::moderator_system());
            messages.push(Message::system(system));
            messages.push(Message::system(PromptTemplate::task_statement(
                self.task.content(),
            )));
        }

        messages.extend_from_slice(self.transcript.messages(AgentSlot::MODERATOR));
        messages.push(Message::user(PromptTemplate::agent_report(replies)));

        let moderator = self.transcript.model(AgentSlot::MODERATOR).clone();
        let raw = self.gateway.send(&moderator, &messages).await?;
        info!("Response from moderator {}: {}", moderator, raw);

        self.transcript
            .append(AgentSlot::MODERATOR, Message::assistant(raw.clone()));
        Ok(raw)
    }

    /// Ask the moderator for a final `CONSENSUS_FAILED:` summary after the
    /// round budget is exhausted
    async fn request_failure_summary(
        &mut self,
        replies: &[String],
    ) -> Result<String, GatewayError> {
        let messages = vec![
            Message::system(PromptTemplate::failure_summary_system()),
            Message::user(PromptTemplate::agent_report(replies)),
        ];

        let moderator = self.transcript.model(AgentSlot::MODERATOR).clone();
        let raw = self.gateway.send(&moderator, &messages).await?;
        info!("Failure summary from moderator {}: {}", moderator, raw);

        self.transcript
            .append(AgentSlot::MODERATOR, Message::assistant(raw.clone()));
        Ok(raw)
    }

    /// Rounds executed so far; never exceeds `max_rounds`
    pub fn rounds_executed(&self) -> u32 {
        self.rounds_executed
    }

    /// True once the run has reached a terminal state
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Per-agent message history keyed by model id, for persistence
    pub fn transcript_log(&self) -> BTreeMap<String, Vec<Message>> {
        self.transcript.to_log()
    }
}

/// Guarantee the failure-summary sentinel, prepending it if the moderator's
/// reply omitted it
fn ensure_failed_prefix(summary: String) -> String {
    let tagged = summary
        .get(..CONSENSUS_FAILED.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(CONSENSUS_FAILED));
    if tagged {
        summary
    } else {
        format!("{CONSENSUS_FAILED}: {summary}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conclave_domain::Role;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    // === Mock implementations ===

    enum ScriptedReply {
        Text(&'static str),
        Failure,
    }

    /// Gateway returning scripted replies per model, recording every call
    struct ScriptedGateway {
        scripts: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
        calls: Mutex<Vec<(String, Vec<Message>)>>,
    }

    impl ScriptedGateway {
        fn new(scripts: Vec<(&Model, Vec<ScriptedReply>)>) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(model, replies)| (model.to_string(), VecDeque::from(replies)))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, model: &Model) -> Vec<Vec<Message>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m == model.as_str())
                .map(|(_, messages)| messages.clone())
                .collect()
        }
    }

    #[async_trait]
    impl AgentGateway for ScriptedGateway {
        async fn send(&self, model: &Model, messages: &[Message]) -> Result<String, GatewayError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            match self
                .scripts
                .lock()
                .unwrap()
                .get_mut(model.as_str())
                .and_then(|queue| queue.pop_front())
            {
                Some(ScriptedReply::Text(text)) => Ok(text.to_string()),
                Some(ScriptedReply::Failure) => {
                    Err(GatewayError::RequestFailed("scripted failure".to_string()))
                }
                None => Err(GatewayError::Other("script exhausted".to_string())),
            }
        }
    }

    fn moderator() -> Model {
        Model::ClaudeSonnet4
    }

    fn participants() -> Vec<Model> {
        vec![Model::Gpt4o, Model::Gemini25Pro]
    }

    fn channel(
        gateway: Arc<ScriptedGateway>,
        max_rounds: u32,
    ) -> Channel<ScriptedGateway> {
        Channel::new(
            gateway,
            Task::new("pick a database"),
            moderator(),
            participants(),
            ChannelConfig::new(max_rounds),
        )
        .unwrap()
    }

    #[test]
    fn test_moderator_must_not_participate() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let result = Channel::new(
            gateway,
            Task::new("task"),
            Model::Gpt4o,
            vec![Model::Gpt4o],
            ChannelConfig::default(),
        );
        assert!(matches!(result, Err(DomainError::ModeratorIsParticipant)));
    }

    #[test]
    fn test_participants_required() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let result = Channel::new(
            gateway,
            Task::new("task"),
            moderator(),
            vec![],
            ChannelConfig::default(),
        );
        assert!(matches!(result, Err(DomainError::NoParticipants)));
    }

    #[test]
    fn test_participants_must_be_distinct() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let result = Channel::new(
            gateway,
            Task::new("task"),
            moderator(),
            vec![Model::Gpt4o, Model::Gpt4o],
            ChannelConfig::default(),
        );
        assert!(matches!(result, Err(DomainError::DuplicateParticipants)));
    }

    #[tokio::test]
    async fn test_consensus_in_first_round() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (&Model::Gpt4o, vec![ScriptedReply::Text("postgres")]),
            (&Model::Gemini25Pro, vec![ScriptedReply::Text("postgres")]),
            (&moderator(), vec![ScriptedReply::Text("CONSENSUS_REACHED: 42")]),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 8);

        let answer = channel.run().await.unwrap();
        assert_eq!(answer, "42");
        assert_eq!(channel.rounds_executed(), 1);
        assert!(channel.is_stopped());
    }

    #[tokio::test]
    async fn test_round_budget_exhaustion_requests_failure_summary() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (
                &Model::Gpt4o,
                vec![ScriptedReply::Text("a"), ScriptedReply::Text("a2")],
            ),
            (
                &Model::Gemini25Pro,
                vec![ScriptedReply::Text("b"), ScriptedReply::Text("b2")],
            ),
            (
                &moderator(),
                vec![
                    ScriptedReply::Text("CONTINUE_DISCUSSION: split on a vs b"),
                    ScriptedReply::Text("CONTINUE_DISCUSSION: still split"),
                    // Failure summary without the sentinel - it must be prepended
                    ScriptedReply::Text("they never agreed"),
                ],
            ),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 2);

        let answer = channel.run().await.unwrap();
        assert_eq!(answer, "CONSENSUS_FAILED: they never agreed");
        assert_eq!(channel.rounds_executed(), 2);
        assert!(channel.is_stopped());
    }

    #[tokio::test]
    async fn test_failure_summary_prefix_not_duplicated() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (&Model::Gpt4o, vec![ScriptedReply::Text("a")]),
            (&Model::Gemini25Pro, vec![ScriptedReply::Text("b")]),
            (
                &moderator(),
                vec![
                    ScriptedReply::Text("CONTINUE_DISCUSSION: split"),
                    ScriptedReply::Text("consensus_failed: deadlock on priorities"),
                ],
            ),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 1);

        let answer = channel.run().await.unwrap();
        // Already tagged (case-insensitively) - returned verbatim
        assert_eq!(answer, "consensus_failed: deadlock on priorities");
    }

    #[tokio::test]
    async fn test_unrecognized_verdict_continues_and_is_recorded() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (
                &Model::Gpt4o,
                vec![ScriptedReply::Text("a"), ScriptedReply::Text("a2")],
            ),
            (
                &Model::Gemini25Pro,
                vec![ScriptedReply::Text("b"), ScriptedReply::Text("b2")],
            ),
            (
                &moderator(),
                vec![
                    ScriptedReply::Text("I think we're close"),
                    ScriptedReply::Text("CONSENSUS_REACHED: done"),
                ],
            ),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 8);

        let answer = channel.run().await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(channel.rounds_executed(), 2);

        // The non-conformant reply still landed in the moderator's history
        let history = channel.transcript().messages(AgentSlot::MODERATOR);
        assert_eq!(history[0].content, "I think we're close");
    }

    #[tokio::test]
    async fn test_participant_failure_becomes_empty_contribution() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (&Model::Gpt4o, vec![ScriptedReply::Failure]),
            (&Model::Gemini25Pro, vec![ScriptedReply::Text("beta")]),
            (&moderator(), vec![ScriptedReply::Text("CONSENSUS_REACHED: ok")]),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 8);

        let answer = channel.run().await.unwrap();
        assert_eq!(answer, "ok");

        // The moderator saw an empty Agent1 line, in stable order
        let moderator_calls = gateway.calls_for(&moderator());
        let report = &moderator_calls[0].last().unwrap().content;
        assert_eq!(report, "Agent1: \nAgent2: beta");

        // And the empty contribution is recorded in the participant history
        let history = channel.transcript().messages(AgentSlot::participant(0));
        let assistant_turns: Vec<_> =
            history.iter().filter(|m| m.role == Role::Assistant).collect();
        assert_eq!(assistant_turns.len(), 1);
        assert_eq!(assistant_turns[0].content, "");
    }

    #[tokio::test]
    async fn test_moderator_failure_is_terminal() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (&Model::Gpt4o, vec![ScriptedReply::Text("a")]),
            (&Model::Gemini25Pro, vec![ScriptedReply::Text("b")]),
            (&moderator(), vec![ScriptedReply::Failure]),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 8);

        let result = channel.run().await;
        assert!(matches!(result, Err(ChannelRunError::ModeratorFailed(_))));
    }

    #[tokio::test]
    async fn test_round_one_participant_prompt_shape() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (&Model::Gpt4o, vec![ScriptedReply::Text("a")]),
            (&Model::Gemini25Pro, vec![ScriptedReply::Text("b")]),
            (&moderator(), vec![ScriptedReply::Text("CONSENSUS_REACHED: ok")]),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 8);
        channel.run().await.unwrap();

        let calls = gateway.calls_for(&Model::Gpt4o);
        let prompt = &calls[0];
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains("collaborating with other AI agents"));
        assert_eq!(prompt[1].content, "TASK: pick a database");
        assert_eq!(prompt[2].role, Role::User);
        assert!(prompt[2].content.starts_with("Round 1:"));
    }

    #[tokio::test]
    async fn test_later_round_prompt_includes_peer_update_and_history() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (
                &Model::Gpt4o,
                vec![ScriptedReply::Text("alpha"), ScriptedReply::Text("alpha2")],
            ),
            (
                &Model::Gemini25Pro,
                vec![ScriptedReply::Text("beta"), ScriptedReply::Text("beta2")],
            ),
            (
                &moderator(),
                vec![
                    ScriptedReply::Text("CONTINUE_DISCUSSION: converge"),
                    ScriptedReply::Text("CONSENSUS_REACHED: ok"),
                ],
            ),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 8);
        channel.run().await.unwrap();

        let calls = gateway.calls_for(&Model::Gpt4o);
        let round_two = &calls[1];

        // No system instructions again after round 1; own history instead:
        // round-1 instruction, own reply, moderator guidance
        assert_eq!(round_two[0].role, Role::User);
        assert!(round_two[0].content.starts_with("Round 1:"));
        assert_eq!(round_two[1].content, "alpha");
        assert_eq!(round_two[2].content, "CONTINUE_DISCUSSION: converge");

        // Peer update lists the other agents' latest turns. Prompts are
        // snapshotted before the fan-out, so after a continue round every
        // other agent's latest turn is the broadcast guidance.
        let peer = &round_two[3];
        assert_eq!(peer.role, Role::System);
        assert!(peer.content.contains("fellow agents"));
        assert_eq!(
            peer.content,
            "Here are the most recent replies from your fellow agents:\n\
             CONTINUE_DISCUSSION: converge\n---\nCONTINUE_DISCUSSION: converge"
        );

        assert!(round_two[4].content.starts_with("Round 2:"));
    }

    #[tokio::test]
    async fn test_moderator_sees_accumulated_history() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (
                &Model::Gpt4o,
                vec![ScriptedReply::Text("a"), ScriptedReply::Text("a2")],
            ),
            (
                &Model::Gemini25Pro,
                vec![ScriptedReply::Text("b"), ScriptedReply::Text("b2")],
            ),
            (
                &moderator(),
                vec![
                    ScriptedReply::Text("CONTINUE_DISCUSSION: converge"),
                    ScriptedReply::Text("CONSENSUS_REACHED: ok"),
                ],
            ),
        ]));
        let mut channel = channel(Arc::clone(&gateway), 8);
        channel.run().await.unwrap();

        let calls = gateway.calls_for(&moderator());

        // Round 1: instructions, task, combined report
        assert_eq!(calls[0].len(), 3);
        assert!(calls[0][0].content.contains("moderator for a panel"));
        assert_eq!(calls[0][2].content, "Agent1: a\nAgent2: b");

        // Round 2: prior verdict as history, then the new report
        assert_eq!(calls[1].len(), 2);
        assert_eq!(calls[1][0].role, Role::Assistant);
        assert_eq!(calls[1][0].content, "CONTINUE_DISCUSSION: converge");
        assert_eq!(calls[1][1].content, "Agent1: a2\nAgent2: b2");
    }

    #[tokio::test]
    async fn test_zero_round_budget_falls_back() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let mut channel = channel(Arc::clone(&gateway), 0);

        let answer = channel.run().await.unwrap();
        assert_eq!(answer, NO_CONSENSUS_FALLBACK);
        assert_eq!(channel.rounds_executed(), 0);
    }

    #[test]
    fn test_ensure_failed_prefix() {
        assert_eq!(
            ensure_failed_prefix("no deal".to_string()),
            "CONSENSUS_FAILED: no deal"
        );
        assert_eq!(
            ensure_failed_prefix("CONSENSUS_FAILED: no deal".to_string()),
            "CONSENSUS_FAILED: no deal"
        );
    }
}
