//! Per-agent conversation transcript for one channel run
//!
//! Each tracked agent role (the moderator and every participant) gets a
//! private, append-only message log owned by the channel instance. Logs are
//! addressed by [`AgentSlot`], a stable small integer assigned at
//! construction time: slot 0 is the moderator, slots `1..=N` are the
//! participants in their fixed submission order. Addressing by slot keeps
//! the `Agent{k}` labeling reproducible across rounds and avoids aliasing
//! hazards — the models themselves are stateless.

use crate::core::model::Model;
use crate::session::entities::Message;
use std::collections::BTreeMap;

/// Stable address of one tracked agent within a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentSlot(usize);

impl AgentSlot {
    /// Slot of the moderator
    pub const MODERATOR: AgentSlot = AgentSlot(0);

    /// Slot of the k-th participant (0-based)
    pub fn participant(k: usize) -> AgentSlot {
        AgentSlot(k + 1)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Append-only per-agent message logs for one channel run (Entity)
///
/// Owned exclusively by the channel instance that created it; never shared
/// between runs.
#[derive(Debug, Clone)]
pub struct Transcript {
    agents: Vec<(Model, Vec<Message>)>,
}

impl Transcript {
    /// Create a transcript tracking the moderator and the given participants
    pub fn new(moderator: Model, participants: &[Model]) -> Self {
        let mut agents = Vec::with_capacity(participants.len() + 1);
        agents.push((moderator, Vec::new()));
        for model in participants {
            agents.push((model.clone(), Vec::new()));
        }
        Self { agents }
    }

    /// Number of tracked agents (moderator + participants)
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Number of participants
    pub fn participant_count(&self) -> usize {
        self.agents.len() - 1
    }

    /// Model occupying the given slot
    pub fn model(&self, slot: AgentSlot) -> &Model {
        &self.agents[slot.0].0
    }

    /// All slots in fixed order, moderator first
    pub fn slots(&self) -> impl Iterator<Item = AgentSlot> + use<> {
        (0..self.agents.len()).map(AgentSlot)
    }

    /// Participant slots in fixed submission order
    pub fn participant_slots(&self) -> impl Iterator<Item = AgentSlot> + use<> {
        (1..self.agents.len()).map(AgentSlot)
    }

    /// Append a message to one agent's log
    pub fn append(&mut self, slot: AgentSlot, message: Message) {
        self.agents[slot.0].1.push(message);
    }

    /// One agent's full ordered history
    pub fn messages(&self, slot: AgentSlot) -> &[Message] {
        &self.agents[slot.0].1
    }

    /// The most recent message in one agent's log, if any
    pub fn latest(&self, slot: AgentSlot) -> Option<&Message> {
        self.agents[slot.0].1.last()
    }

    /// Snapshot of every agent's history keyed by model identifier
    ///
    /// This is the audit form persisted at terminal state; it is not needed
    /// for protocol correctness.
    pub fn to_log(&self) -> BTreeMap<String, Vec<Message>> {
        self.agents
            .iter()
            .map(|(model, messages)| (model.to_string(), messages.clone()))
            .collect()
    }
}
