//! Prompt templates used when composing per-round messages

/// Templates for each message the channel sends to its agents
pub struct PromptTemplate;

impl PromptTemplate {
    /// Default system prompt for every participant, sent once in round 1
    pub fn participant_system() -> &'static str {
        r#"You are an expert AI assistant collaborating with other AI agents to solve the following task.
Provide clear, concise, and well-reasoned answers.
Do *not* attempt to mediate - focus on presenting your own reasoning."#
    }

    /// Default system prompt for the moderator, sent once in round 1
    ///
    /// Spells out the sentinel protocol the moderator must follow; the
    /// verdict parser only recognizes these prefixes.
    pub fn moderator_system() -> &'static str {
        r#"You are the moderator for a panel of AI agents working together to complete a task.
After each round, you must evaluate their responses and decide whether they have reached consensus.
Use the protocol below strictly:
- Start your reply with "CONSENSUS_REACHED:" if they agree. Immediately after the colon, state the final agreed-upon answer in 1-3 sentences.
- Otherwise, start with "CONTINUE_DISCUSSION:" followed by short guidance on what disagreements remain and how they might converge next round."#
    }

    /// System prompt for the one extra moderator call after the round budget
    /// is exhausted without consensus
    pub fn failure_summary_system() -> &'static str {
        r#"The discussion round limit was reached without consensus.
Please provide a final summary in the exact format: CONSENSUS_FAILED: <summary of disagreements and best guess>."#
    }

    /// System message stating the task verbatim
    pub fn task_statement(task: &str) -> String {
        format!("TASK: {task}")
    }

    /// Per-round user instruction asking for the next refinement
    ///
    /// This exact text is also recorded into the participant's own history
    /// so repeated requests stay visible to the model in later rounds.
    pub fn round_instruction(round: u32) -> String {
        format!("Round {round}: Provide your next answer or refinement. Keep it short (<200 words).")
    }

    /// System message giving a participant peripheral visibility into the
    /// latest positions of every other tracked agent
    pub fn peer_update(latest: &[&str]) -> String {
        format!(
            "Here are the most recent replies from your fellow agents:\n{}",
            latest.join("\n---\n")
        )
    }

    /// The combined participant replies for one round, as presented to the
    /// moderator: one `Agent{k}: {text}` line per participant, k 1-based in
    /// the fixed participant order
    pub fn agent_report(replies: &[String]) -> String {
        replies
            .iter()
            .enumerate()
            .map(|(idx, content)| format!("Agent{}: {}", idx + 1, content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
