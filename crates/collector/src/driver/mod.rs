pub mod alerts;
pub mod paginated;
pub mod single_fetch;

/// Per-task result, logged by the orchestrator on worker completion per
/// spec.md §4.9 step 6. Never fatal to the invocation as a whole.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Ran to completion; cursor may or may not have advanced.
    Done,
    /// Stopped early on a transport/auth/sink error; cursor checkpointed
    /// (or left unchanged) so the next invocation resumes correctly.
    Failed(String),
}
