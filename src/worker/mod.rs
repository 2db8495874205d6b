//! Worker process supervision: building prompts, spawning the external AI
//! worker binary, and enforcing per-phase timeouts with a heartbeat.

pub mod prompt;
pub mod supervisor;

pub use prompt::{compile_fix_prompt, handoff_template, implementation_prompt, plan_context_document, terminal_phase_prompt};
pub use supervisor::{run_worker, timeout_for_phase, WorkerOutcome, WorkerSpec};
