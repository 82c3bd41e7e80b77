//! The agent reasoning loop.
//!
//! One turn goes **Send → Interpret → Act**:
//!
//! 1. **Send** the whole history with the current settings and token
//! 2. **Interpret** the reply and append it to the conversation
//! 3. **Act**: if the reply calls for a tool, run it, append the result as a
//!    `tool` message and go back to step 1
//!
//! The turn ends on a reply with nothing to act on, on any provider error,
//! or when the iteration or wall-clock budget runs out.

pub mod invocation;
pub mod loop_runner;

#[cfg(test)]
mod test_helpers;

pub use invocation::ToolInvocation;
pub use loop_runner::{AgentLoop, Session, TurnOutcome};
