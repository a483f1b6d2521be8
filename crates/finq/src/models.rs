//! These models represent the objects passed around by the orchestration loop
//!
//! Two formats meet here:
//! - openai-compatible chat messages/tools, sent from the loop to the LLM
//! - tool calls, sent from the loop to the systems registered in the tool registry
//!
//! We always immediately convert the wire formats into these internal structs
//! using the helpers in `providers::utils`.
pub mod message;
pub mod tool;
