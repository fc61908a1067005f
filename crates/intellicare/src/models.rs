//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - chat history turns, sent from the caller to the agent
//! - ollama chat messages, sent from the agent to the LLM
//! - patient records, returned by the record store to the capabilities
//!
//! Conversation turns map one to one onto the ollama chat message format, so the
//! same struct is serialized straight into the request body.
pub mod message;
pub mod patient;
pub mod role;
