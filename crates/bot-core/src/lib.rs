//! Core of the block-world bot: world model, agent loop, inference client and state recorder.
//!
//! The runner binary wires these to a game bridge; everything here is transport-agnostic.

pub mod agent;
pub mod llm;
pub mod recorder;
pub mod world;
