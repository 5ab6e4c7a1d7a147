//! Client-side model of the game world, fed by updates from the game bridge.

pub mod world_state;

pub use world_state::{WorldState, WorldUpdate};
