pub mod classifier;
pub mod date;
pub mod derivations;
pub mod pipeline;
pub mod projector;
