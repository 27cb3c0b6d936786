pub mod coordinator;
pub mod executor;
pub mod factory;
