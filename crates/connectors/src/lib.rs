pub mod adapter;
pub mod base;
pub mod error;
pub mod memory;
pub mod mongo;
