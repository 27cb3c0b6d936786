pub mod adapter;
pub mod destination;
pub mod query;
pub mod source;
