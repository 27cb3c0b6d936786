pub mod dedup;
pub mod writer;
