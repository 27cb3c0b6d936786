pub mod batch;
pub mod nested;
pub mod outcome;
