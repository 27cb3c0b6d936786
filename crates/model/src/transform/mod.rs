pub mod derivation;
pub mod shape;
