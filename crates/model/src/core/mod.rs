pub mod identifiers;
pub mod provenance;
pub mod value;
