pub mod destination;
pub mod requests;
pub mod source;
