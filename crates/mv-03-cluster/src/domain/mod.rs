pub mod errors;
pub mod job;
pub mod role;
