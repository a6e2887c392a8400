pub mod backend;
pub mod token;
