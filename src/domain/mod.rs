pub mod credential;
pub mod digest;
pub mod message;
