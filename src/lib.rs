pub mod auth;
pub mod cloud;
pub mod config;
pub mod digest;
pub mod domain;
pub mod error;
pub mod mail;
pub mod podcast;
pub mod store;
pub mod task;
pub mod web;

pub use error::Error;
