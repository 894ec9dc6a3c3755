#![allow(dead_code)]

pub mod digest_runner;
pub mod identity;
pub mod mailbox;
pub mod object_store;
pub mod podcast;
pub mod refresher;
pub mod task_queue;
