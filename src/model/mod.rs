pub mod access;
pub mod ballot;
pub mod command;
pub mod common;
pub mod election;
pub mod event;
pub mod pause;
pub mod query;
pub mod state;
