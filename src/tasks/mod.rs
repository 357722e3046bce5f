//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache sweep: expires and evicts entries of the memory cache backend

mod cleanup;

pub use cleanup::spawn_sweep_task;
