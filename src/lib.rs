//! Live task/project graph, activity feed and calendar rescheduling for a
//! team workspace.
//!
//! Data comes from an [`EntityStore`](store::EntityStore), either a workspace
//! server over HTTP or a local SQLite file. The [`graph`] module turns
//! projects and tasks into a relationship graph and keeps a render target in
//! step with it, [`activity`] polls and filters the audit log, and
//! [`reschedule`] moves calendar items optimistically and rolls back when
//! the store refuses.

pub mod activity;
pub mod db;
pub mod display;
pub mod error;
pub mod graph;
pub mod models;
pub mod refresh;
pub mod reschedule;
pub mod store;
pub mod workspace;

#[cfg(test)]
mod test_support;
