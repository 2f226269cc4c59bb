pub mod activity;
pub mod calendar;
pub mod graph;
pub mod init;
pub mod integrations;
pub mod project;
pub mod reschedule;
pub mod task;
pub mod watch;
