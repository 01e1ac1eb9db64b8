//! Integration tests for ecmdrive-sync
//!
//! Runs the change detection pipeline end to end against the embedded
//! repository runtime: audit log, document repository and group directory
//! in memory, with the real `DriveManager` and `ChangeFinder` on top.

mod common;

mod test_change_summary;
mod test_security_fanout;
