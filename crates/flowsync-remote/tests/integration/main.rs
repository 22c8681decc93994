//! Integration tests for flowsync-remote
//!
//! Uses wiremock to simulate the workflow service and verifies the HTTP
//! gateway end to end: pagination, error mapping, and writes.

mod common;

mod test_list;
mod test_workflow_crud;
