// Testing Tools Library
//
// This crate provides testing utilities for the SSE push server.
// Currently includes:
// - sse-test-client: connects several subscribers to a running server and
//   checks that keepalives and disconnects behave as expected

pub mod output;
pub mod scenarios;
pub mod sse_client;
