//! Scenario tests of the ticket system against an in-memory platform.


mod admin;
mod lifecycle;
