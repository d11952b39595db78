//! Multi-city round trip finder.
//!
//! A library and command-line tool that answers: "starting from this
//! airport, which cheap round trips through several cities can I fly?"

pub mod artifacts;
pub mod cache;
pub mod domain;
pub mod pipeline;
pub mod planner;
pub mod report;
pub mod routes;
