//! Room allocation for shared dormitories: an advisory-assisted engine that
//! groups applicants into rooms, plus the join-request workflow around it.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
