//! Core library for `plab`: atom-set diffing, planner experiments, reports
//! and the translator front end.

pub mod atoms;
pub mod environment;
pub mod executor;
pub mod experiment;
pub mod logparse;
pub mod report;
pub mod translate;
