//! Shell data model: parsed pipelines and job bookkeeping.

pub mod job;
pub mod parser;
