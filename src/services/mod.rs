// src/services/mod.rs

pub mod certificate;
pub mod grading;
pub mod queue;
pub mod scoring;
pub mod submission;
