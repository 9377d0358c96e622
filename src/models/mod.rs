// src/models/mod.rs

pub mod certificate;
pub mod question;
pub mod quiz;
pub mod submission;
pub mod user;
