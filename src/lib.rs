//! toonlate - webtoon OCR and translation core.
//!
//! Rotates API keys across concurrent provider calls, fans batches of pages
//! or chapters out with bounded concurrency and retries, and turns
//! free-form model responses into structured translation reports.

#![allow(clippy::should_implement_trait)]

pub mod batch;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod extract;
pub mod prompts;
pub mod provider;
pub mod services;
