// Copyright 2026 Policyscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Policyscope runtime library: locate the privacy policy governing a web
//! page, extract its text and summarize it.
//!
//! The flow is classify, then resolve, then analyze. [`pipeline::Pipeline`]
//! ties the pieces together; each stage is usable on its own.

#![allow(clippy::new_without_default)]

pub mod acquisition;
pub mod analysis;
pub mod audit;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod patterns;
pub mod pipeline;
pub mod renderer;
pub mod resolver;

pub use error::{PipelineError, Result};
