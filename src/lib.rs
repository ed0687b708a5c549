//! # sqlgenie
//!
//! Static SQL anti-pattern analysis with span-based advisory rewrites.
//!
//! - [`ast`] - normalized syntax tree with byte spans and traversal
//! - [`rules`] - built-in anti-pattern rules and the rule set
//! - [`engine`] - runs a rule set over a tree
//! - [`rewrite`] - turns rewrite hints into edited SQL text
//! - [`suggest`] - human-readable suggestion text
//! - [`analyzer`] - the whole pipeline behind one call
//! - [`catalog`] - optional table metadata from DDL

pub mod analyzer;
pub mod app;
pub mod ast;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod rewrite;
pub mod rules;
pub mod suggest;
