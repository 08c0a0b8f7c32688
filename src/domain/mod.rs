//! Core domain types and engines.

pub mod analysis;
pub mod backtest;
pub mod combine;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod expr_parser;
pub mod function;
pub mod lab;
pub mod panel;
pub mod report;
pub mod result;
pub mod series;
pub mod settings;
pub mod stats;
