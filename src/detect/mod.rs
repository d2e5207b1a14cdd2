//! Detection passes over syntax trees, plus the text matcher and name
//! heuristic used when no usable tree exists.

mod async_misuse;
mod confidence;
mod crypto;
mod cross_file;
mod duplicates;
mod empty_catch;
mod generic;
mod heuristic;
mod injection;
mod middleware;
pub mod nodes;
mod orphaned;
mod pipeline;
mod secrets;
mod syntax;
pub mod tables;
mod types;
mod unreachable;
mod unused;

pub use async_misuse::{go_loop_capture, is_async_function, javascript_misuse, python_misuse};
pub use cross_file::{analyze_cross_file, CrossFileFinding};
pub use confidence::{apply_edge_case_penalty, finalize, fix_type_for, EdgeCases};
pub use duplicates::{dice, normalize};
pub use generic::detect_text;
pub use heuristic::complement;
pub use injection::dynamic_reason;
pub use pipeline::{merge, DetectContext, Detector, Pipeline, PipelineOutput, Ranked};
pub use tables::Sinks;
pub use types::{CheckKind, CheckSet, Finding, FixType, Severity};
