#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_wraps
)]

//! PageForge turns an observed web page's structure into agent-invocable
//! tool definitions, and those definitions into runnable automation code.
//!
//! Pipeline: capture a page through the [`driver`] boundary, extract its
//! interactive surface ([`extract`]), synthesize typed tool proposals
//! ([`proposal`]) — either via an external reasoning agent or from a
//! recorded interactive session ([`session`]) — and emit executable tool
//! modules ([`codegen`]).

pub mod codegen;
pub mod config;
pub mod driver;
pub mod extract;
pub mod model;
pub mod proposal;
pub mod session;
pub(crate) mod util;
