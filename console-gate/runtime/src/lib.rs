#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use snfok_console_gate_core as core;
pub use snfok_console_gate_http as backend;

mod admin;
mod args;
pub mod metrics;
pub mod shell;


pub use self::{
    admin::Admin,
    args::Args,
    metrics::Metrics,
    shell::{Screen, Shell},
};
