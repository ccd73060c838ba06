#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod api;
pub mod bootstrap;
mod exclusion;
pub mod readiness;
pub mod session;
mod ticket;
pub mod view;

pub use self::{
    bootstrap::{Bootstrap, ClusterList, ListClusters, Resolver, ResolverState},
    exclusion::ExclusionSet,
    session::{Decision, Gate, GateView, Navigation, Notice, SessionOutcome, ValidateSession},
    ticket::Ticket,
    view::{select_view, Signals, View},
};

/// The route that never requires session validation by default.
pub const LOGIN_ROUTE: &str = "/login";

/// The route whose children are selected by the bootstrap resolver.
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// The `meta.code` the cluster registry uses to report that it is healthy but
/// has no registered clusters.
pub const NO_CLUSTER_AVAILABLE: i64 = 1004;
