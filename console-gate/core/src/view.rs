use crate::{Bootstrap, Resolver};
use serde::Serialize;

/// The four views the dashboard root can show.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Loading,
    Onboarding,
    LiveDashboard,
    BrokenBackend,
}

/// The inputs view selection is derived from.
#[derive(Copy, Clone, Debug, Default)]
pub struct Signals<'a> {
    /// The readiness flag.
    pub loading: bool,

    /// Whether the cluster listing is still in flight.
    pub pending: bool,

    pub result: Option<&'a Bootstrap>,
}

/// Selects the dashboard view.
///
/// Total over its inputs. A pending signal wins over a settled result so that
/// a result still being committed never shows alongside the loading view.
pub fn select_view(signals: Signals<'_>) -> View {
    match signals {
        Signals { loading: true, .. } | Signals { pending: true, .. } => View::Loading,
        Signals { result: None, .. } => View::Loading,
        Signals {
            result: Some(bootstrap),
            ..
        } => match bootstrap {
            Bootstrap::HasCluster(_) => View::LiveDashboard,
            Bootstrap::NoCluster => View::Onboarding,
            Bootstrap::Failed => View::BrokenBackend,
        },
    }
}

// === impl Signals ===

impl<'a> Signals<'a> {
    pub fn new(loading: bool, resolver: &'a Resolver) -> Self {
        Self {
            loading,
            pending: resolver.is_pending(),
            result: resolver.resolved(),
        }
    }
}

// === impl View ===

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Onboarding => "onboarding",
            Self::LiveDashboard => "live-dashboard",
            Self::BrokenBackend => "broken-backend",
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
