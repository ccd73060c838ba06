//! Drives the session gate and bootstrap resolver for one mount of the console.
//!
//! Backend calls are spawned as tasks and report back over a channel, each
//! stamped with the ticket of the navigation (or resolver mount) it was issued
//! for. State only changes when a completion is applied, never while a screen
//! is being computed.

use crate::metrics::{self, Metrics};
use anyhow::{anyhow, Result};
use futures::FutureExt;
use serde::Serialize;
use snfok_console_gate_core::{
    readiness, select_view, ClusterList, Decision, ExclusionSet, Gate, GateView, ListClusters,
    Navigation, Notice, Resolver, SessionOutcome, Signals, Ticket, ValidateSession, View,
};
use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};
use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

pub const DEFAULT_REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct Config {
    pub exclusions: ExclusionSet,
    pub login_route: String,
    pub dashboard_route: String,
    pub request_timeout: time::Duration,
}

/// What the console shows for the current navigation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", content = "target", rename_all = "kebab-case")]
pub enum Screen {
    Loading,

    /// A page other than the dashboard root, rendered as-is.
    Page(String),

    Dashboard(View),

    Redirect(String),
}

pub struct Shell<V, L> {
    gate: Gate,
    resolver: Resolver,
    dashboard_route: String,
    validator: Arc<V>,
    lister: Arc<L>,
    timeout: time::Duration,
    metrics: Metrics,
    notices: Vec<Notice>,

    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    session_call: Option<CancellationToken>,
    clusters_call: Option<CancellationToken>,
}

#[derive(Debug)]
enum Completion {
    Session(Ticket, SessionOutcome),
    Clusters(Ticket, Result<ClusterList>),
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        Self {
            exclusions: ExclusionSet::default(),
            login_route: snfok_console_gate_core::LOGIN_ROUTE.to_string(),
            dashboard_route: snfok_console_gate_core::DASHBOARD_ROUTE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// === impl Screen ===

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => f.write_str("loading"),
            Self::Page(path) => write!(f, "page {path}"),
            Self::Dashboard(view) => view.fmt(f),
            Self::Redirect(to) => write!(f, "redirect {to}"),
        }
    }
}

// === impl Shell ===

impl<V, L> Shell<V, L>
where
    V: ValidateSession + Send + Sync + 'static,
    L: ListClusters + Send + Sync + 'static,
{
    pub fn new(config: Config, validator: Arc<V>, lister: Arc<L>, metrics: Metrics) -> Self {
        let Config {
            mut exclusions,
            login_route,
            dashboard_route,
            request_timeout,
        } = config;

        // Redirecting to a gated login route would never settle.
        if exclusions.insert(&login_route) {
            warn!(%login_route, "Login route was not excluded from session validation");
        }

        let (readiness, _) = readiness::pair();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            gate: Gate::new(Arc::new(exclusions), login_route, readiness),
            resolver: Resolver::new(),
            dashboard_route,
            validator,
            lister,
            timeout: request_timeout,
            metrics,
            notices: Vec::new(),
            tx,
            rx,
            session_call: None,
            clusters_call: None,
        }
    }

    /// Observes whether the session gate is still deciding.
    pub fn readiness(&self) -> readiness::Reader {
        self.gate.readiness()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, idx: usize) -> Option<Notice> {
        if idx < self.notices.len() {
            return Some(self.notices.remove(idx));
        }
        None
    }

    /// True while a current (non-superseded) call is outstanding.
    pub fn is_busy(&self) -> bool {
        self.gate.pending().is_some() || self.resolver.is_pending()
    }

    pub fn navigate(&mut self, path: &str) {
        let nav = self.gate.navigate(path);
        if nav == Navigation::Unchanged {
            return;
        }

        info!(%path, "Navigating");
        self.metrics.navigated();
        self.cancel_calls();
        self.resolver.unmount();

        match nav {
            Navigation::Render => self.mount_children(path),
            Navigation::Validate(ticket) => self.spawn_validation(ticket),
            Navigation::Unchanged => {}
        }
    }

    /// Waits for one outstanding call to complete and applies it.
    ///
    /// Returns `false` without waiting if nothing is outstanding.
    pub async fn next(&mut self) -> bool {
        if !self.is_busy() {
            return false;
        }
        match self.rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Applies completions until nothing is outstanding.
    pub async fn settle(&mut self) -> Screen {
        while self.next().await {}
        self.screen()
    }

    pub fn screen(&self) -> Screen {
        match self.gate.view() {
            GateView::Loading => Screen::Loading,
            GateView::Redirect(to) => Screen::Redirect(to),
            GateView::Children => match self.gate.current_path() {
                Some(path) if path == self.dashboard_route => {
                    let loading = self.readiness().is_loading();
                    Screen::Dashboard(select_view(Signals::new(loading, &self.resolver)))
                }
                Some(path) => Screen::Page(path.to_string()),
                None => Screen::Loading,
            },
        }
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Session(ticket, outcome) => match self.gate.settle(ticket, outcome) {
                None => self.metrics.discarded(metrics::SESSION),
                Some(decision) => {
                    self.session_call = None;
                    self.metrics.validated(outcome);
                    self.decide(decision);
                }
            },

            Completion::Clusters(ticket, res) => {
                match self.resolver.settle(ticket, res).map(|b| b.kind()) {
                    None => self.metrics.discarded(metrics::CLUSTERS),
                    Some(kind) => {
                        self.clusters_call = None;
                        self.metrics.bootstrapped(kind);
                    }
                }
            }
        }
    }

    fn decide(&mut self, decision: Decision) {
        match decision {
            Decision::Proceed => {
                if let Some(path) = self.gate.current_path().map(str::to_string) {
                    self.mount_children(&path);
                }
            }
            Decision::Redirect { to, notice } => {
                warn!(%notice, %to, "Redirecting");
                self.notices.push(notice);
                self.navigate(&to);
            }
        }
    }

    fn mount_children(&mut self, path: &str) {
        if path != self.dashboard_route {
            return;
        }
        let ticket = self.resolver.mount();
        self.spawn_listing(ticket);
    }

    fn spawn_validation(&mut self, ticket: Ticket) {
        let token = CancellationToken::new();
        self.session_call = Some(token.clone());

        let validator = self.validator.clone();
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let metrics = self.metrics.clone();
        tokio::spawn(
            async move {
                let started = time::Instant::now();
                let res = tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Cancelled");
                        return;
                    }
                    res = bounded(timeout, validator.validate_session()) => res,
                };
                metrics.observe(metrics::SESSION, started);

                if let Err(error) = &res {
                    info!(%error, "Session validation failed");
                }
                let outcome = SessionOutcome::from_result(res);
                let _ = tx.send(Completion::Session(ticket, outcome));
            }
            .instrument(info_span!("validate", %ticket)),
        );
    }

    fn spawn_listing(&mut self, ticket: Ticket) {
        let token = CancellationToken::new();
        self.clusters_call = Some(token.clone());

        let lister = self.lister.clone();
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let metrics = self.metrics.clone();
        tokio::spawn(
            async move {
                let started = time::Instant::now();
                let res = tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Cancelled");
                        return;
                    }
                    res = bounded(timeout, lister.list_clusters()) => res,
                };
                metrics.observe(metrics::CLUSTERS, started);

                let _ = tx.send(Completion::Clusters(ticket, res));
            }
            .instrument(info_span!("clusters", %ticket)),
        );
    }
}

impl<V, L> Shell<V, L> {
    fn cancel_calls(&mut self) {
        for token in [self.session_call.take(), self.clusters_call.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
    }
}

impl<V, L> Drop for Shell<V, L> {
    fn drop(&mut self) {
        self.cancel_calls();
    }
}

/// Bounds a backend call. A call that times out or panics fails.
async fn bounded<T>(
    timeout: time::Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match time::timeout(timeout, AssertUnwindSafe(call).catch_unwind()).await {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => {
            warn!("Backend call panicked");
            Err(anyhow!("backend call panicked"))
        }
        Err(_) => {
            info!(?timeout, "Backend call timed out");
            Err(anyhow!("backend call timed out after {timeout:?}"))
        }
    }
}
