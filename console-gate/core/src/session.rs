//! The session gate.
//!
//! For each navigated path the gate either lets the path render immediately
//! (it is excluded from validation), or holds it behind exactly one session
//! validation call. The gate is sans-IO: it hands out a [`Ticket`] for the call
//! it wants issued and is told the outcome through [`Gate::settle`].
//!
//! ```text
//! Idle --navigate(excluded)--> Open
//! Idle --navigate(other)-----> Checking --Valid----> Open
//!                                       --Invalid--> Redirected
//! ```
//!
//! Any navigation to a different path starts over and invalidates the ticket
//! of a call still in flight.

use crate::{
    readiness,
    ticket::{Generations, Ticket},
    ExclusionSet,
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::{debug, trace};

/// Models the identity provider's "validate access" endpoint.
///
/// Implementations report any failure, including transport errors, as `Err`;
/// the caller folds every error into [`SessionOutcome::Invalid`].
#[async_trait::async_trait]
pub trait ValidateSession {
    async fn validate_session(&self) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Valid,
    Invalid,
}

/// What the caller must do after a navigation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// The path is excluded; render it now.
    Render,

    /// Issue one validation call stamped with this ticket.
    Validate(Ticket),

    /// The path is already being checked, or was already let through.
    Unchanged,
}

/// The gate's terminal decision for a settled validation call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Redirect { to: String, notice: Notice },
}

/// What the gate renders for the current path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateView {
    Loading,
    Children,
    Redirect(String),
}

/// A dismissible message shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct Gate {
    exclusions: Arc<ExclusionSet>,
    login_route: String,
    readiness: readiness::Writer,
    generations: Generations,
    state: State,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Checking { path: String, ticket: Ticket },
    Open { path: String },
    Redirected,
}

// === impl SessionOutcome ===

impl SessionOutcome {
    /// Folds a validation result into an outcome. Errors fail closed.
    pub fn from_result<T, E>(res: std::result::Result<T, E>) -> Self {
        match res {
            Ok(_) => Self::Valid,
            Err(_) => Self::Invalid,
        }
    }
}

// === impl Notice ===

impl Notice {
    pub fn session_expired() -> Self {
        Self {
            title: "Session Expired".to_string(),
            description: "Please login again to access your account.".to_string(),
            duration: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

// === impl Gate ===

impl Gate {
    pub fn new(
        exclusions: Arc<ExclusionSet>,
        login_route: impl Into<String>,
        readiness: readiness::Writer,
    ) -> Self {
        Self {
            exclusions,
            login_route: login_route.into(),
            readiness,
            generations: Generations::default(),
            state: State::Idle,
        }
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn readiness(&self) -> readiness::Reader {
        self.readiness.reader()
    }

    /// The path the gate is currently checking or has let through.
    pub fn current_path(&self) -> Option<&str> {
        match &self.state {
            State::Checking { path, .. } | State::Open { path } => Some(path),
            State::Idle | State::Redirected => None,
        }
    }

    /// The ticket of the validation call currently in flight, if any.
    pub fn pending(&self) -> Option<Ticket> {
        match self.state {
            State::Checking { ticket, .. } => Some(ticket),
            _ => None,
        }
    }

    pub fn navigate(&mut self, path: &str) -> Navigation {
        if self.current_path() == Some(path) {
            trace!(%path, "Path unchanged");
            return Navigation::Unchanged;
        }

        // Whatever was in flight belongs to a path we are leaving.
        let ticket = self.generations.advance();

        if self.exclusions.contains(path) {
            debug!(%path, "Path excluded from session validation");
            self.state = State::Open {
                path: path.to_string(),
            };
            self.readiness.set_loading(false);
            return Navigation::Render;
        }

        debug!(%path, %ticket, "Validating session");
        self.state = State::Checking {
            path: path.to_string(),
            ticket,
        };
        self.readiness.set_loading(true);
        Navigation::Validate(ticket)
    }

    /// Applies the outcome of a validation call.
    ///
    /// Returns `None` when the ticket is stale, i.e. the navigation it was
    /// issued for has been superseded.
    pub fn settle(&mut self, ticket: Ticket, outcome: SessionOutcome) -> Option<Decision> {
        let path = match &self.state {
            State::Checking { path, ticket: t } if *t == ticket => path.clone(),
            _ => {
                debug!(%ticket, ?outcome, "Discarding stale validation");
                return None;
            }
        };
        debug_assert!(self.generations.is_current(ticket));

        // The call has settled; nothing is pending regardless of the outcome.
        self.readiness.set_loading(false);

        match outcome {
            SessionOutcome::Valid => {
                debug!(%path, "Session valid");
                self.state = State::Open { path };
                Some(Decision::Proceed)
            }
            SessionOutcome::Invalid => {
                debug!(%path, to = %self.login_route, "Session invalid");
                self.state = State::Redirected;
                Some(Decision::Redirect {
                    to: self.login_route.clone(),
                    notice: Notice::session_expired(),
                })
            }
        }
    }

    pub fn view(&self) -> GateView {
        match self.state {
            State::Idle | State::Checking { .. } => GateView::Loading,
            State::Open { .. } => GateView::Children,
            State::Redirected => GateView::Redirect(self.login_route.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_gate() -> (Gate, readiness::Reader) {
        let (tx, rx) = readiness::pair();
        let gate = Gate::new(Arc::new(ExclusionSet::default()), "/login", tx);
        (gate, rx)
    }

    fn validate(nav: Navigation) -> Ticket {
        match nav {
            Navigation::Validate(ticket) => ticket,
            nav => panic!("expected a validation call, got {nav:?}"),
        }
    }

    #[test]
    fn excluded_path_renders_without_validation() {
        let (mut gate, rx) = mk_gate();
        assert!(rx.is_loading());

        assert_eq!(gate.navigate("/login"), Navigation::Render);
        assert!(!rx.is_loading());
        assert_eq!(gate.pending(), None);
        assert_eq!(gate.view(), GateView::Children);
    }

    #[test]
    fn valid_session_opens_the_gate() {
        let (mut gate, rx) = mk_gate();

        let ticket = validate(gate.navigate("/dashboard"));
        assert!(rx.is_loading());
        assert_eq!(gate.view(), GateView::Loading);
        assert_eq!(gate.pending(), Some(ticket));

        assert_eq!(
            gate.settle(ticket, SessionOutcome::Valid),
            Some(Decision::Proceed)
        );
        assert!(!rx.is_loading());
        assert_eq!(gate.view(), GateView::Children);
        assert_eq!(gate.current_path(), Some("/dashboard"));
    }

    #[test]
    fn invalid_session_redirects_to_login() {
        let (mut gate, rx) = mk_gate();

        let ticket = validate(gate.navigate("/dashboard"));
        assert_eq!(
            gate.settle(ticket, SessionOutcome::Invalid),
            Some(Decision::Redirect {
                to: "/login".to_string(),
                notice: Notice::session_expired(),
            })
        );
        assert!(!rx.is_loading());
        assert_eq!(gate.view(), GateView::Redirect("/login".to_string()));
    }

    #[test]
    fn repeated_invalid_always_redirects_to_login() {
        let (mut gate, _rx) = mk_gate();

        for path in ["/dashboard", "/alerts", "/dashboard", "/kubernetes/pods/p-1"] {
            let ticket = validate(gate.navigate(path));
            match gate.settle(ticket, SessionOutcome::Invalid) {
                Some(Decision::Redirect { to, .. }) => assert_eq!(to, "/login"),
                decision => panic!("expected redirect, got {decision:?}"),
            }
        }
    }

    #[test]
    fn renavigating_an_open_path_does_not_revalidate() {
        let (mut gate, rx) = mk_gate();

        let ticket = validate(gate.navigate("/dashboard"));
        gate.settle(ticket, SessionOutcome::Valid);

        assert_eq!(gate.navigate("/dashboard"), Navigation::Unchanged);
        assert!(!rx.is_loading());
        assert_eq!(gate.view(), GateView::Children);

        // A late duplicate of the same outcome changes nothing either.
        assert_eq!(gate.settle(ticket, SessionOutcome::Valid), None);
        assert_eq!(gate.settle(ticket, SessionOutcome::Invalid), None);
        assert_eq!(gate.view(), GateView::Children);
    }

    #[test]
    fn renavigating_a_checking_path_keeps_the_call() {
        let (mut gate, _rx) = mk_gate();

        let ticket = validate(gate.navigate("/dashboard"));
        assert_eq!(gate.navigate("/dashboard"), Navigation::Unchanged);
        assert_eq!(gate.pending(), Some(ticket));
    }

    #[test]
    fn stale_validation_is_discarded() {
        let (mut gate, rx) = mk_gate();

        let a = validate(gate.navigate("/dashboard"));
        let b = validate(gate.navigate("/alerts"));
        assert_ne!(a, b);

        // A resolves first but belongs to a superseded navigation.
        assert_eq!(gate.settle(a, SessionOutcome::Invalid), None);
        assert!(rx.is_loading());
        assert_eq!(gate.view(), GateView::Loading);

        assert_eq!(gate.settle(b, SessionOutcome::Valid), Some(Decision::Proceed));
        assert_eq!(gate.current_path(), Some("/alerts"));
        assert!(!rx.is_loading());
    }

    #[test]
    fn leaving_for_an_excluded_path_drops_the_pending_call() {
        let (mut gate, rx) = mk_gate();

        let ticket = validate(gate.navigate("/dashboard"));
        assert_eq!(gate.navigate("/login"), Navigation::Render);
        assert!(!rx.is_loading());

        assert_eq!(gate.settle(ticket, SessionOutcome::Invalid), None);
        assert_eq!(gate.view(), GateView::Children);
        assert_eq!(gate.current_path(), Some("/login"));
    }

    #[test]
    fn outcome_fails_closed() {
        assert_eq!(
            SessionOutcome::from_result::<(), _>(Err(anyhow::anyhow!("connection refused"))),
            SessionOutcome::Invalid
        );
        assert_eq!(
            SessionOutcome::from_result::<_, anyhow::Error>(Ok(())),
            SessionOutcome::Valid
        );
    }
}
