//! The bootstrap resolver.
//!
//! Once the session gate lets the dashboard root through, the resolver lists
//! the registered clusters once per mount and settles into one of three
//! terminal states.
//!
//! ```text
//! Unmounted --mount--> Pending --Ok(Registered)--> Resolved(HasCluster)
//!                              --Ok(Empty)-------> Resolved(NoCluster)
//!                              --Err(_)----------> Resolved(Failed)
//! ```
//!
//! Resolved states are terminal until the next mount. Nothing is retried.

use crate::{
    api::Cluster,
    ticket::{Generations, Ticket},
};
use anyhow::Result;
use tracing::debug;

/// Models the cluster registry's "list clusters" endpoint.
///
/// Implementations decide between [`ClusterList::Registered`] and
/// [`ClusterList::Empty`] from the response; any failure to obtain a
/// well-formed response is an `Err`.
#[async_trait::async_trait]
pub trait ListClusters {
    async fn list_clusters(&self) -> Result<ClusterList>;
}

/// A successful cluster listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterList {
    Registered(Vec<Cluster>),

    /// The registry is reachable but no cluster is registered.
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Bootstrap {
    HasCluster(Vec<Cluster>),
    NoCluster,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolverState {
    Unmounted,
    Pending(Ticket),
    Resolved(Bootstrap),
}

#[derive(Debug)]
pub struct Resolver {
    generations: Generations,
    state: ResolverState,
}

// === impl Bootstrap ===

impl Bootstrap {
    pub fn from_listing(res: Result<ClusterList>) -> Self {
        match res {
            Ok(ClusterList::Registered(clusters)) => Self::HasCluster(clusters),
            Ok(ClusterList::Empty) => Self::NoCluster,
            Err(_) => Self::Failed,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::HasCluster(_) => "has_cluster",
            Self::NoCluster => "no_cluster",
            Self::Failed => "failed",
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        match self {
            Self::HasCluster(clusters) => clusters,
            Self::NoCluster | Self::Failed => &[],
        }
    }
}

// === impl Resolver ===

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            generations: Generations::default(),
            state: ResolverState::Unmounted,
        }
    }

    /// Starts a fresh mount in `Pending`. The caller issues one listing call
    /// stamped with the returned ticket.
    pub fn mount(&mut self) -> Ticket {
        let ticket = self.generations.advance();
        debug!(%ticket, "Resolving clusters");
        self.state = ResolverState::Pending(ticket);
        ticket
    }

    pub fn unmount(&mut self) {
        self.generations.advance();
        self.state = ResolverState::Unmounted;
    }

    pub fn state(&self) -> &ResolverState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ResolverState::Pending(_))
    }

    pub fn pending(&self) -> Option<Ticket> {
        match self.state {
            ResolverState::Pending(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn resolved(&self) -> Option<&Bootstrap> {
        match &self.state {
            ResolverState::Resolved(bootstrap) => Some(bootstrap),
            _ => None,
        }
    }

    /// Applies a listing result.
    ///
    /// Returns `None` if the ticket does not belong to the current mount or the
    /// mount has already resolved.
    pub fn settle(&mut self, ticket: Ticket, res: Result<ClusterList>) -> Option<&Bootstrap> {
        if self.pending() != Some(ticket) {
            debug!(%ticket, "Discarding stale cluster listing");
            return None;
        }

        if let Err(error) = &res {
            debug!(%error, "Cluster listing failed");
        }
        let bootstrap = Bootstrap::from_listing(res);
        debug!(%ticket, kind = bootstrap.kind(), "Clusters resolved");
        self.state = ResolverState::Resolved(bootstrap);
        self.resolved()
    }
}
