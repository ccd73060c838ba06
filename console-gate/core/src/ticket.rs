/// Stamps an issued call with the generation it was issued for.
///
/// Completions carrying a ticket from an older generation are stale and must
/// be discarded by the machine that issued them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub(crate) struct Generations(u64);

// === impl Ticket ===

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// === impl Generations ===

impl Generations {
    /// Advances to a new generation, invalidating all previously issued tickets.
    pub(crate) fn advance(&mut self) -> Ticket {
        self.0 = self.0.wrapping_add(1);
        Ticket(self.0)
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        self.0 == ticket.0
    }
}
