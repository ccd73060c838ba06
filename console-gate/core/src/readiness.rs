//! The readiness flag: whether the session gate is still deciding.
//!
//! The flag starts out `true` (loading) and is driven by exactly one
//! [`Writer`], owned by the session gate. Any number of [`Reader`]s may
//! observe it, e.g. to hold back rendering until the gate has settled.

use tokio::sync::watch;

/// Drives the readiness flag. Not `Clone`: the gate is the only writer.
#[derive(Debug)]
pub struct Writer(watch::Sender<bool>);

/// Observes the readiness flag.
#[derive(Clone, Debug)]
pub struct Reader(watch::Receiver<bool>);

pub fn pair() -> (Writer, Reader) {
    let (tx, rx) = watch::channel(true);
    (Writer(tx), Reader(rx))
}

// === impl Writer ===

impl Writer {
    /// Last write wins. Readers are only notified when the value changes.
    pub fn set_loading(&self, loading: bool) {
        self.0.send_if_modified(|current| {
            if *current == loading {
                return false;
            }
            *current = loading;
            true
        });
    }

    pub fn is_loading(&self) -> bool {
        *self.0.borrow()
    }

    pub fn reader(&self) -> Reader {
        Reader(self.0.subscribe())
    }
}

// === impl Reader ===

impl Reader {
    pub fn is_loading(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until the flag is `false`.
    ///
    /// Returns immediately if it already is. If the writer is dropped while
    /// loading, the gate will never settle and this returns `false`.
    pub async fn settled(&mut self) -> bool {
        self.0.wait_for(|loading| !*loading).await.is_ok()
    }
}
