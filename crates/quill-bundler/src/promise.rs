//! Shared one-shot result cells.
//!
//! The maps that deduplicate concurrent builds store a `Promise` *before*
//! the build completes, so every caller that arrives while the build is in
//! flight awaits the same result instead of starting its own. Backed by a
//! watch channel: the value is retained, so late subscribers see it
//! immediately.

use tokio::sync::watch;

pub(crate) struct Promise<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T: Clone> Promise<T> {
    /// A pending cell plus the completer that fulfills it.
    pub(crate) fn pending() -> (Completer<T>, Promise<T>) {
        let (tx, rx) = watch::channel(None);
        (Completer { tx }, Promise { rx })
    }

    /// An already-fulfilled cell.
    pub(crate) fn resolved(value: T) -> Promise<T> {
        let (_tx, rx) = watch::channel(Some(value));
        Promise { rx }
    }

    /// Wait for the value. Returns `None` if the completer was dropped
    /// without fulfilling the cell (the driving task went away).
    pub(crate) async fn wait(&self) -> Option<T> {
        let mut rx = self.rx.clone();
        match rx.wait_for(|value| value.is_some()).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        }
    }
}

pub(crate) struct Completer<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> Completer<T> {
    pub(crate) fn complete(self, value: T) {
        let _ = self.tx.send(Some(value));
    }
}
