use std::fmt::{self, Debug};

use futures::stream::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A value that observers can read synchronously or follow as a stream.
///
/// Backed by a `tokio::sync::watch` channel, so readers never block the
/// writer and a slow watcher only ever sees the latest value. Clones share
/// the same channel.
#[derive(Clone)]
pub struct Property<T: Clone + Send + Sync + 'static> {
    tx: watch::Sender<T>,
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    /// Create a property holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    /// Store a new value, notifying watchers only when it differs.
    ///
    /// Returns whether the value changed. Writes stay inside the crate;
    /// callers outside only observe.
    pub(crate) fn set(&self, new_value: T) -> bool
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == new_value {
                return false;
            }
            *current = new_value;
            true
        })
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Stream of values, starting with the current one.
    pub fn watch(&self) -> impl Stream<Item = T> + Send + use<T> {
        WatchStream::new(self.tx.subscribe())
    }
}

impl<T: Clone + Send + Sync + Debug + 'static> Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&*self.tx.borrow()).finish()
    }
}
