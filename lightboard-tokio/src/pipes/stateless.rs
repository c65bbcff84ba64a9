//! Stateless pipes deliver every event to every live subscription and
//! remember nothing.

use tokio::sync::broadcast;
use tracing::{debug, error};

use super::{RecvError, PIPE_SIZE};
use crate::spawn;

/// Create a pipe that sends every event to all subscribers.
#[must_use]
pub fn create_pipe<T>(name: impl Into<String>) -> (Sender<T>, Receiver<T>)
where
    T: Clone + Send + 'static,
{
    let name = name.into();
    let (tx, rx) = broadcast::channel::<T>(PIPE_SIZE);
    drop(rx);

    let sender = Sender {
        name: name.clone(),
        tx: tx.clone(),
    };
    let receiver = Receiver { name, tx };

    (sender, receiver)
}

/// Send events into a pipe.
#[derive(Debug, Clone)]
pub struct Sender<T> {
    name: String,
    tx: broadcast::Sender<T>,
}

impl<T> Sender<T>
where
    T: Clone + Send + 'static,
{
    /// Send an event without waiting.
    ///
    /// It is not an error if there are no subscribers.
    pub fn try_send(&self, data: T) {
        let _ = self.tx.send(data);
    }

    /// The number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Subscribe to events from a pipe.
#[derive(Debug, Clone)]
pub struct Receiver<T> {
    name: String,
    tx: broadcast::Sender<T>,
}

impl<T> Receiver<T>
where
    T: Clone + Send + 'static,
{
    /// Start a new subscription. Events sent before this call are not seen.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            name: self.name.clone(),
            rx: self.tx.subscribe(),
            lagging: false,
        }
    }

    /// Map this receiver into another type.
    #[must_use]
    pub fn map<U>(self, f: impl Fn(T) -> U + Send + 'static) -> Receiver<U>
    where
        U: Clone + Send + 'static,
    {
        let name = format!("{} (map)", self.name);
        let (tx, rx) = create_pipe(&name);

        spawn(async move {
            let mut sub = self.subscribe();
            loop {
                match sub.recv().await {
                    Ok(data) => tx.try_send(f(data)),
                    Err(err) => {
                        debug!("{name}: recv failed, exiting: {err}");
                        break;
                    }
                }
            }
        });

        rx
    }
}

/// A subscription to a pipe.
#[derive(Debug)]
pub struct Subscription<T> {
    name: String,
    rx: broadcast::Receiver<T>,
    lagging: bool,
}

impl<T> Subscription<T>
where
    T: Clone + Send,
{
    /// Wait for the next event.
    ///
    /// A subscription that fell behind drops its oldest events, is marked
    /// lagging, and keeps receiving from the oldest retained event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Closed` if the pipe is closed.
    pub async fn recv(&mut self) -> Result<T, RecvError> {
        loop {
            match self.rx.recv().await {
                Ok(v) => {
                    self.lagging = false;
                    return Ok(v);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError::Closed),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.lagging = true;
                    error!("{}: subscription lagged, dropped {n} events", self.name);
                }
            }
        }
    }

    /// Get the next event without waiting. Returns `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Closed` if the pipe is closed.
    pub fn try_recv(&mut self) -> Result<Option<T>, RecvError> {
        loop {
            match self.rx.try_recv() {
                Ok(v) => {
                    self.lagging = false;
                    return Ok(Some(v));
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(RecvError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    self.lagging = true;
                    error!("{}: subscription lagged, dropped {n} events", self.name);
                }
            }
        }
    }

    /// Has this subscription dropped events since the last successful read?
    #[must_use]
    pub const fn is_lagging(&self) -> bool {
        self.lagging
    }
}
