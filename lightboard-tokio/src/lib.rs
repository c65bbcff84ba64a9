//! Services for the lightboard control plane: the LIFX LAN transport, the
//! device registry, the effect runtime, the catalog, the audio blob store
//! and the browser-facing HTTP/push surface.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::use_self)]

pub mod catalog;
pub mod effects;
pub mod lifx;
pub mod pipes;
pub mod registry;
pub mod services;

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Spawn a task and automatically monitor its execution.
pub fn spawn<T>(future: T) -> JoinHandle<()>
where
    T: Future + Send + 'static,
    T::Output: Send + 'static,
{
    let task = tokio::spawn(future);

    tokio::spawn(async move {
        let rc = task.await;

        match rc {
            Ok(_rc) => {
                debug!("The task terminated normally");
            }
            Err(err) => {
                error!("The task aborted with error: {err}");
                std::process::exit(1);
            }
        };
    })
}
