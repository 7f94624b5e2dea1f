pub mod format;
pub mod informer;
pub mod utils;

// System
use std::io::{self, Write};

// Third Party
use k8s_openapi::api::core::v1::Pod;
use kube::{api::Api, runtime::watcher, Client};
use tokio_util::sync::CancellationToken;
use tracing::warn;

// Local
use crate::format::{format_pod_event, EventKind};
use crate::informer::{Informer, ResourceEventHandler};

/// Prints one record per pod event to the wrapped writer.
pub struct PodPrinter<W: Write> {
    out: W,
}

impl<W: Write> PodPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write the whole record at once so that lines of one event stay together.
    fn print(&mut self, kind: EventKind, pod: &Pod) {
        let record = format_pod_event(kind, pod);
        if let Err(error) = self
            .out
            .write_all(record.as_bytes())
            .and_then(|()| self.out.flush())
        {
            warn!(
                "Failed to print {} event for pod {:?}: {}",
                kind, pod.metadata.name, error
            );
        }
    }
}

impl<W: Write> ResourceEventHandler<Pod> for PodPrinter<W> {
    fn on_add(&mut self, pod: &Pod) {
        self.print(EventKind::Added, pod);
    }

    fn on_update(&mut self, _old: &Pod, new: &Pod) {
        self.print(EventKind::Updated, new);
    }

    fn on_delete(&mut self, pod: &Pod) {
        self.print(EventKind::Deleted, pod);
    }
}

/// Watches pods in every namespace and prints their lifecycle events to stdout.
pub struct PodLogger {
    client: Client,
}

impl PodLogger {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.clone(),
        }
    }

    /// Block until `stop` is cancelled. No field or label selector, no periodic resync.
    pub async fn watch_pods(&self, stop: CancellationToken) {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let informer = Informer::new(pods, watcher::Config::default());
        let mut printer = PodPrinter::new(io::stdout());
        informer.run(&mut printer, stop).await;
    }
}
