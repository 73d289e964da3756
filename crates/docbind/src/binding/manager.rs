use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::Instrument;

use docbind_api::{DocumentStore, EventStream, ListenerRegistration};

use super::state::{BindingState, LiveReceiver, Phase, ResultEnvelope};
use super::targets::BindingTarget;
use crate::context::StoreContext;
use crate::references::ReferenceResolver;

type StateSender<D> = Arc<watch::Sender<BindingState<D>>>;

/// The subscription instance a binding currently owns.
struct ActiveListener {
    registration: Arc<ListenerRegistration>,
    task: JoinHandle<()>,
}

/// A live view of one [`BindingTarget`].
///
/// `start` opens the store listener and `stop` (or dropping the binding)
/// releases it. Between the two, every store snapshot is materialized and
/// published in arrival order; the latest [`ResultEnvelope`] is available via
/// [`current`](Self::current) or a [`LiveReceiver`].
///
/// Re-invoking with [`update`](Self::update) only resubscribes when the target
/// identity changed. The old listener is released before the new one is
/// opened, and nothing the old instance still had in flight is published.
///
/// Must be started inside a tokio runtime.
pub struct Binding<T: BindingTarget> {
    store: Arc<dyn DocumentStore>,
    resolver: Arc<ReferenceResolver>,
    target: T,
    identity: String,
    state: StateSender<T::Data>,
    active: Option<ActiveListener>,
    stopped: bool,
}

impl<T: BindingTarget> Binding<T> {
    pub fn start(ctx: &StoreContext, target: T) -> Self {
        let (tx, _) = watch::channel(BindingState::new());
        let mut binding = Self {
            store: ctx.store().clone(),
            resolver: ctx.resolver().clone(),
            identity: target.identity(),
            target,
            state: Arc::new(tx),
            active: None,
            stopped: false,
        };
        binding.subscribe();
        binding
    }

    /// Re-invoke with `target`. Returns whether the identity changed, in which
    /// case the old listener was released and the new target subscribed.
    pub fn update(&mut self, target: T) -> bool {
        if self.stopped {
            tracing::warn!("[binding] update() on a stopped binding ignored: {}", self.identity);
            return false;
        }

        let identity = target.identity();
        if identity == self.identity {
            return false;
        }

        tracing::debug!("[binding] Target changed: {} -> {}", self.identity, identity);
        self.release();
        self.target = target;
        self.identity = identity;
        self.subscribe();
        true
    }

    /// Release the listener. Later calls do nothing.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.release();
        self.state.send_if_modified(|s| {
            if s.phase == Phase::Errored {
                return false;
            }
            s.phase = Phase::Terminated;
            true
        });
        tracing::debug!("[binding] Stopped {}", self.identity);
    }

    pub fn current(&self) -> ResultEnvelope<T::Data> {
        self.state.borrow().envelope.clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn watch(&self) -> LiveReceiver<T::Data> {
        LiveReceiver::new(self.state.subscribe())
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn subscribe(&mut self) {
        let Some(listen_target) = self.target.listen_target() else {
            tracing::debug!("[binding] Nothing to listen to for {}", self.identity);
            self.state.send_modify(|s| {
                s.envelope = ResultEnvelope {
                    data: T::Data::default(),
                    loading: false,
                };
                s.phase = Phase::Idle;
            });
            return;
        };

        let mut epoch = 0;
        self.state.send_modify(|s| {
            epoch = s.epoch;
            s.envelope.loading = true;
            s.phase = Phase::Subscribing;
        });

        tracing::debug!("[binding] Opening listener: {}", listen_target);
        let (events, registration) = self.store.listen(listen_target).into_parts();
        let registration = Arc::new(registration);

        let span = tracing::info_span!("binding", key = %self.identity);
        let task = tokio::spawn(
            run_listener(
                events,
                registration.clone(),
                self.state.clone(),
                self.resolver.clone(),
                self.target.clone(),
                epoch,
            )
            .instrument(span),
        );

        self.active = Some(ActiveListener { registration, task });
    }

    /// Revoke the current instance's right to publish, then tear it down.
    fn release(&mut self) {
        self.state.send_if_modified(|s| {
            s.epoch += 1;
            false
        });

        if let Some(active) = self.active.take() {
            active.task.abort();
            if active.registration.remove() {
                tracing::debug!("[binding] Released listener for {}", self.identity);
            }
        }
    }
}

/// Consume one listener's events until it errors, ends, or is aborted.
///
/// Snapshots are handled one at a time, so a newer snapshot never starts
/// resolving before the previous one was published or discarded.
async fn run_listener<T: BindingTarget>(
    mut events: EventStream,
    registration: Arc<ListenerRegistration>,
    state: StateSender<T::Data>,
    resolver: Arc<ReferenceResolver>,
    target: T,
    epoch: u64,
) {
    while let Some(event) = events.next().await {
        let snapshot = match event {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("[binding] Subscription error: {}", e);
                state.send_if_modified(|s| {
                    if s.epoch != epoch {
                        return false;
                    }
                    s.envelope.loading = false;
                    s.phase = Phase::Errored;
                    true
                });
                registration.remove();
                return;
            }
        };

        match target.materialize(snapshot, &resolver).await {
            Ok(data) => {
                let published = state.send_if_modified(|s| {
                    if s.epoch != epoch {
                        return false;
                    }
                    s.envelope = ResultEnvelope {
                        data,
                        loading: false,
                    };
                    s.phase = Phase::Streaming;
                    true
                });
                if !published {
                    tracing::debug!("[binding] Discarded snapshot of a released listener");
                    return;
                }
            }
            Err(e) => {
                tracing::error!("[binding] Failed to resolve snapshot: {}", e);
                state.send_if_modified(|s| {
                    if s.epoch != epoch || !s.envelope.loading {
                        return false;
                    }
                    s.envelope.loading = false;
                    true
                });
            }
        }
    }

    tracing::debug!("[binding] Event stream ended");
}

impl<T: BindingTarget> Drop for Binding<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: BindingTarget> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("identity", &self.identity)
            .field("phase", &self.phase())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}
