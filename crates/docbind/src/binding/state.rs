use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// What a consumer sees: the latest published data and whether the first
/// snapshot of the current subscription is still pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<D> {
    pub data: D,
    pub loading: bool,
}

impl<D: Default> ResultEnvelope<D> {
    pub(crate) fn pending() -> Self {
        Self {
            data: D::default(),
            loading: true,
        }
    }
}

/// Lifecycle of the subscription instance currently owned by a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No store listener held
    Idle,
    /// Listener opened, nothing published yet
    Subscribing,
    /// At least one snapshot published
    Streaming,
    /// Released by `stop`
    Terminated,
    /// The store reported an error and the listener was released
    Errored,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Terminated | Phase::Errored)
    }
}

/// Shared state behind the watch channel. `epoch` identifies the subscription
/// instance allowed to publish; it changes whenever that instance is released.
#[derive(Debug, Clone)]
pub(crate) struct BindingState<D> {
    pub(crate) envelope: ResultEnvelope<D>,
    pub(crate) phase: Phase,
    pub(crate) epoch: u64,
}

impl<D: Default> BindingState<D> {
    pub(crate) fn new() -> Self {
        Self {
            envelope: ResultEnvelope::pending(),
            phase: Phase::Idle,
            epoch: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("binding was dropped")]
pub struct BindingClosed;

/// Read side of a binding, usable from other tasks.
#[derive(Debug, Clone)]
pub struct LiveReceiver<D> {
    rx: watch::Receiver<BindingState<D>>,
}

impl<D: Clone> LiveReceiver<D> {
    pub(crate) fn new(rx: watch::Receiver<BindingState<D>>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> ResultEnvelope<D> {
        self.rx.borrow().envelope.clone()
    }

    pub fn phase(&self) -> Phase {
        self.rx.borrow().phase
    }

    /// Wait for the next publish and return it.
    pub async fn changed(&mut self) -> Result<ResultEnvelope<D>, BindingClosed> {
        self.rx.changed().await.map_err(|_| BindingClosed)?;
        Ok(self.rx.borrow_and_update().envelope.clone())
    }

    /// Wait until `loading` is false, returning immediately if it already is.
    pub async fn settled(&mut self) -> Result<ResultEnvelope<D>, BindingClosed> {
        self.wait_until(|envelope, _| !envelope.loading).await
    }

    /// Wait until `condition` holds for the current envelope and phase.
    pub async fn wait_until(
        &mut self,
        mut condition: impl FnMut(&ResultEnvelope<D>, Phase) -> bool,
    ) -> Result<ResultEnvelope<D>, BindingClosed> {
        let state = self
            .rx
            .wait_for(|s| condition(&s.envelope, s.phase))
            .await
            .map_err(|_| BindingClosed)?;
        Ok(state.envelope.clone())
    }
}
