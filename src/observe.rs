//! Listener registration for the feed's collaborators.
//!
//! Every `register`/`subscribe` hands back a [`Subscription`]; dropping it
//! unregisters the listener, so tearing down a coordinator releases
//! everything it listened to.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self::new(move || token.cancel())
    }

    pub fn release(mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.release.is_some()).finish()
    }
}

/// Source of the "sentinel is on screen" signal.
pub trait VisibilitySensor {
    fn register(&self, listener: UnboundedSender<bool>) -> Subscription;
}

type Listeners = Arc<Mutex<Vec<(u64, UnboundedSender<bool>)>>>;

/// Visibility sensor driven by hand: the CLI's simulated scroller and tests.
#[derive(Clone, Default)]
pub struct ManualSensor {
    listeners: Listeners,
    state: Arc<Mutex<SensorState>>,
}

#[derive(Default)]
struct SensorState {
    visible: bool,
    next_id: u64,
}

impl ManualSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast a new value. Repeats of the current value are not sent.
    pub fn set_visible(&self, visible: bool) {
        let mut st = self.state.lock().unwrap();
        if st.visible == visible {
            return;
        }
        st.visible = visible;
        // state stays locked so a concurrent register cannot miss the change
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|(_, tx)| tx.send(visible).is_ok());
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().unwrap().visible
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl VisibilitySensor for ManualSensor {
    fn register(&self, listener: UnboundedSender<bool>) -> Subscription {
        let mut st = self.state.lock().unwrap();
        st.next_id += 1;
        let id = st.next_id;
        if st.visible {
            let _ = listener.send(true);
        }
        self.listeners.lock().unwrap().push((id, listener));
        drop(st);
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || {
            listeners.lock().unwrap().retain(|(lid, _)| *lid != id);
        })
    }
}
