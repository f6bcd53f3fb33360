//! Trigger sources: what wakes the session loop up.
//!
//! The loop only ever asks for the next trigger and blocks until it arrives,
//! so the OS hook sits behind a one-method trait. Tests drive the loop with
//! a scripted source instead of real key presses.
//!
//! ## Presses while busy
//!
//! [`KeyListenerTrigger`] forwards a press only while the loop is waiting.
//! Presses during a running cycle are dropped instead of queueing up a burst
//! of screenshots, and holding the key (auto-repeat) counts once.

use crate::config::TriggerKey;
use async_trait::async_trait;
use std::time::Instant;

/// One detected trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub key: TriggerKey,
    pub at: Instant,
}

impl TriggerEvent {
    pub fn now(key: TriggerKey) -> Self {
        Self {
            key,
            at: Instant::now(),
        }
    }
}

/// A source of triggers for the session loop.
#[async_trait]
pub trait TriggerSource: Send {
    /// Wait for the next trigger. `None` means the source is gone for good.
    async fn next_trigger(&mut self) -> Option<TriggerEvent>;
}

#[cfg(feature = "desktop")]
pub use listener::KeyListenerTrigger;

#[cfg(feature = "desktop")]
mod listener {
    use super::{TriggerEvent, TriggerSource};
    use crate::config::TriggerKey;
    use crate::error::AppError;
    use async_trait::async_trait;
    use rdev::{listen, Event, EventType, Key};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tracing::{debug, error, info};

    /// Map a configured trigger to the key code the OS hook reports.
    pub(crate) fn rdev_key(key: TriggerKey) -> Result<Key, AppError> {
        let code = match key {
            TriggerKey::CapsLock => Key::CapsLock,
            TriggerKey::ScrollLock => Key::ScrollLock,
            TriggerKey::Pause => Key::Pause,
            TriggerKey::Insert => Key::Insert,
            TriggerKey::Function(n) => match n {
                1 => Key::F1,
                2 => Key::F2,
                3 => Key::F3,
                4 => Key::F4,
                5 => Key::F5,
                6 => Key::F6,
                7 => Key::F7,
                8 => Key::F8,
                9 => Key::F9,
                10 => Key::F10,
                11 => Key::F11,
                12 => Key::F12,
                _ => {
                    return Err(AppError::UnknownTriggerKey {
                        name: key.name(),
                    })
                }
            },
        };
        Ok(code)
    }

    /// Decides which raw key events become triggers.
    pub(crate) struct KeyGate {
        target: Key,
        held: AtomicBool,
        waiting: Arc<AtomicBool>,
    }

    impl KeyGate {
        pub(crate) fn new(target: Key, waiting: Arc<AtomicBool>) -> Self {
            Self {
                target,
                held: AtomicBool::new(false),
                waiting,
            }
        }

        /// True when this event should wake the loop.
        pub(crate) fn on_event(&self, event_type: &EventType) -> bool {
            match event_type {
                EventType::KeyPress(k) if *k == self.target => {
                    let repeat = self.held.swap(true, Ordering::SeqCst);
                    !repeat && self.waiting.swap(false, Ordering::SeqCst)
                }
                EventType::KeyRelease(k) if *k == self.target => {
                    self.held.store(false, Ordering::SeqCst);
                    false
                }
                _ => false,
            }
        }
    }

    /// Global keyboard hook via `rdev`, running on its own thread.
    pub struct KeyListenerTrigger {
        key: TriggerKey,
        rx: UnboundedReceiver<TriggerEvent>,
        waiting: Arc<AtomicBool>,
    }

    impl KeyListenerTrigger {
        /// Install the hook and start listening for `key`.
        ///
        /// If the hook dies later (e.g. accessibility permission revoked),
        /// [`TriggerSource::next_trigger`] returns `None`.
        pub fn spawn(key: TriggerKey) -> Result<Self, AppError> {
            let target = rdev_key(key)?;
            let (tx, rx) = unbounded_channel();
            let waiting = Arc::new(AtomicBool::new(false));
            let gate = KeyGate::new(target, Arc::clone(&waiting));

            std::thread::Builder::new()
                .name("trigger-listener".into())
                .spawn(move || {
                    info!("Listening for '{}' system-wide", key);
                    let callback = move |event: Event| {
                        if gate.on_event(&event.event_type) {
                            debug!("Trigger '{}' pressed", key);
                            let _ = tx.send(TriggerEvent::now(key));
                        }
                    };
                    if let Err(e) = listen(callback) {
                        error!("Key listener failed: {:?}", e);
                    }
                })
                .map_err(|e| AppError::KeyListener(e.to_string()))?;

            Ok(Self { key, rx, waiting })
        }

        pub fn key(&self) -> TriggerKey {
            self.key
        }
    }

    #[async_trait]
    impl TriggerSource for KeyListenerTrigger {
        async fn next_trigger(&mut self) -> Option<TriggerEvent> {
            self.waiting.store(true, Ordering::SeqCst);
            self.rx.recv().await
        }
    }

}
