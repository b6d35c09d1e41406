//! Connectivity gate shared by every fetch loop and socket

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Gates realtime connectivity on the host's UI state.
///
/// `connectivity_allowed` is true only while the hosting view is visible,
/// focused, and actually on the chat screen. The host forwards its own
/// visibility/focus/navigation events through the setters; the supervisor
/// only publishes the derived flag. It never opens or closes anything
/// itself: consumers watch the flag and manage their own connections.
pub struct ConnectionSupervisor {
    visible: AtomicBool,
    focused: AtomicBool,
    on_chat_screen: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ConnectionSupervisor {
    /// Visibility and focus start true (a freshly launched host is in the
    /// foreground); the route flag starts false until the host reports that
    /// the chat screen is active.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            visible: AtomicBool::new(true),
            focused: AtomicBool::new(true),
            on_chat_screen: AtomicBool::new(false),
            tx,
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
        self.recompute();
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
        self.recompute();
    }

    /// Report whether the host currently shows the chat screen.
    pub fn set_route(&self, on_chat_screen: bool) {
        self.on_chat_screen.store(on_chat_screen, Ordering::SeqCst);
        self.recompute();
    }

    /// Current value of the gate.
    pub fn connectivity_allowed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver that wakes on every transition of the gate (and only on
    /// transitions).
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    fn recompute(&self) {
        let allowed = self.visible.load(Ordering::SeqCst)
            && self.focused.load(Ordering::SeqCst)
            && self.on_chat_screen.load(Ordering::SeqCst);
        self.tx.send_if_modified(|current| {
            if *current != allowed {
                *current = allowed;
                true
            } else {
                false
            }
        });
    }
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_requires_all_three_inputs() {
        let s = ConnectionSupervisor::new();
        assert!(!s.connectivity_allowed());

        s.set_route(true);
        assert!(s.connectivity_allowed());

        s.set_visible(false);
        assert!(!s.connectivity_allowed());
        s.set_visible(true);
        assert!(s.connectivity_allowed());

        s.set_focused(false);
        assert!(!s.connectivity_allowed());
        s.set_focused(true);
        assert!(s.connectivity_allowed());

        s.set_route(false);
        assert!(!s.connectivity_allowed());
    }

    #[test]
    fn test_watch_wakes_only_on_transition() {
        let s = ConnectionSupervisor::new();
        let mut rx = s.watch();
        assert!(!rx.has_changed().unwrap());

        // Still false: visible was already true, no transition.
        s.set_visible(true);
        assert!(!rx.has_changed().unwrap());

        // false -> true
        s.set_route(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        // true -> true is not a transition
        s.set_focused(true);
        assert!(!rx.has_changed().unwrap());

        // true -> false
        s.set_focused(false);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }
}
