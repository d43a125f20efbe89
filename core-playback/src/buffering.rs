//! Reduces engine readiness signals to a [`BufferingState`].
//!
//! The most recent signal wins: *stalled* means `Delayed`, *ready* means
//! `Ready`. Repeated signals that do not change the state are swallowed so
//! observers only see edges.

use bridge_traits::{BufferingState, MediaEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferingMonitor {
    state: BufferingState,
}

impl BufferingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BufferingState {
        self.state
    }

    /// Feed an engine event. Returns the new state when it changed; events
    /// that carry no readiness information are ignored.
    pub fn observe(&mut self, event: &MediaEvent) -> Option<BufferingState> {
        match event {
            MediaEvent::Ready => self.transition(BufferingState::Ready),
            MediaEvent::Stalled => self.transition(BufferingState::Delayed),
            _ => None,
        }
    }

    /// Forget readiness, e.g. when playback stops or a new load begins.
    pub fn reset(&mut self) -> Option<BufferingState> {
        self.transition(BufferingState::Unknown)
    }

    fn transition(&mut self, next: BufferingState) -> Option<BufferingState> {
        if self.state == next {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_edges_only() {
        let mut monitor = BufferingMonitor::new();
        assert_eq!(monitor.state(), BufferingState::Unknown);

        assert_eq!(
            monitor.observe(&MediaEvent::Stalled),
            Some(BufferingState::Delayed)
        );
        assert_eq!(monitor.observe(&MediaEvent::Stalled), None);
        assert_eq!(
            monitor.observe(&MediaEvent::Ready),
            Some(BufferingState::Ready)
        );
        assert_eq!(monitor.observe(&MediaEvent::Ready), None);
    }

    #[test]
    fn test_latest_signal_wins() {
        let mut monitor = BufferingMonitor::new();
        for event in [
            MediaEvent::Ready,
            MediaEvent::Stalled,
            MediaEvent::Ready,
            MediaEvent::Stalled,
        ] {
            monitor.observe(&event);
        }
        assert_eq!(monitor.state(), BufferingState::Delayed);
    }

    #[test]
    fn test_non_readiness_events_ignored() {
        let mut monitor = BufferingMonitor::new();
        monitor.observe(&MediaEvent::Ready);
        assert_eq!(monitor.observe(&MediaEvent::ReachedEnd), None);
        assert_eq!(
            monitor.observe(&MediaEvent::Progress {
                position: Duration::from_secs(3)
            }),
            None
        );
        assert_eq!(monitor.observe(&MediaEvent::failed("boom")), None);
        assert_eq!(monitor.state(), BufferingState::Ready);
    }

    #[test]
    fn test_reset() {
        let mut monitor = BufferingMonitor::new();
        assert_eq!(monitor.reset(), None);
        monitor.observe(&MediaEvent::Ready);
        assert_eq!(monitor.reset(), Some(BufferingState::Unknown));
    }
}
