//! Latest-value handoff of the flow signal from the detector's callback
//! thread to the tick that drives the wheel.
//!
//! The producer never blocks and never fails: publishing into a relay whose
//! consumer has gone away is silently ignored.  The consumer drains the whole
//! queue each tick and acts only on the newest value.

use crossbeam_channel::{unbounded, Receiver, Sender};
use hand_flow::{extract_flow, DetectionResult};
use tracing::trace;

use crate::detector::ResultCallback;

/// One detection outcome and the flow computed from it.
#[derive(Clone, Debug)]
pub struct FlowEvent {
    pub result:       DetectionResult,
    pub flow:         f32,
    pub timestamp_ms: i64,
}

pub fn flow_relay() -> (FlowPublisher, FlowRelay) {
    let (tx, rx) = unbounded();
    (FlowPublisher { tx }, FlowRelay { rx, handlers: Vec::new() })
}

#[derive(Clone, Debug)]
pub struct FlowPublisher {
    tx: Sender<FlowEvent>,
}

impl FlowPublisher {
    /// Returns `false` when the consumer is gone.
    pub fn publish(&self, event: FlowEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Compute flow from `result` and publish it.
    pub fn publish_result(&self, result: DetectionResult, timestamp_ms: i64) -> f32 {
        let flow = extract_flow(&result.hands);
        if !self.publish(FlowEvent { result, flow, timestamp_ms }) {
            trace!(timestamp_ms, "flow relay has no consumer; event dropped");
        }
        flow
    }

    /// Result callback for a live-stream detector.
    pub fn stream_callback(&self) -> ResultCallback {
        let publisher = self.clone();
        Box::new(move |result, _image, timestamp_ms| {
            publisher.publish_result(result, timestamp_ms);
        })
    }
}

type Handler = Box<dyn FnMut(&FlowEvent)>;

pub struct FlowRelay {
    rx:       Receiver<FlowEvent>,
    handlers: Vec<Handler>,
}

impl FlowRelay {
    /// Register a handler run, in the draining context, for every event.
    pub fn subscribe(&mut self, handler: impl FnMut(&FlowEvent) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Drain everything queued; the newest event, if any.
    pub fn drain_latest_event(&mut self) -> Option<FlowEvent> {
        let mut latest = None;
        for event in self.rx.try_iter() {
            for h in self.handlers.iter_mut() {
                h(&event);
            }
            latest = Some(event);
        }
        latest
    }

    /// Drain everything queued; the newest flow value, if any.
    pub fn drain_latest(&mut self) -> Option<f32> {
        self.drain_latest_event().map(|e| e.flow)
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn event(flow: f32, ts: i64) -> FlowEvent {
        FlowEvent { result: DetectionResult::default(), flow, timestamp_ms: ts }
    }

    #[test]
    fn empty_drain_is_none() {
        let (_tx, mut rx) = flow_relay();
        assert_eq!(rx.drain_latest(), None);
    }

    #[test]
    fn only_newest_survives() {
        let (tx, mut rx) = flow_relay();
        for (i, f) in [0.1, 0.7, 0.3].into_iter().enumerate() {
            tx.publish(event(f, i as i64));
        }
        assert_eq!(rx.pending(), 3);
        assert_eq!(rx.drain_latest(), Some(0.3));
        assert_eq!(rx.drain_latest(), None);
    }

    #[test]
    fn handlers_see_every_event() {
        let (tx, mut rx) = flow_relay();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        rx.subscribe(move |_| s.set(s.get() + 1));
        tx.publish(event(0.2, 1));
        tx.publish(event(0.4, 2));
        let last = rx.drain_latest_event().unwrap();
        assert_eq!(last.timestamp_ms, 2);
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn publish_without_consumer_is_harmless() {
        let (tx, rx) = flow_relay();
        drop(rx);
        assert!(!tx.publish(event(0.5, 0)));
        assert_eq!(tx.publish_result(DetectionResult::default(), 1), 0.0);
    }

    #[test]
    fn stream_callback_from_another_thread() {
        let (tx, mut rx) = flow_relay();
        let mut cb = tx.stream_callback();
        std::thread::spawn(move || {
            cb(DetectionResult::default(), crate::Image::cpu(0, 0, Vec::new()), 42);
        })
        .join()
        .unwrap();
        let e = rx.drain_latest_event().unwrap();
        assert_eq!(e.timestamp_ms, 42);
        assert_eq!(e.flow, 0.0);
    }
}
