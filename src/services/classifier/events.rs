use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;

/// Receives progress and results from a folder run, in enumeration order.
/// `on_complete` is always the last structured event of a run.
pub trait ClassifyObserver {
    fn on_progress_update(&mut self, _percent: f32) {}
    fn on_status_update(&mut self, _message: &str) {}
    fn on_image_classified(&mut self, _file_name: &str, _label: &str, _confidence: f32) {}
    /// `file_name` is empty for failures that abort the whole run.
    fn on_error(&mut self, _file_name: &str, _message: &str) {}
    fn on_complete(&mut self, _category_counts: &BTreeMap<String, usize>, _processed: usize, _total: usize) {}
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClassifyEvent {
    Progress {
        percent: f32,
    },
    Status {
        message: String,
    },
    Classified {
        file_name: String,
        label: String,
        confidence: f32,
    },
    Error {
        file_name: String,
        message: String,
    },
    Complete {
        category_counts: BTreeMap<String, usize>,
        processed: usize,
        total: usize,
    },
}

/// Forwards every callback as a [`ClassifyEvent`] so a front end can render
/// them on its own task.
pub struct ChannelObserver {
    tx: UnboundedSender<ClassifyEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<ClassifyEvent>) -> Self {
        Self { tx }
    }

    fn emit(&self, event: ClassifyEvent) {
        // The receiver going away only means nobody is watching any more.
        let _ = self.tx.send(event);
    }
}

impl ClassifyObserver for ChannelObserver {
    fn on_progress_update(&mut self, percent: f32) {
        self.emit(ClassifyEvent::Progress { percent });
    }

    fn on_status_update(&mut self, message: &str) {
        self.emit(ClassifyEvent::Status {
            message: message.to_string(),
        });
    }

    fn on_image_classified(&mut self, file_name: &str, label: &str, confidence: f32) {
        self.emit(ClassifyEvent::Classified {
            file_name: file_name.to_string(),
            label: label.to_string(),
            confidence,
        });
    }

    fn on_error(&mut self, file_name: &str, message: &str) {
        self.emit(ClassifyEvent::Error {
            file_name: file_name.to_string(),
            message: message.to_string(),
        });
    }

    fn on_complete(&mut self, category_counts: &BTreeMap<String, usize>, processed: usize, total: usize) {
        self.emit(ClassifyEvent::Complete {
            category_counts: category_counts.clone(),
            processed,
            total,
        });
    }
}

/// Collects events in memory; handy for tests and batch callers.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<ClassifyEvent>,
}

impl ClassifyObserver for RecordingObserver {
    fn on_progress_update(&mut self, percent: f32) {
        self.events.push(ClassifyEvent::Progress { percent });
    }

    fn on_status_update(&mut self, message: &str) {
        self.events.push(ClassifyEvent::Status {
            message: message.to_string(),
        });
    }

    fn on_image_classified(&mut self, file_name: &str, label: &str, confidence: f32) {
        self.events.push(ClassifyEvent::Classified {
            file_name: file_name.to_string(),
            label: label.to_string(),
            confidence,
        });
    }

    fn on_error(&mut self, file_name: &str, message: &str) {
        self.events.push(ClassifyEvent::Error {
            file_name: file_name.to_string(),
            message: message.to_string(),
        });
    }

    fn on_complete(&mut self, category_counts: &BTreeMap<String, usize>, processed: usize, total: usize) {
        self.events.push(ClassifyEvent::Complete {
            category_counts: category_counts.clone(),
            processed,
            total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn channel_observer_preserves_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut observer = ChannelObserver::new(tx);

        observer.on_progress_update(0.0);
        observer.on_image_classified("a.jpg", "foods", 0.9);
        observer.on_error("b.jpg", "corrupt");
        observer.on_complete(&BTreeMap::new(), 1, 2);
        drop(observer);

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 4);
        assert_eq!(received[0], ClassifyEvent::Progress { percent: 0.0 });
        assert!(matches!(received[3], ClassifyEvent::Complete { processed: 1, total: 2, .. }));
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(ClassifyEvent::Error {
            file_name: String::new(),
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["file_name"], "");
    }

    #[test]
    fn send_after_receiver_dropped_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut observer = ChannelObserver::new(tx);
        observer.on_status_update("nobody listening");
    }
}
