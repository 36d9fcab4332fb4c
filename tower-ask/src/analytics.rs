use ask_limit::AnalyticsEvent;
use ask_limit::AnalyticsSink;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tokio::sync::mpsc;

/// Counts events on the global OpenTelemetry meter.
///
/// Every event adds one to the `rating_events` counter, with the event name in
/// the `event` attribute and its payload, if any, in `stars` or `reason`.
#[derive(Clone, Debug)]
pub struct MeterAnalytics {
    events: Counter<u64>,
}

impl Default for MeterAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterAnalytics {
    pub fn new() -> Self {
        let meter = global::meter("rating_coordinator");
        Self {
            events: meter.u64_counter("rating_events").build(),
        }
    }
}

impl AnalyticsSink for MeterAnalytics {
    fn record(&self, event: AnalyticsEvent) {
        let mut attributes = vec![KeyValue::new("event", event.name())];
        match event {
            AnalyticsEvent::StarsSelected(stars) => {
                attributes.push(KeyValue::new("stars", i64::from(stars)));
            }
            AnalyticsEvent::NotEligible(reason) => {
                attributes.push(KeyValue::new("reason", reason.as_str()));
            }
            AnalyticsEvent::AskViewed
            | AnalyticsEvent::Dismissed
            | AnalyticsEvent::NativePromptShown => {}
        }
        self.events.add(1, &attributes);
    }
}

/// Forwards events to an unbounded channel, for hosts that ship analytics from
/// their own task.
#[derive(Clone, Debug)]
pub struct ChannelAnalytics {
    tx: mpsc::UnboundedSender<AnalyticsEvent>,
}

impl ChannelAnalytics {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AnalyticsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AnalyticsSink for ChannelAnalytics {
    fn record(&self, event: AnalyticsEvent) {
        // The receiver has gone away; analytics are best effort.
        let _ = self.tx.send(event);
    }
}
