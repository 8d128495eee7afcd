use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Domain event dropped");
        }
    }
}

/// Domain events emitted after a state change commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    FeePeriodCreated {
        period_id: Uuid,
        name: String,
    },
    ObligationsGenerated {
        period_id: Uuid,
        count: usize,
        total_expected: Decimal,
    },
    FeePeriodClosed {
        period_id: Uuid,
    },
    ObligationPaid {
        obligation_id: Uuid,
        amount: Decimal,
        fully_paid: bool,
    },
    HouseholdMovedOut {
        household_id: Uuid,
    },
    HeadTransferred {
        household_id: Uuid,
        old_head_id: Uuid,
        new_head_id: Uuid,
    },
    NotificationPublished {
        notification_id: Uuid,
        published_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::FeePeriodCreated { .. } => "fee_period_created",
            Event::ObligationsGenerated { .. } => "obligations_generated",
            Event::FeePeriodClosed { .. } => "fee_period_closed",
            Event::ObligationPaid { .. } => "obligation_paid",
            Event::HouseholdMovedOut { .. } => "household_moved_out",
            Event::HeadTransferred { .. } => "head_transferred",
            Event::NotificationPublished { .. } => "notification_published",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ObligationsGenerated {
                period_id,
                count,
                total_expected,
            } => info!(
                event = event.name(),
                %period_id,
                count,
                %total_expected,
                "Obligations generated"
            ),
            Event::ObligationPaid {
                obligation_id,
                amount,
                fully_paid,
            } => info!(
                event = event.name(),
                %obligation_id,
                %amount,
                fully_paid,
                "Payment recorded"
            ),
            other => match serde_json::to_string(other) {
                Ok(payload) => info!(event = other.name(), %payload, "Domain event"),
                Err(e) => warn!(event = other.name(), error = %e, "Unserializable event"),
            },
        }
    }

    info!("Event processing loop stopped");
}
