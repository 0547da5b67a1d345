use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::metrics;

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
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event for a transaction that already committed. Delivery failures are
    /// logged and never surface to the caller.
    pub async fn emit(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Domain events published after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Event {
    OrderCreated {
        company_id: Uuid,
        order_id: Uuid,
        order_number: String,
    },
    OrderUpdated {
        company_id: Uuid,
        order_id: Uuid,
    },
    OrderDeleted {
        company_id: Uuid,
        order_id: Uuid,
    },
    PickListCreated {
        company_id: Uuid,
        order_id: Uuid,
        pick_list_id: Uuid,
    },
    PickerAssigned {
        pick_list_id: Uuid,
        picker_id: Uuid,
    },
    PickingStarted {
        pick_list_id: Uuid,
        order_id: Uuid,
    },
    ItemPicked {
        pick_list_item_id: Uuid,
        quantity_picked: i32,
    },
    PickingCompleted {
        pick_list_id: Uuid,
        order_id: Uuid,
    },
    PackerAssigned {
        packing_task_id: Uuid,
        packer_id: Uuid,
    },
    PackingStarted {
        packing_task_id: Uuid,
        order_id: Uuid,
    },
    OrderPacked {
        packing_task_id: Uuid,
        order_id: Uuid,
    },
    ShipmentCreated {
        shipment_id: Uuid,
        order_id: Uuid,
    },
    ShipmentUpdated {
        shipment_id: Uuid,
    },
    OrderDelivered {
        shipment_id: Uuid,
        order_id: Uuid,
    },
    ReturnCreated {
        return_id: Uuid,
        rma_number: String,
        order_id: Uuid,
    },
    ReturnTransitioned {
        return_id: Uuid,
        from: String,
        to: String,
    },
    ReturnRefunded {
        return_id: Uuid,
        amount: Decimal,
    },
    StockAdjusted {
        product_id: Uuid,
        warehouse_id: Uuid,
        delta: i32,
        new_quantity: i32,
    },
    UserCreated {
        user_id: Uuid,
        company_id: Option<Uuid>,
    },
}

impl Event {
    /// Stable snake_case name, used as the metrics key.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Drains the event channel, logging each event and counting it.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        let name = event.name();
        metrics::increment_counter(&format!("events_{}_total", name));

        match &event {
            Event::ReturnTransitioned { return_id, from, to } => {
                info!(event = name, %return_id, %from, %to, "return transitioned");
            }
            Event::StockAdjusted {
                product_id,
                warehouse_id,
                delta,
                new_quantity,
            } => {
                info!(event = name, %product_id, %warehouse_id, delta, new_quantity, "stock adjusted");
            }
            other => {
                info!(event = name, payload = ?other, "domain event");
            }
        }
    }

    warn!("Event processing loop has ended");
}
