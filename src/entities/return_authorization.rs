use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Lifecycle of a return merchandise authorization. See [`ReturnStatus::apply`] for the
/// allowed moves; `CLOSED` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    #[sea_orm(string_value = "RMA_CREATED")]
    RmaCreated,
    #[sea_orm(string_value = "AWAITING_RETURN")]
    AwaitingReturn,
    #[sea_orm(string_value = "RECEIVED")]
    Received,
    #[sea_orm(string_value = "IN_INSPECTION")]
    InInspection,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "REFUNDED")]
    Refunded,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

/// Result of inspecting returned goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionOutcome {
    Approved,
    Rejected,
}

impl FromStr for InspectionOutcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "APPROVED" => Ok(InspectionOutcome::Approved),
            "REJECTED" => Ok(InspectionOutcome::Rejected),
            other => Err(format!(
                "Inspection outcome must be APPROVED or REJECTED, got '{}'",
                other
            )),
        }
    }
}

/// Every operation that moves an RMA between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnTransition {
    MarkAwaitingReturn,
    Receive,
    StartInspection,
    Inspect(InspectionOutcome),
    Refund,
    Close,
}

impl ReturnTransition {
    pub const ALL: [ReturnTransition; 7] = [
        ReturnTransition::MarkAwaitingReturn,
        ReturnTransition::Receive,
        ReturnTransition::StartInspection,
        ReturnTransition::Inspect(InspectionOutcome::Approved),
        ReturnTransition::Inspect(InspectionOutcome::Rejected),
        ReturnTransition::Refund,
        ReturnTransition::Close,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReturnTransition::MarkAwaitingReturn => "mark_awaiting_return",
            ReturnTransition::Receive => "receive_item",
            ReturnTransition::StartInspection => "start_inspection",
            ReturnTransition::Inspect(_) => "inspect",
            ReturnTransition::Refund => "process_refund",
            ReturnTransition::Close => "close",
        }
    }
}

impl ReturnStatus {
    /// Applies a transition, returning the next status or `None` when the pair is not allowed.
    pub fn apply(self, transition: ReturnTransition) -> Option<ReturnStatus> {
        use ReturnStatus::*;
        use ReturnTransition::*;

        match (self, transition) {
            (RmaCreated, MarkAwaitingReturn) => Some(AwaitingReturn),
            (RmaCreated | AwaitingReturn, Receive) => Some(Received),
            (Received, StartInspection) => Some(InInspection),
            (Received | InInspection, Inspect(InspectionOutcome::Approved)) => Some(Approved),
            (Received | InInspection, Inspect(InspectionOutcome::Rejected)) => Some(Rejected),
            (Approved, Refund) => Some(Refunded),
            (Refunded | Rejected, Close) => Some(Closed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ReturnStatus::Closed
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "returns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub rma_number: String,
    pub sales_order_id: Uuid,
    pub shipment_id: Uuid,
    pub customer_id: Uuid,
    pub status: ReturnStatus,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub return_type: Option<String>,
    pub recovery_value: Option<Decimal>,
    pub refund_amount: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub received_at: Option<DateTime<Utc>>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Notes with `addition` appended on a new line.
    pub fn notes_with(&self, addition: Option<&str>) -> Option<String> {
        match (self.notes.as_deref(), addition.map(str::trim)) {
            (existing, None) | (existing, Some("")) => existing.map(str::to_owned),
            (None, Some(added)) => Some(added.to_owned()),
            (Some(existing), Some(added)) => Some(format!("{}\n{}", existing, added)),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sales_order::Entity",
        from = "Column::SalesOrderId",
        to = "super::sales_order::Column::Id"
    )]
    SalesOrder,
    #[sea_orm(
        belongs_to = "super::shipment::Entity",
        from = "Column::ShipmentId",
        to = "super::shipment::Column::Id"
    )]
    Shipment,
}

impl Related<super::sales_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesOrder.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
