pub mod auth;
pub mod common;
pub mod orders;
pub mod packing;
pub mod pick_lists;
pub mod returns;
pub mod shipments;
pub mod stock;
pub mod users;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    orders::OrderService, packing::PackingService, picking::PickingService,
    returns::ReturnService, shipments::ShipmentService, stock::StockService, users::UserService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub picking: Arc<PickingService>,
    pub packing: Arc<PackingService>,
    pub shipments: Arc<ShipmentService>,
    pub returns: Arc<ReturnService>,
    pub stock: Arc<StockService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), event_sender.clone())),
            picking: Arc::new(PickingService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.picking,
            )),
            packing: Arc::new(PackingService::new(db_pool.clone(), event_sender.clone())),
            shipments: Arc::new(ShipmentService::new(db_pool.clone(), event_sender.clone())),
            returns: Arc::new(ReturnService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.returns,
            )),
            stock: Arc::new(StockService::new(db_pool.clone(), event_sender.clone())),
            users: Arc::new(UserService::new(db_pool, event_sender)),
        }
    }
}
