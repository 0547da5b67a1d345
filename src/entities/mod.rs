//! sea-orm entities for the fulfillment schema.

pub mod order_item;
pub mod packing_task;
pub mod pick_list;
pub mod pick_list_item;
pub mod product;
pub mod product_stock;
pub mod return_authorization;
pub mod sales_order;
pub mod shipment;
pub mod tenant_sequence;
pub mod user;
pub mod warehouse;
