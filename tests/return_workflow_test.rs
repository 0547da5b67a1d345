mod common;

use assert_matches::assert_matches;
use chrono::{Datelike, Utc};
use common::TestApp;
use futures::future::join_all;
use rust_decimal_macros::dec;
use std::collections::HashSet;

use fulfillment_api::{
    entities::{
        packing_task::PackingStatus, pick_list::PickListStatus,
        return_authorization::ReturnStatus, sales_order::OrderStatus,
    },
    errors::ServiceError,
    services::returns::{CreateReturnInput, InspectReturnInput, RefundInput},
    services::stock::StockLedger,
};

fn rma_for(order_id: uuid::Uuid, shipment_id: uuid::Uuid) -> CreateReturnInput {
    CreateReturnInput {
        sales_order_id: order_id,
        shipment_id,
        reason: "Arrived damaged".into(),
        return_type: Some("refund".into()),
        notes: None,
    }
}

fn inspection(outcome: &str) -> InspectReturnInput {
    InspectReturnInput {
        outcome: outcome.into(),
        recovery_value: Some(dec!(20.00)),
        notes: Some("box crushed, contents fine".into()),
    }
}

#[tokio::test]
async fn order_to_refund_end_to_end() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let tenant = &app.tenant;

    let details = app.create_order(tenant, &[(3, 2), (5, 1)]).await;
    let order = &details.order;
    assert_eq!(order.total_amount, dec!(45.00));
    assert_eq!(order.status, OrderStatus::PickListCreated);

    let pick_list = services
        .picking
        .get_for_order(&tenant.admin(), order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pick_list.pick_list.status, PickListStatus::Pending);
    let mut required: Vec<i32> = pick_list.items.iter().map(|i| i.quantity_required).collect();
    required.sort();
    assert_eq!(required, vec![1, 2]);

    let task = app.packing_task_for(order.id).await;
    services
        .packing
        .assign_packer(&tenant.manager(), task.id, tenant.packer.id)
        .await
        .unwrap();
    let packed = services
        .packing
        .complete_packing(&tenant.packer(), task.id)
        .await
        .unwrap();
    assert_eq!(packed.status, PackingStatus::Completed);

    let shipped = app.ship(tenant, order.id).await;
    let (shipments, _) = services
        .shipments
        .list_shipments(&tenant.admin(), Some(order.id), 1, 20)
        .await
        .unwrap();
    assert_eq!(shipments.len(), 1);

    services
        .shipments
        .mark_delivered(&tenant.manager(), shipped.id)
        .await
        .unwrap();
    let delivered = services
        .orders
        .get_order(&tenant.admin(), order.id)
        .await
        .unwrap()
        .order;
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let returns = &services.returns;
    let rma = returns
        .create_rma(&tenant.inventory(), rma_for(order.id, shipped.id))
        .await
        .unwrap();
    assert_eq!(rma.status, ReturnStatus::RmaCreated);
    assert_eq!(rma.rma_number, format!("RMA-{}-0001", Utc::now().year()));
    assert_eq!(rma.customer_id, order.customer_id);
    assert_eq!(rma.created_by, tenant.inventory.id);

    let received = returns.receive_item(&tenant.inventory(), rma.id).await.unwrap();
    assert_eq!(received.status, ReturnStatus::Received);
    assert!(received.received_at.is_some());

    let approved = returns
        .inspect_rma(&tenant.inventory(), rma.id, inspection("APPROVED"))
        .await
        .unwrap();
    assert_eq!(approved.status, ReturnStatus::Approved);
    assert_eq!(approved.recovery_value, Some(dec!(20.00)));
    assert!(approved.inspected_at.is_some());
    assert_eq!(approved.notes.as_deref(), Some("box crushed, contents fine"));

    let refunded = returns
        .process_refund(&tenant.admin(), rma.id, RefundInput { amount: dec!(45.00) })
        .await
        .unwrap();
    assert_eq!(refunded.status, ReturnStatus::Refunded);
    assert_eq!(refunded.refund_amount, Some(dec!(45.00)));
    assert!(refunded.completed_at.is_some());

    let closed = returns.close_rma(&tenant.inventory(), rma.id).await.unwrap();
    assert_eq!(closed.status, ReturnStatus::Closed);

    assert_matches!(
        returns.mark_awaiting_return(&tenant.inventory(), rma.id).await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        returns.receive_item(&tenant.inventory(), rma.id).await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        returns.start_inspection(&tenant.inventory(), rma.id).await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        returns
            .inspect_rma(&tenant.inventory(), rma.id, inspection("REJECTED"))
            .await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        returns
            .process_refund(&tenant.admin(), rma.id, RefundInput { amount: dec!(1) })
            .await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        returns.close_rma(&tenant.inventory(), rma.id).await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn returns_need_a_delivered_order_and_its_own_shipment() {
    let app = TestApp::new().await;
    let returns = &app.state.services.returns;
    let tenant = &app.tenant;

    let order = app.create_order(tenant, &[(1, 1)]).await.order;
    app.pack(tenant, order.id).await;
    let shipped = app.ship(tenant, order.id).await;
    let not_delivered = returns
        .create_rma(&tenant.inventory(), rma_for(order.id, shipped.id))
        .await;
    assert_matches!(not_delivered, Err(ServiceError::InvalidState(_)));

    let (first, first_shipment) = app.delivered_order(tenant, &[(1, 1)]).await;
    let (_, second_shipment) = app.delivered_order(tenant, &[(2, 1)]).await;
    let mismatched = returns
        .create_rma(&tenant.inventory(), rma_for(first.order.id, second_shipment.id))
        .await;
    assert_matches!(mismatched, Err(ServiceError::ValidationError(_)));

    let missing_reason = returns
        .create_rma(
            &tenant.inventory(),
            CreateReturnInput {
                reason: String::new(),
                ..rma_for(first.order.id, first_shipment.id)
            },
        )
        .await;
    assert_matches!(missing_reason, Err(ServiceError::ValidationError(_)));

    let picker = returns
        .create_rma(&tenant.picker(), rma_for(first.order.id, first_shipment.id))
        .await;
    assert_matches!(picker, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn rejected_returns_close_without_refund() {
    let app = TestApp::new().await;
    let returns = &app.state.services.returns;
    let tenant = &app.tenant;
    let (details, shipped) = app.delivered_order(tenant, &[(4, 1)]).await;

    let rma = returns
        .create_rma(&tenant.manager(), rma_for(details.order.id, shipped.id))
        .await
        .unwrap();
    let awaiting = returns
        .mark_awaiting_return(&tenant.manager(), rma.id)
        .await
        .unwrap();
    assert_eq!(awaiting.status, ReturnStatus::AwaitingReturn);

    assert_matches!(
        returns.start_inspection(&tenant.manager(), rma.id).await,
        Err(ServiceError::InvalidState(_))
    );

    returns.receive_item(&tenant.manager(), rma.id).await.unwrap();
    let inspecting = returns
        .start_inspection(&tenant.manager(), rma.id)
        .await
        .unwrap();
    assert_eq!(inspecting.status, ReturnStatus::InInspection);

    let rejected = returns
        .inspect_rma(&tenant.manager(), rma.id, inspection(" REJECTED "))
        .await
        .unwrap();
    assert_eq!(rejected.status, ReturnStatus::Rejected);

    let refund = returns
        .process_refund(&tenant.admin(), rma.id, RefundInput { amount: dec!(10) })
        .await;
    assert_matches!(refund, Err(ServiceError::InvalidState(_)));

    let closed = returns.close_rma(&tenant.manager(), rma.id).await.unwrap();
    assert_eq!(closed.status, ReturnStatus::Closed);
    assert_eq!(closed.refund_amount, None);
}

#[tokio::test]
async fn inspection_and_refund_inputs_are_checked() {
    let app = TestApp::new().await;
    let returns = &app.state.services.returns;
    let tenant = &app.tenant;
    let (details, shipped) = app.delivered_order(tenant, &[(3, 2), (5, 1)]).await;
    let rma = returns
        .create_rma(&tenant.inventory(), rma_for(details.order.id, shipped.id))
        .await
        .unwrap();
    returns.receive_item(&tenant.inventory(), rma.id).await.unwrap();

    let unknown = returns
        .inspect_rma(&tenant.inventory(), rma.id, inspection("approved"))
        .await;
    assert_matches!(unknown, Err(ServiceError::ValidationError(_)));

    let negative_recovery = returns
        .inspect_rma(
            &tenant.inventory(),
            rma.id,
            InspectReturnInput {
                recovery_value: Some(dec!(-1)),
                ..inspection("APPROVED")
            },
        )
        .await;
    assert_matches!(negative_recovery, Err(ServiceError::ValidationError(_)));

    let early_refund = returns
        .process_refund(&tenant.admin(), rma.id, RefundInput { amount: dec!(10) })
        .await;
    assert_matches!(early_refund, Err(ServiceError::InvalidState(_)));

    returns
        .inspect_rma(&tenant.inventory(), rma.id, inspection("APPROVED"))
        .await
        .unwrap();

    let not_allowed = returns
        .process_refund(&tenant.inventory(), rma.id, RefundInput { amount: dec!(10) })
        .await;
    assert_matches!(not_allowed, Err(ServiceError::Forbidden(_)));
    let negative = returns
        .process_refund(&tenant.admin(), rma.id, RefundInput { amount: dec!(-5) })
        .await;
    assert_matches!(negative, Err(ServiceError::ValidationError(_)));
    let too_much = returns
        .process_refund(&tenant.admin(), rma.id, RefundInput { amount: dec!(45.50) })
        .await;
    assert_matches!(too_much, Err(ServiceError::ValidationError(_)));

    let still_approved = returns.get_return(&tenant.viewer(), rma.id).await.unwrap();
    assert_eq!(still_approved.status, ReturnStatus::Approved);
    assert_eq!(still_approved.refund_amount, None);

    let partial = returns
        .process_refund(&tenant.admin(), rma.id, RefundInput { amount: dec!(20.00) })
        .await
        .unwrap();
    assert_eq!(partial.refund_amount, Some(dec!(20.00)));
}

#[tokio::test]
async fn approved_returns_restock_when_enabled() {
    let app = TestApp::with_config(|cfg| cfg.returns.restock_on_approval = true).await;
    let tenant = &app.tenant;
    let stock = &app.state.services.stock;
    let (details, shipped) = app.delivered_order(tenant, &[(3, 2), (5, 1)]).await;

    let before = stock
        .available(&tenant.viewer(), tenant.product(3), tenant.warehouse.id)
        .await
        .unwrap();
    assert_eq!(before, 0);

    let returns = &app.state.services.returns;
    let rma = returns
        .create_rma(&tenant.inventory(), rma_for(details.order.id, shipped.id))
        .await
        .unwrap();
    returns.receive_item(&tenant.inventory(), rma.id).await.unwrap();
    returns
        .inspect_rma(&tenant.inventory(), rma.id, inspection("APPROVED"))
        .await
        .unwrap();

    let p3 = stock
        .available(&tenant.viewer(), tenant.product(3), tenant.warehouse.id)
        .await
        .unwrap();
    let p5 = stock
        .get_level(&tenant.viewer(), tenant.product(5), tenant.warehouse.id)
        .await
        .unwrap()
        .expect("stock cell created on restock");
    assert_eq!(p3, 2);
    assert_eq!(p5.quantity, 1);
}

#[tokio::test]
async fn rejected_returns_never_restock() {
    let app = TestApp::with_config(|cfg| cfg.returns.restock_on_approval = true).await;
    let tenant = &app.tenant;
    let (details, shipped) = app.delivered_order(tenant, &[(1, 3)]).await;
    let returns = &app.state.services.returns;
    let rma = returns
        .create_rma(&tenant.inventory(), rma_for(details.order.id, shipped.id))
        .await
        .unwrap();
    returns.receive_item(&tenant.inventory(), rma.id).await.unwrap();
    returns
        .inspect_rma(&tenant.inventory(), rma.id, inspection("REJECTED"))
        .await
        .unwrap();

    let level = app
        .state
        .services
        .stock
        .get_level(&tenant.viewer(), tenant.product(1), tenant.warehouse.id)
        .await
        .unwrap();
    assert!(level.is_none());
}

#[tokio::test]
async fn one_return_per_order_and_shipment() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let returns = &app.state.services.returns;
    let (details, shipped) = app.delivered_order(tenant, &[(3, 2), (5, 1)]).await;

    let first = returns
        .create_rma(&tenant.inventory(), rma_for(details.order.id, shipped.id))
        .await
        .unwrap();
    let again = returns
        .create_rma(&tenant.manager(), rma_for(details.order.id, shipped.id))
        .await;
    assert_matches!(again, Err(ServiceError::Conflict(_)));

    returns.receive_item(&tenant.inventory(), first.id).await.unwrap();
    returns
        .inspect_rma(&tenant.inventory(), first.id, inspection("APPROVED"))
        .await
        .unwrap();
    returns
        .process_refund(
            &tenant.admin(),
            first.id,
            RefundInput {
                amount: details.order.total_amount,
            },
        )
        .await
        .unwrap();

    let after_refund = returns
        .create_rma(&tenant.inventory(), rma_for(details.order.id, shipped.id))
        .await;
    assert_matches!(after_refund, Err(ServiceError::Conflict(_)));

    let (all, total) = returns
        .list_returns(&tenant.viewer(), None, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(all[0].id, first.id);
    assert_eq!(all[0].status, ReturnStatus::Refunded);

    // The rejected attempts did not burn numbers
    let (next_details, next_shipped) = app.delivered_order(tenant, &[(1, 1)]).await;
    let next = returns
        .create_rma(&tenant.inventory(), rma_for(next_details.order.id, next_shipped.id))
        .await
        .unwrap();
    assert_eq!(next.rma_number, format!("RMA-{}-0002", Utc::now().year()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rmas_get_distinct_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("returns.db").display());
    let app = TestApp::with_config(|cfg| {
        cfg.database_url = url;
        cfg.db_max_connections = 8;
    })
    .await;
    let tenant = &app.tenant;
    let returns = &app.state.services.returns;
    let caller = tenant.inventory();

    let mut delivered = Vec::new();
    for _ in 0..8 {
        delivered.push(app.delivered_order(tenant, &[(1, 1)]).await);
    }

    let attempts = delivered.iter().map(|(details, shipped)| {
        let returns = returns.clone();
        let caller = caller.clone();
        let input = rma_for(details.order.id, shipped.id);
        tokio::spawn(async move { returns.create_rma(&caller, input).await })
    });
    let created: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completed"))
        .map(|result| {
            assert!(
                !matches!(result, Err(ServiceError::DatabaseError(_))),
                "database error under concurrency: {:?}",
                result
            );
            result.expect("rma created")
        })
        .collect();

    let numbers: HashSet<String> = created.iter().map(|r| r.rma_number.clone()).collect();
    assert_eq!(numbers.len(), 8);
    let year = Utc::now().year();
    for n in 1..=8 {
        assert!(numbers.contains(&format!("RMA-{}-{:04}", year, n)));
    }

    let (other_details, other_shipment) = app.delivered_order(&app.other, &[(1, 1)]).await;
    let elsewhere = returns
        .create_rma(
            &app.other.inventory(),
            rma_for(other_details.order.id, other_shipment.id),
        )
        .await
        .unwrap();
    assert_eq!(elsewhere.rma_number, format!("RMA-{}-0001", year));
}

#[tokio::test]
async fn list_returns_filters_by_status() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let returns = &app.state.services.returns;
    let (details, shipped) = app.delivered_order(tenant, &[(1, 1)]).await;
    let (second, second_shipped) = app.delivered_order(tenant, &[(2, 1)]).await;
    let first = returns
        .create_rma(&tenant.inventory(), rma_for(details.order.id, shipped.id))
        .await
        .unwrap();
    returns
        .create_rma(&tenant.inventory(), rma_for(second.order.id, second_shipped.id))
        .await
        .unwrap();
    returns.receive_item(&tenant.inventory(), first.id).await.unwrap();

    let (received, total) = returns
        .list_returns(&tenant.viewer(), Some(ReturnStatus::Received), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(received[0].id, first.id);

    let (all, total) = returns
        .list_returns(&tenant.viewer(), None, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);
}
