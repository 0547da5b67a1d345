mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::{seed_user, TestApp};
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};

use fulfillment_api::{
    auth::Role,
    entities::{
        packing_task::{self, PackingStatus},
        pick_list::PickListStatus,
        sales_order::{self, OrderStatus},
    },
    errors::ServiceError,
    services::picking::PickListDetails,
};

async fn pick_list_of(app: &TestApp, order_id: uuid::Uuid) -> PickListDetails {
    app.state
        .services
        .picking
        .get_for_order(&app.tenant.admin(), order_id)
        .await
        .unwrap()
        .expect("order has a pick list")
}

async fn order_status(app: &TestApp, order_id: uuid::Uuid) -> OrderStatus {
    app.state
        .services
        .orders
        .get_order(&app.tenant.admin(), order_id)
        .await
        .unwrap()
        .order
        .status
}

#[tokio::test]
async fn picking_moves_the_order_forward() {
    let app = TestApp::new().await;
    let picking = &app.state.services.picking;
    let order = app.create_order(&app.tenant, &[(3, 2), (5, 1)]).await.order;
    let list = pick_list_of(&app, order.id).await;

    let assigned = picking
        .assign_picker(&app.tenant.manager(), list.pick_list.id, app.tenant.picker.id)
        .await
        .unwrap();
    assert_eq!(assigned.assigned_to, Some(app.tenant.picker.id));

    let started = picking
        .start_picking(&app.tenant.picker(), list.pick_list.id)
        .await
        .unwrap();
    assert_eq!(started.status, PickListStatus::InProgress);
    assert!(started.started_at.is_some());
    assert_eq!(order_status(&app, order.id).await, OrderStatus::Picking);

    for item in &list.items {
        let picked = picking
            .record_pick(&app.tenant.picker(), item.id, item.quantity_required)
            .await
            .unwrap();
        assert_eq!(picked.quantity_picked, item.quantity_required);
    }

    let completed = picking
        .complete_picking(&app.tenant.picker(), list.pick_list.id)
        .await
        .unwrap();
    assert_eq!(completed.status, PickListStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(order_status(&app, order.id).await, OrderStatus::Picking);

    let late = picking
        .record_pick(&app.tenant.picker(), list.items[0].id, 1)
        .await;
    assert_matches!(late, Err(ServiceError::InvalidState(_)));

    let reassign = picking
        .assign_picker(&app.tenant.manager(), list.pick_list.id, app.tenant.picker.id)
        .await;
    assert_matches!(reassign, Err(ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn pickers_only_touch_their_own_lists() {
    let app = TestApp::new().await;
    let picking = &app.state.services.picking;
    let second_picker = seed_user(
        &app.state,
        Some(app.tenant.company_id),
        Role::Picker,
        "picker2@acme.test",
    )
    .await;
    let order = app.create_order(&app.tenant, &[(1, 1)]).await.order;
    let list = pick_list_of(&app, order.id).await;
    picking
        .assign_picker(&app.tenant.manager(), list.pick_list.id, second_picker.id)
        .await
        .unwrap();

    let result = picking
        .start_picking(&app.tenant.picker(), list.pick_list.id)
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
    let result = picking
        .record_pick(&app.tenant.picker(), list.items[0].id, 1)
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));

    let unassigned = app.create_order(&app.tenant, &[(2, 1)]).await.order;
    let (visible, total) = picking
        .list_pick_lists(&app.tenant.picker(), None, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(visible[0].sales_order_id, unassigned.id);

    let packer_attempt = picking
        .start_picking(&app.tenant.packer(), list.pick_list.id)
        .await;
    assert_matches!(packer_attempt, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn assigning_requires_an_active_picker_of_the_tenant() {
    let app = TestApp::new().await;
    let picking = &app.state.services.picking;
    let order = app.create_order(&app.tenant, &[(1, 1)]).await.order;
    let list = pick_list_of(&app, order.id).await;

    let wrong_role = picking
        .assign_picker(&app.tenant.manager(), list.pick_list.id, app.tenant.packer.id)
        .await;
    assert_matches!(wrong_role, Err(ServiceError::ValidationError(_)));

    let foreign = picking
        .assign_picker(&app.tenant.manager(), list.pick_list.id, app.other.picker.id)
        .await;
    assert_matches!(foreign, Err(ServiceError::NotFound(_)));

    let not_allowed = picking
        .assign_picker(&app.tenant.picker(), list.pick_list.id, app.tenant.picker.id)
        .await;
    assert_matches!(not_allowed, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn over_picking_is_rejected_when_enforced() {
    let app = TestApp::with_config(|cfg| {
        cfg.picking.enforce_picked_quantity = true;
        cfg.picking.enforce_status_order = true;
    })
    .await;
    let picking = &app.state.services.picking;
    let order = app.create_order(&app.tenant, &[(1, 2)]).await.order;
    let list = pick_list_of(&app, order.id).await;
    let item = &list.items[0];

    let before_start = picking.record_pick(&app.tenant.manager(), item.id, 1).await;
    assert_matches!(before_start, Err(ServiceError::InvalidState(_)));
    let early_complete = picking
        .complete_picking(&app.tenant.manager(), list.pick_list.id)
        .await;
    assert_matches!(early_complete, Err(ServiceError::InvalidState(_)));

    picking
        .start_picking(&app.tenant.manager(), list.pick_list.id)
        .await
        .unwrap();
    let restart = picking
        .start_picking(&app.tenant.manager(), list.pick_list.id)
        .await;
    assert_matches!(restart, Err(ServiceError::InvalidState(_)));

    let over = picking.record_pick(&app.tenant.manager(), item.id, 3).await;
    assert_matches!(over, Err(ServiceError::ValidationError(_)));
    let negative = picking.record_pick(&app.tenant.manager(), item.id, -1).await;
    assert_matches!(negative, Err(ServiceError::ValidationError(_)));
    let exact = picking
        .record_pick(&app.tenant.manager(), item.id, 2)
        .await
        .unwrap();
    assert_eq!(exact.quantity_picked, 2);
}

#[tokio::test]
async fn relaxed_picking_accepts_out_of_order_steps() {
    let app = TestApp::new().await;
    let picking = &app.state.services.picking;
    let order = app.create_order(&app.tenant, &[(1, 2)]).await.order;
    let list = pick_list_of(&app, order.id).await;

    let over = picking
        .record_pick(&app.tenant.manager(), list.items[0].id, 5)
        .await
        .unwrap();
    assert_eq!(over.quantity_picked, 5);

    let completed = picking
        .complete_picking(&app.tenant.manager(), list.pick_list.id)
        .await
        .unwrap();
    assert_eq!(completed.status, PickListStatus::Completed);
}

#[tokio::test]
async fn completing_packing_marks_the_order_packed() {
    let app = TestApp::new().await;
    let packing = &app.state.services.packing;
    let order = app.create_order(&app.tenant, &[(3, 2), (5, 1)]).await.order;
    let task = app.packing_task_for(order.id).await;

    let unassigned = packing.start_packing(&app.tenant.packer(), task.id).await;
    assert_matches!(unassigned, Err(ServiceError::Forbidden(_)));

    packing
        .assign_packer(&app.tenant.manager(), task.id, app.tenant.packer.id)
        .await
        .unwrap();
    let started = packing
        .start_packing(&app.tenant.packer(), task.id)
        .await
        .unwrap();
    assert_eq!(started.status, PackingStatus::Packing);
    assert_eq!(order_status(&app, order.id).await, OrderStatus::Packing);

    let restart = packing.start_packing(&app.tenant.packer(), task.id).await;
    assert_matches!(restart, Err(ServiceError::InvalidState(_)));

    let done = packing
        .complete_packing(&app.tenant.packer(), task.id)
        .await
        .unwrap();
    assert_eq!(done.status, PackingStatus::Completed);
    assert!(done.packed_at.is_some());
    assert_eq!(order_status(&app, order.id).await, OrderStatus::Packed);

    let again = packing.complete_packing(&app.tenant.packer(), task.id).await;
    assert_matches!(again, Err(ServiceError::InvalidState(_)));
    let reassign = packing
        .assign_packer(&app.tenant.manager(), task.id, app.tenant.packer.id)
        .await;
    assert_matches!(reassign, Err(ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn packing_can_complete_straight_from_pending() {
    let app = TestApp::new().await;
    let order = app.create_order(&app.tenant, &[(1, 1)]).await.order;

    let task = app.pack(&app.tenant, order.id).await;

    assert_eq!(task.status, PackingStatus::Completed);
    assert_eq!(order_status(&app, order.id).await, OrderStatus::Packed);
}

#[tokio::test]
async fn packing_completion_is_all_or_nothing() {
    let app = TestApp::new().await;
    let packing = &app.state.services.packing;
    let order = app.create_order(&app.tenant, &[(1, 1)]).await.order;
    let task = app.packing_task_for(order.id).await;
    packing
        .assign_packer(&app.tenant.manager(), task.id, app.tenant.packer.id)
        .await
        .unwrap();
    packing
        .start_packing(&app.tenant.packer(), task.id)
        .await
        .unwrap();

    // Another path moved the order on while the packer was still working.
    sales_order::Entity::update_many()
        .col_expr(sales_order::Column::Status, Expr::value(OrderStatus::Shipped))
        .col_expr(sales_order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(sales_order::Column::Id.eq(order.id))
        .exec(app.db())
        .await
        .unwrap();

    let result = packing.complete_packing(&app.tenant.packer(), task.id).await;
    assert_matches!(result, Err(ServiceError::InvalidState(_)));

    let task_after = packing_task::Entity::find_by_id(task.id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task_after.status, PackingStatus::Packing);
    assert_eq!(task_after.packed_at, None);
    assert_eq!(order_status(&app, order.id).await, OrderStatus::Shipped);
}

#[tokio::test]
async fn packers_see_only_their_tasks() {
    let app = TestApp::new().await;
    let packing = &app.state.services.packing;
    let mine = app.create_order(&app.tenant, &[(1, 1)]).await.order;
    let theirs = app.create_order(&app.tenant, &[(2, 1)]).await.order;
    let my_task = app.packing_task_for(mine.id).await;
    let their_task = app.packing_task_for(theirs.id).await;
    packing
        .assign_packer(&app.tenant.manager(), my_task.id, app.tenant.packer.id)
        .await
        .unwrap();

    let (tasks, total) = packing
        .list_packing_tasks(&app.tenant.packer(), None, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(tasks[0].id, my_task.id);

    let hidden = packing
        .get_packing_task(&app.tenant.packer(), their_task.id)
        .await;
    assert_matches!(hidden, Err(ServiceError::NotFound(_)));
    let forbidden = packing
        .complete_packing(&app.tenant.packer(), their_task.id)
        .await;
    assert_matches!(forbidden, Err(ServiceError::Forbidden(_)));

    let (all, total) = packing
        .list_packing_tasks(&app.tenant.manager(), Some(PackingStatus::Pending), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn packing_requires_a_packable_order() {
    let app = TestApp::new().await;
    let packing = &app.state.services.packing;
    let order = app.create_order(&app.tenant, &[(1, 1)]).await.order;
    let task = app.packing_task_for(order.id).await;
    packing
        .assign_packer(&app.tenant.manager(), task.id, app.tenant.packer.id)
        .await
        .unwrap();

    sales_order::Entity::update_many()
        .col_expr(sales_order::Column::Status, Expr::value(OrderStatus::Pending))
        .filter(sales_order::Column::Id.eq(order.id))
        .exec(app.db())
        .await
        .unwrap();

    let result = packing.start_packing(&app.tenant.packer(), task.id).await;
    assert_matches!(result, Err(ServiceError::InvalidState(_)));
    let task_after = packing
        .get_packing_task(&app.tenant.manager(), task.id)
        .await
        .unwrap();
    assert_eq!(task_after.status, PackingStatus::Pending);
}
