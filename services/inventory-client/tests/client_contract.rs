use inventory_client::{
    ClientError, Identity, InventoryClient, ItemFilter, ItemRef, StockMovement,
    StockMovementType, StockStatus,
};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> InventoryClient {
    InventoryClient::new(
        server.uri(),
        Uuid::new_v4(),
        Identity {
            roles: vec!["manager".into()],
            user_id: Some(Uuid::new_v4()),
            user_name: Some("Dana Reyes".into()),
            user_email: None,
        },
    )
    .expect("client")
}

fn item_json(id: Uuid, quantity: i32) -> Value {
    json!({
        "id": id,
        "tenant_id": Uuid::new_v4(),
        "sku": "LINEN-001",
        "name": "Queen flat sheet",
        "category": "linen",
        "unit": "piece",
        "quantity_in_stock": quantity,
        "reorder_level": 10,
        "max_stock_level": null,
        "reorder_point": null,
        "reorder_quantity": null,
        "price_per_unit": "12.00",
        "total_value": "480.00",
        "supplier_id": null,
        "location": null,
        "is_active": true,
        "is_perishable": false,
        "expiry_date": null,
        "created_at": "2026-08-30T12:00:00Z",
        "updated_at": "2026-08-30T12:00:00Z"
    })
}

fn transaction_json(item_id: Uuid, quantity: i32) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "item_id": item_id,
        "transaction_type": "transfer",
        "quantity": quantity,
        "unit_price": "12.00",
        "transaction_date": "2026-08-30T12:00:00Z",
        "department": null,
        "reference_number": "XFER-test",
        "reason": null,
        "performed_by": null,
        "performed_by_name": null,
        "status": "completed"
    })
}

fn adjustment_body(item_id: Uuid, quantity_after: i32, tx_quantity: i32) -> Value {
    json!({
        "success": true,
        "data": {
            "item": item_json(item_id, quantity_after),
            "transaction": transaction_json(item_id, tx_quantity)
        }
    })
}

#[tokio::test]
async fn fetching_a_new_item_ref_makes_no_request() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let fetched = client.fetch_item(ItemRef::New).await.unwrap();
    assert!(fetched.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn fetching_an_existing_item_hits_its_endpoint() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/inventory/{id}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": item_json(id, 40)})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let item = client.fetch_item(ItemRef::Existing(id)).await.unwrap().unwrap();
    assert_eq!(item.id, id);
    assert_eq!(item.quantity_in_stock, 40);
}

#[tokio::test]
async fn unset_filters_are_omitted_from_the_query_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inventory"))
        .and(query_param_is_missing("search"))
        .and(query_param_is_missing("category"))
        .and(query_param_is_missing("stock_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [],
            "count": 0,
            "total": 0,
            "pagination": {"page": 1, "limit": 20, "total_pages": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let page = client.list_items(&ItemFilter::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn set_filters_are_sent_as_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inventory"))
        .and(query_param("search", "towel"))
        .and(query_param("stock_status", "low_stock"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [],
            "count": 0,
            "total": 41,
            "pagination": {"page": 2, "limit": 20, "total_pages": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let filter = ItemFilter {
        search: Some("towel".into()),
        stock_status: Some(StockStatus::LowStock),
        page: Some(2),
        ..Default::default()
    };
    let page = client.list_items(&filter).await.unwrap();
    assert_eq!(page.total, 41);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn stock_movement_without_date_is_stamped_before_sending() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{id}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(id, 37, -3)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let before = chrono::Utc::now();
    client
        .update_stock_level(id, StockMovement::new(StockMovementType::Consumption, 3))
        .await
        .unwrap();
    let after = chrono::Utc::now();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["type"], "consumption");
    let stamped: chrono::DateTime<chrono::Utc> = body["transaction_date"]
        .as_str()
        .expect("client should stamp transaction_date")
        .parse()
        .unwrap();
    assert!(
        stamped >= before && stamped <= after,
        "stamp {stamped} should fall between {before} and {after}"
    );
}

#[tokio::test]
async fn caller_supplied_date_is_passed_through() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{id}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(id, 50, 10)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut movement = StockMovement::new(StockMovementType::Restock, 10);
    movement.transaction_date = Some("2026-08-15T08:00:00Z".parse().unwrap());
    client.update_stock_level(id, movement).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let sent: chrono::DateTime<chrono::Utc> =
        body["transaction_date"].as_str().unwrap().parse().unwrap();
    assert_eq!(sent, "2026-08-15T08:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
}

#[tokio::test]
async fn transfer_debits_source_then_credits_destination() {
    let server = MockServer::start().await;
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{from}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(from, 30, -10)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{to}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(to, 15, 10)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let receipt = client.transfer_stock(from, to, 10, None, None).await.unwrap();
    assert_eq!(receipt.debit.quantity, -10);
    assert_eq!(receipt.credit.quantity, 10);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.path().contains(&from.to_string()), "debit leg must run first");
    assert!(requests[1].url.path().contains(&to.to_string()));

    let debit: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let credit: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(debit["quantity"], -10);
    assert_eq!(credit["quantity"], 10);
    assert_eq!(debit["type"], "transfer");
    assert_eq!(
        debit["reference_number"], credit["reference_number"],
        "both legs share a reference number"
    );
    // Each leg's reason names the other item.
    assert!(
        debit["reason"].as_str().unwrap().contains(&to.to_string()),
        "debit reason was {}", debit["reason"]
    );
    assert!(
        credit["reason"].as_str().unwrap().contains(&from.to_string()),
        "credit reason was {}", credit["reason"]
    );
}

#[tokio::test]
async fn caller_reason_rides_on_both_transfer_legs() {
    let server = MockServer::start().await;
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{from}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(from, 30, -10)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{to}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(to, 15, 10)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .transfer_stock(from, to, 10, Some("seasonal rebalance".into()), None)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let debit: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let credit: Value = serde_json::from_slice(&requests[1].body).unwrap();
    for (leg, other) in [(&debit, to), (&credit, from)] {
        let reason = leg["reason"].as_str().unwrap();
        assert!(reason.contains(&other.to_string()), "reason was {reason}");
        assert!(reason.contains("seasonal rebalance"), "reason was {reason}");
    }
}

#[tokio::test]
async fn failed_debit_leg_never_touches_the_destination() {
    let server = MockServer::start().await;
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{from}/stock")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "insufficient_stock",
            "message": "Cannot deduct 10 from 'Queen flat sheet': only 4 in stock"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{to}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(to, 15, 10)))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.transfer_stock(from, to, 10, None, None).await.unwrap_err();
    assert!(!err.is_stranded_transfer(), "nothing moved, so no stranded debit");
    assert_eq!(err.api_code(), Some("insufficient_stock"));
    // The service message is surfaced verbatim.
    assert_eq!(
        err.to_string(),
        "Cannot deduct 10 from 'Queen flat sheet': only 4 in stock"
    );
}

#[tokio::test]
async fn failed_credit_leg_reports_a_stranded_debit() {
    let server = MockServer::start().await;
    let from = Uuid::new_v4();
    let to = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{from}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(from, 30, -10)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{to}/stock")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "item_not_found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.transfer_stock(from, to, 10, None, None).await.unwrap_err();
    match err {
        ClientError::StrandedDebit { from: f, to: t, quantity, source } => {
            assert_eq!(f, from);
            assert_eq!(t, to);
            assert_eq!(quantity, 10);
            assert_eq!(source.api_code(), Some("item_not_found"));
        }
        other => panic!("expected StrandedDebit, got {other:?}"),
    }

    // No compensating movement is attempted: exactly one request per leg.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn department_issue_is_a_single_debit_with_department_set() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(format!("/inventory/{id}/stock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(adjustment_body(id, 34, -6)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.transfer_to_department(id, 6, "housekeeping", None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["quantity"], -6);
    assert_eq!(body["department"], "housekeeping");
}

#[tokio::test]
async fn identity_headers_ride_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inventory/low-stock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [],
            "count": 0
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let items = client.low_stock_items().await.unwrap();
    assert!(items.is_empty());

    let requests = server.received_requests().await.unwrap();
    let headers = &requests[0].headers;
    assert!(headers.contains_key("x-tenant-id"));
    assert_eq!(headers.get("x-roles").unwrap(), "manager");
    assert!(headers.contains_key("x-trace-id"));
}

#[tokio::test]
async fn invalid_transfers_are_rejected_locally() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let id = Uuid::new_v4();

    assert!(matches!(
        client.transfer_stock(id, Uuid::new_v4(), 0, None, None).await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(matches!(
        client.transfer_stock(id, id, 5, None, None).await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
