//! End-to-end placement scenarios against a mock gateway.
//!
//! - A: valid bracket order is placed once
//! - B: unknown symbol never reaches the network
//! - C: derivative quantity off the lot size
//! - D: exchange code for the wrong venue
//! - E: HTTP 200 with `orderStatus=REJECTED`

mod common;
use common::{harness, hdfc_bracket};

use dhan_client::PlacementError;
use dhan_core::{ExchangeSegment, PlacementStatus, RawOrder};
use dhan_orchestrator::OrderError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_scenario_a_valid_bracket_is_placed_once() {
    let h = harness();

    let result = h.orchestrator.place(&hdfc_bracket()).await.unwrap();

    assert_eq!(result.status, PlacementStatus::Transit);
    let calls = h.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].security_id, "1333");
    assert_eq!(calls[0].segment, ExchangeSegment::NseEq);
}

#[tokio::test]
async fn test_scenario_b_unknown_symbol_no_network() {
    let h = harness();
    let raw = RawOrder {
        symbol: Some("UNKNOWN".to_string()),
        ..hdfc_bracket()
    };

    let err = h.orchestrator.place(&raw).await.unwrap_err();

    assert!(matches!(err, OrderError::InstrumentNotFound { .. }));
    assert!(err.is_local());
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_scenario_c_lot_size_violation() {
    let h = harness();
    let raw = RawOrder {
        symbol: Some("NIFTY-Jan2025-FUT".to_string()),
        exchange: Some("NFO".to_string()),
        quantity: Some(25),
        order_type: Some("MARKET".to_string()),
        price: None,
        target_price: Some(dec!(24500)),
        stop_loss_price: Some(dec!(23500)),
        ..hdfc_bracket()
    };

    let err = h.orchestrator.place(&raw).await.unwrap_err();

    assert!(matches!(
        err,
        OrderError::LotSizeViolation {
            quantity: 25,
            lot_size: 50,
            ..
        }
    ));
    assert_eq!(h.gateway.call_count(), 0);

    // Whole lots go through.
    let ok = RawOrder {
        quantity: Some(100),
        ..raw
    };
    h.orchestrator.place(&ok).await.unwrap();
    assert_eq!(h.gateway.calls()[0].segment, ExchangeSegment::NseFno);
}

#[tokio::test]
async fn test_scenario_d_exchange_mismatch() {
    let h = harness();
    let raw = RawOrder {
        symbol: Some("INFY".to_string()),
        exchange: Some("BSE".to_string()),
        ..hdfc_bracket()
    };

    let err = h.orchestrator.place(&raw).await.unwrap_err();

    assert!(matches!(err, OrderError::ExchangeMismatch(_)));
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_bse_listing_preferred_when_requested() {
    let h = harness();
    let raw = RawOrder {
        exchange: Some("BSE".to_string()),
        ..hdfc_bracket()
    };

    h.orchestrator.place(&raw).await.unwrap();

    let calls = h.gateway.calls();
    assert_eq!(calls[0].security_id, "500180");
    assert_eq!(calls[0].segment, ExchangeSegment::BseEq);
}

#[tokio::test]
async fn test_scenario_e_rejected_status_keeps_order_id() {
    let h = harness();
    h.gateway.push_result(Err(PlacementError::BrokerRejected {
        code: "REJECTED".to_string(),
        message: "insufficient margin".to_string(),
        order_id: Some("552209".to_string()),
    }));

    let err = h.orchestrator.place(&hdfc_bracket()).await.unwrap_err();

    assert!(matches!(err, OrderError::BrokerRejected { .. }));
    assert_eq!(err.order_id(), Some("552209"));
    assert!(err.to_string().contains("insufficient margin"));
    assert!(!err.is_local());
    assert_eq!(h.gateway.call_count(), 1);
}

#[tokio::test]
async fn test_invalid_input_never_reaches_network() {
    let h = harness();
    let raw = RawOrder {
        // BUY with stop-loss above entry.
        stop_loss_price: Some(dec!(1550)),
        ..hdfc_bracket()
    };

    let err = h.orchestrator.place(&raw).await.unwrap_err();

    assert!(matches!(err, OrderError::InputValidation(_)));
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_option_resolved_by_contract_details() {
    let h = harness();
    let raw = RawOrder {
        symbol: Some("NIFTY".to_string()),
        exchange: Some("NSE_FNO".to_string()),
        quantity: Some(75),
        strike_price: Some(dec!(24000)),
        expiry_date: Some("2025-01-30".to_string()),
        option_type: Some("CE".to_string()),
        order_type: Some("MARKET".to_string()),
        price: None,
        target_price: Some(dec!(200)),
        stop_loss_price: Some(dec!(100)),
        ..hdfc_bracket()
    };

    h.orchestrator.place(&raw).await.unwrap();

    assert_eq!(h.gateway.calls()[0].security_id, "49081");
}

#[tokio::test]
async fn test_transport_failure_is_classified() {
    let h = harness();
    h.gateway
        .push_result(Err(PlacementError::Transport("connection reset".to_string())));

    let err = h.orchestrator.place(&hdfc_bracket()).await.unwrap_err();

    assert_eq!(err, OrderError::Transport("connection reset".to_string()));
}

#[tokio::test]
async fn test_trigger_order_routed_through_same_pipeline() {
    let h = harness();
    let raw = RawOrder {
        product: Some("CNC".to_string()),
        trigger_price: Some(dec!(1490)),
        target_price: None,
        stop_loss_price: None,
        ..hdfc_bracket()
    };

    h.orchestrator.place(&raw).await.unwrap();

    let calls = h.gateway.calls();
    assert!(matches!(
        calls[0].intent,
        dhan_core::OrderIntent::Trigger(_)
    ));
}
