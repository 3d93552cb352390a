//! Bulk job lifecycle against mock gateways.

mod common;
use common::{bracket_row, creds, harness, harness_with_master};

use dhan_bulk::{rows_from_csv, BulkError, BulkJobStatus};
use dhan_client::PlacementError;
use std::time::Duration;
use tempfile::TempDir;

const POLL: Duration = Duration::from_millis(5);

#[tokio::test]
async fn test_mixed_rows_fail_individually() {
    let h = harness();
    let input = "\
Symbol,Exchange,Transaction Type,Qty,Order Type,Product Type,Price,Target Price,Stop Loss,Trigger Price
HDFCBANK,NSE,BUY,10,LIMIT,INTRADAY,1500,1550,1480,
,NSE,BUY,10,LIMIT,INTRADAY,1500,1550,1480,
UNKNOWN,NSE,BUY,10,LIMIT,INTRADAY,1500,1550,1480,
INFY,NSE,BUY,ten,LIMIT,INTRADAY,1500,1550,1480,
INFY,NSE,SELL,5,LIMIT,CNC,1600,,,1590
HDFCBANK,NSE,BUY,10,LIMIT,INTRADAY,1500,1550,,
";
    let rows = rows_from_csv(input.as_bytes()).unwrap();

    let job_id = h.processor.submit("session-1", creds(), rows).unwrap();
    let job = h.processor.wait(&job_id, POLL).await.unwrap();

    assert_eq!(job.status, BulkJobStatus::Completed);
    assert_eq!(job.total_rows, 6);
    assert_eq!(job.success_count, 2);
    assert_eq!(job.failure_count, 4);
    assert_eq!(job.timing.rows, 6);

    let rows: Vec<usize> = job.results.iter().map(|r| r.row).collect();
    assert_eq!(rows, vec![2, 3, 4, 5, 6, 7]);

    assert_eq!(job.results[0].order_id.as_deref(), Some("MOCK-1"));
    assert_eq!(job.results[1].message, "Symbol is required");
    assert!(job.results[2].message.contains("Instrument not found"));
    assert_eq!(job.results[3].message, "Qty: 'ten' is not a valid number");
    assert!(job.results[4].success);
    assert_eq!(job.results[5].message, "Bracket orders require StopLoss");

    // Only the two valid rows reached the broker, through one gateway.
    assert_eq!(h.factory.gateway.call_count(), 2);
    assert_eq!(h.factory.requested_by(), vec!["1000001".to_string()]);
}

#[tokio::test]
async fn test_broker_rejection_keeps_order_id_on_row() {
    let h = harness();
    h.factory
        .gateway
        .push_result(Err(PlacementError::BrokerRejected {
            code: "REJECTED".to_string(),
            message: "insufficient margin".to_string(),
            order_id: Some("552209".to_string()),
        }));

    let job_id = h
        .processor
        .submit("s", creds(), vec![bracket_row(2, "HDFCBANK"), bracket_row(3, "INFY")])
        .unwrap();
    let job = h.processor.wait(&job_id, POLL).await.unwrap();

    assert_eq!(job.failure_count, 1);
    assert_eq!(job.success_count, 1);
    let rejected = &job.results[0];
    assert!(!rejected.success);
    assert!(rejected.message.contains("insufficient margin"));
    assert_eq!(rejected.order_id.as_deref(), Some("552209"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_before_unstarted_rows() {
    let h = harness();
    h.factory.gateway.set_delay(Duration::from_millis(100));
    let rows = (0..5).map(|i| bracket_row(i + 2, "HDFCBANK")).collect();

    let job_id = h.processor.submit("s", creds(), rows).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(h.processor.cancel(&job_id).unwrap(), BulkJobStatus::Cancelling);
    assert_eq!(
        h.processor.status(&job_id).unwrap().status,
        BulkJobStatus::Cancelling
    );

    let job = h.processor.wait(&job_id, POLL).await.unwrap();
    assert_eq!(job.status, BulkJobStatus::Cancelled);
    assert!(job.results.len() < 5);
    assert!(job.results.iter().all(|r| r.success));
    // The in-flight call finished and was recorded; nothing started after.
    assert_eq!(job.results.len(), h.factory.gateway.call_count());
    assert!(job.finished_at.is_some());

    // Cancelling a finished job is a no-op.
    assert_eq!(h.processor.cancel(&job_id).unwrap(), BulkJobStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_one_active_job_per_session() {
    let h = harness();
    h.factory.gateway.set_delay(Duration::from_millis(50));

    let first = h
        .processor
        .submit("s", creds(), vec![bracket_row(2, "HDFCBANK"), bracket_row(3, "INFY")])
        .unwrap();
    let second = h
        .processor
        .submit("s", creds(), vec![bracket_row(2, "INFY")]);
    assert!(matches!(second, Err(BulkError::JobActive { ref job_id, .. }) if *job_id == first));

    // Other sessions are independent.
    h.processor
        .submit("other", creds(), vec![bracket_row(2, "INFY")])
        .unwrap();

    h.processor.wait(&first, POLL).await.unwrap();
    let third = h
        .processor
        .submit("s", creds(), vec![bracket_row(2, "INFY")])
        .unwrap();

    // Finished job is superseded by the new one.
    assert!(h.processor.status(&first).is_none());
    assert_eq!(h.processor.latest_for("s").unwrap().id, third);
}

#[tokio::test]
async fn test_catalog_failure_fails_job() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.csv");
    let h = harness_with_master(dir, missing);

    let job_id = h
        .processor
        .submit("s", creds(), vec![bracket_row(2, "HDFCBANK")])
        .unwrap();
    let job = h.processor.wait(&job_id, POLL).await.unwrap();

    assert_eq!(job.status, BulkJobStatus::Failed);
    assert!(job
        .error
        .as_deref()
        .unwrap()
        .starts_with("Instrument catalog unavailable"));
    assert!(job.results.is_empty());
    assert_eq!(h.factory.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_job_and_empty_input() {
    let h = harness();
    assert!(matches!(
        h.processor.cancel("nope"),
        Err(BulkError::UnknownJob(_))
    ));
    assert!(matches!(
        h.processor.submit("s", creds(), Vec::new()),
        Err(BulkError::EmptyInput)
    ));
    assert!(h.processor.latest_for("s").is_none());
}

#[tokio::test]
async fn test_job_snapshot_serializes_for_status_views() {
    let h = harness();
    let job_id = h
        .processor
        .submit("s", creds(), vec![bracket_row(2, "HDFCBANK")])
        .unwrap();
    let job = h.processor.wait(&job_id, POLL).await.unwrap();

    let json = serde_json::to_value(&job).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["results"][0]["row"], 2);
    assert_eq!(json["success_count"], 1);
}
