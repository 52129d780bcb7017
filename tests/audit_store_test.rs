// tests/audit_store_test.rs
// SQLite audit log: append, paging cursor, search, org scoping

mod common;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::*;
use termgate::audit::{AuditAction, AuditQuery, AuditRecord, AuditSink, SqliteAuditLog};

fn record(org_id: i64, action: AuditAction, initiator: &str, ip: &str, session_id: Uuid) -> AuditRecord {
    AuditRecord {
        org_id,
        user_id: 1,
        action,
        resource_type: "ssh".to_string(),
        resource_id: Some(3),
        target: "10.0.0.5".to_string(),
        session_id: Some(session_id),
        ip: ip.to_string(),
        user_agent: "Mozilla/5.0".to_string(),
        initiator_name: initiator.to_string(),
        metadata: json!({"ssh_user": "deploy", "port": 22}),
        created_at: Utc::now(),
    }
}

async fn log_with_entries(count: usize) -> SqliteAuditLog {
    let log = SqliteAuditLog::new(memory_pool().await);
    for i in 0..count {
        let action = if i % 2 == 0 {
            AuditAction::SessionConnect
        } else {
            AuditAction::SessionDisconnect
        };
        log.record(&record(1, action, "Ada", "192.0.2.1", Uuid::new_v4())).await.unwrap();
    }
    log
}

#[tokio::test]
async fn pages_walk_every_entry_once() {
    let log = log_with_entries(5).await;

    let mut query = AuditQuery::new(1);
    query.limit = 2;

    let mut seen = Vec::new();
    loop {
        let page = log.list(&query).await.unwrap();
        seen.extend(page.logs.iter().map(|e| e.id));
        match page.next_cursor {
            Some(cursor) => {
                assert_eq!(Some(cursor), page.logs.last().map(|e| e.id));
                query.after_id = Some(cursor);
            }
            None => break,
        }
    }

    // Newest first, no gaps, no repeats.
    let mut expected = seen.clone();
    expected.sort_unstable_by(|a, b| b.cmp(a));
    expected.dedup();
    assert_eq!(seen, expected);
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn exact_page_has_no_cursor() {
    let log = log_with_entries(2).await;
    let mut query = AuditQuery::new(1);
    query.limit = 2;

    let page = log.list(&query).await.unwrap();
    assert_eq!(page.logs.len(), 2);
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn oversized_limit_is_clamped() {
    let log = log_with_entries(3).await;
    let mut query = AuditQuery::new(1);
    query.limit = 10_000;

    let page = log.list(&query).await.unwrap();
    assert_eq!(page.logs.len(), 3);
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn search_matches_initiator_action_and_ip() {
    let log = SqliteAuditLog::new(memory_pool().await);
    log.record(&record(1, AuditAction::SessionConnect, "Ada Lovelace", "192.0.2.1", Uuid::new_v4()))
        .await
        .unwrap();
    log.record(&record(1, AuditAction::SessionDisconnect, "Grace Hopper", "198.51.100.7", Uuid::new_v4()))
        .await
        .unwrap();

    let search = |q: &str| {
        let mut query = AuditQuery::new(1);
        query.search = Some(q.to_string());
        query
    };

    let page = log.list(&search("grace")).await.unwrap();
    assert_eq!(page.logs.len(), 1);
    assert_eq!(page.logs[0].initiator_name, "Grace Hopper");

    let page = log.list(&search("disconnect")).await.unwrap();
    assert_eq!(page.logs.len(), 1);
    assert_eq!(page.logs[0].action, "session.disconnect");

    let page = log.list(&search("192.0.2")).await.unwrap();
    assert_eq!(page.logs.len(), 1);
    assert_eq!(page.logs[0].ip, "192.0.2.1");

    assert_eq!(log.list(&search("ssh")).await.unwrap().logs.len(), 2);
    assert_eq!(log.list(&search("   ")).await.unwrap().logs.len(), 2);
}

#[tokio::test]
async fn listing_is_scoped_to_org() {
    let log = SqliteAuditLog::new(memory_pool().await);
    log.record(&record(1, AuditAction::SessionConnect, "Ada", "192.0.2.1", Uuid::new_v4()))
        .await
        .unwrap();
    log.record(&record(2, AuditAction::SessionConnect, "Eve", "192.0.2.2", Uuid::new_v4()))
        .await
        .unwrap();

    let page = log.list(&AuditQuery::new(2)).await.unwrap();
    assert_eq!(page.logs.len(), 1);
    assert_eq!(page.logs[0].initiator_name, "Eve");
}

#[tokio::test]
async fn session_entries_round_trip() {
    let log = SqliteAuditLog::new(memory_pool().await);
    let session_id = Uuid::new_v4();

    let connect = record(1, AuditAction::SessionConnect, "Ada", "192.0.2.1", session_id);
    let mut disconnect = connect.clone();
    disconnect.action = AuditAction::SessionDisconnect;
    disconnect.created_at = connect.created_at + Duration::milliseconds(1500);

    log.record(&connect).await.unwrap();
    log.record(&disconnect).await.unwrap();

    let entries = log.for_session(&session_id.to_string()).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "session.connect");
    assert_eq!(entries[1].action, "session.disconnect");
    assert_eq!(entries[0].metadata, json!({"ssh_user": "deploy", "port": 22}));
    assert_eq!(entries[0].resource_id, Some(3));
    assert_eq!(
        entries[0].created_at.timestamp_millis(),
        connect.created_at.timestamp_millis()
    );
    assert!(entries[1].created_at > entries[0].created_at);
}
