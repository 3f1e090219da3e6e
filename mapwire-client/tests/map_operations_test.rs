//! Integration tests for the single-frame map operations.

mod common;

use common::*;
use mapwire_core::EventId;

#[tokio::test]
async fn test_size_round_trip() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event.ordinal(), 3);
        assert!(req.txn.unwrap() >= 1);
        assert!(req.payload.is_empty());
        write_response(&mut socket, req.txn.unwrap(), &42i32.to_ne_bytes()).await;
    });

    let map = string_map(addr).await;
    assert_eq!(map.size().await.unwrap(), 42);
    server.await.unwrap();
}

#[tokio::test]
async fn test_long_size_round_trip() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::LongSize);
        write_response(&mut socket, req.txn.unwrap(), &(1i64 << 33).to_ne_bytes()).await;
    });

    let map = string_map(addr).await;
    assert_eq!(map.long_size().await.unwrap(), 1i64 << 33);
    server.await.unwrap();
}

#[tokio::test]
async fn test_is_empty() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::IsEmpty);
        write_response(&mut socket, req.txn.unwrap(), &[1]).await;
    });

    let map = string_map(addr).await;
    assert!(map.is_empty().await.unwrap());
    server.await.unwrap();
}

#[tokio::test]
async fn test_get_hit_and_miss() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::Get);
        let mut at = 0;
        assert_eq!(parse_string(&req.payload, &mut at), "present");
        assert_eq!(at, req.payload.len());
        write_response(&mut socket, req.txn.unwrap(), &present_value("found")).await;

        let req = read_request(&mut socket).await;
        let mut at = 0;
        assert_eq!(parse_string(&req.payload, &mut at), "missing");
        write_response(&mut socket, req.txn.unwrap(), &absent_value()).await;
    });

    let map = string_map(addr).await;
    assert_eq!(
        map.get(&"present".to_string()).await.unwrap(),
        Some("found".to_string())
    );
    assert_eq!(map.get(&"missing".to_string()).await.unwrap(), None);
    server.await.unwrap();
}

#[tokio::test]
async fn test_put_returns_prior_null() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event.ordinal(), 8);
        let mut at = 0;
        assert_eq!(parse_string(&req.payload, &mut at), "a");
        assert_eq!(parse_string(&req.payload, &mut at), "b");
        assert_eq!(at, req.payload.len());
        write_response(&mut socket, req.txn.unwrap(), &absent_value()).await;
    });

    let map = string_map(addr).await;
    assert_eq!(map.put("a".to_string(), "b".to_string()).await.unwrap(), None);
    server.await.unwrap();
}

#[tokio::test]
async fn test_put_returns_prior_value() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        write_response(&mut socket, req.txn.unwrap(), &present_value("old")).await;
    });

    let map = string_map(addr).await;
    assert_eq!(
        map.put("k".to_string(), "new".to_string()).await.unwrap(),
        Some("old".to_string())
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_remove_and_remove_with_value() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::Remove);
        write_response(&mut socket, req.txn.unwrap(), &present_value("gone")).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::RemoveWithValue);
        let mut at = 0;
        assert_eq!(parse_string(&req.payload, &mut at), "k");
        assert_eq!(parse_string(&req.payload, &mut at), "v");
        write_response(&mut socket, req.txn.unwrap(), &[1]).await;
    });

    let map = string_map(addr).await;
    assert_eq!(
        map.remove(&"k".to_string()).await.unwrap(),
        Some("gone".to_string())
    );
    assert!(map
        .remove_with_value(&"k".to_string(), &"v".to_string())
        .await
        .unwrap());
    server.await.unwrap();
}

#[tokio::test]
async fn test_replace_variants() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::Replace);
        write_response(&mut socket, req.txn.unwrap(), &present_value("before")).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::ReplaceWithOldAndNewValue);
        let mut at = 0;
        assert_eq!(parse_string(&req.payload, &mut at), "k");
        assert_eq!(parse_string(&req.payload, &mut at), "old");
        assert_eq!(parse_string(&req.payload, &mut at), "new");
        assert_eq!(at, req.payload.len());
        write_response(&mut socket, req.txn.unwrap(), &[0]).await;
    });

    let map = string_map(addr).await;
    assert_eq!(
        map.replace("k".to_string(), "v".to_string()).await.unwrap(),
        Some("before".to_string())
    );
    assert!(!map
        .replace_with_old_and_new(&"k".to_string(), &"old".to_string(), &"new".to_string())
        .await
        .unwrap());
    server.await.unwrap();
}

#[tokio::test]
async fn test_put_if_absent() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::PutIfAbsent);
        write_response(&mut socket, req.txn.unwrap(), &present_value("existing")).await;
    });

    let map = string_map(addr).await;
    assert_eq!(
        map.put_if_absent("k".to_string(), "v".to_string())
            .await
            .unwrap(),
        Some("existing".to_string())
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_contains_key_and_value() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::ContainsKey);
        write_response(&mut socket, req.txn.unwrap(), &[1]).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::ContainsValue);
        write_response(&mut socket, req.txn.unwrap(), &[0]).await;
    });

    let map = string_map(addr).await;
    assert!(map.contains_key(&"k".to_string()).await.unwrap());
    assert!(!map.contains_value(&"v".to_string()).await.unwrap());
    server.await.unwrap();
}

#[tokio::test]
async fn test_clear_then_empty_and_zero_size() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::Clear);
        write_response(&mut socket, req.txn.unwrap(), &[]).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::IsEmpty);
        write_response(&mut socket, req.txn.unwrap(), &[1]).await;

        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::Size);
        write_response(&mut socket, req.txn.unwrap(), &0i32.to_ne_bytes()).await;
    });

    let map = string_map(addr).await;
    map.clear().await.unwrap();
    assert!(map.is_empty().await.unwrap());
    assert_eq!(map.size().await.unwrap(), 0);
    server.await.unwrap();
}

#[tokio::test]
async fn test_hash_code_is_delegated() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::HashCode);
        write_response(&mut socket, req.txn.unwrap(), &(-77i32).to_ne_bytes()).await;
    });

    let map = string_map(addr).await;
    assert_eq!(map.hash_code().await.unwrap(), -77);
    server.await.unwrap();
}

#[tokio::test]
async fn test_remote_to_string_prefixes_name() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::ToString);
        write_response(&mut socket, req.txn.unwrap(), &string_bytes("{a=b}")).await;
    });

    let map = string_map(addr).await;
    assert_eq!(
        map.remote_to_string().await.unwrap(),
        "name=test-map, {a=b}"
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_map_for_key_sends_function_payload() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::MapForKey);
        let mut at = 0;
        assert_eq!(parse_string(&req.payload, &mut at), "k");
        assert_eq!(parse_string(&req.payload, &mut at), "uppercase");
        assert_eq!(at, req.payload.len());
        write_response(&mut socket, req.txn.unwrap(), &string_bytes("VALUE")).await;
    });

    let map = string_map(addr).await;
    let result: String = map
        .map_for_key(&"k".to_string(), &"uppercase".to_string())
        .await
        .unwrap();
    assert_eq!(result, "VALUE");
    server.await.unwrap();
}

#[tokio::test]
async fn test_update_for_key() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let req = read_request(&mut socket).await;
        assert_eq!(req.event, EventId::UpdateForKey);
        write_response(&mut socket, req.txn.unwrap(), &string_bytes("updated")).await;
    });

    let map = string_map(addr).await;
    let result: String = map
        .update_for_key(&"k".to_string(), &"append".to_string())
        .await
        .unwrap();
    assert_eq!(result, "updated");
    server.await.unwrap();
}

#[tokio::test]
async fn test_transaction_ids_strictly_increase() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut socket = accept_and_handshake(&listener).await;
        let mut previous = 0u64;
        for _ in 0..6 {
            let req = read_request(&mut socket).await;
            let txn = req.txn.unwrap();
            assert!(txn > previous, "{txn} not greater than {previous}");
            previous = txn;
            write_response(&mut socket, txn, &[1]).await;
        }
    });

    let map = string_map(addr).await;
    for _ in 0..6 {
        map.is_empty().await.unwrap();
    }
    server.await.unwrap();
}
