//! ReplicaStore Tests
//!
//! Tests verify:
//! - Lazy creation of registers on first touch
//! - Never-written keys report `exists = false`
//! - Request execution
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use quorumreg::protocol::{GetRequest, Request, Response, SetRequest};
use quorumreg::store::ReplicaStore;
use quorumreg::tag::NO_WRITER;
use quorumreg::Tag;

fn get(store: &ReplicaStore, key: &str) -> quorumreg::protocol::GetResponse {
    store.get(&GetRequest {
        key: key.to_string(),
    })
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_store_is_empty() {
    let store = ReplicaStore::new();
    assert!(store.is_empty());
    assert_eq!(store.len(), 0);
}

#[test]
fn test_get_unseen_key() {
    let store = ReplicaStore::new();

    let resp = get(&store, "missing");
    assert!(!resp.exists);
    assert_eq!(resp.value, "");
    assert_eq!(resp.timestamp, 0);
    assert_eq!(resp.writer_id, NO_WRITER);
}

#[test]
fn test_get_creates_placeholder_entry() {
    let store = ReplicaStore::new();

    get(&store, "k");
    assert_eq!(store.len(), 1);
    assert!(!get(&store, "k").exists);
}

#[test]
fn test_set_then_get() {
    let store = ReplicaStore::new();

    store.set(&SetRequest::new("k", "alpha", Tag::new(1, 0)));

    let resp = get(&store, "k");
    assert!(resp.exists);
    assert_eq!(resp.value, "alpha");
    assert_eq!(resp.tag(), Tag::new(1, 0));
}

#[test]
fn test_stale_set_still_acknowledged() {
    let store = ReplicaStore::new();

    store.set(&SetRequest::new("k", "new", Tag::new(5, 0)));
    let resp = store.set(&SetRequest::new("k", "old", Tag::new(1, 0)));

    assert!(resp.ok);
    assert_eq!(get(&store, "k").value, "new");
}

#[test]
fn test_apply_reports_whether_applied() {
    let store = ReplicaStore::new();

    assert!(store.apply("k", "a", Tag::new(1, 1)));
    assert!(!store.apply("k", "b", Tag::new(1, 0)));
    assert_eq!(store.snapshot("k"), ("a".to_string(), Tag::new(1, 1)));
}

#[test]
fn test_execute_dispatches_requests() {
    let store = ReplicaStore::new();

    let set = Request::Set(SetRequest::new("k", "v", Tag::new(1, 2)));
    assert!(matches!(store.execute(&set), Response::Set(r) if r.ok));

    let get = Request::Get(GetRequest {
        key: "k".to_string(),
    });
    match store.execute(&get) {
        Response::Get(resp) => {
            assert!(resp.exists);
            assert_eq!(resp.value, "v");
        }
        other => panic!("Expected GET response, got {:?}", other),
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_first_touch_converges() {
    let store = Arc::new(ReplicaStore::new());
    let mut handles = vec![];

    // Every thread touches the same fresh key with its own tag
    for writer in 0..16i64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store.set(&SetRequest::new("fresh", format!("w{}", writer), Tag::new(1, writer)));
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.len(), 1);
    let resp = get(&store, "fresh");
    assert_eq!(resp.value, "w15");
    assert_eq!(resp.tag(), Tag::new(1, 15));
}

#[test]
fn test_concurrent_writers_keep_max_tag() {
    let store = Arc::new(ReplicaStore::new());
    let mut handles = vec![];

    for writer in 0..8i64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for ts in 1..=200u64 {
                store.set(&SetRequest::new(
                    "hot",
                    format!("{}-{}", ts, writer),
                    Tag::new(ts, writer),
                ));
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let resp = get(&store, "hot");
    assert_eq!(resp.tag(), Tag::new(200, 7));
    assert_eq!(resp.value, "200-7");
}

#[test]
fn test_concurrent_distinct_keys() {
    let store = Arc::new(ReplicaStore::new());
    let mut handles = vec![];

    for t in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let key = format!("t{}-k{}", t, i);
                store.set(&SetRequest::new(key.as_str(), "v", Tag::new(1, t)));
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.len(), 800);
    assert!(get(&store, "t3-k42").exists);
}

#[test]
fn test_readers_never_see_torn_entries() {
    let store = Arc::new(ReplicaStore::new());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for ts in 1..=500u64 {
                store.set(&SetRequest::new("k", ts.to_string(), Tag::new(ts, 0)));
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..500 {
                let resp = get(&store, "k");
                if resp.exists {
                    // value and timestamp always come from the same write
                    assert_eq!(resp.value, resp.timestamp.to_string());
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}
