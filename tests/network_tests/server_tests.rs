//! Replica Server Tests
//!
//! These tests verify, over real loopback sockets:
//! - Request handling by the TCP server
//! - TcpReplica calls, reconnection and call deadlines
//! - Connection limits and shutdown
//! - Client construction against partially reachable replica sets

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use quorumreg::client::{ReplicaTransport, TcpReplica};
use quorumreg::network::{Server, ShutdownHandle};
use quorumreg::protocol::{
    read_request, read_response, write_request, write_response, GetRequest, Request, Response,
    SetRequest,
};
use quorumreg::{ClientConfig, RegisterClient, RegisterError, ReplicaStore, ServerConfig, Tag};

// =============================================================================
// Helper Functions
// =============================================================================

struct RunningReplica {
    addr: SocketAddr,
    store: Arc<ReplicaStore>,
    shutdown: ShutdownHandle,
    thread: JoinHandle<()>,
}

impl RunningReplica {
    fn stop(self) -> (SocketAddr, Arc<ReplicaStore>) {
        self.shutdown.shutdown();
        self.thread.join().unwrap();
        (self.addr, self.store)
    }
}

fn start_replica(listen: &str, store: Arc<ReplicaStore>, max_connections: usize) -> RunningReplica {
    let config = ServerConfig::builder()
        .listen_addr(listen)
        .max_connections(max_connections)
        .build();
    let mut server = Server::new(config, Arc::clone(&store));
    let addr = server.bind().unwrap();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || server.run().unwrap());

    RunningReplica {
        addr,
        store,
        shutdown,
        thread,
    }
}

fn start_fresh() -> RunningReplica {
    start_replica("127.0.0.1:0", Arc::new(ReplicaStore::new()), 64)
}

/// An address nothing listens on
fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn get(key: &str) -> Request {
    Request::Get(GetRequest {
        key: key.to_string(),
    })
}

fn set(key: &str, value: &str, ts: u64, writer: i64) -> Request {
    Request::Set(SetRequest::new(key, value, Tag::new(ts, writer)))
}

// =============================================================================
// Server Tests
// =============================================================================

#[test]
fn test_server_serves_raw_requests() {
    let replica = start_fresh();
    let mut stream = TcpStream::connect(replica.addr).unwrap();

    write_request(&mut stream, &set("k", "v", 1, 0)).unwrap();
    assert!(matches!(read_response(&mut stream).unwrap(), Response::Set(r) if r.ok));

    write_request(&mut stream, &get("k")).unwrap();
    match read_response(&mut stream).unwrap() {
        Response::Get(resp) => {
            assert!(resp.exists);
            assert_eq!(resp.value, "v");
            assert_eq!(resp.tag(), Tag::new(1, 0));
        }
        other => panic!("Expected GET response, got {:?}", other),
    }

    assert_eq!(replica.store.snapshot("k").0, "v");
    replica.stop();
}

#[test]
fn test_server_rejects_garbage_frame() {
    let replica = start_fresh();
    let mut stream = TcpStream::connect(replica.addr).unwrap();

    stream.write_all(&[0x7E, 0, 0, 0, 0]).unwrap();

    assert!(matches!(read_response(&mut stream).unwrap(), Response::Error(_)));
    replica.stop();
}

#[test]
fn test_max_connections_refuses_excess() {
    let replica = start_replica("127.0.0.1:0", Arc::new(ReplicaStore::new()), 1);

    let mut first = TcpStream::connect(replica.addr).unwrap();
    write_request(&mut first, &get("k")).unwrap();
    assert!(matches!(read_response(&mut first).unwrap(), Response::Get(_)));

    let mut second = TcpStream::connect(replica.addr).unwrap();
    match read_response(&mut second).unwrap() {
        Response::Error(message) => assert!(message.contains("too many connections")),
        other => panic!("Expected ERROR response, got {:?}", other),
    }

    replica.stop();
}

#[test]
fn test_connection_slot_released_after_disconnect() {
    let replica = start_replica("127.0.0.1:0", Arc::new(ReplicaStore::new()), 1);

    for round in 0..3 {
        // The previous client's slot frees up once its handler notices EOF
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let mut stream = TcpStream::connect(replica.addr).unwrap();
            let served = write_request(&mut stream, &get("k"))
                .and_then(|()| read_response(&mut stream))
                .map(|resp| matches!(resp, Response::Get(_)))
                .unwrap_or(false);
            if served {
                break;
            }
            assert!(Instant::now() < deadline, "slot never released (round {})", round);
            thread::sleep(Duration::from_millis(20));
        }
    }

    replica.stop();
}

#[test]
fn test_tcp_replica_reports_error_frame_as_remote() {
    // Answers one request with an ERROR frame
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request(&mut stream).unwrap();
        write_response(&mut stream, &Response::error("boom")).unwrap();
        // Hold the connection open until the client hangs up
        let _ = read_request(&mut stream);
    });

    let tcp = TcpReplica::connect(addr.to_string(), Duration::from_secs(1), None).unwrap();
    match tcp.call(&get("k")) {
        Err(RegisterError::Remote(message)) => assert_eq!(message, "boom"),
        other => panic!("Expected remote error, got {:?}", other),
    }
    assert!(!tcp.is_connected());

    peer.join().unwrap();
}

#[test]
fn test_shutdown_closes_open_connections() {
    let replica = start_fresh();
    let mut stream = TcpStream::connect(replica.addr).unwrap();
    write_request(&mut stream, &get("k")).unwrap();
    read_response(&mut stream).unwrap();

    replica.stop();

    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let _ = write_request(&mut stream, &get("k"));
    assert!(read_response(&mut stream).is_err());
}

// =============================================================================
// TcpReplica Tests
// =============================================================================

#[test]
fn test_tcp_replica_call() {
    let replica = start_fresh();
    let tcp = TcpReplica::connect(replica.addr.to_string(), Duration::from_secs(1), None).unwrap();

    assert!(tcp.is_connected());
    assert_eq!(tcp.name(), replica.addr.to_string());
    assert!(matches!(tcp.call(&set("k", "v", 1, 0)).unwrap(), Response::Set(_)));
    match tcp.call(&get("k")).unwrap() {
        Response::Get(resp) => assert_eq!(resp.value, "v"),
        other => panic!("Expected GET response, got {:?}", other),
    }

    replica.stop();
}

#[test]
fn test_tcp_replica_unreachable() {
    let result = TcpReplica::connect(dead_addr().to_string(), Duration::from_secs(1), None);
    assert!(matches!(result, Err(RegisterError::Transport { .. })));
}

#[test]
fn test_tcp_replica_reconnects_after_restart() {
    let replica = start_fresh();
    let tcp = TcpReplica::connect(replica.addr.to_string(), Duration::from_secs(1), None).unwrap();
    tcp.call(&set("k", "before", 1, 0)).unwrap();

    let (addr, store) = replica.stop();
    assert!(tcp.call(&get("k")).is_err());
    assert!(!tcp.is_connected());

    let replica = start_replica(&addr.to_string(), store, 64);
    match tcp.call(&get("k")).unwrap() {
        Response::Get(resp) => assert_eq!(resp.value, "before"),
        other => panic!("Expected GET response, got {:?}", other),
    }

    replica.stop();
}

#[test]
fn test_tcp_replica_call_deadline() {
    // Accepts connections but never answers
    let silent = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = silent.local_addr().unwrap();
    let acceptor = thread::spawn(move || {
        let (stream, _) = silent.accept().unwrap();
        thread::sleep(Duration::from_secs(2));
        drop(stream);
    });

    let tcp = TcpReplica::connect(
        addr.to_string(),
        Duration::from_secs(1),
        Some(Duration::from_millis(100)),
    )
    .unwrap();

    let start = Instant::now();
    let result = tcp.call(&get("k"));
    assert!(matches!(result, Err(RegisterError::Transport { .. })));
    assert!(start.elapsed() < Duration::from_secs(1));

    acceptor.join().unwrap();
}

// =============================================================================
// Client Construction Tests
// =============================================================================

#[test]
fn test_connect_tolerates_unreachable_minority() {
    let r1 = start_fresh();
    let r2 = start_fresh();
    let config = ClientConfig::builder()
        .replica(r1.addr.to_string())
        .replica(r2.addr.to_string())
        .replica(dead_addr().to_string())
        .client_id(1)
        .build();

    let client = RegisterClient::connect(&config).unwrap();
    client.write("k", "v").unwrap();
    assert_eq!(client.read("k").unwrap(), "v");

    r1.stop();
    r2.stop();
}

#[test]
fn test_connect_fails_without_majority() {
    let r1 = start_fresh();
    let config = ClientConfig::builder()
        .replica(r1.addr.to_string())
        .replica(dead_addr().to_string())
        .replica(dead_addr().to_string())
        .build();

    assert!(matches!(
        RegisterClient::connect(&config),
        Err(RegisterError::Config(_))
    ));

    r1.stop();
}

#[test]
fn test_connect_rejects_empty_list() {
    let config = ClientConfig::default();
    assert!(matches!(
        RegisterClient::connect(&config),
        Err(RegisterError::Config(_))
    ));
}
