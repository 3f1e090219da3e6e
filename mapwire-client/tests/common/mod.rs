//! Shared mock-server utilities for integration tests.
//!
//! The mock speaks the client's wire protocol from the server side: it
//! answers the one-byte handshake, parses request frames (event tag,
//! size, optional transaction id, payload), and writes scripted response
//! frames. Tests drive it with one spawned task per scenario.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use mapwire_client::{MapConfig, NativeCodec, RemoteMap};
use mapwire_core::protocol::STATELESS_CLIENT_IDENTIFIER;
use mapwire_core::EventId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Identifier byte the mock hands back during the handshake.
pub const SERVER_IDENTIFIER: u8 = 0x07;

/// One parsed request frame.
#[derive(Debug)]
pub struct MockRequest {
    pub event: EventId,
    pub txn: Option<u64>,
    pub payload: Vec<u8>,
}

pub async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

pub fn test_config(addr: SocketAddr) -> MapConfig {
    MapConfig::builder(addr)
        .name("test-map")
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

pub async fn string_map(addr: SocketAddr) -> RemoteMap<String, String, NativeCodec> {
    RemoteMap::connect(test_config(addr), NativeCodec::new()).await
}

/// Accepts one connection and answers the handshake.
pub async fn accept_and_handshake(listener: &TcpListener) -> TcpStream {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut byte = [0u8; 1];
    socket.read_exact(&mut byte).await.unwrap();
    assert_eq!(byte[0], STATELESS_CLIENT_IDENTIFIER, "bad handshake byte");
    socket.write_all(&[SERVER_IDENTIFIER]).await.unwrap();
    socket
}

/// Reads one request frame, splitting off the transaction id unless the
/// event is fire-and-forget.
pub async fn read_request(socket: &mut TcpStream) -> MockRequest {
    let mut tag = [0u8; 1];
    socket.read_exact(&mut tag).await.unwrap();
    let event = EventId::from_ordinal(tag[0]).expect("unknown event tag");

    let mut size = [0u8; 4];
    socket.read_exact(&mut size).await.unwrap();
    let size = u32::from_ne_bytes(size) as usize;

    let mut body = vec![0u8; size];
    socket.read_exact(&mut body).await.unwrap();

    if event.is_fire_and_forget() {
        MockRequest {
            event,
            txn: None,
            payload: body,
        }
    } else {
        let mut txn = [0u8; 8];
        txn.copy_from_slice(&body[..8]);
        MockRequest {
            event,
            txn: Some(u64::from_ne_bytes(txn)),
            payload: body[8..].to_vec(),
        }
    }
}

/// Writes one response frame: `[size][is_exception][txn][payload]`.
pub async fn write_frame(socket: &mut TcpStream, txn: u64, is_exception: bool, payload: &[u8]) {
    let size = 1 + 8 + payload.len();
    let mut frame = Vec::with_capacity(4 + size);
    frame.extend_from_slice(&(size as u32).to_ne_bytes());
    frame.push(u8::from(is_exception));
    frame.extend_from_slice(&txn.to_ne_bytes());
    frame.extend_from_slice(payload);
    socket.write_all(&frame).await.unwrap();
}

pub async fn write_response(socket: &mut TcpStream, txn: u64, payload: &[u8]) {
    write_frame(socket, txn, false, payload).await;
}

/// A length-prefixed string as the `NativeCodec` encodes it.
pub fn string_bytes(s: &str) -> Vec<u8> {
    let mut out = (s.len() as i32).to_ne_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out
}

/// A present nullable value: marker byte then the value bytes.
pub fn present_value(s: &str) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&string_bytes(s));
    out
}

/// The absent nullable value: just the marker byte.
pub fn absent_value() -> Vec<u8> {
    vec![0u8]
}

/// One streamed chunk: continuation flag, entry count, entry bytes.
pub fn chunk(has_more: bool, entries: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![u8::from(has_more)];
    out.extend_from_slice(&(entries.len() as i32).to_ne_bytes());
    for entry in entries {
        out.extend_from_slice(entry);
    }
    out
}

/// Reads a stop-bit varint out of a request payload.
pub fn parse_stop_bit(payload: &[u8], at: &mut usize) -> u64 {
    let mut v: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = payload[*at];
        *at += 1;
        v |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 != 0 {
            return v;
        }
        shift += 7;
    }
}

/// Reads a length-prefixed string out of a request payload.
pub fn parse_string(payload: &[u8], at: &mut usize) -> String {
    let mut len = [0u8; 4];
    len.copy_from_slice(&payload[*at..*at + 4]);
    let len = i32::from_ne_bytes(len) as usize;
    *at += 4;
    let s = String::from_utf8(payload[*at..*at + len].to_vec()).unwrap();
    *at += len;
    s
}
