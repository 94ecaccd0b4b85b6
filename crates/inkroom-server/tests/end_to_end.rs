//! Drives a real server over WebSockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use inkroom_core::shapes::Rect;
use inkroom_core::{ClientMessage, RoomClient, ServerMessage, Shape, ShapeRecord};
use inkroom_server::{Hub, Room, ServerConfig, ShapeRepository, memory_hub, router, serve};
use jsonwebtoken::{EncodingKey, Header, encode};
use kurbo::Point;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "test-secret";

#[derive(Serialize)]
struct Claims<'a> {
    id: &'a str,
    exp: u64,
}

fn token(user: &str) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    encode(
        &Header::default(),
        &Claims { id: user, exp },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn config() -> ServerConfig {
    ServerConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        jwt_secret: SECRET.into(),
        replay_limit: 100,
        rooms: vec![Room {
            id: "abc".into(),
            slug: "sketch".into(),
            admin: "alice".into(),
        }],
    }
}

async fn start() -> SocketAddr {
    let config = config();
    let listener = TcpListener::bind(config.addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, memory_hub(&config)));
    addr
}

async fn connect(addr: SocketAddr, user: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws?token={}", token(user)))
        .await
        .unwrap();
    socket
}

async fn send(socket: &mut Socket, msg: &ClientMessage) {
    socket.send(Message::Text(msg.to_json().unwrap().into())).await.unwrap();
}

/// Next text frame, as raw JSON.
async fn next_frame(socket: &mut Socket) -> String {
    loop {
        let msg = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

async fn next(socket: &mut Socket) -> ServerMessage {
    ServerMessage::from_json(&next_frame(socket).await).unwrap()
}

/// Join and wait until our own identity shows up in the roster.
async fn join(socket: &mut Socket, client: &mut RoomClient) {
    client.join_room("abc");
    for frame in client.take_outgoing() {
        socket.send(Message::Text(frame.into())).await.unwrap();
    }
    loop {
        let frame = next_frame(socket).await;
        let msg = ServerMessage::from_json(&frame).unwrap();
        client.handle_message(&frame, Instant::now());
        if let ServerMessage::ParticipantsUpdate { participants, .. } = msg {
            if participants.iter().any(|p| p.user_id == client.user_id()) {
                return;
            }
        }
    }
}

fn rect(id: &str, x: f64) -> Shape {
    let mut r = Rect::new(Point::new(x, 10.0), 50.0, 30.0, "black");
    r.id = id.into();
    Shape::Rect(r)
}

#[tokio::test]
async fn test_create_broadcast_and_replay() {
    let addr = start().await;
    let mut a = connect(addr, "alice").await;
    let mut b = connect(addr, "bob").await;
    let mut alice = RoomClient::new("alice");
    let mut bob = RoomClient::new("bob");
    join(&mut a, &mut alice).await;
    join(&mut b, &mut bob).await;
    // Alice also sees bob's arrival.
    next(&mut a).await;

    alice.local_create(rect("r1", 10.0));
    for frame in alice.take_outgoing() {
        a.send(Message::Text(frame.into())).await.unwrap();
    }

    let frame = next_frame(&mut b).await;
    assert!(matches!(
        bob.handle_message(&frame, Instant::now()),
        Some(inkroom_core::RoomEvent::ShapeCreated { .. })
    ));
    assert_eq!(bob.store().get("r1"), Some(&rect("r1", 10.0)));

    // The originator gets its own echo, which commits the shape.
    let frame = next_frame(&mut a).await;
    alice.handle_message(&frame, Instant::now());
    assert_eq!(alice.store().sync_state("r1"), Some(inkroom_core::SyncState::Committed));

    let mut c = connect(addr, "carol").await;
    let mut carol = RoomClient::new("carol");
    join(&mut c, &mut carol).await;
    assert_eq!(carol.store().len(), 1);
    assert_eq!(carol.store().get("r1"), Some(&rect("r1", 10.0)));
}

#[tokio::test]
async fn test_room_order_is_preserved() {
    let addr = start().await;
    let mut a = connect(addr, "alice").await;
    let mut b = connect(addr, "bob").await;
    let mut alice = RoomClient::new("alice");
    let mut bob = RoomClient::new("bob");
    join(&mut a, &mut alice).await;
    join(&mut b, &mut bob).await;

    for (id, x) in [("A", 1.0), ("B", 2.0), ("C", 3.0)] {
        send(&mut a, &ClientMessage::Create { room_id: "abc".into(), shape: rect(id, x) }).await;
    }

    let mut seen = Vec::new();
    while seen.len() < 3 {
        if let ServerMessage::Created { message, .. } = next(&mut b).await {
            let shape: Shape = serde_json::from_str(&message).unwrap();
            seen.push(shape.id().unwrap().to_string());
        }
    }
    assert_eq!(seen, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_roster_follows_disconnect() {
    let addr = start().await;
    let mut a = connect(addr, "alice").await;
    let mut b = connect(addr, "bob").await;
    let mut alice = RoomClient::new("alice");
    let mut bob = RoomClient::new("bob");
    join(&mut a, &mut alice).await;
    join(&mut b, &mut bob).await;

    match next(&mut a).await {
        ServerMessage::ParticipantsUpdate { participants, .. } => {
            let ids: Vec<_> = participants.into_iter().map(|p| p.user_id).collect();
            assert_eq!(ids, vec!["alice", "bob"]);
        }
        other => panic!("Expected roster, got {:?}", other),
    }

    b.close(None).await.unwrap();
    drop(b);

    match next(&mut a).await {
        ServerMessage::ParticipantsUpdate { participants, .. } => {
            let ids: Vec<_> = participants.into_iter().map(|p| p.user_id).collect();
            assert_eq!(ids, vec!["alice"]);
        }
        other => panic!("Expected roster, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cursor_reaches_other_members_only() {
    let addr = start().await;
    let mut a = connect(addr, "alice").await;
    let mut b = connect(addr, "bob").await;
    let mut alice = RoomClient::new("alice");
    let mut bob = RoomClient::new("bob");
    join(&mut a, &mut alice).await;
    join(&mut b, &mut bob).await;
    next(&mut a).await;

    send(&mut a, &ClientMessage::CursorMove { room_id: "abc".into(), x: 12.0, y: 34.0 }).await;
    match next(&mut b).await {
        ServerMessage::CursorMove { user_id, x, y, .. } => {
            assert_eq!(user_id, "alice");
            assert_eq!((x, y), (12.0, 34.0));
        }
        other => panic!("Expected cursor, got {:?}", other),
    }
    assert!(timeout(Duration::from_millis(200), a.next()).await.is_err());
}

#[tokio::test]
async fn test_bad_token_is_closed_without_payload() {
    let addr = start().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws?token=garbage"))
        .await
        .unwrap();
    loop {
        match timeout(Duration::from_secs(5), socket.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => panic!("Unexpected payload: {}", text.as_str()),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(_)) => {}
        }
    }
}

/// Issue a GET against the router in-process.
async fn get_json(hub: Arc<Hub>, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router(hub)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

#[tokio::test]
async fn test_shapes_endpoint_lists_newest_first() {
    let hub = memory_hub(&config());
    for (id, x) in [("old", 1.0), ("new", 2.0)] {
        let record = ShapeRecord::from_shape("abc", "alice", &rect(id, x)).unwrap();
        hub.repository().create_row(record).await.unwrap();
    }

    let (status, value) = get_json(hub, "/rooms/abc/shapes?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = value["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["new", "old"]);
}

#[tokio::test]
async fn test_room_lookup_by_slug() {
    let hub = memory_hub(&config());

    let (status, value) = get_json(hub.clone(), "/rooms/by-slug/sketch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["room"]["id"], "abc");
    assert_eq!(value["room"]["slug"], "sketch");
    assert_eq!(value["room"]["adminId"], "alice");

    let (status, value) = get_json(hub, "/rooms/by-slug/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"], "Room Not Found");
}
