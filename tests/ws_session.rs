//! End-to-end tests over real WebSocket connections

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use pong_arena::app::AppState;
use pong_arena::client::{ClientPhase, ClientSession};
use pong_arena::config::Config;
use pong_arena::game::{GameSession, SessionHandle, SessionSettings};
use pong_arena::http::build_router;
use pong_arena::ws::protocol::{decode_server, ServerMsg, Side};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    start_server_with(Config::default()).await.0
}

async fn start_server_with(config: Config) -> (SocketAddr, SessionHandle) {
    let (session, handle) = GameSession::new(SessionSettings::from(&config), 7);
    tokio::spawn(session.run());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(AppState::new(config, handle.clone()));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, handle)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Next non-snapshot, non-ping message; `None` once the server closes
async fn next_notice(ws: &mut Ws) -> Option<ServerMsg> {
    timeout(Duration::from_secs(3), async {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Text(text)) => match decode_server(&text) {
                    Some(ServerMsg::State { .. }) | Some(ServerMsg::Ping { .. }) => continue,
                    other => return other,
                },
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    })
    .await
    .expect("timed out waiting for server")
}

async fn next_state(ws: &mut Ws) -> ServerMsg {
    timeout(Duration::from_secs(3), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(msg @ ServerMsg::State { .. }) = decode_server(&text) {
                        return msg;
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

fn side_of(msg: Option<ServerMsg>) -> Side {
    match msg {
        Some(ServerMsg::Init { side, .. }) => side,
        other => panic!("expected init, got {other:?}"),
    }
}

#[tokio::test]
async fn third_connection_gets_full_and_match_is_unchanged() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    assert_eq!(side_of(next_notice(&mut a).await), Side::Left);
    let mut b = connect(addr).await;
    assert_eq!(side_of(next_notice(&mut b).await), Side::Right);

    let mut c = connect(addr).await;
    assert_eq!(next_notice(&mut c).await, Some(ServerMsg::Full));
    assert_eq!(next_notice(&mut c).await, None);

    let snapshot = next_state(&mut a).await;
    assert!(snapshot.paddle(Side::Left).is_some());
    assert!(snapshot.paddle(Side::Right).is_some());
}

#[tokio::test]
async fn leaving_player_ends_match_for_everyone() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    side_of(next_notice(&mut a).await);
    let mut b = connect(addr).await;
    side_of(next_notice(&mut b).await);

    b.close(None).await.unwrap();

    assert_eq!(
        next_notice(&mut a).await,
        Some(ServerMsg::End {
            reason: "player_left".to_string()
        })
    );
    assert_eq!(next_notice(&mut a).await, None);

    let mut c = connect(addr).await;
    assert_eq!(side_of(next_notice(&mut c).await), Side::Left);
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    side_of(next_notice(&mut a).await);

    a.send(Message::Text("definitely not json".to_string()))
        .await
        .unwrap();
    a.send(Message::Text(r#"{"type":"warp","x":1}"#.to_string()))
        .await
        .unwrap();

    // Still seated and receiving snapshots
    let snapshot = next_state(&mut a).await;
    assert!(snapshot.paddle(Side::Left).is_some());
}

#[tokio::test]
async fn touch_flood_does_not_starve_heartbeat_replies() {
    let (addr, handle) = start_server_with(Config {
        heartbeat_interval_ms: 100,
        heartbeat_timeout_multiple: 3,
        ..Config::default()
    })
    .await;
    let mut ws = connect(addr).await;
    side_of(next_notice(&mut ws).await);

    let deadline = Instant::now() + Duration::from_millis(800);
    let mut pongs = 0;
    while Instant::now() < deadline {
        for i in 0..20 {
            let touch = format!(r#"{{"type":"touchMove","desiredY":{}}}"#, i * 10);
            ws.send(Message::Text(touch)).await.unwrap();
        }

        while let Ok(frame) = timeout(Duration::from_millis(2), ws.next()).await {
            match frame {
                Some(Ok(Message::Text(text))) => match decode_server(&text) {
                    Some(ServerMsg::Ping { t }) => {
                        ws.send(Message::Text(format!(r#"{{"type":"pong","t":{t}}}"#)))
                            .await
                            .unwrap();
                        pongs += 1;
                    }
                    Some(ServerMsg::End { reason }) => panic!("match ended: {reason}"),
                    _ => {}
                },
                Some(Ok(_)) => {}
                other => panic!("connection ended: {other:?}"),
            }
        }
    }

    assert!(pongs >= 3);
    assert_eq!(handle.status().participants, 1);
}

#[tokio::test]
async fn renderer_reconstructs_poses_from_live_snapshots() {
    let addr = start_server().await;
    let mut ws = connect(addr).await;
    let mut client = ClientSession::new(100.0);
    let start = Instant::now();

    timeout(Duration::from_secs(3), async {
        while client.buffer().len() < 10 {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                panic!("connection ended");
            };
            let now_ms = start.elapsed().as_secs_f64() * 1000.0;
            if let Some(reply) = client.handle_text(&text, now_ms) {
                ws.send(Message::Text(reply)).await.unwrap();
            }
        }
    })
    .await
    .expect("timed out buffering snapshots");

    assert_eq!(client.phase(), &ClientPhase::Playing);
    assert_eq!(client.side(), Some(Side::Left));

    let now_ms = start.elapsed().as_secs_f64() * 1000.0;
    let pose = client.pose(now_ms).expect("pose available");
    assert!((0.0..=1.0).contains(&pose.alpha));
    assert!(pose.left.is_some());
    assert!(pose.right.is_none());
}
