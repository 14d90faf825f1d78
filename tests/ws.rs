//! Live leaderboard subscription over a real socket.

#![allow(clippy::panic)]

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use common::Harness;
use contest_gateway::api::build_app;
use contest_gateway::domain::{MatchStatus, NewContest, NewMatchEvent, NewRoster, PlayerId, UserId};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(harness: &Harness) -> SocketAddr {
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("loopback bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("bound address");
    };
    let app = build_app(harness.state());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(client: &mut Client) -> Value {
    let read = async {
        while let Some(frame) = client.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    return serde_json::from_str::<Value>(text.as_str()).unwrap_or(Value::Null);
                }
                Ok(Message::Close(_)) | Err(_) => return Value::Null,
                Ok(_) => {}
            }
        }
        Value::Null
    };
    let Ok(value) = tokio::time::timeout(Duration::from_secs(5), read).await else {
        panic!("no frame within timeout");
    };
    value
}

async fn next_leaderboard(client: &mut Client) -> Value {
    loop {
        let msg = next_json(client).await;
        if msg.is_null() {
            panic!("socket closed before a leaderboard arrived");
        }
        if msg.pointer("/payload/event") == Some(&json!("leaderboard")) {
            return msg;
        }
    }
}

#[tokio::test]
async fn subscriber_receives_snapshot_then_live_updates() {
    let harness = Harness::new();
    let service = &harness.service;
    let Ok(m) = service.register_match(1, None).await else {
        panic!("match registers");
    };
    let captain = PlayerId::new();
    let vice = PlayerId::new();
    let owner = UserId::new();
    let Ok(roster) = service
        .register_roster(NewRoster {
            owner_id: owner,
            match_id: m.id,
            captain_player_id: captain,
            vice_captain_player_id: vice,
            members: vec![captain, vice],
        })
        .await
    else {
        panic!("roster registers");
    };
    let Ok(contest) = service
        .register_contest(NewContest {
            match_id: m.id,
            prize_pool: 0.0,
            prize_distribution: vec![],
        })
        .await
    else {
        panic!("contest registers");
    };
    let Ok(_) = service.enter_contest(contest.id, roster.id).await else {
        panic!("entry accepted");
    };

    let addr = serve(&harness).await;
    let url = format!("ws://{addr}/ws/contests/{}?viewer={owner}", contest.id);
    let Ok((mut client, _)) = connect_async(url).await else {
        panic!("upgrade succeeds");
    };

    let initial = next_leaderboard(&mut client).await;
    assert_eq!(initial.pointer("/payload/data/total_entries"), Some(&json!(1)));
    let Some(initial_sequence) = initial
        .pointer("/payload/data/sequence")
        .and_then(Value::as_u64)
    else {
        panic!("snapshot carries a sequence");
    };

    let Ok(_) = service.transition_match(m.id, MatchStatus::Live).await else {
        panic!("match goes live");
    };
    let Ok(_) = service
        .record_event(NewMatchEvent {
            match_id: m.id,
            player_id: captain,
            event_type: "kill".to_string(),
            points: 2.0,
            round_number: 1,
            recorded_by: UserId::new(),
        })
        .await
    else {
        panic!("event recorded");
    };

    let mut latest = next_leaderboard(&mut client).await;
    while latest.pointer("/payload/data/entries/0/total_points") != Some(&json!(4.0)) {
        latest = next_leaderboard(&mut client).await;
    }
    let Some(sequence) = latest
        .pointer("/payload/data/sequence")
        .and_then(Value::as_u64)
    else {
        panic!("snapshot carries a sequence");
    };
    assert!(sequence > initial_sequence);
    assert_eq!(latest.pointer("/payload/data/viewer/rank"), Some(&json!(1)));
}

#[tokio::test]
async fn commands_are_answered_and_unsubscribe_releases_the_slot() {
    let harness = Harness::new();
    let service = &harness.service;
    let Ok(m) = service.register_match(1, None).await else {
        panic!("match registers");
    };
    let Ok(contest) = service
        .register_contest(NewContest {
            match_id: m.id,
            prize_pool: 0.0,
            prize_distribution: vec![],
        })
        .await
    else {
        panic!("contest registers");
    };

    let addr = serve(&harness).await;
    let url = format!("ws://{addr}/ws/contests/{}", contest.id);
    let Ok((mut client, _)) = connect_async(url).await else {
        panic!("upgrade succeeds");
    };
    let _ = next_leaderboard(&mut client).await;
    assert_eq!(harness.connections.subscriber_count(contest.id).await, 1);

    let ping = json!({"id": "p1", "type": "command", "payload": {"command": "ping"}});
    let Ok(()) = client.send(Message::text(ping.to_string())).await else {
        panic!("send ping");
    };
    let pong = next_json(&mut client).await;
    assert_eq!(pong.get("type"), Some(&json!("response")));
    assert_eq!(pong.get("id"), Some(&json!("p1")));
    assert_eq!(pong.pointer("/payload/command"), Some(&json!("pong")));

    let status = json!({"id": "s1", "type": "command", "payload": {"command": "status"}});
    let Ok(()) = client.send(Message::text(status.to_string())).await else {
        panic!("send status");
    };
    let resent = next_leaderboard(&mut client).await;
    assert_eq!(resent.pointer("/payload/data/total_entries"), Some(&json!(0)));

    let bye = json!({"id": "u1", "type": "command", "payload": {"command": "unsubscribe"}});
    let Ok(()) = client.send(Message::text(bye.to_string())).await else {
        panic!("send unsubscribe");
    };
    let done = next_json(&mut client).await;
    assert_eq!(done.pointer("/payload/command"), Some(&json!("unsubscribe")));

    let mut remaining = 1;
    for _ in 0..50 {
        remaining = harness.connections.subscriber_count(contest.id).await;
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn rest_and_push_share_one_listener() {
    let harness = Harness::new();
    let Ok(m) = harness.service.register_match(1, None).await else {
        panic!("match registers");
    };
    let Ok(contest) = harness
        .service
        .register_contest(NewContest {
            match_id: m.id,
            prize_pool: 0.0,
            prize_distribution: vec![],
        })
        .await
    else {
        panic!("contest registers");
    };
    let addr = serve(&harness).await;
    let Ok((_client, _)) = connect_async(format!("ws://{addr}/ws/contests/{}", contest.id)).await
    else {
        panic!("upgrade succeeds");
    };

    let http = reqwest::Client::new();
    let mut live = 0;
    for _ in 0..50 {
        let response = tokio_test::assert_ok!(http.get(format!("http://{addr}/health")).send().await);
        let body: Value = tokio_test::assert_ok!(response.json().await);
        live = body.get("live_connections").and_then(Value::as_u64).unwrap_or(0);
        if live == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(live, 1);

    let leaderboard = tokio_test::assert_ok!(
        http.get(format!("http://{addr}/api/v1/contests/{}/leaderboard", contest.id))
            .send()
            .await
    );
    assert_eq!(leaderboard.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn unknown_contest_is_rejected_before_upgrade() {
    let harness = Harness::new();
    let addr = serve(&harness).await;
    let url = format!("ws://{addr}/ws/contests/{}", uuid::Uuid::new_v4());
    assert!(connect_async(url).await.is_err());
}
