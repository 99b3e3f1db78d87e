//! Runs one complete match against an in-process room server.
//!
//! The demo hosts a scripted TCP room server speaking the wire
//! protocol, binds two users to game accounts, and lets the matchmaker
//! drive the whole thing: both players join, seats are assigned, the
//! game starts, black loses, and the verdict lands on the console
//! channel. `RUST_LOG=stonewire_room=debug` shows the connection layer
//! at work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use stonewire::{
    encode_record, AuthRegistry, ExternalUser, HostedRoom, IdentityStore,
    MatchError, MatchRegistry, Matchmaker, Messenger, Profile, RoomConf,
    RoomDirectory, RoomServerInfo, RoomSnapshot, ServerEvent, Turn, UserId,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ADMIN: UserId = UserId(99);
const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);

// ---------------------------------------------------------------------------
// Scripted room server
// ---------------------------------------------------------------------------

/// Serves one client. Confs are echoed, `start` answers with a `start`
/// event, and the script injects the player joins and, once the game is
/// running, a defeat of the black seat.
async fn serve_room(listener: TcpListener, name: String) {
    let (stream, _) = match listener.accept().await {
        Ok(accepted) => accepted,
        Err(err) => {
            tracing::error!(error = %err, "room server accept failed");
            return;
        }
    };
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut conf = RoomConf::new(name, ADMIN);

    let (inject, mut injected) = mpsc::unbounded_channel::<ServerEvent>();
    // The players show up shortly after the room opens.
    let joins = inject.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = joins.send(ServerEvent::Enter { user: ALICE });
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = joins.send(ServerEvent::Enter { user: BOB });
    });

    loop {
        let event = tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let value: Value = match serde_json::from_str(&line) {
                    Ok(value) => value,
                    Err(_) => continue,
                };
                match value["type"].as_str() {
                    Some("connect") => ServerEvent::Connect {
                        room: RoomSnapshot {
                            id: "demo-room".into(),
                            created_at: 0,
                            conf: conf.clone(),
                            users: vec![ADMIN],
                            ingame: false,
                        },
                    },
                    Some("conf") => {
                        match serde_json::from_value(value["conf"].clone()) {
                            Ok(next) => conf = next,
                            Err(err) => {
                                tracing::warn!(error = %err, "bad conf");
                                continue;
                            }
                        }
                        ServerEvent::Conf { conf: conf.clone() }
                    }
                    Some("start") => {
                        // Black resigns two seconds into the game.
                        let defeat = inject.clone();
                        let loser = conf.black;
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_secs(2)).await;
                            let _ = defeat.send(ServerEvent::End {
                                loser,
                                cause: Some("gg".into()),
                            });
                        });
                        ServerEvent::Start {
                            black: conf.black,
                            white: conf.white,
                            turn: Turn::Black,
                            board: vec![vec!["o".into(); 5]; 5],
                        }
                    }
                    Some("chat") => ServerEvent::Chat {
                        user: ADMIN,
                        content: value["content"]
                            .as_str()
                            .unwrap_or_default()
                            .to_owned(),
                    },
                    _ => continue,
                }
            }
            event = injected.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        let frame = match encode_record(&event) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(error = %err, "encode failed");
                continue;
            }
        };
        if write.write_all(&frame).await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

struct DemoDirectory {
    users: Vec<Profile>,
    rooms: Mutex<Vec<HostedRoom>>,
}

impl RoomDirectory for DemoDirectory {
    async fn create_room(&self, name: &str) -> Result<HostedRoom, MatchError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|err| MatchError::Directory(err.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|err| MatchError::Directory(err.to_string()))?;
        tokio::spawn(serve_room(listener, name.to_owned()));

        let room = HostedRoom {
            id: format!("demo-{addr}"),
            server: RoomServerInfo {
                addr: addr.to_string(),
                invite: "demo-invite".into(),
            },
            name: name.to_owned(),
        };
        self.rooms
            .lock()
            .expect("room list poisoned")
            .push(room.clone());
        Ok(room)
    }

    async fn fetch_rooms(&self) -> Result<Vec<HostedRoom>, MatchError> {
        Ok(self.rooms.lock().expect("room list poisoned").clone())
    }

    async fn user(&self, id: UserId) -> Result<Profile, MatchError> {
        self.users
            .iter()
            .find(|profile| profile.id == id)
            .cloned()
            .ok_or_else(|| MatchError::Directory(format!("no account {id}")))
    }

    async fn list_users(&self) -> Result<Vec<Profile>, MatchError> {
        Ok(self.users.clone())
    }
}

/// Prints channel traffic to stdout.
struct ConsoleMessenger;

impl Messenger for ConsoleMessenger {
    async fn send(&self, text: &str) -> Result<(), MatchError> {
        println!("[#stone-arena] {text}");
        Ok(())
    }

    fn mention(&self, user: &ExternalUser) -> String {
        format!("@{}", user.nickname)
    }

    fn name(&self) -> String {
        "stone-arena".into()
    }
}

#[derive(Default)]
struct MemoryIdentity {
    bindings: Mutex<HashMap<String, UserId>>,
}

impl IdentityStore for MemoryIdentity {
    async fn get(
        &self,
        user: &ExternalUser,
    ) -> Result<Option<UserId>, MatchError> {
        let id = self
            .bindings
            .lock()
            .expect("bindings poisoned")
            .get(&user.key())
            .copied();
        Ok(id.filter(|id| id.is_assigned()))
    }

    async fn set(
        &self,
        user: &ExternalUser,
        id: UserId,
    ) -> Result<(), MatchError> {
        self.bindings
            .lock()
            .expect("bindings poisoned")
            .insert(user.key(), id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let alice = ExternalUser {
        id: "100".into(),
        platform: "console".into(),
        nickname: "Alice".into(),
    };
    let bob = ExternalUser {
        id: "200".into(),
        platform: "console".into(),
        nickname: "Bob".into(),
    };

    let directory = Arc::new(DemoDirectory {
        users: vec![
            Profile {
                id: ALICE,
                username: "alice".into(),
            },
            Profile {
                id: BOB,
                username: "bob".into(),
            },
            Profile {
                id: ADMIN,
                username: "referee".into(),
            },
        ],
        rooms: Mutex::new(Vec::new()),
    });
    let matchmaker = Matchmaker::new(
        ADMIN,
        directory,
        Arc::new(ConsoleMessenger),
        Arc::new(MemoryIdentity::default()),
        Arc::new(MatchRegistry::new()),
        Arc::new(AuthRegistry::new()),
    );

    // Bind both users to their game accounts.
    for (user, id) in [(&alice, ALICE), (&bob, BOB)] {
        matchmaker.begin_auth(user).await?;
        matchmaker.complete_auth(user, id).await?;
    }

    info!("starting the demo match");
    let handle = matchmaker.start_match(&alice, &bob).await?;
    handle.await?;
    info!("demo finished");
    Ok(())
}
