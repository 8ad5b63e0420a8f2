use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{error, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};
use serde::Deserialize;

use system::{
    bincode, ConnectionId, IdentifiableCommand, IdentifiableEvent, InvalidActionKind, RoomId,
    SessionError, UserProfile,
};

use crate::directory::Authenticator;
use crate::registry::SessionRegistry;
use crate::room::{RoomMessage, RoomTx};

/// What the room (or the join task) pushes at a connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    Joined {
        connection_id: ConnectionId,
        room_tx: RoomTx,
    },
    Event(IdentifiableEvent),
    /// Join was turned away; deliver the error and close.
    Rejected(SessionError),
    Closed,
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Joining,
    Joined {
        connection_id: ConnectionId,
        room_tx: RoomTx,
    },
}

pub struct ConnectionActor {
    registry: SessionRegistry,
    profile: UserProfile,
    room_id: RoomId,
    state: ConnectionState,
}

impl ConnectionActor {
    pub fn new(registry: SessionRegistry, profile: UserProfile, room_id: RoomId) -> Self {
        Self {
            registry,
            profile,
            room_id,
            state: ConnectionState::Joining,
        }
    }

    fn reject_frame(&self, ctx: &mut ws::WebsocketContext<Self>, error: SessionError) {
        let frame = IdentifiableEvent::Rejected { error };
        ctx.binary(bincode::serialize(&frame).expect("must succeed"));
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) =
            tokio::sync::mpsc::channel::<ConnectionEvent>(self.registry.config().outbound_buffer);
        let addr = ctx.address().recipient();
        let registry = self.registry.clone();
        let profile = self.profile.clone();
        let room_id = self.room_id.clone();

        tokio::spawn(async move {
            log::debug!("connection task for {} - started", profile.user_id);
            // A session that retires while we join drops our request; the
            // registry then hands out a fresh session to retry against.
            loop {
                let room_tx = registry.get_or_create(&room_id);
                let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
                let join = RoomMessage::Join {
                    profile: profile.clone(),
                    tx: tx.clone(),
                    reply: reply_tx,
                };
                if room_tx.send(join).await.is_err() {
                    continue;
                }
                match reply_rx.await {
                    Ok(Ok(connection_id)) => {
                        let joined = ConnectionActorMessage(ConnectionEvent::Joined {
                            connection_id,
                            room_tx,
                        });
                        if addr.send(joined).await.is_err() {
                            return;
                        }
                        break;
                    }
                    Ok(Err(session_error)) => {
                        let _ = addr
                            .send(ConnectionActorMessage(ConnectionEvent::Rejected(
                                session_error,
                            )))
                            .await;
                        return;
                    }
                    Err(_) => continue,
                }
            }
            // only the room holds a sender now; its removal ends the loop
            drop(tx);

            while let Some(event) = rx.recv().await {
                if addr.send(ConnectionActorMessage(event)).await.is_err() {
                    return;
                }
            }
            let _ = addr.send(ConnectionActorMessage(ConnectionEvent::Closed)).await;
            log::debug!("connection task - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Joined {
            connection_id,
            room_tx,
        } = &self.state
        {
            let _ = room_tx.try_send(RoomMessage::Leave {
                from: *connection_id,
            });
        }
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("ingress size: {}", bin.len());
                if let ConnectionState::Joined {
                    connection_id,
                    room_tx,
                } = &self.state
                {
                    match bincode::deserialize::<IdentifiableCommand>(&bin) {
                        Ok(command) => {
                            log::debug!("ingress {:?}", command);
                            let message = RoomMessage::Command {
                                from: *connection_id,
                                command,
                            };
                            match room_tx.try_send(message) {
                                Ok(()) => {}
                                Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                                    log::warn!(
                                        "room {} inbox saturated, dropping a frame",
                                        self.room_id
                                    );
                                }
                                Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                                    ctx.close(Some(CloseReason {
                                        code: CloseCode::Again,
                                        description: None,
                                    }));
                                    ctx.stop();
                                }
                            }
                        }
                        Err(_) => {
                            // rejected per-message; the connection stays open
                            self.reject_frame(
                                ctx,
                                SessionError::InvalidAction(InvalidActionKind::MalformedMessage),
                            );
                        }
                    }
                }
            }
            Ok(ws::Message::Text(_)) => {
                // the protocol is binary frames only
                self.reject_frame(
                    ctx,
                    SessionError::InvalidAction(InvalidActionKind::MalformedMessage),
                );
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        let connection_event = msg.0;
        log::debug!("egress {:?}", connection_event);
        match connection_event {
            ConnectionEvent::Joined {
                connection_id,
                room_tx,
            } => {
                self.state = ConnectionState::Joined {
                    connection_id,
                    room_tx,
                };
            }
            ConnectionEvent::Event(event) => {
                let serialized = bincode::serialize(&event).expect("must succeed");
                ctx.binary(serialized);
            }
            ConnectionEvent::Rejected(session_error) => {
                self.reject_frame(ctx, session_error);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Policy,
                    description: None,
                }));
                ctx.stop();
            }
            ConnectionEvent::Closed => {
                ctx.close(None);
                ctx.stop();
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    token: Option<String>,
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<ConnectQuery>,
    registry: web::Data<SessionRegistry>,
    auth: web::Data<dyn Authenticator>,
) -> Result<HttpResponse, Error> {
    let room_id: RoomId = req.match_info().get("room_id").unwrap().to_owned();

    let profile = match &query.token {
        Some(token) => auth
            .authenticate(token)
            .ok_or_else(|| error::ErrorUnauthorized("unknown token"))?,
        None => UserProfile::anonymous(),
    };
    if registry.directory().room_meta(&room_id).is_none() {
        return Err(error::ErrorNotFound("room not found"));
    }

    ws::start(
        ConnectionActor::new(registry.get_ref().clone(), profile, room_id),
        &req,
        stream,
    )
}
