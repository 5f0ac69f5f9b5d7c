// ============================
// pointing-backend-lib/src/room_actor.rs
// ============================
//! Per-room actor.
//!
//! Every room is owned by exactly one tokio task; all mutations flow through
//! its command channel and run to completion one at a time, so a reveal can
//! never interleave a vote on the same room. The actor also owns the room's
//! subscriber map and republishes the full snapshot after each mutation.
//!
//! Once the last member leaves the actor closes: further joins are refused
//! with `RoomClosed` and the registry retries against a fresh room.

use std::collections::HashMap;
use std::sync::Arc;

use pointing_common::{MemberId, ServerToClient, VotingSystem};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::room::{Room, RoomPolicy};

/// Message sent *into* the actor
#[derive(Debug)]
pub enum RoomMsg {
    Join {
        id: MemberId,
        name: String,
        request_admin: bool,
        tx: mpsc::Sender<ServerToClient>,
        resp_tx: mpsc::UnboundedSender<Result<(), AppError>>,
    },
    Vote {
        id: MemberId,
        value: String,
    },
    Reveal {
        id: MemberId,
    },
    Reset {
        id: MemberId,
    },
    ChangeVotingSystem {
        id: MemberId,
        system: VotingSystem,
    },
    RemoveMember {
        requester: MemberId,
        target: MemberId,
        resp_tx: mpsc::UnboundedSender<bool>,
    },
    Leave {
        id: MemberId,
        resp_tx: mpsc::UnboundedSender<bool>,
    },
}

/// Handle that other components keep: the actor's command channel.
#[derive(Clone)]
pub struct RoomHandle {
    cmd_tx: mpsc::UnboundedSender<RoomMsg>,
}

impl RoomHandle {
    /// Join this room, subscribing `tx` to its broadcasts on success.
    pub async fn join(
        &self,
        id: MemberId,
        name: String,
        request_admin: bool,
        tx: mpsc::Sender<ServerToClient>,
    ) -> Result<(), AppError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx
            .send(RoomMsg::Join {
                id,
                name,
                request_admin,
                tx,
                resp_tx,
            })
            .map_err(|_| AppError::RoomClosed)?;
        resp_rx.recv().await.ok_or(AppError::ChannelClosed)?
    }

    /// Fire-and-forget operations. Invalid or unauthorized requests are
    /// dropped inside the actor with no reply, matching the protocol's
    /// silently-ignored error model.
    pub fn cast_vote(&self, id: MemberId, value: String) {
        let _ = self.cmd_tx.send(RoomMsg::Vote { id, value });
    }

    pub fn reveal(&self, id: MemberId) {
        let _ = self.cmd_tx.send(RoomMsg::Reveal { id });
    }

    pub fn reset(&self, id: MemberId) {
        let _ = self.cmd_tx.send(RoomMsg::Reset { id });
    }

    pub fn change_voting_system(&self, id: MemberId, system: VotingSystem) {
        let _ = self.cmd_tx.send(RoomMsg::ChangeVotingSystem { id, system });
    }

    /// Remove `target` on behalf of `requester`. Returns whether the room is
    /// now empty so the registry can drop it.
    pub async fn remove_member(&self, requester: MemberId, target: MemberId) -> bool {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        if self
            .cmd_tx
            .send(RoomMsg::RemoveMember {
                requester,
                target,
                resp_tx,
            })
            .is_err()
        {
            return false;
        }
        resp_rx.recv().await.unwrap_or(false)
    }

    /// Remove `id` after a disconnect. Returns whether the room is now empty.
    pub async fn leave(&self, id: MemberId) -> bool {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        if self.cmd_tx.send(RoomMsg::Leave { id, resp_tx }).is_err() {
            return false;
        }
        resp_rx.recv().await.unwrap_or(false)
    }

    /// Whether `other` is a handle to the same actor. The registry uses this
    /// to avoid dropping a freshly recreated room during cleanup.
    pub fn same_channel(&self, other: &RoomHandle) -> bool {
        self.cmd_tx.same_channel(&other.cmd_tx)
    }
}

pub struct RoomActor {
    room_id: String,
    room: Room,
    subscribers: HashMap<MemberId, mpsc::Sender<ServerToClient>>,
    clock: Arc<dyn Clock>,
    policy: RoomPolicy,
    /// Set once the last member leaves; joins are refused from then on.
    closed: bool,
}

impl RoomActor {
    fn new(room_id: String, clock: Arc<dyn Clock>, policy: RoomPolicy) -> Self {
        let room = Room::new(clock.now());
        Self {
            room_id,
            room,
            subscribers: HashMap::new(),
            clock,
            policy,
            closed: false,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomMsg>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
            if self.closed {
                break;
            }
        }
        debug!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle(&mut self, msg: RoomMsg) {
        match msg {
            RoomMsg::Join {
                id,
                name,
                request_admin,
                tx,
                resp_tx,
            } => {
                let result = self.handle_join(id, name, request_admin, tx);
                let _ = resp_tx.send(result);
            },
            RoomMsg::Vote { id, value } => {
                if self.room.vote(id, value, self.clock.now()) {
                    metrics::counter!(crate::metrics::VOTES_CAST).increment(1);
                    self.publish();
                }
            },
            RoomMsg::Reveal { id } => {
                if self.room.reveal(id, self.clock.now()) {
                    self.publish();
                }
            },
            RoomMsg::Reset { id } => {
                if self.room.reset(id, self.clock.now()) {
                    self.publish();
                }
            },
            RoomMsg::ChangeVotingSystem { id, system } => {
                if self.room.change_voting_system(id, system, self.clock.now()) {
                    self.publish();
                }
            },
            RoomMsg::RemoveMember {
                requester,
                target,
                resp_tx,
            } => {
                let _ = resp_tx.send(self.handle_remove_member(requester, target));
            },
            RoomMsg::Leave { id, resp_tx } => {
                let _ = resp_tx.send(self.handle_leave(id));
            },
        }
    }

    fn handle_join(
        &mut self,
        id: MemberId,
        name: String,
        request_admin: bool,
        tx: mpsc::Sender<ServerToClient>,
    ) -> Result<(), AppError> {
        if self.closed {
            return Err(AppError::RoomClosed);
        }

        self.room
            .join(id, name, request_admin, self.clock.now(), &self.policy)?;

        self.subscribers.insert(id, tx);
        // the periodic reset inside join may have purged abandoned members
        let room = &self.room;
        self.subscribers.retain(|sub_id, _| room.contains(*sub_id));
        self.publish();
        Ok(())
    }

    fn handle_remove_member(&mut self, requester: MemberId, target: MemberId) -> bool {
        if !self
            .room
            .remove_member(requester, target, self.clock.now())
        {
            return false;
        }

        // dedicated out-of-band signal before the subscription is dropped
        if let Some(tx) = self.subscribers.remove(&target) {
            if tx.try_send(ServerToClient::Kicked).is_err() {
                debug!(room_id = %self.room_id, member_id = %target, "kicked member unreachable");
            }
        }

        if self.room.is_empty() {
            self.closed = true;
            return true;
        }
        self.publish();
        false
    }

    fn handle_leave(&mut self, id: MemberId) -> bool {
        self.subscribers.remove(&id);
        if !self.room.remove(id) {
            return false;
        }
        if self.room.is_empty() {
            self.closed = true;
            return true;
        }
        self.publish();
        false
    }

    /// Push the complete current room snapshot to every member. No deltas: a
    /// subscriber that misses one update is consistent again on the next.
    fn publish(&self) {
        let update = ServerToClient::RoomUpdate {
            room: self.room.snapshot(),
        };
        for (member_id, tx) in &self.subscribers {
            if let Err(e) = tx.try_send(update.clone()) {
                warn!(room_id = %self.room_id, member_id = %member_id, error = %e,
                    "dropping room update for slow or gone subscriber");
            }
        }
    }
}

/// Spawn a new room actor and return its handle.
pub fn spawn_room_actor(room_id: &str, clock: Arc<dyn Clock>, policy: RoomPolicy) -> RoomHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let actor = RoomActor::new(room_id.to_string(), clock, policy);

    tokio::spawn(actor.run(cmd_rx));

    RoomHandle { cmd_tx }
}
