//! The `Core` context and the heartbeat loop.
//!
//! Everything the tick thread mutates hangs off one `Core` value: the world,
//! the session and connection tables, the command registries and the handle
//! to the store. Systems and command handlers receive `&mut Core`; nothing
//! in the core is a global.

use crate::accounts::{CharacterNameValidator, UsernameValidator};
use crate::command::{CommandParser, CommandTables};
use crate::components::SessionHolder;
use crate::connection::ConnectionRegistry;
use crate::error::CoreError;
use crate::hooks::CoreHooks;
use crate::link::LinkEvent;
use crate::objects::{Entity, ObjectId};
use crate::persist::{Db, DeserializeExt, SerializeExt};
use crate::protocol::{client_data_frame, ClientMessage};
use crate::session::Session;
use crate::systems::SystemRegistry;
use crate::world::World;
use async_std::channel::{Receiver, Sender};
use async_std::task;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use slog::{crit, error, info, warn, Logger};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(100);

/// Window and cap for account creation per edge host.
const ACCOUNT_CREATION_WINDOW: i64 = 3600;
const ACCOUNT_CREATION_CAP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameLoop {
    Running,
    Shutdown,
    Restart,
}

pub struct Core {
    pub world: World,
    pub db: Db,
    pub hooks: CoreHooks,
    pub parser: CommandParser,
    pub commands: CommandTables,
    pub sessions: HashMap<ObjectId, Session>,
    pub connections: ConnectionRegistry,
    pub status: GameLoop,
    pub heartbeat_interval: Duration,

    pub username_validators: Vec<UsernameValidator>,
    pub character_name_validators: Vec<CharacterNameValidator>,
    pub serialize_extensions: Vec<SerializeExt>,
    pub deserialize_extensions: Vec<DeserializeExt>,
    pub pre_load: Vec<fn(&mut Core)>,
    pub post_load: Vec<fn(&mut Core)>,

    pub(crate) link_outbound: Sender<Value>,
    pub(crate) link_inbox: Receiver<LinkEvent>,
    recent_account_hosts: HashMap<String, Vec<DateTime<Utc>>>,
}

impl Core {
    pub fn new(
        world: World,
        db: Db,
        link_outbound: Sender<Value>,
        link_inbox: Receiver<LinkEvent>,
    ) -> Self {
        Core {
            world,
            db,
            hooks: CoreHooks::default(),
            parser: CommandParser::default(),
            commands: CommandTables::default(),
            sessions: HashMap::new(),
            connections: ConnectionRegistry::default(),
            status: GameLoop::Running,
            heartbeat_interval: DEFAULT_HEARTBEAT,
            username_validators: Vec::new(),
            character_name_validators: Vec::new(),
            serialize_extensions: Vec::new(),
            deserialize_extensions: Vec::new(),
            pre_load: Vec::new(),
            post_load: Vec::new(),
            link_outbound,
            link_inbox,
            recent_account_hosts: HashMap::new(),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.world.logger
    }

    // -- world load / flush -------------------------------------------------

    pub async fn load(&mut self) -> Result<u64, CoreError> {
        for hook in self.pre_load.clone() {
            hook(self);
        }
        let db = self.db.clone();
        let extensions = self.deserialize_extensions.clone();
        let count = db
            .load_world(&mut self.world, &self.hooks, &extensions)
            .await?;
        for hook in self.post_load.clone() {
            hook(self);
        }
        Ok(count)
    }

    pub async fn flush_dirty(&mut self) -> Result<(), CoreError> {
        let db = self.db.clone();
        let extensions = self.serialize_extensions.clone();
        db.flush_dirty(&mut self.world, &extensions).await
    }

    // -- output plumbing ----------------------------------------------------

    /// Render and enqueue text for one client connection.
    pub fn send_text_to_connection(&mut self, conn_id: i64, text: &str) {
        let rendered = match self.connections.get(conn_id) {
            Some(conn) => (self.hooks.render_ansi)(text, conn.capabilities.color),
            None => return,
        };
        let frame = client_data_frame(conn_id, &[ClientMessage::text(rendered)]);
        if self.link_outbound.try_send(frame).is_err() {
            warn!(self.world.logger, "outbound link queue full, dropping frame";
                  "client" => conn_id);
        }
    }

    /// Buffer a line for whatever session drives the given entity.
    pub fn send_line_to_entity(&mut self, ent: Entity, text: &str) {
        let sid = match self.world.get::<SessionHolder>(ent) {
            Some(holder) => holder.session,
            None => return,
        };
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.send_line(text);
        }
    }

    pub fn send_text_to_entity(&mut self, ent: Entity, text: &str) {
        let sid = match self.world.get::<SessionHolder>(ent) {
            Some(holder) => holder.session,
            None => return,
        };
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.send_text(text);
        }
    }

    /// A line for every active session. Also logged, so it is visible even
    /// with nobody online (startup progress, emergencies).
    pub fn broadcast(&mut self, text: &str) {
        info!(self.world.logger, "{}", text);
        for session in self.sessions.values_mut() {
            session.send_line(text);
        }
    }

    // -- session management -------------------------------------------------

    /// Attach a connection to the character's session, creating the session
    /// if the character is not already being played.
    pub async fn join_session(&mut self, conn_id: i64, character: Entity) -> Result<(), CoreError> {
        let id = match self.world.object_id(character) {
            Some(id) => id,
            None => {
                warn!(self.world.logger, "join_session on a dead entity");
                return Ok(());
            }
        };
        let (account, admin_level) = match self.connections.get(conn_id) {
            Some(conn) => (conn.account.unwrap_or(-1), conn.admin_level),
            None => return Ok(()),
        };

        let sid = match self.world.get::<SessionHolder>(character) {
            Some(holder) => holder.session,
            None => {
                let mut session = Session::new(id, account, character);
                session.admin_level = admin_level;
                self.sessions.insert(id, session);
                self.world
                    .attach(character, SessionHolder { session: id, mode: 1 });
                self.db.touch_character_login(id.index as i64).await?;
                id
            }
        };

        if let Some(session) = self.sessions.get_mut(&sid) {
            session.add_connection(conn_id);
        }
        if let Some(conn) = self.connections.get_mut(conn_id) {
            conn.session = Some(sid);
        }
        let name = crate::hooks::name(&self.world, character);
        self.send_line_to_entity(character, &format!("You become {}.", name));
        Ok(())
    }

    /// Tear a session down: detach its connections, drop the holder
    /// component and record the logout.
    pub async fn end_session(&mut self, sid: ObjectId) -> Result<(), CoreError> {
        let mut session = match self.sessions.remove(&sid) {
            Some(session) => session,
            None => return Ok(()),
        };
        let farewell = session.take_output();
        for conn_id in &session.clients {
            if let Some(conn) = self.connections.get_mut(*conn_id) {
                conn.session = None;
            }
            // push anything still buffered before the session disappears
            if let Some(farewell) = &farewell {
                self.send_text_to_connection(*conn_id, farewell);
            }
            self.send_text_to_connection(*conn_id, "You return to the account menu.\r\n");
        }
        if self.world.is_valid(session.character) {
            self.world.detach::<SessionHolder>(session.character);
            // the holder is runtime state, its removal alone is not a reason
            // to rewrite the row; but detach marked it, which is harmless
        }
        self.db.touch_character_logout(sid.index as i64).await?;
        info!(self.world.logger, "session ended"; "session" => %sid);
        Ok(())
    }

    /// Redirect a session to steer a different entity.
    pub fn change_puppet(&mut self, sid: ObjectId, ent: Entity) {
        if let Some(session) = self.sessions.get_mut(&sid) {
            let old = session.puppet;
            session.change_puppet(ent);
            if self.world.is_valid(old) && old != session.character {
                self.world.detach::<SessionHolder>(old);
            }
            if ent != session.character {
                self.world.attach(ent, SessionHolder { session: sid, mode: 2 });
            }
        }
    }

    // -- account creation rate limiting -------------------------------------

    /// Sliding-window limit on account creation per edge host.
    pub fn account_creation_allowed(&mut self, host: &str) -> bool {
        let cutoff = Utc::now() - ChronoDuration::seconds(ACCOUNT_CREATION_WINDOW);
        let entries = self
            .recent_account_hosts
            .entry(host.to_string())
            .or_insert_with(Vec::new);
        entries.retain(|stamp| *stamp > cutoff);
        entries.len() < ACCOUNT_CREATION_CAP
    }

    pub fn note_account_created(&mut self, host: &str) {
        self.recent_account_hosts
            .entry(host.to_string())
            .or_insert_with(Vec::new)
            .push(Utc::now());
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn request_shutdown(&mut self) {
        self.status = GameLoop::Shutdown;
    }

    pub fn request_restart(&mut self) {
        self.status = GameLoop::Restart;
    }

    pub fn clear_command_cache(&mut self) {
        self.commands.clear_cache();
    }
}

/// Run systems in priority order, once.
pub async fn heartbeat(
    core: &mut Core,
    systems: &mut SystemRegistry,
    dt: f64,
) -> Result<(), CoreError> {
    for system in systems.iter_mut() {
        if system.should_run(core, dt).await {
            system.run(core, dt).await?;
        }
    }
    Ok(())
}

/// The fixed-rate game loop. Returns the final status on a clean exit; an
/// `Err` means a heartbeat blew up and the process should die non-zero.
pub async fn run_game(core: &mut Core, systems: &mut SystemRegistry) -> Result<GameLoop, CoreError> {
    systems.sort();
    if systems.is_empty() {
        warn!(core.logger(), "no systems registered");
    }

    let interval = core.heartbeat_interval;
    let mut wait = interval;
    let mut last_tick = Instant::now();
    core.broadcast("Let the games begin!");

    while core.status == GameLoop::Running {
        task::sleep(wait).await;

        let tick_start = Instant::now();
        let dt = tick_start.duration_since(last_tick).as_secs_f64();
        last_tick = tick_start;

        if let Err(err) = heartbeat(core, systems, dt).await {
            crit!(core.logger(), "heartbeat failed: {}", err);
            core.broadcast(
                "Critical error detected in game simulation, commencing emergency shutdown!",
            );
            emergency_flush(core);
            return Err(err);
        }

        let elapsed = tick_start.elapsed();
        wait = if elapsed >= interval {
            // a long tick gets a token pause so the loop stays cooperative
            Duration::from_millis(1)
        } else {
            interval - elapsed
        };
    }

    match core.status {
        GameLoop::Shutdown => info!(core.logger(), "game loop requested a shutdown"),
        GameLoop::Restart => info!(core.logger(), "game loop requested a restart"),
        GameLoop::Running => {}
    }
    Ok(core.status)
}

/// Best-effort push of buffered session output straight to the link, used on
/// the way down when the normal output system will not run again.
fn emergency_flush(core: &mut Core) {
    let flushes: Vec<(Vec<i64>, String)> = core
        .sessions
        .values_mut()
        .filter_map(|session| {
            session
                .take_output()
                .map(|text| (session.clients.iter().copied().collect(), text))
        })
        .collect();
    for (clients, text) in flushes {
        for conn_id in clients {
            core.send_text_to_connection(conn_id, &text);
        }
    }
    if core.link_outbound.is_full() {
        error!(core.logger(), "link queue full during emergency flush");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::world::test_logger;

    /// A core wired to detached channel endpoints, so tests can inject link
    /// events and observe outbound frames.
    pub(crate) struct Harness {
        pub core: Core,
        pub events: Sender<LinkEvent>,
        pub outbound: Receiver<Value>,
    }

    pub(crate) async fn harness() -> Harness {
        let db = Db::in_memory().await.expect("in-memory db");
        db.ready().await.expect("schema");
        let mut world = World::new(test_logger());
        world.loading = false;
        let (out_tx, out_rx) = async_std::channel::bounded(1024);
        let (ev_tx, ev_rx) = async_std::channel::bounded(1024);
        let mut core = Core::new(world, db, out_tx, ev_rx);
        crate::commands::register_defaults(&mut core.commands).expect("default commands");
        core.commands.expand();
        Harness {
            core,
            events: ev_tx,
            outbound: out_rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn account_creation_rate_limit_slides() {
        let mut harness = testing::harness().await;
        let core = &mut harness.core;
        assert!(core.account_creation_allowed("10.0.0.1"));
        for _ in 0..ACCOUNT_CREATION_CAP {
            core.note_account_created("10.0.0.1");
        }
        assert!(!core.account_creation_allowed("10.0.0.1"));
        // a different host is unaffected
        assert!(core.account_creation_allowed("10.0.0.2"));

        // age the entries past the window and the host recovers
        let stale = Utc::now() - ChronoDuration::seconds(ACCOUNT_CREATION_WINDOW + 10);
        for stamp in core
            .recent_account_hosts
            .get_mut("10.0.0.1")
            .expect("tracked host")
        {
            *stamp = stale;
        }
        assert!(core.account_creation_allowed("10.0.0.1"));
    }
}
