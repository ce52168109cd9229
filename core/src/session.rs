//! A Session is one stretch of play: an account steering a character.
//!
//! Several connections may attach to the same session at once (play from two
//! devices, see the same output); their input lands in one queue in global
//! arrival order. Output accumulates in a buffer that is flushed to every
//! attached connection once per tick. Losing the last connection does not
//! destroy the session, it goes link-dead and a later tick reaps it after
//! the grace period.

use crate::objects::{Entity, ObjectId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

/// How long a link-dead session lingers before it is reaped.
pub const LINKDEAD_GRACE: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct Session {
    /// The character's ObjectId doubles as the session id.
    pub id: ObjectId,
    pub account: i64,
    pub admin_level: i64,
    pub character: Entity,
    /// What the player is steering right now. Usually the character, but
    /// possession and vehicles can redirect it.
    pub puppet: Entity,
    pub clients: BTreeSet<i64>,
    input_queue: VecDeque<String>,
    out_text: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: Instant,
    pub linkdead_since: Option<Instant>,
    total_connections: u64,
}

impl Session {
    pub fn new(id: ObjectId, account: i64, character: Entity) -> Self {
        Session {
            id,
            account,
            admin_level: 0,
            character,
            puppet: character,
            clients: BTreeSet::new(),
            input_queue: VecDeque::new(),
            out_text: String::new(),
            created_at: Utc::now(),
            last_activity: Instant::now(),
            linkdead_since: None,
            total_connections: 0,
        }
    }

    /// Queue one line of player input. The literal `--` flushes the queue
    /// instead, so a player can bail out of a long backlog.
    pub fn handle_text(&mut self, line: &str) {
        self.last_activity = Instant::now();
        if line == "--" {
            self.input_queue.clear();
            self.send_line("Your input queue has been cleared of all pending commands.");
            return;
        }
        self.input_queue.push_back(line.to_string());
    }

    pub fn next_input(&mut self) -> Option<String> {
        self.input_queue.pop_front()
    }

    pub fn queued_input(&self) -> impl Iterator<Item = &str> {
        self.input_queue.iter().map(|s| s.as_str())
    }

    pub fn send_text(&mut self, text: &str) {
        self.out_text.push_str(text);
    }

    pub fn send_line(&mut self, text: &str) {
        self.out_text.push_str(text);
        if !text.ends_with('\n') {
            self.out_text.push('\n');
        }
    }

    /// The buffered output for this tick, if any. Clears the buffer.
    pub fn take_output(&mut self) -> Option<String> {
        if self.out_text.is_empty() {
            return None;
        }
        Some(std::mem::replace(&mut self.out_text, String::new()))
    }

    /// Returns true when this is the session's first ever connection.
    pub fn add_connection(&mut self, conn_id: i64) -> bool {
        self.clients.insert(conn_id);
        self.linkdead_since = None;
        let first = self.total_connections == 0;
        self.total_connections += 1;
        first
    }

    pub fn remove_connection(&mut self, conn_id: i64) {
        self.clients.remove(&conn_id);
        if self.clients.is_empty() {
            self.linkdead_since = Some(Instant::now());
        }
    }

    pub fn is_linkdead(&self) -> bool {
        self.linkdead_since.is_some()
    }

    pub fn change_puppet(&mut self, ent: Entity) {
        self.puppet = ent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Entity;

    fn session() -> Session {
        Session::new(
            ObjectId {
                index: 1,
                generation: 1000,
            },
            1,
            Entity(1),
        )
    }

    #[test]
    fn input_is_fifo_across_sources() {
        let mut s = session();
        // two connections feeding the same queue, interleaved
        s.handle_text("n");
        s.handle_text("s");
        s.handle_text("look");
        assert_eq!(s.next_input().as_deref(), Some("n"));
        assert_eq!(s.next_input().as_deref(), Some("s"));
        assert_eq!(s.next_input().as_deref(), Some("look"));
        assert_eq!(s.next_input(), None);
    }

    #[test]
    fn double_dash_clears_the_queue_and_acknowledges() {
        let mut s = session();
        s.handle_text("kill rat");
        s.handle_text("kill rat");
        s.handle_text("--");
        assert_eq!(s.next_input(), None);
        let out = s.take_output().expect("acknowledgement queued");
        assert!(out.contains("cleared"));
    }

    #[test]
    fn output_buffers_within_a_tick_and_flushes_once() {
        let mut s = session();
        s.send_text("You see ");
        s.send_text("a goblin.");
        s.send_line("");
        s.send_line("It sees you.");
        let out = s.take_output().unwrap();
        assert_eq!(out, "You see a goblin.\nIt sees you.\n");
        assert!(s.take_output().is_none());
    }

    #[test]
    fn last_connection_out_marks_linkdead() {
        let mut s = session();
        assert!(s.add_connection(10));
        assert!(!s.add_connection(11));
        s.remove_connection(10);
        assert!(!s.is_linkdead());
        s.remove_connection(11);
        assert!(s.is_linkdead());
        // a rejoin revives it
        s.add_connection(12);
        assert!(!s.is_linkdead());
    }
}
