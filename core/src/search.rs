//! Keyword resolution: turning player-typed names into entities.
//!
//! Input has the shape `[<prefix>.]<name>` where the prefix is a 1-based
//! ordinal or the literal `all`. A handful of special names (`self`, `here`,
//! `#id`, `*`) are gated behind builder flags. Candidates come from the
//! listed scopes in order, filtered by type and detection, and matched by
//! case-insensitive prefix against the candidate's search words.

use crate::components::{Character, Item, Npc, Player, Vehicle};
use crate::hooks::CoreHooks;
use crate::objects::Entity;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Room(Entity),
    Inventory(Entity),
    Equipment(Entity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Anything,
    Characters,
    Players,
    Npcs,
    Vehicles,
    Items,
}

pub struct Search<'a> {
    world: &'a World,
    hooks: &'a CoreHooks,
    ent: Entity,
    scopes: Vec<SearchScope>,
    modes: u64,
    kind: SearchType,
    allow_id: bool,
    allow_self: bool,
    allow_all: bool,
    allow_here: bool,
    allow_asterisk: bool,
}

impl<'a> Search<'a> {
    pub fn new(world: &'a World, hooks: &'a CoreHooks, ent: Entity) -> Self {
        Search {
            world,
            hooks,
            ent,
            scopes: Vec::new(),
            modes: 0,
            kind: SearchType::Anything,
            allow_id: false,
            allow_self: true,
            allow_all: true,
            allow_here: false,
            allow_asterisk: false,
        }
    }

    pub fn in_inventory(mut self, holder: Entity) -> Self {
        self.scopes.push(SearchScope::Inventory(holder));
        self
    }

    pub fn in_equipment(mut self, holder: Entity) -> Self {
        self.scopes.push(SearchScope::Equipment(holder));
        self
    }

    pub fn in_room(mut self, observer: Entity) -> Self {
        self.scopes.push(SearchScope::Room(observer));
        self
    }

    pub fn modes(mut self, modes: u64) -> Self {
        self.modes = modes;
        self
    }

    pub fn use_id(mut self, allow: bool) -> Self {
        self.allow_id = allow;
        self
    }

    pub fn use_self(mut self, allow: bool) -> Self {
        self.allow_self = allow;
        self
    }

    pub fn use_all(mut self, allow: bool) -> Self {
        self.allow_all = allow;
        self
    }

    pub fn use_here(mut self, allow: bool) -> Self {
        self.allow_here = allow;
        self
    }

    pub fn use_asterisk(mut self, allow: bool) -> Self {
        self.allow_asterisk = allow;
        self
    }

    pub fn set_type(mut self, kind: SearchType) -> Self {
        self.kind = kind;
        self
    }

    /// The special names that bypass the scope walk entirely. The outer
    /// `Option` says "handled"; the inner one may still be empty.
    fn simple_check(&self, name: &str) -> Option<Option<Entity>> {
        if self.allow_self && (name.eq_ignore_ascii_case("self") || name.eq_ignore_ascii_case("me"))
        {
            return Some(Some(self.ent));
        }
        if self.allow_here && name.eq_ignore_ascii_case("here") {
            return Some(self.world.location(self.ent));
        }
        if self.allow_id && name.starts_with('#') {
            return Some(self.world.parse_ref(name));
        }
        None
    }

    fn detect(&self, target: Entity) -> bool {
        (self.hooks.can_detect)(self.hooks, self.world, self.ent, target, self.modes)
    }

    fn type_matches(&self, candidate: Entity) -> bool {
        match self.kind {
            SearchType::Anything => true,
            SearchType::Characters => self.world.has::<Character>(candidate),
            SearchType::Players => self.world.has::<Player>(candidate),
            SearchType::Npcs => self.world.has::<Npc>(candidate),
            SearchType::Vehicles => self.world.has::<Vehicle>(candidate),
            SearchType::Items => self.world.has::<Item>(candidate),
        }
    }

    pub fn find(&self, name: &str) -> Vec<Entity> {
        if let Some(handled) = self.simple_check(name) {
            return handled
                .filter(|ent| self.world.is_valid(*ent))
                .map(|ent| vec![ent])
                .unwrap_or_default();
        }

        // split "<prefix>.<name>"; a missing prefix means "the first match"
        let (prefix, name) = match name.find('.') {
            Some(dot) => (&name[..dot], &name[dot + 1..]),
            None => ("1", name),
        };

        let mut wanted: i64 = 1;
        let mut all_mode = false;
        if prefix.eq_ignore_ascii_case("all") {
            all_mode = self.allow_all;
        } else {
            wanted = match prefix.parse() {
                Ok(n) if n >= 1 => n,
                _ => return Vec::new(),
            };
        }

        let asterisk = name == "*";
        if asterisk && !self.allow_asterisk {
            return Vec::new();
        }

        let mut seen: i64 = 0;
        let mut results = Vec::new();
        for scope in &self.scopes {
            let candidates = match scope {
                SearchScope::Room(observer) => {
                    (self.hooks.room_contents)(self.hooks, self.world, *observer)
                }
                SearchScope::Inventory(holder) => {
                    (self.hooks.inventory)(self.hooks, self.world, *holder)
                }
                SearchScope::Equipment(holder) => {
                    (self.hooks.equipment)(self.hooks, self.world, *holder)
                }
            };
            for candidate in candidates {
                if candidate == self.ent || !self.world.is_valid(candidate) {
                    continue;
                }
                if !self.type_matches(candidate) {
                    continue;
                }
                if self.modes != 0 && !self.detect(candidate) {
                    continue;
                }
                if asterisk {
                    results.push(candidate);
                    continue;
                }
                if !(self.hooks.check_search)(self.hooks, self.world, candidate, name, self.ent) {
                    continue;
                }
                if all_mode {
                    results.push(candidate);
                } else {
                    seen += 1;
                    if seen == wanted {
                        results.push(candidate);
                        return results;
                    }
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::set_short_description;
    use crate::world::test_world;

    /// A holder with three orcs and a sword in its contents.
    fn menagerie() -> (World, CoreHooks, Entity, Vec<Entity>) {
        let mut world = test_world();
        let hooks = CoreHooks::default();

        let room = world.create_object();
        let seeker = world.create_object();
        world.attach(seeker, Character);
        world.set_location(seeker, Some(room)).unwrap();

        let mut spawned = Vec::new();
        for label in &["a scarred orc", "an orc shaman", "a burly orc"] {
            let orc = world.create_object();
            world.attach(orc, Npc);
            set_short_description(&mut world, &hooks, orc, label);
            world.set_location(orc, Some(room)).unwrap();
            spawned.push(orc);
        }
        let sword = world.create_object();
        world.attach(sword, Item);
        set_short_description(&mut world, &hooks, sword, "a rusty sword");
        world.set_location(sword, Some(room)).unwrap();
        spawned.push(sword);

        (world, hooks, seeker, spawned)
    }

    #[test]
    fn numbered_search_returns_the_nth_match() {
        let (world, hooks, seeker, spawned) = menagerie();
        let found = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find("2.orc");
        assert_eq!(found, vec![spawned[1]]);

        let first = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find("orc");
        assert_eq!(first, vec![spawned[0]]);

        let too_far = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find("9.orc");
        assert!(too_far.is_empty());
    }

    #[test]
    fn all_prefix_returns_every_match() {
        let (world, hooks, seeker, spawned) = menagerie();
        let found = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find("all.orc");
        assert_eq!(found, vec![spawned[0], spawned[1], spawned[2]]);

        // the type filter trims the candidate pool first
        let items = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .set_type(SearchType::Items)
            .find("all.a");
        assert_eq!(items, vec![spawned[3]]);
    }

    #[test]
    fn here_is_gated_by_its_flag() {
        let (world, hooks, seeker, _) = menagerie();
        let denied = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find("here");
        assert!(denied.is_empty());

        let allowed = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .use_here(true)
            .find("here");
        assert_eq!(allowed, vec![world.location(seeker).unwrap()]);
    }

    #[test]
    fn self_and_ids_resolve_directly() {
        let (world, hooks, seeker, spawned) = menagerie();
        let me = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find("self");
        assert_eq!(me, vec![seeker]);

        let id = world.object_id(spawned[0]).unwrap();
        let denied = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find(&id.to_string());
        assert!(denied.is_empty());
        let by_id = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .use_id(true)
            .find(&id.to_string());
        assert_eq!(by_id, vec![spawned[0]]);
    }

    #[test]
    fn asterisk_matches_every_candidate_when_allowed() {
        let (world, hooks, seeker, spawned) = menagerie();
        let denied = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .find("*");
        assert!(denied.is_empty());
        let everything = Search::new(&world, &hooks, seeker)
            .in_room(seeker)
            .use_asterisk(true)
            .find("*");
        assert_eq!(everything.len(), spawned.len());
    }
}
