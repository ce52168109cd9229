//! Command registries, the input grammar, and the shape-keyed command cache.
//!
//! Three registries exist: pre-auth connect commands, post-auth login
//! commands (both flat maps, expanded once at startup), and the in-world
//! command table. Which in-world commands an entity can reach depends on its
//! role flags, so the expanded, priority-sorted table is memoized per shape
//! key: a bitset over `Character, NPC, Player, Item, Vehicle`.

use crate::error::CoreError;
use crate::game::Core;
use crate::objects::Entity;
use crate::world::World;
use futures_util::future::BoxFuture;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// A parsed input line: `cmd/switch1/switch2 lsargs=rsargs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInput {
    pub full: String,
    pub cmd: String,
    pub switches: String,
    pub args: String,
    pub lsargs: String,
    pub rsargs: String,
}

pub struct CommandParser {
    grammar: Regex,
}

impl Default for CommandParser {
    fn default() -> Self {
        CommandParser {
            grammar: Regex::new(
                r"^(?P<cmd>[^\s/]+)(?P<switches>(?:/\w+)*)?(?:\s+(?P<args>(?P<lsargs>[^=]+)(?:=(?P<rsargs>.*))?))?$",
            )
            .expect("command grammar"),
        }
    }
}

impl CommandParser {
    pub fn parse(&self, input: &str) -> Option<CommandInput> {
        let caps = self.grammar.captures(input)?;
        let grab = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };
        Some(CommandInput {
            full: input.to_string(),
            cmd: grab("cmd"),
            switches: grab("switches"),
            args: grab("args"),
            lsargs: grab("lsargs"),
            rsargs: grab("rsargs"),
        })
    }
}

// ---------------------------------------------------------------------------
// Command traits
// ---------------------------------------------------------------------------

/// An in-world command acting through an entity puppet.
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    fn help(&self) -> &str {
        ""
    }

    fn category(&self) -> &str {
        "Uncategorized"
    }

    fn priority(&self) -> i64 {
        0
    }

    /// Whether the command appears in this entity's table at all. Usually a
    /// role-flag check; feeds the shape-keyed cache.
    fn is_available(&self, _world: &World, _ent: Entity) -> bool {
        true
    }

    fn can_execute(
        &self,
        _core: &Core,
        _ent: Entity,
        _input: &CommandInput,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>>;
}

/// A command available to a connection at the welcome screen.
pub trait ConnectCommand: Send + Sync {
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    fn help(&self) -> &str {
        ""
    }

    fn is_available(&self, _core: &Core, _conn_id: i64) -> bool {
        true
    }

    fn can_execute(&self, _core: &Core, _conn_id: i64, _input: &CommandInput) -> Result<(), CoreError> {
        Ok(())
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>>;
}

/// A command available once authenticated, before entering play.
pub trait LoginCommand: Send + Sync {
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    fn help(&self) -> &str {
        ""
    }

    fn is_available(&self, _core: &Core, _conn_id: i64) -> bool {
        true
    }

    fn can_execute(&self, _core: &Core, _conn_id: i64, _input: &CommandInput) -> Result<(), CoreError> {
        Ok(())
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>>;
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Expanded, priority-ordered `(lowercased key, command)` pairs for one shape.
pub type CommandList = Vec<(String, Arc<dyn Command>)>;

#[derive(Default)]
pub struct CommandTables {
    registry: Vec<Arc<dyn Command>>,
    connect: Vec<Arc<dyn ConnectCommand>>,
    login: Vec<Arc<dyn LoginCommand>>,
    pub(crate) expanded_connect: HashMap<String, Arc<dyn ConnectCommand>>,
    pub(crate) expanded_login: HashMap<String, Arc<dyn LoginCommand>>,
    cache: HashMap<u64, Arc<CommandList>>,
}

impl CommandTables {
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<(), CoreError> {
        if command.name().is_empty() {
            return Err(CoreError::FatalStartup("command name cannot be empty".into()));
        }
        self.registry.push(command);
        Ok(())
    }

    pub fn register_connect(&mut self, command: Arc<dyn ConnectCommand>) -> Result<(), CoreError> {
        if command.name().is_empty() {
            return Err(CoreError::FatalStartup("command name cannot be empty".into()));
        }
        self.connect.push(command);
        Ok(())
    }

    pub fn register_login(&mut self, command: Arc<dyn LoginCommand>) -> Result<(), CoreError> {
        if command.name().is_empty() {
            return Err(CoreError::FatalStartup("command name cannot be empty".into()));
        }
        self.login.push(command);
        Ok(())
    }

    /// Sort the world registry and expand the flat connect/login maps. Run
    /// once at startup, after all registrations.
    pub fn expand(&mut self) {
        self.registry.sort_by_key(|cmd| cmd.priority());

        self.expanded_connect.clear();
        for cmd in &self.connect {
            self.expanded_connect
                .insert(cmd.name().to_lowercase(), cmd.clone());
            for alias in cmd.aliases() {
                self.expanded_connect
                    .insert(alias.to_lowercase(), cmd.clone());
            }
        }
        self.expanded_login.clear();
        for cmd in &self.login {
            self.expanded_login
                .insert(cmd.name().to_lowercase(), cmd.clone());
            for alias in cmd.aliases() {
                self.expanded_login.insert(alias.to_lowercase(), cmd.clone());
            }
        }
        self.cache.clear();
    }

    /// The expanded command table for an entity's shape, memoized. Two
    /// entities with the same shape share the same `Arc`.
    pub fn sorted_for_shape(&mut self, world: &World, ent: Entity, shape: u64) -> Arc<CommandList> {
        if let Some(hit) = self.cache.get(&shape) {
            return hit.clone();
        }
        // within one name, the last (highest priority) registration wins
        let mut chosen: HashMap<&str, &Arc<dyn Command>> = HashMap::new();
        for cmd in &self.registry {
            if cmd.is_available(world, ent) {
                chosen.insert(cmd.name(), cmd);
            }
        }
        // expand keys in registry order so priority and insertion order hold
        let mut list: CommandList = Vec::new();
        for cmd in &self.registry {
            match chosen.get(cmd.name()) {
                Some(winner) if Arc::ptr_eq(winner, &cmd) => {}
                _ => continue,
            }
            list.push((cmd.name().to_lowercase(), cmd.clone()));
            for alias in cmd.aliases() {
                list.push((alias.to_lowercase(), cmd.clone()));
            }
        }
        let list = Arc::new(list);
        self.cache.insert(shape, list.clone());
        list
    }

    /// Drop every memoized table. Must be called if role-relevant components
    /// are added to or removed from a live entity.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.registry
    }
}

/// Compact key over the role flags that decide command availability.
pub fn shape_key(world: &World, ent: Entity) -> u64 {
    use crate::components::{Character, Item, Npc, Player, Vehicle};
    let mut bits = 0u64;
    if world.has::<Character>(ent) {
        bits |= 1;
    }
    if world.has::<Npc>(ent) {
        bits |= 1 << 1;
    }
    if world.has::<Player>(ent) {
        bits |= 1 << 2;
    }
    if world.has::<Item>(ent) {
        bits |= 1 << 3;
    }
    if world.has::<Vehicle>(ent) {
        bits |= 1 << 4;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Character, Item};
    use crate::world::test_world;
    use futures_util::future;

    #[test]
    fn grammar_splits_commands_switches_and_args() {
        let parser = CommandParser::default();

        let input = parser.parse("look").unwrap();
        assert_eq!(input.cmd, "look");
        assert_eq!(input.args, "");

        let input = parser.parse("get 2.sword").unwrap();
        assert_eq!(input.cmd, "get");
        assert_eq!(input.args, "2.sword");
        assert_eq!(input.lsargs, "2.sword");
        assert_eq!(input.rsargs, "");

        let input = parser.parse("put/quietly coin=bag of holding").unwrap();
        assert_eq!(input.cmd, "put");
        assert_eq!(input.switches, "/quietly");
        assert_eq!(input.lsargs, "coin");
        assert_eq!(input.rsargs, "bag of holding");

        assert!(parser.parse("").is_none());
    }

    struct Dummy {
        name: &'static str,
        aliases: &'static [&'static str],
        priority: i64,
        needs_character: bool,
    }

    impl Command for Dummy {
        fn name(&self) -> &str {
            self.name
        }

        fn aliases(&self) -> &[&str] {
            self.aliases
        }

        fn priority(&self) -> i64 {
            self.priority
        }

        fn is_available(&self, world: &World, ent: Entity) -> bool {
            !self.needs_character || world.has::<Character>(ent)
        }

        fn execute<'a>(
            &'a self,
            _core: &'a mut Core,
            _ent: Entity,
            _input: CommandInput,
        ) -> BoxFuture<'a, Result<(), CoreError>> {
            Box::pin(future::ready(Ok(())))
        }
    }

    fn tables() -> CommandTables {
        let mut tables = CommandTables::default();
        tables
            .register(Arc::new(Dummy {
                name: "look",
                aliases: &["l"],
                priority: 0,
                needs_character: false,
            }))
            .unwrap();
        tables
            .register(Arc::new(Dummy {
                name: "say",
                aliases: &[],
                priority: 10,
                needs_character: true,
            }))
            .unwrap();
        tables.expand();
        tables
    }

    #[test]
    fn same_shape_shares_one_cache_entry() {
        let mut world = test_world();
        let mut tables = tables();

        let a = world.create_object();
        let b = world.create_object();
        world.attach(a, Character);
        world.attach(b, Character);
        let c = world.create_object();
        world.attach(c, Item);

        let shape_a = shape_key(&world, a);
        let shape_b = shape_key(&world, b);
        assert_eq!(shape_a, shape_b);
        assert_ne!(shape_a, shape_key(&world, c));

        let list_a = tables.sorted_for_shape(&world, a, shape_a);
        let list_b = tables.sorted_for_shape(&world, b, shape_b);
        assert!(Arc::ptr_eq(&list_a, &list_b));

        // characters see both commands, with aliases expanded, priority order
        let keys: Vec<&str> = list_a.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["look", "l", "say"]);

        // items only see the unconditional one
        let list_c = tables.sorted_for_shape(&world, c, shape_key(&world, c));
        let keys: Vec<&str> = list_c.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["look", "l"]);
    }

    #[test]
    fn higher_priority_commands_shadow_same_name() {
        let mut world = test_world();
        let ent = world.create_object();

        let mut tables = CommandTables::default();
        tables
            .register(Arc::new(Dummy {
                name: "look",
                aliases: &[],
                priority: 100,
                needs_character: false,
            }))
            .unwrap();
        tables
            .register(Arc::new(Dummy {
                name: "look",
                aliases: &["peek"],
                priority: 0,
                needs_character: false,
            }))
            .unwrap();
        tables.expand();

        let list = tables.sorted_for_shape(&world, ent, shape_key(&world, ent));
        // the priority-100 variant wins the name; the loser is gone entirely
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].0, "look");
        assert_eq!(list[0].1.priority(), 100);
    }

    #[test]
    fn cache_invalidation_drops_stale_tables() {
        let mut world = test_world();
        let mut tables = tables();
        let ent = world.create_object();
        let list = tables.sorted_for_shape(&world, ent, shape_key(&world, ent));
        tables.clear_cache();
        let relist = tables.sorted_for_shape(&world, ent, shape_key(&world, ent));
        assert!(!Arc::ptr_eq(&list, &relist));
    }
}
