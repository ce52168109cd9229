//! The game state owned by the tick thread: the object arena, the component
//! tables, the dirty set and the string pool.

use crate::components::{ComponentStore, HasTable};
use crate::objects::{Entity, ObjRef, ObjectId, Objects};
use crate::text::Interner;
use slog::{o, Drain, Logger};
use std::collections::HashSet;
use std::sync::Arc;

pub struct World {
    pub(crate) objects: Objects,
    pub(crate) components: ComponentStore,

    /// ObjectIds whose persisted form is stale. Flushed at the end of every
    /// tick; cleared only on a successful flush so failures retry.
    pub dirty: HashSet<ObjectId>,

    /// While true (bulk world hydration), mutations do not mark dirty.
    pub loading: bool,

    pub(crate) interner: Interner,

    pub logger: Logger,
}

impl World {
    pub fn new(logger: impl Into<Option<Logger>>) -> Self {
        let logger = logger.into().unwrap_or_else(|| {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_envlogger::new(drain).fuse();
            let drain = slog_async::Async::new(drain)
                .overflow_strategy(slog_async::OverflowStrategy::DropAndReport)
                .build()
                .fuse();
            Logger::root(drain, o!())
        });

        World {
            objects: Objects::default(),
            components: ComponentStore::default(),
            dirty: HashSet::new(),
            loading: true,
            interner: Interner::default(),
            logger,
        }
    }

    // -- object lifecycle ---------------------------------------------------

    /// Allocate a fresh object, stamped with the current UNIX timestamp.
    pub fn create_object(&mut self) -> Entity {
        let now = chrono::Utc::now().timestamp();
        let (ent, id) = self.objects.allocate(now);
        self.mark_dirty_id(id);
        ent
    }

    pub fn is_valid(&self, ent: Entity) -> bool {
        self.objects.contains(ent)
    }

    pub fn object_id(&self, ent: Entity) -> Option<ObjectId> {
        self.objects.id_of(ent)
    }

    pub fn resolve(&self, id: ObjectId) -> Option<Entity> {
        self.objects.resolve(id)
    }

    pub fn occupant(&self, index: u32) -> Option<Entity> {
        self.objects.occupant(index)
    }

    /// Resolve a textual `#index` or `#index:generation` reference.
    pub fn parse_ref(&self, input: &str) -> Option<Entity> {
        match ObjRef::parse(input)? {
            ObjRef::Slot(index) => self.occupant(index),
            ObjRef::Exact(id) => self.resolve(id),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len_live()
    }

    pub fn iter_objects(&self) -> impl Iterator<Item = Entity> + '_ {
        self.objects.iter_live()
    }

    // -- dirty tracking -----------------------------------------------------

    pub fn mark_dirty(&mut self, ent: Entity) {
        if let Some(id) = self.objects.id_of(ent) {
            self.mark_dirty_id(id);
        }
    }

    pub fn mark_dirty_id(&mut self, id: ObjectId) {
        if !self.loading {
            self.dirty.insert(id);
        }
    }

    // -- components ---------------------------------------------------------

    pub fn attach<C>(&mut self, ent: Entity, component: C)
    where
        ComponentStore: HasTable<C>,
    {
        if !self.objects.contains(ent) {
            return;
        }
        self.components.table_mut().insert(ent, component);
        self.mark_dirty(ent);
    }

    pub fn detach<C>(&mut self, ent: Entity) -> Option<C>
    where
        ComponentStore: HasTable<C>,
    {
        let removed = self.components.table_mut().remove(ent);
        if removed.is_some() {
            self.mark_dirty(ent);
        }
        removed
    }

    pub fn get<C>(&self, ent: Entity) -> Option<&C>
    where
        ComponentStore: HasTable<C>,
    {
        self.components.table().get(ent)
    }

    /// Mutable component access. Marks the entity dirty, since the caller is
    /// presumably about to change something.
    pub fn get_mut<C>(&mut self, ent: Entity) -> Option<&mut C>
    where
        ComponentStore: HasTable<C>,
    {
        if self.components.table().contains(ent) {
            self.mark_dirty(ent);
        }
        self.components.table_mut().get_mut(ent)
    }

    /// Fetch-or-default, for inverse lists and container indexes.
    pub fn get_or_attach<C>(&mut self, ent: Entity) -> &mut C
    where
        C: Default,
        ComponentStore: HasTable<C>,
    {
        if !self.components.table().contains(ent) {
            self.components.table_mut().insert(ent, C::default());
        }
        self.components
            .table_mut()
            .get_mut(ent)
            .expect("row inserted above")
    }

    pub fn has<C>(&self, ent: Entity) -> bool
    where
        ComponentStore: HasTable<C>,
    {
        self.components.table().contains(ent)
    }

    pub fn iter_with<'a, C: 'a>(&'a self) -> impl Iterator<Item = (Entity, &'a C)>
    where
        ComponentStore: HasTable<C>,
    {
        self.components.table().iter()
    }

    // -- strings ------------------------------------------------------------

    pub fn intern(&mut self, text: &str) -> Arc<str> {
        self.interner.intern(text)
    }
}

#[cfg(test)]
pub(crate) fn test_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

#[cfg(test)]
pub(crate) fn test_world() -> World {
    let mut world = World::new(test_logger());
    world.loading = false;
    world
}
