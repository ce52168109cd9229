//! The generational slot arena behind every persisted game object.
//!
//! An [`Entity`] is a plain index into the arena and is only meaningful on the
//! tick thread. An [`ObjectId`] pairs the index with the slot's generation (a
//! UNIX timestamp stamped at creation) and is what crosses task boundaries and
//! the database: a slot that has been freed and re-used carries a newer
//! generation, so stale ids resolve to nothing instead of a stranger.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// How many slots to grow by when the arena runs out of graves.
pub(crate) const SLOT_CHUNK: usize = 40;

/// Opaque handle to a live object. Never store one across ticks; keep an
/// [`ObjectId`] and resolve it on use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(pub(crate) u32);

impl Entity {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable external identity of an object: `(slot index, generation)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub index: u32,
    pub generation: i64,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}:{}", self.index, self.generation)
    }
}

// The wire and database form is a two element array, `[index, generation]`.
impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.index, self.generation).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (index, generation) = <(u32, i64)>::deserialize(deserializer)?;
        Ok(ObjectId { index, generation })
    }
}

/// A textual object reference: `#<index>` names whatever currently occupies
/// the slot, `#<index>:<generation>` names one exact object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjRef {
    Slot(u32),
    Exact(ObjectId),
}

impl ObjRef {
    pub fn parse(input: &str) -> Option<ObjRef> {
        let body = input.strip_prefix('#')?;
        let mut parts = body.splitn(2, ':');
        let index: u32 = parts.next()?.parse().ok()?;
        match parts.next() {
            None | Some("") => Some(ObjRef::Slot(index)),
            Some(gen) => {
                let generation: i64 = gen.parse().ok()?;
                Some(ObjRef::Exact(ObjectId { index, generation }))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: i64,
    live: bool,
}

/// Growable arena of object slots. A dead slot (a "grave") keeps its last
/// generation so re-use can stamp a strictly newer one even within the same
/// second.
#[derive(Debug, Default)]
pub struct Objects {
    slots: Vec<Slot>,
}

impl Objects {
    pub fn allocate(&mut self, now: i64) -> (Entity, ObjectId) {
        let index = self.free_slot();
        let slot = &mut self.slots[index];
        slot.generation = now.max(slot.generation + 1);
        slot.live = true;
        let ent = Entity(index as u32);
        (
            ent,
            ObjectId {
                index: ent.0,
                generation: slot.generation,
            },
        )
    }

    fn free_slot(&mut self) -> usize {
        for (i, slot) in self.slots.iter().enumerate() {
            if !slot.live {
                return i;
            }
        }
        let i = self.slots.len();
        self.slots.resize(i + SLOT_CHUNK, Slot::default());
        i
    }

    /// Pre-size the arena so bulk loading does a single allocation.
    pub fn reserve_slots(&mut self, upto: usize) {
        if self.slots.len() < upto {
            self.slots.resize(upto, Slot::default());
        }
    }

    /// Re-occupy a specific slot with a known generation. Used by world
    /// hydration, where ids come from storage rather than the clock.
    pub fn restore(&mut self, id: ObjectId) -> Entity {
        let index = id.index as usize;
        if self.slots.len() <= index {
            self.slots.resize(index + SLOT_CHUNK, Slot::default());
        }
        self.slots[index] = Slot {
            generation: id.generation,
            live: true,
        };
        Entity(id.index)
    }

    pub fn release(&mut self, ent: Entity) {
        if let Some(slot) = self.slots.get_mut(ent.index()) {
            slot.live = false;
        }
    }

    pub fn contains(&self, ent: Entity) -> bool {
        self.slots.get(ent.index()).map(|s| s.live).unwrap_or(false)
    }

    /// Exact lookup: the slot must be live *and* carry the same generation.
    pub fn resolve(&self, id: ObjectId) -> Option<Entity> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.live && slot.generation == id.generation {
            Some(Entity(id.index))
        } else {
            None
        }
    }

    /// Loose lookup: whatever currently occupies the slot.
    pub fn occupant(&self, index: u32) -> Option<Entity> {
        let slot = self.slots.get(index as usize)?;
        if slot.live {
            Some(Entity(index))
        } else {
            None
        }
    }

    pub fn id_of(&self, ent: Entity) -> Option<ObjectId> {
        let slot = self.slots.get(ent.index())?;
        if slot.live {
            Some(ObjectId {
                index: ent.0,
                generation: slot.generation,
            })
        } else {
            None
        }
    }

    pub fn len_live(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.live)
            .map(|(i, _)| Entity(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slots_are_reused_with_newer_generations() {
        let mut objects = Objects::default();
        let (a, a_id) = objects.allocate(1000);
        assert_eq!(objects.resolve(a_id), Some(a));

        objects.release(a);
        assert_eq!(objects.resolve(a_id), None);
        assert_eq!(objects.occupant(a_id.index), None);

        // same second: the generation must still advance
        let (b, b_id) = objects.allocate(1000);
        assert_eq!(b.index(), a.index());
        assert!(b_id.generation > a_id.generation);
        assert_eq!(objects.resolve(a_id), None);
        assert_eq!(objects.resolve(b_id), Some(b));
    }

    #[test]
    fn arena_grows_in_chunks() {
        let mut objects = Objects::default();
        for _ in 0..SLOT_CHUNK {
            objects.allocate(1);
        }
        assert_eq!(objects.slots.len(), SLOT_CHUNK);
        objects.allocate(1);
        assert_eq!(objects.slots.len(), SLOT_CHUNK * 2);
    }

    #[test]
    fn object_refs_parse() {
        assert_eq!(ObjRef::parse("#5"), Some(ObjRef::Slot(5)));
        assert_eq!(
            ObjRef::parse("#8721:1680642313"),
            Some(ObjRef::Exact(ObjectId {
                index: 8721,
                generation: 1680642313
            }))
        );
        assert_eq!(ObjRef::parse("5"), None);
        assert_eq!(ObjRef::parse("#"), None);
        assert_eq!(ObjRef::parse("#x"), None);
    }

    #[test]
    fn object_id_round_trips_as_a_pair() {
        let id = ObjectId {
            index: 3,
            generation: 1700000000,
        };
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!([3, 1700000000i64]));
        let back: ObjectId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}
