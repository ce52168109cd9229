//! The component schema recognized by the core.
//!
//! Components are plain values attached to entities; presence is meaningful
//! (an object *is* an item because it carries [`Item`]). Storage is one dense
//! [`VecTable`] per component kind, generated by the `component_store!` macro
//! below, indexed by the entity's slot index.

use crate::objects::{Entity, ObjectId};
use crate::text::StyledText;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

pub type RoomId = u64;
pub type GridLength = i64;
pub type SectorLength = f64;

/// Integer lattice coordinate inside a `Map` or `Expanse`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridPoint {
    pub x: GridLength,
    pub y: GridLength,
    pub z: GridLength,
}

impl GridPoint {
    pub fn new(x: GridLength, y: GridLength, z: GridLength) -> Self {
        GridPoint { x, y, z }
    }
}

impl Serialize for GridPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x, self.y, self.z].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GridPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x, y, z] = <[GridLength; 3]>::deserialize(deserializer)?;
        Ok(GridPoint { x, y, z })
    }
}

/// Floating point coordinate inside a `Space`.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct SectorPoint {
    pub x: SectorLength,
    pub y: SectorLength,
    pub z: SectorLength,
}

impl SectorPoint {
    pub fn new(x: SectorLength, y: SectorLength, z: SectorLength) -> Self {
        SectorPoint { x, y, z }
    }
}

impl Serialize for SectorPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x, self.y, self.z].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SectorPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x, y, z] = <[SectorLength; 3]>::deserialize(deserializer)?;
        Ok(SectorPoint { x, y, z })
    }
}

// ---------------------------------------------------------------------------
// Identity components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Name(pub StyledText);

#[derive(Debug, Clone)]
pub struct ShortDescription(pub StyledText);

#[derive(Debug, Clone)]
pub struct RoomDescription(pub StyledText);

#[derive(Debug, Clone)]
pub struct LookDescription(pub StyledText);

// ---------------------------------------------------------------------------
// Relationship components. The forward edge and its inverse list are kept in
// lockstep by the world API; nothing else may touch them.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Parent(pub Entity);

#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<Entity>);

#[derive(Debug, Clone, Copy)]
pub struct Owner(pub Entity);

#[derive(Debug, Clone, Default)]
pub struct Assets(pub Vec<Entity>);

/// Physical containment, with a type tag and a floating point offset within
/// the holder, for games that care where inside a container something sits.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub target: Entity,
    pub kind: u8,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn at(target: Entity) -> Self {
        Location {
            target,
            kind: 0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Contents(pub Vec<Entity>);

// ---------------------------------------------------------------------------
// Spatial placement. At most one of RoomLocation / GridLocation /
// SectorLocation may be attached to an entity at a time.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomLocation {
    pub id: RoomId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLocation(pub GridPoint);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorLocation(pub SectorPoint);

#[derive(Debug, Clone, Default)]
pub struct RoomContents(pub Vec<Entity>);

#[derive(Debug, Clone, Default)]
pub struct GridContents(pub BTreeMap<GridPoint, Vec<Entity>>);

#[derive(Debug, Clone, Default)]
pub struct SectorContents(pub Vec<(SectorPoint, Vec<Entity>)>);

/// Coordinate limits for Maps and Expanses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub min_x: GridLength,
    pub max_x: GridLength,
    pub min_y: GridLength,
    pub max_y: GridLength,
    pub min_z: GridLength,
    pub max_z: GridLength,
}

impl Default for GridBounds {
    fn default() -> Self {
        GridBounds {
            min_x: GridLength::MIN,
            max_x: GridLength::MAX,
            min_y: GridLength::MIN,
            max_y: GridLength::MAX,
            min_z: GridLength::MIN,
            max_z: GridLength::MAX,
        }
    }
}

impl GridBounds {
    pub fn contains(&self, p: GridPoint) -> bool {
        p.x >= self.min_x
            && p.x <= self.max_x
            && p.y >= self.min_y
            && p.y <= self.max_y
            && p.z >= self.min_z
            && p.z <= self.max_z
    }
}

/// Coordinate limits for Spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorBounds {
    pub min_x: SectorLength,
    pub max_x: SectorLength,
    pub min_y: SectorLength,
    pub max_y: SectorLength,
    pub min_z: SectorLength,
    pub max_z: SectorLength,
}

impl Default for SectorBounds {
    fn default() -> Self {
        SectorBounds {
            min_x: f64::MIN,
            max_x: f64::MAX,
            min_y: f64::MIN,
            max_y: f64::MAX,
            min_z: f64::MIN,
            max_z: f64::MAX,
        }
    }
}

impl SectorBounds {
    pub fn contains(&self, p: SectorPoint) -> bool {
        p.x >= self.min_x
            && p.x <= self.max_x
            && p.y >= self.min_y
            && p.y <= self.max_y
            && p.z >= self.min_z
            && p.z <= self.max_z
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// A keyed collection of rooms, for the classic linked-rooms MUD design. The
/// core does not define exits; how rooms connect is up to the game.
#[derive(Debug, Clone, Default)]
pub struct Area {
    pub rooms: BTreeMap<RoomId, Entity>,
}

/// Attached to the entities inside an [`Area`]'s room table.
#[derive(Debug, Clone, Copy)]
pub struct Room {
    pub owner: ObjectId,
    pub id: RoomId,
}

/// A grid where only the listed points of interest are valid locations.
#[derive(Debug, Clone, Default)]
pub struct Map {
    pub bounds: GridBounds,
    pub poi: BTreeMap<GridPoint, Entity>,
}

/// A grid where every in-bounds point is a valid location. Gives the illusion
/// of a vast, mostly empty area with a few interesting things scattered in it.
#[derive(Debug, Clone, Default)]
pub struct Expanse {
    pub bounds: GridBounds,
    pub poi: BTreeMap<GridPoint, Entity>,
}

/// Like an Expanse but with floating point coordinates, for games that want
/// ships drifting through continuous space.
#[derive(Debug, Clone, Default)]
pub struct Space {
    pub bounds: SectorBounds,
    pub poi: Vec<(SectorPoint, Entity)>,
}

// ---------------------------------------------------------------------------
// Role flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct Item;

#[derive(Debug, Clone, Copy, Default)]
pub struct Character;

#[derive(Debug, Clone, Copy, Default)]
pub struct Npc;

#[derive(Debug, Clone, Copy)]
pub struct Player {
    pub account_id: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vehicle;

#[derive(Debug, Clone)]
pub struct Prototype {
    pub name: String,
}

/// Runtime only: present while a character is actively played. Holds the id
/// of the session driving this entity, never a live reference.
#[derive(Debug, Clone, Copy)]
pub struct SessionHolder {
    pub session: ObjectId,
    pub mode: u8,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Dense per-component table indexed by entity slot. Optimised for the usual
/// case of component presence being common among low slot indices.
#[derive(Debug)]
pub struct VecTable<C> {
    data: Vec<Option<C>>,
}

impl<C> Default for VecTable<C> {
    fn default() -> Self {
        VecTable { data: Vec::new() }
    }
}

impl<C> VecTable<C> {
    pub fn insert(&mut self, ent: Entity, row: C) -> Option<C> {
        let i = ent.index();
        if i >= self.data.len() {
            self.data.resize_with(i + 1, || None);
        }
        self.data[i].replace(row)
    }

    pub fn remove(&mut self, ent: Entity) -> Option<C> {
        self.data.get_mut(ent.index()).and_then(|slot| slot.take())
    }

    pub fn get(&self, ent: Entity) -> Option<&C> {
        self.data.get(ent.index()).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, ent: Entity) -> Option<&mut C> {
        self.data.get_mut(ent.index()).and_then(|slot| slot.as_mut())
    }

    pub fn contains(&self, ent: Entity) -> bool {
        self.get(ent).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|row| (Entity(i as u32), row)))
    }
}

/// Typed access to the table holding component `C`.
pub trait HasTable<C> {
    fn table(&self) -> &VecTable<C>;
    fn table_mut(&mut self) -> &mut VecTable<C>;
}

macro_rules! component_store {
    ($($field:ident : $comp:ty),* $(,)?) => {
        /// One table per recognized component kind.
        #[derive(Debug, Default)]
        pub struct ComponentStore {
            $(pub $field: VecTable<$comp>,)*
        }

        impl ComponentStore {
            /// Drop every component attached to `ent`. Used by object deletion
            /// after the relationship cascade has run.
            pub(crate) fn forget(&mut self, ent: Entity) {
                $(self.$field.remove(ent);)*
            }
        }

        $(
            impl HasTable<$comp> for ComponentStore {
                fn table(&self) -> &VecTable<$comp> {
                    &self.$field
                }

                fn table_mut(&mut self) -> &mut VecTable<$comp> {
                    &mut self.$field
                }
            }
        )*
    };
}

component_store!(
    names: Name,
    short_descriptions: ShortDescription,
    room_descriptions: RoomDescription,
    look_descriptions: LookDescription,

    parents: Parent,
    children: Children,
    owners: Owner,
    assets: Assets,
    locations: Location,
    contents: Contents,

    areas: Area,
    rooms: Room,
    room_locations: RoomLocation,
    room_contents: RoomContents,
    maps: Map,
    expanses: Expanse,
    spaces: Space,
    grid_locations: GridLocation,
    grid_contents: GridContents,
    sector_locations: SectorLocation,
    sector_contents: SectorContents,

    items: Item,
    characters: Character,
    npcs: Npc,
    players: Player,
    vehicles: Vehicle,
    prototype_tags: Prototype,
    session_holders: SessionHolder,
);
