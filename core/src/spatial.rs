//! Placement of objects within rooms, grids and sectors.
//!
//! An entity's primary locator is at most one of `RoomLocation`,
//! `GridLocation` or `SectorLocation`; moving through [`World::move_to`]
//! removes the old locator and its reverse index entry before installing the
//! new one.

use crate::components::{
    Area, Expanse, GridContents, GridLocation, GridPoint, Map, RoomContents, RoomId, RoomLocation,
    SectorContents, SectorLocation, SectorPoint, Space,
};
use crate::error::CoreError;
use crate::objects::{Entity, ObjectId};
use crate::world::World;
use serde_json::{json, Value};

/// One concrete point inside a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DestinationPoint {
    Room(RoomId),
    Grid(GridPoint),
    Sector(SectorPoint),
}

/// Where something may be moved to. `target` of `None` means a point within
/// the mover's current location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub target: Option<Entity>,
    pub point: DestinationPoint,
}

impl Destination {
    pub fn to_json(&self, world: &World) -> Value {
        let mut j = serde_json::Map::new();
        if let Some(id) = self.target.and_then(|t| world.object_id(t)) {
            j.insert("object".into(), json!([id.index, id.generation]));
        }
        let dest = match self.point {
            DestinationPoint::Room(id) => json!(id),
            DestinationPoint::Grid(p) => json!([p.x, p.y, p.z]),
            DestinationPoint::Sector(p) => json!([p.x, p.y, p.z]),
        };
        j.insert("destination".into(), dest);
        Value::Object(j)
    }

    pub fn from_json(world: &World, j: &Value) -> Option<Destination> {
        let target = match j.get("object") {
            Some(obj) => {
                let id: ObjectId = serde_json::from_value(obj.clone()).ok()?;
                world.resolve(id)
            }
            None => None,
        };
        let dest = j.get("destination")?;
        let point = if let Some(id) = dest.as_u64() {
            DestinationPoint::Room(id)
        } else {
            let triple = dest.as_array()?;
            if triple.iter().any(|v| v.is_f64()) {
                DestinationPoint::Sector(SectorPoint::new(
                    triple.get(0)?.as_f64()?,
                    triple.get(1)?.as_f64()?,
                    triple.get(2)?.as_f64()?,
                ))
            } else {
                DestinationPoint::Grid(GridPoint::new(
                    triple.get(0)?.as_i64()?,
                    triple.get(1)?.as_i64()?,
                    triple.get(2)?.as_i64()?,
                ))
            }
        };
        Some(Destination { target, point })
    }
}

/// `"3,4,5"` → `[3.0, 4.0, 5.0]`; short inputs are zero filled.
pub fn parse_coordinates(input: &str) -> Option<Vec<f64>> {
    let mut out = Vec::new();
    if !input.trim().is_empty() {
        for token in input.split(',') {
            out.push(token.trim().parse::<f64>().ok()?);
        }
    }
    out.resize(3, 0.0);
    Some(out)
}

impl World {
    /// The room entity the object currently stands in, if its location chain
    /// leads into an [`Area`].
    pub fn room_of(&self, ent: Entity) -> Option<Entity> {
        let container = self.location(ent)?;
        let room_id = self.get::<RoomLocation>(ent)?.id;
        self.get::<Area>(container)
            .and_then(|area| area.rooms.get(&room_id).copied())
    }

    /// Remove `ent` from whatever spatial cell it occupies and strip its
    /// locator components. The plain Location edge is untouched.
    pub fn leave_spatial(&mut self, ent: Entity) {
        let container = self.location(ent);

        if let Some(room_loc) = self.get::<RoomLocation>(ent).copied() {
            let room = container.and_then(|c| {
                self.get::<Area>(c)
                    .and_then(|area| area.rooms.get(&room_loc.id).copied())
            });
            if let Some(room) = room {
                self.get_or_attach::<RoomContents>(room).0.retain(|e| *e != ent);
            }
        }

        if let Some(grid_loc) = self.get::<GridLocation>(ent).copied() {
            if let Some(container) = container {
                if let Some(index) = self.get_mut::<GridContents>(container) {
                    if let Some(cell) = index.0.get_mut(&grid_loc.0) {
                        cell.retain(|e| *e != ent);
                        if cell.is_empty() {
                            index.0.remove(&grid_loc.0);
                        }
                    }
                }
            }
        }

        if let Some(sector_loc) = self.get::<SectorLocation>(ent).copied() {
            if let Some(container) = container {
                if let Some(index) = self.get_mut::<SectorContents>(container) {
                    if let Some(pos) = index.0.iter().position(|(p, _)| *p == sector_loc.0) {
                        index.0[pos].1.retain(|e| *e != ent);
                        if index.0[pos].1.is_empty() {
                            index.0.remove(pos);
                        }
                    }
                }
            }
        }

        self.detach::<RoomLocation>(ent);
        self.detach::<GridLocation>(ent);
        self.detach::<SectorLocation>(ent);
    }

    /// Move an object to a destination, keeping the Location edge, the
    /// locator component and the reverse index consistent.
    pub fn move_to(&mut self, ent: Entity, dest: &Destination) -> Result<(), CoreError> {
        let target = dest
            .target
            .or_else(|| self.location(ent))
            .ok_or(CoreError::InvalidDestination)?;

        match dest.point {
            DestinationPoint::Room(id) => {
                let room = self
                    .get::<Area>(target)
                    .and_then(|area| area.rooms.get(&id).copied())
                    .ok_or(CoreError::InvalidDestination)?;
                self.leave_spatial(ent);
                self.set_location(ent, Some(target))?;
                self.attach(ent, RoomLocation { id });
                self.get_or_attach::<RoomContents>(room).0.push(ent);
            }
            DestinationPoint::Grid(point) => {
                let valid = if let Some(map) = self.get::<Map>(target) {
                    map.bounds.contains(point) && map.poi.contains_key(&point)
                } else if let Some(expanse) = self.get::<Expanse>(target) {
                    expanse.bounds.contains(point)
                } else {
                    false
                };
                if !valid {
                    return Err(CoreError::InvalidDestination);
                }
                self.leave_spatial(ent);
                self.set_location(ent, Some(target))?;
                self.attach(ent, GridLocation(point));
                self.get_or_attach::<GridContents>(target)
                    .0
                    .entry(point)
                    .or_insert_with(Vec::new)
                    .push(ent);
            }
            DestinationPoint::Sector(point) => {
                let valid = self
                    .get::<Space>(target)
                    .map(|space| space.bounds.contains(point))
                    .unwrap_or(false);
                if !valid {
                    return Err(CoreError::InvalidDestination);
                }
                self.leave_spatial(ent);
                self.set_location(ent, Some(target))?;
                self.attach(ent, SectorLocation(point));
                let index = self.get_or_attach::<SectorContents>(target);
                match index.0.iter_mut().find(|(p, _)| *p == point) {
                    Some((_, cell)) => cell.push(ent),
                    None => index.0.push((point, vec![ent])),
                }
            }
        }
        Ok(())
    }

    /// Everything sharing a spatial cell with `ent`, or failing that, the
    /// plain contents of its location.
    pub fn colocated(&self, ent: Entity) -> Vec<Entity> {
        if let Some(room) = self.room_of(ent) {
            return self
                .get::<RoomContents>(room)
                .map(|c| c.0.clone())
                .unwrap_or_default();
        }
        let container = match self.location(ent) {
            Some(c) => c,
            None => return Vec::new(),
        };
        if let Some(grid_loc) = self.get::<GridLocation>(ent) {
            return self
                .get::<GridContents>(container)
                .and_then(|index| index.0.get(&grid_loc.0).cloned())
                .unwrap_or_default();
        }
        if let Some(sector_loc) = self.get::<SectorLocation>(ent) {
            return self
                .get::<SectorContents>(container)
                .and_then(|index| {
                    index
                        .0
                        .iter()
                        .find(|(p, _)| *p == sector_loc.0)
                        .map(|(_, cell)| cell.clone())
                })
                .unwrap_or_default();
        }
        self.contents(container).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::GridBounds;
    use crate::world::test_world;

    fn expanse_world() -> (World, Entity) {
        let mut world = test_world();
        let zone = world.create_object();
        world.attach(
            zone,
            Expanse {
                bounds: GridBounds {
                    min_x: -10,
                    max_x: 10,
                    min_y: -10,
                    max_y: 10,
                    min_z: 0,
                    max_z: 0,
                },
                poi: Default::default(),
            },
        );
        (world, zone)
    }

    #[test]
    fn locators_are_mutually_exclusive() {
        let (mut world, zone) = expanse_world();
        let walker = world.create_object();

        world
            .move_to(
                walker,
                &Destination {
                    target: Some(zone),
                    point: DestinationPoint::Grid(GridPoint::new(1, 1, 0)),
                },
            )
            .unwrap();
        assert!(world.has::<GridLocation>(walker));

        // a room area on the same container: moving there swaps the locator
        let area = world.create_object();
        let room = world.create_object();
        let mut rooms = Area::default();
        rooms.rooms.insert(7, room);
        world.attach(area, rooms);

        world
            .move_to(
                walker,
                &Destination {
                    target: Some(area),
                    point: DestinationPoint::Room(7),
                },
            )
            .unwrap();
        assert!(!world.has::<GridLocation>(walker));
        assert_eq!(world.get::<RoomLocation>(walker), Some(&RoomLocation { id: 7 }));
        assert_eq!(world.room_of(walker), Some(room));

        // the old grid cell forgot the walker
        assert!(world
            .get::<GridContents>(zone)
            .map(|g| g.0.is_empty())
            .unwrap_or(true));
    }

    #[test]
    fn out_of_bounds_moves_are_rejected() {
        let (mut world, zone) = expanse_world();
        let walker = world.create_object();
        let err = world
            .move_to(
                walker,
                &Destination {
                    target: Some(zone),
                    point: DestinationPoint::Grid(GridPoint::new(99, 0, 0)),
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDestination));
        assert!(world.location(walker).is_none());
    }

    #[test]
    fn colocated_sees_cell_mates_only() {
        let (mut world, zone) = expanse_world();
        let a = world.create_object();
        let b = world.create_object();
        let far = world.create_object();
        let here = DestinationPoint::Grid(GridPoint::new(0, 0, 0));
        let there = DestinationPoint::Grid(GridPoint::new(5, 5, 0));
        world
            .move_to(a, &Destination { target: Some(zone), point: here })
            .unwrap();
        world
            .move_to(b, &Destination { target: Some(zone), point: here })
            .unwrap();
        world
            .move_to(far, &Destination { target: Some(zone), point: there })
            .unwrap();

        assert_eq!(world.colocated(a), vec![a, b]);
    }

    #[test]
    fn coordinates_parse_and_zero_fill() {
        assert_eq!(parse_coordinates(""), Some(vec![0.0, 0.0, 0.0]));
        assert_eq!(parse_coordinates("3"), Some(vec![3.0, 0.0, 0.0]));
        assert_eq!(parse_coordinates("1, 2, 3"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(parse_coordinates("1,x"), None);
    }
}
