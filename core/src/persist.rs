//! Serialization of entities to the relational store and world hydration.
//!
//! An entity's persisted form is a JSON object holding only the components it
//! actually carries; deserialization is keyed purely by field presence.
//! Relationship fields store the peer's [`ObjectId`] rather than a live
//! handle, so rows may hydrate in any order: pass one allocates a slot for
//! every stored id, pass two restores components against the now-complete
//! arena.

use crate::components::{
    Area, Character, Expanse, GridBounds, GridLocation, GridPoint, Item, Map, Npc, Player,
    Prototype, Room, RoomContents, RoomId, RoomLocation, SectorBounds, SectorLocation,
    SectorPoint, Space, Vehicle,
};
use crate::error::CoreError;
use crate::hooks::{
    set_look_description, set_name, set_room_description, set_short_description, CoreHooks,
};
use crate::objects::{Entity, ObjectId};
use crate::world::World;
use serde_json::{json, Map as JsonMap, Value};
use slog::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Content-registered codec extensions: invoked after the core has done its
/// part, so games can persist their own components in the same blob.
pub type SerializeExt = fn(&World, Entity, bool, &mut Value);
pub type DeserializeExt = fn(&mut World, &CoreHooks, Entity, &Value);

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS objects (
        id INTEGER PRIMARY KEY,
        generation INTEGER NOT NULL,
        data TEXT NOT NULL,
        UNIQUE(id, generation)
    );",
    "CREATE TABLE IF NOT EXISTS prototypes (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        data TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        created INTEGER NOT NULL DEFAULT (strftime('%s','now')),
        lastLogin INTEGER NOT NULL DEFAULT (strftime('%s','now')),
        lastLogout INTEGER NOT NULL DEFAULT (strftime('%s','now')),
        lastPasswordChanged INTEGER NOT NULL DEFAULT (strftime('%s','now')),
        totalPlayTime REAL NOT NULL DEFAULT 0,
        totalLoginTime REAL NOT NULL DEFAULT 0,
        disabledReason TEXT NOT NULL DEFAULT '',
        disabledUntil INTEGER NOT NULL DEFAULT 0,
        adminLevel INTEGER NOT NULL DEFAULT 0
    );",
    "CREATE TABLE IF NOT EXISTS playerCharacters (
        character INTEGER NOT NULL,
        account INTEGER NOT NULL,
        lastLogin INTEGER NOT NULL DEFAULT (strftime('%s','now')),
        lastLogout INTEGER NOT NULL DEFAULT (strftime('%s','now')),
        totalPlayTime REAL NOT NULL DEFAULT 0,
        FOREIGN KEY(account) REFERENCES accounts(id) ON UPDATE CASCADE ON DELETE CASCADE,
        FOREIGN KEY(character) REFERENCES objects(id) ON UPDATE CASCADE ON DELETE CASCADE,
        PRIMARY KEY(character)
    );",
];

/// Handle to the relational store. Cloning shares the single-connection pool;
/// by policy only the tick thread issues queries.
#[derive(Clone)]
pub struct Db {
    pub(crate) pool: SqlitePool,
}

impl Db {
    pub async fn open(path: &str) -> Result<Db, CoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .map_err(CoreError::Persistence)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Db { pool })
    }

    pub async fn in_memory() -> Result<Db, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Db { pool })
    }

    /// Apply the schema. Every statement is idempotent.
    pub async fn ready(&self) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Hydrate the world. Returns the number of objects restored.
    pub async fn load_world(
        &self,
        world: &mut World,
        hooks: &CoreHooks,
        extensions: &[DeserializeExt],
    ) -> Result<u64, CoreError> {
        world.loading = true;

        let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM objects")
            .fetch_one(&self.pool)
            .await?;
        if let Some(max_id) = max_id {
            world.objects.reserve_slots(max_id as usize + 50);
        }

        // pass 1: claim every slot so relationship ids resolve in pass 2
        let rows = sqlx::query("SELECT id, generation FROM objects")
            .fetch_all(&self.pool)
            .await?;
        let mut restored = 0u64;
        for row in &rows {
            let index: i64 = row.get(0);
            let generation: i64 = row.get(1);
            world.objects.restore(ObjectId {
                index: index as u32,
                generation,
            });
            restored += 1;
        }
        debug!(world.logger, "prepared {} object slots", restored);

        // pass 2: restore components; every peer now has a slot
        let rows = sqlx::query("SELECT id, generation, data FROM objects")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let index: i64 = row.get(0);
            let generation: i64 = row.get(1);
            let data: String = row.get(2);
            let id = ObjectId {
                index: index as u32,
                generation,
            };
            let ent = match world.resolve(id) {
                Some(ent) => ent,
                None => continue,
            };
            let blob: Value =
                serde_json::from_str(&data).map_err(|err| CoreError::CorruptRecord {
                    id,
                    detail: err.to_string(),
                })?;
            deserialize_entity(world, hooks, extensions, ent, &blob);
        }

        rebuild_spatial_indexes(world);

        world.loading = false;
        world.dirty.clear();
        info!(world.logger, "hydrated {} objects", restored);
        Ok(restored)
    }

    /// Write out everything in the dirty set. The set is cleared only on
    /// success, so a failed flush retries next tick.
    pub async fn flush_dirty(
        &self,
        world: &mut World,
        extensions: &[SerializeExt],
    ) -> Result<(), CoreError> {
        if world.dirty.is_empty() {
            return Ok(());
        }
        let ids: Vec<ObjectId> = world.dirty.iter().copied().collect();
        let mut tx = self.pool.begin().await?;
        for id in &ids {
            match world.resolve(*id) {
                Some(ent) => {
                    let blob = serialize_entity(world, ent, false, extensions);
                    sqlx::query(
                        "INSERT OR REPLACE INTO objects (id, generation, data) VALUES (?, ?, ?)",
                    )
                    .bind(id.index as i64)
                    .bind(id.generation)
                    .bind(blob.to_string())
                    .execute(&mut tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM objects WHERE id = ? AND generation = ?")
                        .bind(id.index as i64)
                        .bind(id.generation)
                        .execute(&mut tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        world.dirty.clear();
        Ok(())
    }

    pub async fn save_prototype(&self, name: &str, data: &Value) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO prototypes (name, data) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data",
        )
        .bind(name)
        .bind(data.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn prototype(&self, name: &str) -> Result<Option<Value>, CoreError> {
        let row = sqlx::query("SELECT data FROM prototypes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: String = row.get(0);
                let parsed = serde_json::from_str(&data).map_err(|err| CoreError::CorruptRecord {
                    id: ObjectId {
                        index: 0,
                        generation: 0,
                    },
                    detail: err.to_string(),
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity codec
// ---------------------------------------------------------------------------

pub fn serialize_entity(
    world: &World,
    ent: Entity,
    as_prototype: bool,
    extensions: &[SerializeExt],
) -> Value {
    let mut j = JsonMap::new();

    if let Some(name) = world.get::<crate::components::Name>(ent) {
        j.insert("Name".into(), json!(name.0.raw.as_ref()));
    }
    if let Some(short) = world.get::<crate::components::ShortDescription>(ent) {
        j.insert("ShortDescription".into(), json!(short.0.raw.as_ref()));
    }
    if let Some(room) = world.get::<crate::components::RoomDescription>(ent) {
        j.insert("RoomDescription".into(), json!(room.0.raw.as_ref()));
    }
    if let Some(look) = world.get::<crate::components::LookDescription>(ent) {
        j.insert("LookDescription".into(), json!(look.0.raw.as_ref()));
    }

    if !as_prototype {
        // relationships go out as the peer's stable id
        if let Some(id) = world.location(ent).and_then(|t| world.object_id(t)) {
            j.insert("Location".into(), json!(id));
        }
        if let Some(id) = world.parent(ent).and_then(|t| world.object_id(t)) {
            j.insert("Parent".into(), json!(id));
        }
        if let Some(id) = world.owner(ent).and_then(|t| world.object_id(t)) {
            j.insert("Owner".into(), json!(id));
        }
    }

    if let Some(area) = world.get::<Area>(ent) {
        let rooms: Vec<Value> = area
            .rooms
            .iter()
            .map(|(room_id, room_ent)| {
                json!([room_id, serialize_entity(world, *room_ent, as_prototype, extensions)])
            })
            .collect();
        j.insert("Area".into(), Value::Array(rooms));
    }
    if let Some(expanse) = world.get::<Expanse>(ent) {
        j.insert(
            "Expanse".into(),
            grid_container_json(world, &expanse.bounds, &expanse.poi, as_prototype, extensions),
        );
    }
    if let Some(map) = world.get::<Map>(ent) {
        j.insert(
            "Map".into(),
            grid_container_json(world, &map.bounds, &map.poi, as_prototype, extensions),
        );
    }
    if let Some(space) = world.get::<Space>(ent) {
        let mut e = sector_bounds_json(&space.bounds);
        let poi: Vec<Value> = space
            .poi
            .iter()
            .map(|(point, poi_ent)| {
                json!([
                    [point.x, point.y, point.z],
                    serialize_entity(world, *poi_ent, as_prototype, extensions)
                ])
            })
            .collect();
        if !poi.is_empty() {
            e.insert("poi".into(), Value::Array(poi));
        }
        j.insert("Space".into(), Value::Object(e));
    }

    if let Some(grid) = world.get::<GridLocation>(ent) {
        j.insert("GridLocation".into(), json!(grid.0));
    }
    if let Some(room) = world.get::<RoomLocation>(ent) {
        j.insert("RoomLocation".into(), json!(room.id));
    }
    if let Some(sector) = world.get::<SectorLocation>(ent) {
        j.insert("SectorLocation".into(), json!(sector.0));
    }

    if let Some(player) = world.get::<Player>(ent) {
        j.insert("Player".into(), json!({ "accountId": player.account_id }));
    }
    if let Some(room) = world.get::<Room>(ent) {
        j.insert("Room".into(), json!({ "id": room.id, "obj": room.owner }));
    }
    if let Some(proto) = world.get::<Prototype>(ent) {
        j.insert("Prototype".into(), json!(proto.name));
    }

    if world.has::<Character>(ent) {
        j.insert("Character".into(), json!(true));
    }
    if world.has::<Npc>(ent) {
        j.insert("NPC".into(), json!(true));
    }
    if world.has::<Item>(ent) {
        j.insert("Item".into(), json!(true));
    }
    if world.has::<Vehicle>(ent) {
        j.insert("Vehicle".into(), json!(true));
    }

    let mut out = Value::Object(j);
    for ext in extensions {
        ext(world, ent, as_prototype, &mut out);
    }
    out
}

fn grid_container_json(
    world: &World,
    bounds: &GridBounds,
    poi: &std::collections::BTreeMap<GridPoint, Entity>,
    as_prototype: bool,
    extensions: &[SerializeExt],
) -> Value {
    let mut e = JsonMap::new();
    e.insert("minX".into(), json!(bounds.min_x));
    e.insert("minY".into(), json!(bounds.min_y));
    e.insert("minZ".into(), json!(bounds.min_z));
    e.insert("maxX".into(), json!(bounds.max_x));
    e.insert("maxY".into(), json!(bounds.max_y));
    e.insert("maxZ".into(), json!(bounds.max_z));
    let poi: Vec<Value> = poi
        .iter()
        .map(|(point, poi_ent)| {
            json!([point, serialize_entity(world, *poi_ent, as_prototype, extensions)])
        })
        .collect();
    if !poi.is_empty() {
        e.insert("poi".into(), Value::Array(poi));
    }
    Value::Object(e)
}

fn sector_bounds_json(bounds: &SectorBounds) -> JsonMap<String, Value> {
    let mut e = JsonMap::new();
    e.insert("minX".into(), json!(bounds.min_x));
    e.insert("minY".into(), json!(bounds.min_y));
    e.insert("minZ".into(), json!(bounds.min_z));
    e.insert("maxX".into(), json!(bounds.max_x));
    e.insert("maxY".into(), json!(bounds.max_y));
    e.insert("maxZ".into(), json!(bounds.max_z));
    e
}

pub fn deserialize_entity(
    world: &mut World,
    hooks: &CoreHooks,
    extensions: &[DeserializeExt],
    ent: Entity,
    j: &Value,
) {
    if let Some(text) = j.get("Name").and_then(|v| v.as_str()) {
        set_name(world, hooks, ent, text);
    }
    if let Some(text) = j.get("ShortDescription").and_then(|v| v.as_str()) {
        set_short_description(world, hooks, ent, text);
    }
    if let Some(text) = j.get("RoomDescription").and_then(|v| v.as_str()) {
        set_room_description(world, hooks, ent, text);
    }
    if let Some(text) = j.get("LookDescription").and_then(|v| v.as_str()) {
        set_look_description(world, hooks, ent, text);
    }

    if let Some(target) = peer(world, j.get("Location")) {
        let _ = world.set_location(ent, Some(target));
    }
    if let Some(target) = peer(world, j.get("Parent")) {
        let _ = world.set_parent(ent, Some(target));
    }
    if let Some(target) = peer(world, j.get("Owner")) {
        let _ = world.set_owner(ent, Some(target));
    }

    if let Some(rooms) = j.get("Area").and_then(|v| v.as_array()) {
        let owner = world.object_id(ent).unwrap_or(ObjectId {
            index: ent.0,
            generation: 0,
        });
        let mut area = Area::default();
        for entry in rooms {
            let room_id = match entry.get(0).and_then(|v| v.as_u64()) {
                Some(room_id) => room_id as RoomId,
                None => continue,
            };
            let blob = match entry.get(1) {
                Some(blob) => blob.clone(),
                None => continue,
            };
            let room_ent = world.create_object();
            deserialize_entity(world, hooks, extensions, room_ent, &blob);
            world.attach(
                room_ent,
                Room {
                    owner,
                    id: room_id,
                },
            );
            area.rooms.insert(room_id, room_ent);
        }
        world.attach(ent, area);
    }

    if let Some(data) = j.get("Expanse") {
        let (bounds, poi) = grid_container_from_json(world, hooks, extensions, data);
        world.attach(ent, Expanse { bounds, poi });
    }
    if let Some(data) = j.get("Map") {
        let (bounds, poi) = grid_container_from_json(world, hooks, extensions, data);
        world.attach(ent, Map { bounds, poi });
    }
    if let Some(data) = j.get("Space") {
        let mut bounds = SectorBounds::default();
        if let Some(v) = data.get("minX").and_then(|v| v.as_f64()) {
            bounds.min_x = v;
        }
        if let Some(v) = data.get("minY").and_then(|v| v.as_f64()) {
            bounds.min_y = v;
        }
        if let Some(v) = data.get("minZ").and_then(|v| v.as_f64()) {
            bounds.min_z = v;
        }
        if let Some(v) = data.get("maxX").and_then(|v| v.as_f64()) {
            bounds.max_x = v;
        }
        if let Some(v) = data.get("maxY").and_then(|v| v.as_f64()) {
            bounds.max_y = v;
        }
        if let Some(v) = data.get("maxZ").and_then(|v| v.as_f64()) {
            bounds.max_z = v;
        }
        let mut poi = Vec::new();
        if let Some(entries) = data.get("poi").and_then(|v| v.as_array()) {
            for entry in entries {
                let point: SectorPoint = match entry
                    .get(0)
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                {
                    Some(point) => point,
                    None => continue,
                };
                let blob = match entry.get(1) {
                    Some(blob) => blob.clone(),
                    None => continue,
                };
                let poi_ent = world.create_object();
                deserialize_entity(world, hooks, extensions, poi_ent, &blob);
                poi.push((point, poi_ent));
            }
        }
        world.attach(ent, Space { bounds, poi });
    }

    if let Some(point) = j
        .get("GridLocation")
        .and_then(|v| serde_json::from_value::<GridPoint>(v.clone()).ok())
    {
        world.attach(ent, GridLocation(point));
    }
    if let Some(id) = j.get("RoomLocation").and_then(|v| v.as_u64()) {
        world.attach(ent, RoomLocation { id });
    }
    if let Some(point) = j
        .get("SectorLocation")
        .and_then(|v| serde_json::from_value::<SectorPoint>(v.clone()).ok())
    {
        world.attach(ent, SectorLocation(point));
    }

    if j.get("Item").is_some() {
        world.attach(ent, Item);
    }
    if j.get("Character").is_some() {
        world.attach(ent, Character);
    }
    if j.get("NPC").is_some() {
        world.attach(ent, Npc);
    }
    if j.get("Vehicle").is_some() {
        world.attach(ent, Vehicle);
    }
    if let Some(data) = j.get("Player") {
        let account_id = data.get("accountId").and_then(|v| v.as_i64()).unwrap_or(-1);
        world.attach(ent, Player { account_id });
    }
    if let Some(data) = j.get("Room") {
        let id = data.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
        let owner = data
            .get("obj")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(ObjectId {
                index: 0,
                generation: 0,
            });
        world.attach(ent, Room { owner, id });
    }
    if let Some(name) = j.get("Prototype").and_then(|v| v.as_str()) {
        world.attach(
            ent,
            Prototype {
                name: name.to_string(),
            },
        );
    }

    for ext in extensions {
        ext(world, hooks, ent, j);
    }
}

fn grid_container_from_json(
    world: &mut World,
    hooks: &CoreHooks,
    extensions: &[DeserializeExt],
    data: &Value,
) -> (GridBounds, std::collections::BTreeMap<GridPoint, Entity>) {
    let mut bounds = GridBounds::default();
    if let Some(v) = data.get("minX").and_then(|v| v.as_i64()) {
        bounds.min_x = v;
    }
    if let Some(v) = data.get("minY").and_then(|v| v.as_i64()) {
        bounds.min_y = v;
    }
    if let Some(v) = data.get("minZ").and_then(|v| v.as_i64()) {
        bounds.min_z = v;
    }
    if let Some(v) = data.get("maxX").and_then(|v| v.as_i64()) {
        bounds.max_x = v;
    }
    if let Some(v) = data.get("maxY").and_then(|v| v.as_i64()) {
        bounds.max_y = v;
    }
    if let Some(v) = data.get("maxZ").and_then(|v| v.as_i64()) {
        bounds.max_z = v;
    }
    let mut poi = std::collections::BTreeMap::new();
    if let Some(entries) = data.get("poi").and_then(|v| v.as_array()) {
        for entry in entries {
            let point: GridPoint = match entry
                .get(0)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
            {
                Some(point) => point,
                None => continue,
            };
            let blob = match entry.get(1) {
                Some(blob) => blob.clone(),
                None => continue,
            };
            let poi_ent = world.create_object();
            deserialize_entity(world, hooks, extensions, poi_ent, &blob);
            poi.insert(point, poi_ent);
        }
    }
    (bounds, poi)
}

fn peer(world: &World, value: Option<&Value>) -> Option<Entity> {
    let id: ObjectId = serde_json::from_value(value?.clone()).ok()?;
    world.resolve(id)
}

/// Re-index room/grid/sector occupancy after a bulk load. Locators hydrate
/// before their containers are guaranteed to exist, so the reverse lookups
/// are rebuilt once everything is in place.
fn rebuild_spatial_indexes(world: &mut World) {
    let occupants: Vec<Entity> = world.iter_objects().collect();
    for ent in occupants {
        let container = match world.location(ent) {
            Some(container) => container,
            None => continue,
        };
        if let Some(room_loc) = world.get::<RoomLocation>(ent).copied() {
            let room = world
                .get::<Area>(container)
                .and_then(|area| area.rooms.get(&room_loc.id).copied());
            if let Some(room) = room {
                let index = world.get_or_attach::<RoomContents>(room);
                if !index.0.contains(&ent) {
                    index.0.push(ent);
                }
            }
        } else if let Some(grid_loc) = world.get::<GridLocation>(ent).copied() {
            let cell = world
                .get_or_attach::<crate::components::GridContents>(container)
                .0
                .entry(grid_loc.0)
                .or_insert_with(Vec::new);
            if !cell.contains(&ent) {
                cell.push(ent);
            }
        } else if let Some(sector_loc) = world.get::<SectorLocation>(ent).copied() {
            let index = world.get_or_attach::<crate::components::SectorContents>(container);
            match index.0.iter_mut().find(|(p, _)| *p == sector_loc.0) {
                Some((_, cell)) => {
                    if !cell.contains(&ent) {
                        cell.push(ent);
                    }
                }
                None => index.0.push((sector_loc.0, vec![ent])),
            }
        }
    }
}
