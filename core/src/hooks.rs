//! The replaceable surface of the core.
//!
//! Every user-facing behavior the core cannot dictate (how names render, who
//! can see whom, what counts as equipment, how passwords are hashed) is a
//! plain function pointer in [`CoreHooks`]. Games compose their own set at
//! startup; the defaults below implement the behavior a bare core ships
//! with. All hooks receive the hook table itself so overridden pieces can
//! still call into the rest of the pipeline.

use crate::components::{
    Area, Character, Expanse, GridLocation, GridPoint, Item, LookDescription, Map, Name, Npc,
    RoomContents, RoomDescription, RoomLocation, SectorLocation, SectorPoint, ShortDescription,
    Space,
};
use crate::error::CoreError;
use crate::objects::Entity;
use crate::protocol::ColorType;
use crate::spatial::{parse_coordinates, Destination, DestinationPoint};
use crate::text::StyledText;
use crate::world::World;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

pub struct CoreHooks {
    /// Render color codes for a client capability level.
    pub render_ansi: fn(&str, ColorType) -> String,
    /// Strip all color codes.
    pub strip_ansi: fn(&str) -> String,

    pub display_name: fn(&CoreHooks, &World, Entity, Entity) -> String,
    pub room_line: fn(&CoreHooks, &World, Entity, Entity) -> String,
    pub render_appearance: fn(&CoreHooks, &World, Entity, Entity) -> String,

    pub search_words: fn(&CoreHooks, &World, Entity, Entity) -> Vec<String>,
    pub check_search: fn(&CoreHooks, &World, Entity, &str, Entity) -> bool,
    pub can_detect: fn(&CoreHooks, &World, Entity, Entity, u64) -> bool,

    pub is_equipped: fn(&CoreHooks, &World, Entity) -> bool,
    pub is_inventory: fn(&CoreHooks, &World, Entity) -> bool,
    pub inventory: fn(&CoreHooks, &World, Entity) -> Vec<Entity>,
    pub equipment: fn(&CoreHooks, &World, Entity) -> Vec<Entity>,
    /// Everything the given entity shares a room (or grid cell, or sector
    /// point) with.
    pub room_contents: fn(&CoreHooks, &World, Entity) -> Vec<Entity>,

    pub valid_destination: fn(&CoreHooks, &World, Entity, &str) -> Option<Destination>,

    pub hash_password: fn(&str) -> Result<String, CoreError>,
    pub verify_password: fn(&str, &str) -> bool,
}

impl Default for CoreHooks {
    fn default() -> Self {
        CoreHooks {
            render_ansi: default_render_ansi,
            strip_ansi: default_strip_ansi,
            display_name: default_display_name,
            room_line: default_room_line,
            render_appearance: default_render_appearance,
            search_words: default_search_words,
            check_search: default_check_search,
            can_detect: default_can_detect,
            is_equipped: default_is_equipped,
            is_inventory: default_is_inventory,
            inventory: default_inventory,
            equipment: default_equipment,
            room_contents: default_room_contents,
            valid_destination: default_valid_destination,
            hash_password: default_hash_password,
            verify_password: default_verify_password,
        }
    }
}

// ---------------------------------------------------------------------------
// Text components
// ---------------------------------------------------------------------------

fn styled(world: &mut World, hooks: &CoreHooks, text: &str) -> StyledText {
    let plain = (hooks.strip_ansi)(text);
    StyledText {
        raw: world.intern(text),
        plain: world.intern(&plain),
    }
}

pub fn set_name(world: &mut World, hooks: &CoreHooks, ent: Entity, text: &str) {
    let value = styled(world, hooks, text);
    world.attach(ent, Name(value));
}

pub fn set_short_description(world: &mut World, hooks: &CoreHooks, ent: Entity, text: &str) {
    let value = styled(world, hooks, text);
    world.attach(ent, ShortDescription(value));
}

pub fn set_room_description(world: &mut World, hooks: &CoreHooks, ent: Entity, text: &str) {
    let value = styled(world, hooks, text);
    world.attach(ent, RoomDescription(value));
}

pub fn set_look_description(world: &mut World, hooks: &CoreHooks, ent: Entity, text: &str) {
    let value = styled(world, hooks, text);
    world.attach(ent, LookDescription(value));
}

pub fn name(world: &World, ent: Entity) -> String {
    match world.get::<Name>(ent) {
        Some(n) if !n.0.raw.is_empty() => n.0.raw.to_string(),
        _ => "Unnamed Object".to_string(),
    }
}

pub fn short_description(world: &World, ent: Entity) -> String {
    world
        .get::<ShortDescription>(ent)
        .map(|d| d.0.raw.to_string())
        .unwrap_or_default()
}

pub fn room_description(world: &World, ent: Entity) -> String {
    world
        .get::<RoomDescription>(ent)
        .map(|d| d.0.raw.to_string())
        .unwrap_or_default()
}

pub fn look_description(world: &World, ent: Entity) -> String {
    world
        .get::<LookDescription>(ent)
        .map(|d| d.0.raw.to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// The default renderer is a passthrough; games inject their own color markup
// transform. Stripping therefore renders at the NoColor level.
pub fn default_render_ansi(input: &str, _color: ColorType) -> String {
    input.to_string()
}

pub fn default_strip_ansi(input: &str) -> String {
    default_render_ansi(input, ColorType::NoColor)
}

pub fn default_display_name(
    _hooks: &CoreHooks,
    world: &World,
    ent: Entity,
    _viewer: Entity,
) -> String {
    if world.has::<Item>(ent) || world.has::<Npc>(ent) {
        return short_description(world, ent);
    }
    name(world, ent)
}

pub fn default_room_line(hooks: &CoreHooks, world: &World, ent: Entity, viewer: Entity) -> String {
    if world.has::<Item>(ent) || world.has::<Npc>(ent) {
        return room_description(world, ent);
    }
    if world.has::<Character>(ent) {
        return format!("{} is here.", (hooks.display_name)(hooks, world, ent, viewer));
    }
    format!("{} is here.", (hooks.display_name)(hooks, world, ent, viewer))
}

pub fn default_render_appearance(
    hooks: &CoreHooks,
    world: &World,
    ent: Entity,
    viewer: Entity,
) -> String {
    let mut out = vec![(hooks.display_name)(hooks, world, ent, viewer)];
    let rdesc = room_description(world, ent);
    if !rdesc.is_empty() {
        out.push(rdesc);
    }
    out.join("\n")
}

pub fn default_search_words(
    hooks: &CoreHooks,
    world: &World,
    ent: Entity,
    viewer: Entity,
) -> Vec<String> {
    let display = (hooks.display_name)(hooks, world, ent, viewer);
    let plain = (hooks.strip_ansi)(&display);
    plain.split_whitespace().map(|w| w.to_string()).collect()
}

pub fn default_check_search(
    hooks: &CoreHooks,
    world: &World,
    ent: Entity,
    term: &str,
    viewer: Entity,
) -> bool {
    let mut words = (hooks.search_words)(hooks, world, ent, viewer);
    // shortest first, so "sw" prefers "sword" over "swordfish sheath"
    words.sort_by_key(|w| w.len());
    let term = term.to_lowercase();
    words.iter().any(|word| word.to_lowercase().starts_with(&term))
}

pub fn default_can_detect(
    _hooks: &CoreHooks,
    _world: &World,
    _seeker: Entity,
    _target: Entity,
    _modes: u64,
) -> bool {
    true
}

// Equipment schemes are game content; the bare core holds nothing equipped.
pub fn default_is_equipped(_hooks: &CoreHooks, _world: &World, _ent: Entity) -> bool {
    false
}

pub fn default_is_inventory(hooks: &CoreHooks, world: &World, ent: Entity) -> bool {
    !(hooks.is_equipped)(hooks, world, ent)
        && !world.has::<RoomLocation>(ent)
        && !world.has::<GridLocation>(ent)
        && !world.has::<SectorLocation>(ent)
}

pub fn default_inventory(hooks: &CoreHooks, world: &World, ent: Entity) -> Vec<Entity> {
    world
        .contents(ent)
        .iter()
        .copied()
        .filter(|e| (hooks.is_inventory)(hooks, world, *e))
        .collect()
}

pub fn default_equipment(hooks: &CoreHooks, world: &World, ent: Entity) -> Vec<Entity> {
    world
        .contents(ent)
        .iter()
        .copied()
        .filter(|e| (hooks.is_equipped)(hooks, world, *e))
        .collect()
}

pub fn default_room_contents(_hooks: &CoreHooks, world: &World, ent: Entity) -> Vec<Entity> {
    if let Some(direct) = world.get::<RoomContents>(ent) {
        return direct.0.clone();
    }
    world.colocated(ent)
}

pub fn default_valid_destination(
    _hooks: &CoreHooks,
    world: &World,
    ent: Entity,
    input: &str,
) -> Option<Destination> {
    if !world.is_valid(ent) {
        return None;
    }
    let coords = parse_coordinates(input)?;

    if let Some(area) = world.get::<Area>(ent) {
        let id = coords[0] as u64;
        if area.rooms.contains_key(&id) {
            return Some(Destination {
                target: Some(ent),
                point: DestinationPoint::Room(id),
            });
        }
        return None;
    }
    if let Some(expanse) = world.get::<Expanse>(ent) {
        let p = GridPoint::new(coords[0] as i64, coords[1] as i64, coords[2] as i64);
        if expanse.bounds.contains(p) {
            return Some(Destination {
                target: Some(ent),
                point: DestinationPoint::Grid(p),
            });
        }
        return None;
    }
    if let Some(map) = world.get::<Map>(ent) {
        let p = GridPoint::new(coords[0] as i64, coords[1] as i64, coords[2] as i64);
        if map.bounds.contains(p) && map.poi.contains_key(&p) {
            return Some(Destination {
                target: Some(ent),
                point: DestinationPoint::Grid(p),
            });
        }
        return None;
    }
    if let Some(space) = world.get::<Space>(ent) {
        let p = SectorPoint::new(coords[0], coords[1], coords[2]);
        if space.bounds.contains(p) {
            return Some(Destination {
                target: Some(ent),
                point: DestinationPoint::Sector(p),
            });
        }
        return None;
    }
    None
}

pub fn default_hash_password(password: &str) -> Result<String, CoreError> {
    if password.is_empty() {
        return Err(CoreError::auth("Password cannot be empty"));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CoreError::auth(format!("Failed to hash password: {}", err)))
}

pub fn default_verify_password(hash: &str, candidate: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_world;

    #[test]
    fn display_pipeline_honors_role_flags() {
        let mut world = test_world();
        let hooks = CoreHooks::default();

        let sword = world.create_object();
        world.attach(sword, Item);
        set_name(&mut world, &hooks, sword, "sword");
        set_short_description(&mut world, &hooks, sword, "a rusty sword");
        set_room_description(&mut world, &hooks, sword, "A rusty sword lies here.");

        let alice = world.create_object();
        world.attach(alice, Character);
        set_name(&mut world, &hooks, alice, "Alice");

        let viewer = world.create_object();

        assert_eq!(
            (hooks.display_name)(&hooks, &world, sword, viewer),
            "a rusty sword"
        );
        assert_eq!(
            (hooks.room_line)(&hooks, &world, sword, viewer),
            "A rusty sword lies here."
        );
        assert_eq!((hooks.display_name)(&hooks, &world, alice, viewer), "Alice");
        assert_eq!(
            (hooks.room_line)(&hooks, &world, alice, viewer),
            "Alice is here."
        );

        let anon = world.create_object();
        assert_eq!(
            (hooks.display_name)(&hooks, &world, anon, viewer),
            "Unnamed Object"
        );
    }

    #[test]
    fn search_words_prefix_match_case_insensitively() {
        let mut world = test_world();
        let hooks = CoreHooks::default();
        let orc = world.create_object();
        world.attach(orc, Npc);
        set_short_description(&mut world, &hooks, orc, "a Savage Orc warrior");

        let viewer = world.create_object();
        assert!((hooks.check_search)(&hooks, &world, orc, "orc", viewer));
        assert!((hooks.check_search)(&hooks, &world, orc, "SAV", viewer));
        assert!(!(hooks.check_search)(&hooks, &world, orc, "goblin", viewer));
    }

    #[test]
    fn passwords_hash_and_verify() {
        let hash = default_hash_password("hunter2").unwrap();
        assert!(default_verify_password(&hash, "hunter2"));
        assert!(!default_verify_password(&hash, "hunter3"));
        assert!(default_hash_password("").is_err());
    }

    #[test]
    fn inventory_excludes_placed_things() {
        let mut world = test_world();
        let hooks = CoreHooks::default();
        let holder = world.create_object();
        let carried = world.create_object();
        let placed = world.create_object();
        world.set_location(carried, Some(holder)).unwrap();
        world.set_location(placed, Some(holder)).unwrap();
        world.attach(placed, RoomLocation { id: 1 });

        assert_eq!(
            (hooks.inventory)(&hooks, &world, holder),
            vec![carried]
        );
    }
}
