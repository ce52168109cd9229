//! The in-world staples. These act through whatever entity the session is
//! puppeting, so most are available to anything that looks like a character,
//! an item being possessed, or a vehicle.

use crate::command::{Command, CommandInput, CommandTables};
use crate::components::{
    Character, GridLocation, GridPoint, Item, SectorLocation, SectorPoint, SessionHolder, Vehicle,
};
use crate::error::CoreError;
use crate::game::Core;
use crate::hooks;
use crate::objects::Entity;
use crate::search::{Search, SearchType};
use crate::spatial::{Destination, DestinationPoint};
use crate::world::World;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Role gate shared by every object command.
fn is_puppetable(world: &World, ent: Entity) -> bool {
    world.has::<Character>(ent) || world.has::<Item>(ent) || world.has::<Vehicle>(ent)
}

fn session_line(core: &mut Core, ent: Entity, text: &str) {
    core.send_line_to_entity(ent, text);
}

/// Tell everyone co-located with `actor` except `actor` itself.
fn tell_bystanders(core: &mut Core, actor: Entity, render: impl Fn(&Core, Entity) -> String) {
    let others: Vec<Entity> = (core.hooks.room_contents)(&core.hooks, &core.world, actor)
        .into_iter()
        .filter(|e| *e != actor && core.world.has::<SessionHolder>(*e))
        .collect();
    for other in others {
        let line = render(core, other);
        core.send_line_to_entity(other, &line);
    }
}

// ---------------------------------------------------------------------------

struct Look;

impl Command for Look {
    fn name(&self) -> &str {
        "look"
    }

    fn aliases(&self) -> &[&str] {
        &["l"]
    }

    fn category(&self) -> &str {
        "Perception"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let args = input.args.trim();
            if args.is_empty() {
                let text = render_surroundings(core, ent);
                session_line(core, ent, &text);
                return Ok(());
            }
            let found = Search::new(&core.world, &core.hooks, ent)
                .in_room(ent)
                .in_inventory(ent)
                .use_here(true)
                .find(args);
            match found.first() {
                Some(target) => {
                    let mut text =
                        (core.hooks.render_appearance)(&core.hooks, &core.world, *target, ent);
                    let detail = hooks::look_description(&core.world, *target);
                    if !detail.is_empty() {
                        text.push('\n');
                        text.push_str(&detail);
                    }
                    session_line(core, ent, &text);
                }
                None => session_line(core, ent, "You don't see that here."),
            }
            Ok(())
        })
    }
}

fn render_surroundings(core: &Core, ent: Entity) -> String {
    let world = &core.world;
    let here = match world.room_of(ent).or_else(|| world.location(ent)) {
        Some(here) => here,
        None => return "You are floating in a formless void.".to_string(),
    };
    let mut out = Vec::new();
    out.push((core.hooks.display_name)(&core.hooks, world, here, ent));
    let detail = hooks::look_description(world, here);
    if !detail.is_empty() {
        out.push(detail);
    }
    for other in (core.hooks.room_contents)(&core.hooks, world, ent) {
        if other == ent {
            continue;
        }
        let line = (core.hooks.room_line)(&core.hooks, world, other, ent);
        if !line.is_empty() {
            out.push(line);
        }
    }
    out.join("\n")
}

// ---------------------------------------------------------------------------

struct Help;

impl Command for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn aliases(&self) -> &[&str] {
        &["h"]
    }

    fn category(&self) -> &str {
        "Information"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let shape = crate::command::shape_key(&core.world, ent);
            let table = core.commands.sorted_for_shape(&core.world, ent, shape);
            let mut lines = vec!["Available commands:".to_string()];
            let mut last = String::new();
            for (key, command) in table.iter() {
                // aliases follow their command; print each command once
                if command.name().to_lowercase() != *key || command.name() == last {
                    continue;
                }
                last = command.name().to_string();
                if command.help().is_empty() {
                    lines.push(format!("  {:<12} ({})", command.name(), command.category()));
                } else {
                    lines.push(format!("  {:<12} {}", command.name(), command.help()));
                }
            }
            let text = lines.join("\n");
            session_line(core, ent, &text);
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------

struct Move;

const COMPASS: &[(&str, (i64, i64, i64))] = &[
    ("north", (0, 1, 0)),
    ("n", (0, 1, 0)),
    ("south", (0, -1, 0)),
    ("s", (0, -1, 0)),
    ("east", (1, 0, 0)),
    ("e", (1, 0, 0)),
    ("west", (-1, 0, 0)),
    ("w", (-1, 0, 0)),
    ("northeast", (1, 1, 0)),
    ("ne", (1, 1, 0)),
    ("northwest", (-1, 1, 0)),
    ("nw", (-1, 1, 0)),
    ("southeast", (1, -1, 0)),
    ("se", (1, -1, 0)),
    ("southwest", (-1, -1, 0)),
    ("sw", (-1, -1, 0)),
    ("up", (0, 0, 1)),
    ("u", (0, 0, 1)),
    ("down", (0, 0, -1)),
    ("d", (0, 0, -1)),
];

fn compass_delta(token: &str) -> Option<(i64, i64, i64)> {
    COMPASS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, delta)| *delta)
}

impl Command for Move {
    fn name(&self) -> &str {
        "move"
    }

    fn aliases(&self) -> &[&str] {
        &[
            "mv", "go", "north", "n", "south", "s", "east", "e", "west", "w", "up", "u", "down",
            "d", "in", "inside", "out", "outside", "northwest", "nw", "northeast", "ne",
            "southwest", "sw", "southeast", "se",
        ]
    }

    fn category(&self) -> &str {
        "Movement"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn can_execute(&self, core: &Core, ent: Entity, _input: &CommandInput) -> Result<(), CoreError> {
        if core.world.location(ent).is_none() {
            return Err(CoreError::InvalidDestination);
        }
        Ok(())
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            // `north` arrives with the direction as the command word itself
            let direction = compass_delta(&input.cmd)
                .or_else(|| compass_delta(input.args.trim()));

            let container = match core.world.location(ent) {
                Some(container) => container,
                None => return Err(CoreError::InvalidDestination),
            };

            let dest = if let Some((dx, dy, dz)) = direction {
                if let Some(grid) = core.world.get::<GridLocation>(ent) {
                    let from = grid.0;
                    Some(Destination {
                        target: Some(container),
                        point: DestinationPoint::Grid(GridPoint::new(
                            from.x + dx,
                            from.y + dy,
                            from.z + dz,
                        )),
                    })
                } else if let Some(sector) = core.world.get::<SectorLocation>(ent) {
                    let from = sector.0;
                    Some(Destination {
                        target: Some(container),
                        point: DestinationPoint::Sector(SectorPoint::new(
                            from.x + dx as f64,
                            from.y + dy as f64,
                            from.z + dz as f64,
                        )),
                    })
                } else {
                    // rooms connect however the game says they do; the bare
                    // core has no exits to follow
                    session_line(core, ent, "You can't go that way.");
                    return Ok(());
                }
            } else {
                (core.hooks.valid_destination)(&core.hooks, &core.world, container, input.args.trim())
            };

            let dest = match dest {
                Some(dest) => dest,
                None => {
                    session_line(core, ent, "You can't go there.");
                    return Ok(());
                }
            };

            match core.world.move_to(ent, &dest) {
                Ok(()) => {
                    let text = render_surroundings(core, ent);
                    session_line(core, ent, &text);
                    Ok(())
                }
                Err(CoreError::InvalidDestination) => {
                    session_line(core, ent, "You can't go there.");
                    Ok(())
                }
                Err(err) => Err(err),
            }
        })
    }
}

// ---------------------------------------------------------------------------

struct Say;

impl Command for Say {
    fn name(&self) -> &str {
        "say"
    }

    fn category(&self) -> &str {
        "Communication"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let message = input.args.trim().to_string();
            if message.is_empty() {
                session_line(core, ent, "Say what?");
                return Ok(());
            }
            session_line(core, ent, &format!("You say, \"{}\"", message));
            tell_bystanders(core, ent, |core, other| {
                format!(
                    "{} says, \"{}\"",
                    (core.hooks.display_name)(&core.hooks, &core.world, ent, other),
                    message
                )
            });
            Ok(())
        })
    }
}

struct Pose;

impl Command for Pose {
    fn name(&self) -> &str {
        "pose"
    }

    fn aliases(&self) -> &[&str] {
        &[";", "emote"]
    }

    fn category(&self) -> &str {
        "Communication"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let message = input.args.trim().to_string();
            if message.is_empty() {
                session_line(core, ent, "Pose what?");
                return Ok(());
            }
            let me = hooks::name(&core.world, ent);
            session_line(core, ent, &format!("{} {}", me, message));
            tell_bystanders(core, ent, |core, other| {
                format!(
                    "{} {}",
                    (core.hooks.display_name)(&core.hooks, &core.world, ent, other),
                    message
                )
            });
            Ok(())
        })
    }
}

struct Semipose;

impl Command for Semipose {
    fn name(&self) -> &str {
        "semipose"
    }

    fn aliases(&self) -> &[&str] {
        &[":"]
    }

    fn category(&self) -> &str {
        "Communication"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let message = input.args.trim().to_string();
            if message.is_empty() {
                session_line(core, ent, "Pose what?");
                return Ok(());
            }
            let me = hooks::name(&core.world, ent);
            session_line(core, ent, &format!("{}{}", me, message));
            tell_bystanders(core, ent, |core, other| {
                format!(
                    "{}{}",
                    (core.hooks.display_name)(&core.hooks, &core.world, ent, other),
                    message
                )
            });
            Ok(())
        })
    }
}

struct Whisper;

impl Command for Whisper {
    fn name(&self) -> &str {
        "whisper"
    }

    fn category(&self) -> &str {
        "Communication"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let target_name = input.lsargs.trim();
            let message = input.rsargs.trim().to_string();
            if target_name.is_empty() || message.is_empty() {
                session_line(core, ent, "whisper <target>=<message>");
                return Ok(());
            }
            let found = Search::new(&core.world, &core.hooks, ent)
                .in_room(ent)
                .set_type(SearchType::Characters)
                .find(target_name);
            let target = match found.first().copied() {
                Some(target) => target,
                None => {
                    session_line(core, ent, "They aren't here.");
                    return Ok(());
                }
            };
            let target_display =
                (core.hooks.display_name)(&core.hooks, &core.world, target, ent);
            session_line(
                core,
                ent,
                &format!("You whisper to {}, \"{}\"", target_display, message),
            );
            let my_display = (core.hooks.display_name)(&core.hooks, &core.world, ent, target);
            core.send_line_to_entity(
                target,
                &format!("{} whispers, \"{}\"", my_display, message),
            );
            Ok(())
        })
    }
}

struct Shout;

impl Command for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn aliases(&self) -> &[&str] {
        &["yell"]
    }

    fn category(&self) -> &str {
        "Communication"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let message = input.args.trim().to_string();
            if message.is_empty() {
                session_line(core, ent, "Shout what?");
                return Ok(());
            }
            session_line(core, ent, &format!("You shout, \"{}\"", message));
            // area-wide: everyone whose location chain shares our container
            let container = core.world.location(ent);
            let hearers: Vec<Entity> = core
                .sessions
                .values()
                .map(|session| session.puppet)
                .filter(|puppet| *puppet != ent && core.world.location(*puppet) == container)
                .collect();
            for hearer in hearers {
                let line = format!(
                    "{} shouts, \"{}\"",
                    (core.hooks.display_name)(&core.hooks, &core.world, ent, hearer),
                    message
                );
                core.send_line_to_entity(hearer, &line);
            }
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------

struct Get;

impl Command for Get {
    fn name(&self) -> &str {
        "get"
    }

    fn category(&self) -> &str {
        "Manipulation"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let wanted = input.args.trim();
            if wanted.is_empty() {
                session_line(core, ent, "Get what?");
                return Ok(());
            }
            let found = Search::new(&core.world, &core.hooks, ent)
                .in_room(ent)
                .set_type(SearchType::Items)
                .find(wanted);
            let item = match found.first().copied() {
                Some(item) => item,
                None => {
                    session_line(core, ent, "You don't see that here.");
                    return Ok(());
                }
            };
            core.world.leave_spatial(item);
            core.world.set_location(item, Some(ent))?;
            let display = (core.hooks.display_name)(&core.hooks, &core.world, item, ent);
            session_line(core, ent, &format!("You pick up {}.", display));
            tell_bystanders(core, ent, |core, other| {
                format!(
                    "{} picks up {}.",
                    (core.hooks.display_name)(&core.hooks, &core.world, ent, other),
                    (core.hooks.display_name)(&core.hooks, &core.world, item, other)
                )
            });
            Ok(())
        })
    }
}

/// Unlike `get`, `take` reaches into containers the actor already holds and
/// pulls the item into the actor's own inventory.
struct Take;

impl Command for Take {
    fn name(&self) -> &str {
        "take"
    }

    fn help(&self) -> &str {
        "Retrieve something from a container you hold: take <item> or take <item>=<container>"
    }

    fn category(&self) -> &str {
        "Manipulation"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let item_name = input.lsargs.trim();
            if item_name.is_empty() {
                session_line(core, ent, "Take what?");
                return Ok(());
            }

            let container_name = input.rsargs.trim();
            let containers: Vec<Entity> = if container_name.is_empty() {
                // no container named: try everything held, inventory first
                let mut held =
                    (core.hooks.inventory)(&core.hooks, &core.world, ent);
                held.extend((core.hooks.equipment)(&core.hooks, &core.world, ent));
                held.into_iter()
                    .filter(|c| !core.world.contents(*c).is_empty())
                    .collect()
            } else {
                let found = Search::new(&core.world, &core.hooks, ent)
                    .in_inventory(ent)
                    .in_equipment(ent)
                    .set_type(SearchType::Items)
                    .find(container_name);
                match found.first().copied() {
                    Some(container) => vec![container],
                    None => {
                        session_line(core, ent, "You aren't holding that container.");
                        return Ok(());
                    }
                }
            };

            for container in containers {
                let found = Search::new(&core.world, &core.hooks, ent)
                    .in_inventory(container)
                    .find(item_name);
                let item = match found.first().copied() {
                    Some(item) => item,
                    None => continue,
                };
                core.world.set_location(item, Some(ent))?;
                let text = format!(
                    "You take {} from {}.",
                    (core.hooks.display_name)(&core.hooks, &core.world, item, ent),
                    (core.hooks.display_name)(&core.hooks, &core.world, container, ent)
                );
                session_line(core, ent, &text);
                tell_bystanders(core, ent, |core, other| {
                    format!(
                        "{} takes {} from {}.",
                        (core.hooks.display_name)(&core.hooks, &core.world, ent, other),
                        (core.hooks.display_name)(&core.hooks, &core.world, item, other),
                        (core.hooks.display_name)(&core.hooks, &core.world, container, other)
                    )
                });
                return Ok(());
            }
            session_line(core, ent, "You don't have that.");
            Ok(())
        })
    }
}

struct Drop;

impl Command for Drop {
    fn name(&self) -> &str {
        "drop"
    }

    fn category(&self) -> &str {
        "Manipulation"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let wanted = input.args.trim();
            if wanted.is_empty() {
                session_line(core, ent, "Drop what?");
                return Ok(());
            }
            let found = Search::new(&core.world, &core.hooks, ent)
                .in_inventory(ent)
                .find(wanted);
            let item = match found.first().copied() {
                Some(item) => item,
                None => {
                    session_line(core, ent, "You aren't carrying that.");
                    return Ok(());
                }
            };
            // the item lands exactly where the holder stands
            let dest = current_spot(&core.world, ent);
            match dest {
                Some(dest) => core.world.move_to(item, &dest)?,
                None => {
                    let here = core.world.location(ent);
                    core.world.set_location(item, here)?;
                }
            }
            let display = (core.hooks.display_name)(&core.hooks, &core.world, item, ent);
            session_line(core, ent, &format!("You drop {}.", display));
            tell_bystanders(core, ent, |core, other| {
                format!(
                    "{} drops {}.",
                    (core.hooks.display_name)(&core.hooks, &core.world, ent, other),
                    (core.hooks.display_name)(&core.hooks, &core.world, item, other)
                )
            });
            Ok(())
        })
    }
}

/// The holder's own placement, as a destination others can be moved to.
fn current_spot(world: &World, ent: Entity) -> Option<Destination> {
    let container = world.location(ent)?;
    if let Some(room) = world.get::<crate::components::RoomLocation>(ent) {
        return Some(Destination {
            target: Some(container),
            point: DestinationPoint::Room(room.id),
        });
    }
    if let Some(grid) = world.get::<GridLocation>(ent) {
        return Some(Destination {
            target: Some(container),
            point: DestinationPoint::Grid(grid.0),
        });
    }
    if let Some(sector) = world.get::<SectorLocation>(ent) {
        return Some(Destination {
            target: Some(container),
            point: DestinationPoint::Sector(sector.0),
        });
    }
    None
}

struct Put;

impl Command for Put {
    fn name(&self) -> &str {
        "put"
    }

    fn category(&self) -> &str {
        "Manipulation"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let item_name = input.lsargs.trim();
            let container_name = input.rsargs.trim();
            if item_name.is_empty() || container_name.is_empty() {
                session_line(core, ent, "put <item>=<container>");
                return Ok(());
            }
            let item = Search::new(&core.world, &core.hooks, ent)
                .in_inventory(ent)
                .find(item_name)
                .first()
                .copied();
            let item = match item {
                Some(item) => item,
                None => {
                    session_line(core, ent, "You aren't carrying that.");
                    return Ok(());
                }
            };
            let container = Search::new(&core.world, &core.hooks, ent)
                .in_inventory(ent)
                .in_room(ent)
                .set_type(SearchType::Items)
                .find(container_name)
                .first()
                .copied();
            let container = match container {
                Some(container) if container != item => container,
                _ => {
                    session_line(core, ent, "Put it where?");
                    return Ok(());
                }
            };
            core.world.set_location(item, Some(container))?;
            session_line(
                core,
                ent,
                &format!(
                    "You put {} in {}.",
                    (core.hooks.display_name)(&core.hooks, &core.world, item, ent),
                    (core.hooks.display_name)(&core.hooks, &core.world, container, ent)
                ),
            );
            Ok(())
        })
    }
}

struct Give;

impl Command for Give {
    fn name(&self) -> &str {
        "give"
    }

    fn category(&self) -> &str {
        "Manipulation"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let item_name = input.lsargs.trim();
            let target_name = input.rsargs.trim();
            if item_name.is_empty() || target_name.is_empty() {
                session_line(core, ent, "give <item>=<character>");
                return Ok(());
            }
            let item = Search::new(&core.world, &core.hooks, ent)
                .in_inventory(ent)
                .find(item_name)
                .first()
                .copied();
            let item = match item {
                Some(item) => item,
                None => {
                    session_line(core, ent, "You aren't carrying that.");
                    return Ok(());
                }
            };
            let target = Search::new(&core.world, &core.hooks, ent)
                .in_room(ent)
                .set_type(SearchType::Characters)
                .find(target_name)
                .first()
                .copied();
            let target = match target {
                Some(target) => target,
                None => {
                    session_line(core, ent, "They aren't here.");
                    return Ok(());
                }
            };
            core.world.set_location(item, Some(target))?;
            session_line(
                core,
                ent,
                &format!(
                    "You give {} to {}.",
                    (core.hooks.display_name)(&core.hooks, &core.world, item, ent),
                    (core.hooks.display_name)(&core.hooks, &core.world, target, ent)
                ),
            );
            let line = format!(
                "{} gives you {}.",
                (core.hooks.display_name)(&core.hooks, &core.world, ent, target),
                (core.hooks.display_name)(&core.hooks, &core.world, item, target)
            );
            core.send_line_to_entity(target, &line);
            Ok(())
        })
    }
}

struct Inventory;

impl Command for Inventory {
    fn name(&self) -> &str {
        "inventory"
    }

    fn aliases(&self) -> &[&str] {
        &["inv", "i"]
    }

    fn category(&self) -> &str {
        "Information"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let carried = (core.hooks.inventory)(&core.hooks, &core.world, ent);
            let text = if carried.is_empty() {
                "You are carrying nothing.".to_string()
            } else {
                let mut lines = vec!["You are carrying:".to_string()];
                for item in carried {
                    lines.push(format!(
                        "  {}",
                        (core.hooks.display_name)(&core.hooks, &core.world, item, ent)
                    ));
                }
                lines.join("\n")
            };
            session_line(core, ent, &text);
            Ok(())
        })
    }
}

struct Equip;

impl Command for Equip {
    fn name(&self) -> &str {
        "equip"
    }

    fn aliases(&self) -> &[&str] {
        &["eq", "wear", "wield", "hold"]
    }

    fn category(&self) -> &str {
        "Manipulation"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            if input.args.trim().is_empty() {
                let worn = (core.hooks.equipment)(&core.hooks, &core.world, ent);
                let text = if worn.is_empty() {
                    "You have nothing equipped.".to_string()
                } else {
                    let mut lines = vec!["You are using:".to_string()];
                    for item in worn {
                        lines.push(format!(
                            "  {}",
                            (core.hooks.display_name)(&core.hooks, &core.world, item, ent)
                        ));
                    }
                    lines.join("\n")
                };
                session_line(core, ent, &text);
                return Ok(());
            }
            // slotting rules are game content; the bare core only lists
            session_line(core, ent, "You can't equip that.");
            Ok(())
        })
    }
}

struct Quit;

impl Command for Quit {
    fn name(&self) -> &str {
        "quit"
    }

    fn category(&self) -> &str {
        "System"
    }

    fn is_available(&self, world: &World, ent: Entity) -> bool {
        is_puppetable(world, ent)
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        ent: Entity,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let sid = match core.world.get::<SessionHolder>(ent) {
                Some(holder) => holder.session,
                None => return Ok(()),
            };
            session_line(core, ent, "Leaving the world. See you soon.");
            core.end_session(sid).await
        })
    }
}

pub fn register(tables: &mut CommandTables) -> Result<(), CoreError> {
    tables.register(Arc::new(Look))?;
    tables.register(Arc::new(Help))?;
    tables.register(Arc::new(Move))?;
    tables.register(Arc::new(Say))?;
    tables.register(Arc::new(Pose))?;
    tables.register(Arc::new(Semipose))?;
    tables.register(Arc::new(Whisper))?;
    tables.register(Arc::new(Shout))?;
    tables.register(Arc::new(Get))?;
    tables.register(Arc::new(Take))?;
    tables.register(Arc::new(Drop))?;
    tables.register(Arc::new(Put))?;
    tables.register(Arc::new(Give))?;
    tables.register(Arc::new(Inventory))?;
    tables.register(Arc::new(Equip))?;
    tables.register(Arc::new(Quit))?;
    Ok(())
}
