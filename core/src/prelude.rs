//! Convenient re-exports for games built on the core.

pub use crate::command::{
    shape_key, Command, CommandInput, CommandParser, CommandTables, ConnectCommand, LoginCommand,
};
pub use crate::components::{
    Area, Assets, Character, Children, Contents, Expanse, GridBounds, GridContents, GridLength,
    GridLocation, GridPoint, Item, Location, LookDescription, Map, Name, Npc, Owner, Parent,
    Player, Prototype, Room, RoomContents, RoomDescription, RoomId, RoomLocation, SectorBounds,
    SectorContents, SectorLength, SectorLocation, SectorPoint, SessionHolder, ShortDescription,
    Space, Vehicle,
};
pub use crate::connection::{Connection, ConnectionRegistry};
pub use crate::error::CoreError;
pub use crate::game::{heartbeat, run_game, Core, GameLoop, DEFAULT_HEARTBEAT};
pub use crate::hooks::CoreHooks;
pub use crate::link::{LinkEvent, LinkManager, RECONNECT_BACKOFF};
pub use crate::objects::{Entity, ObjRef, ObjectId};
pub use crate::persist::{serialize_entity, Db};
pub use crate::protocol::{ClientMessage, ColorType, Protocol, ProtocolCapabilities};
pub use crate::search::{Search, SearchScope, SearchType};
pub use crate::session::{Session, LINKDEAD_GRACE};
pub use crate::spatial::{Destination, DestinationPoint};
pub use crate::systems::{
    register_defaults as register_default_systems, ProcessCommands, ProcessConnections,
    ProcessOutput, ProcessSessions, System, SystemRegistry,
};
pub use crate::world::World;
