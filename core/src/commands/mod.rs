//! The stock command set: welcome-screen commands, account-menu commands and
//! the in-world staples. Games replace or extend these at startup.

pub mod connect;
pub mod login;
pub mod object;

use crate::command::CommandTables;
use crate::error::CoreError;

/// Register every built-in command. Call `CommandTables::expand` afterwards.
pub fn register_defaults(tables: &mut CommandTables) -> Result<(), CoreError> {
    connect::register(tables)?;
    login::register(tables)?;
    object::register(tables)?;
    Ok(())
}
