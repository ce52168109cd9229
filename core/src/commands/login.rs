//! Account-menu commands: pick a character, make one, housekeeping.

use crate::accounts::partial_match;
use crate::command::{CommandInput, CommandTables, LoginCommand};
use crate::components::{Character, Player, SessionHolder};
use crate::error::CoreError;
use crate::game::Core;
use crate::hooks::set_name;
use crate::objects::Entity;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Characters the connection's account may play, as live entities.
async fn playable_characters(core: &Core, account: i64) -> Result<Vec<Entity>, CoreError> {
    let rows = core.db.characters_for_account(account).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| core.world.occupant(row.character as u32))
        .collect())
}

struct Play;

impl LoginCommand for Play {
    fn name(&self) -> &str {
        "play"
    }

    fn aliases(&self) -> &[&str] {
        &["select", "p"]
    }

    fn help(&self) -> &str {
        "Enter the world as one of your characters: play <name>"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let account = match core.connections.get(conn_id).and_then(|c| c.account) {
                Some(account) => account,
                None => return Ok(()),
            };
            let wanted = input.args.trim();
            if wanted.is_empty() {
                core.send_text_to_connection(conn_id, "Please enter a name.\r\n");
                return Ok(());
            }

            let characters = playable_characters(core, account).await?;
            let named: Vec<(String, Entity)> = characters
                .into_iter()
                .map(|ent| (crate::hooks::name(&core.world, ent), ent))
                .collect();
            let found = partial_match(
                wanted,
                named.iter().map(|(name, ent)| (name.as_str(), *ent)),
            );

            match found {
                Some(character) => core.join_session(conn_id, character).await,
                None => {
                    core.send_text_to_connection(conn_id, "No character found with that name.\r\n");
                    Ok(())
                }
            }
        })
    }
}

struct New;

impl LoginCommand for New {
    fn name(&self) -> &str {
        "new"
    }

    fn aliases(&self) -> &[&str] {
        &["create", "register", "reg", "cr"]
    }

    fn help(&self) -> &str {
        "Create a new character: new <name>"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let account = match core.connections.get(conn_id).and_then(|c| c.account) {
                Some(account) => account,
                None => return Ok(()),
            };
            let wanted = input.args.trim().to_string();
            let validators = core.character_name_validators.clone();
            crate::accounts::validate_character_name(&validators, &wanted, None)?;

            // no duplicate names within one account
            let existing = playable_characters(core, account).await?;
            if existing
                .iter()
                .any(|ent| crate::hooks::name(&core.world, *ent).eq_ignore_ascii_case(&wanted))
            {
                core.send_text_to_connection(conn_id, "You already have a character by that name.\r\n");
                return Ok(());
            }

            let character = core.world.create_object();
            world_setup(core, character, account, &wanted);
            let id = core
                .world
                .object_id(character)
                .expect("freshly created object");
            core.db.link_character(id.index as i64, account).await?;

            core.send_text_to_connection(
                conn_id,
                &format!("{} joins the world. Use \"play {}\" to begin.\r\n", wanted, wanted),
            );
            Ok(())
        })
    }
}

fn world_setup(core: &mut Core, character: Entity, account: i64, name: &str) {
    core.world.attach(character, Character);
    core.world.attach(
        character,
        Player {
            account_id: account,
        },
    );
    let hooks = &core.hooks;
    set_name(&mut core.world, hooks, character, name);
}

struct Delete;

impl LoginCommand for Delete {
    fn name(&self) -> &str {
        "delete"
    }

    fn help(&self) -> &str {
        "Permanently delete one of your characters: delete <name>"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let account = match core.connections.get(conn_id).and_then(|c| c.account) {
                Some(account) => account,
                None => return Ok(()),
            };
            let wanted = input.args.trim();
            if wanted.is_empty() {
                core.send_text_to_connection(conn_id, "syntax: delete <character>\r\n");
                return Ok(());
            }

            // deletion is no place for fuzzy matching: exact names only
            let characters = playable_characters(core, account).await?;
            let target = characters
                .into_iter()
                .find(|ent| crate::hooks::name(&core.world, *ent).eq_ignore_ascii_case(wanted));
            let target = match target {
                Some(target) => target,
                None => {
                    core.send_text_to_connection(conn_id, "No character found with that name.\r\n");
                    return Ok(());
                }
            };
            if core.world.has::<SessionHolder>(target) {
                core.send_text_to_connection(
                    conn_id,
                    "You can't delete a character who is in play.\r\n",
                );
                return Ok(());
            }

            let name = crate::hooks::name(&core.world, target);
            let id = core
                .world
                .object_id(target)
                .expect("playable characters are live");
            core.world.delete_object(target);
            core.db.unlink_character(id.index as i64).await?;

            core.send_text_to_connection(conn_id, &format!("{} has been deleted.\r\n", name));
            Ok(())
        })
    }
}

struct Email;

impl LoginCommand for Email {
    fn name(&self) -> &str {
        "email"
    }

    fn help(&self) -> &str {
        "Change your email address: email <address>"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let account = match core.connections.get(conn_id).and_then(|c| c.account) {
                Some(account) => account,
                None => return Ok(()),
            };
            let address = input.args.trim();
            if address.is_empty() {
                core.send_text_to_connection(conn_id, "syntax: email <email address>\r\n");
                return Ok(());
            }
            if !address.contains('@') || address.contains(char::is_whitespace) {
                core.send_text_to_connection(
                    conn_id,
                    "That doesn't look like an email address.\r\n",
                );
                return Ok(());
            }
            core.db.update_account_email(account, address).await?;
            core.send_text_to_connection(conn_id, "Email address updated.\r\n");
            Ok(())
        })
    }
}

struct Password;

impl LoginCommand for Password {
    fn name(&self) -> &str {
        "password"
    }

    fn help(&self) -> &str {
        "Change your password: password <old>=<new>"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let account = match core.connections.get(conn_id).and_then(|c| c.account) {
                Some(account) => account,
                None => return Ok(()),
            };
            if input.rsargs.is_empty() {
                core.send_text_to_connection(conn_id, "syntax: password <old password>=<new password>\r\n");
                return Ok(());
            }
            let record = core.db.account_record(account).await?;
            let username = match record {
                Some(record) => record.username,
                None => return Ok(()),
            };
            let credentials = core.db.account_credentials(&username).await?;
            let hash = match credentials {
                Some((_, hash)) => hash,
                None => return Ok(()),
            };
            if !(core.hooks.verify_password)(&hash, input.lsargs.trim()) {
                core.send_text_to_connection(conn_id, "Passwords do not match.\r\n");
                return Ok(());
            }
            let new_hash = (core.hooks.hash_password)(input.rsargs.trim())?;
            core.db.update_account_password(account, &new_hash).await?;
            core.send_text_to_connection(conn_id, "Password changed.\r\n");
            Ok(())
        })
    }
}

struct Quit;

impl LoginCommand for Quit {
    fn name(&self) -> &str {
        "quit"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            core.send_text_to_connection(conn_id, "Goodbye!\r\n");
            core.connections.apply(
                crate::link::LinkEvent::ClientGone { id: conn_id },
                &core.world.logger.clone(),
            );
            Ok(())
        })
    }
}

pub fn register(tables: &mut CommandTables) -> Result<(), CoreError> {
    tables.register_login(Arc::new(Play))?;
    tables.register_login(Arc::new(New))?;
    tables.register_login(Arc::new(Delete))?;
    tables.register_login(Arc::new(Email))?;
    tables.register_login(Arc::new(Password))?;
    tables.register_login(Arc::new(Quit))?;
    Ok(())
}
