//! Welcome-screen commands: authenticate, create an account, or look around.

use crate::command::{CommandInput, CommandTables, ConnectCommand};
use crate::error::CoreError;
use crate::game::Core;
use futures_util::future::BoxFuture;
use regex::Regex;
use std::sync::Arc;

/// `connect alice secret` or `connect "alice m" secret`.
fn auth_regex() -> Regex {
    Regex::new(r#"^(?P<username>".*?"|\S+)(?:\s+(?P<password>.*))?$"#).expect("auth grammar")
}

fn split_credentials(re: &Regex, args: &str) -> Option<(String, String)> {
    let caps = re.captures(args.trim())?;
    let username = caps
        .name("username")
        .map(|m| m.as_str().trim_matches('"').to_string())?;
    let password = caps
        .name("password")
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Some((username, password))
}

pub(crate) async fn show_account_menu(core: &mut Core, conn_id: i64) -> Result<(), CoreError> {
    let account = match core.connections.get(conn_id).and_then(|c| c.account) {
        Some(account) => account,
        None => return Ok(()),
    };
    let record = match core.db.account_record(account).await? {
        Some(record) => record,
        None => return Ok(()),
    };

    let mut menu = String::new();
    menu.push_str("                 @RAccount Menu@n\n");
    menu.push_str("=============================================\n");
    menu.push_str(&format!("|@g{:<14}@n:  {:<27}|\n", "Username", record.username));
    if !record.email.is_empty() {
        menu.push_str(&format!("|@g{:<14}@n:  {:<27}|\n", "Email Address", record.email));
    }
    if record.admin_level > 0 {
        menu.push_str(&format!("|@g{:<14}@n:  {:<27}|\n", "Admin Level", record.admin_level));
    }
    menu.push_str("=============================================\n\n");

    let rows = core.db.characters_for_account(account).await?;
    let mut names = Vec::new();
    for row in rows {
        if let Some(ent) = core.world.occupant(row.character as u32) {
            names.push(crate::hooks::name(&core.world, ent));
        }
    }
    if !names.is_empty() {
        menu.push_str("[@y----@YAvailable Characters@y----@n]\n");
        for name in names {
            menu.push_str(&name);
            menu.push('\n');
        }
    }

    menu.push_str("\n[@y----@YCommands@y----@n]\n");
    menu.push_str("@Wcreate <character>@n - Create a new character.\n");
    menu.push_str("@Wplay <character>@n - Log in to a character.\n");
    menu.push_str("@Wdelete <character>@n - Delete a character.\n");
    menu.push_str("@Wpassword <old password>=<new password>@n - Change your password.\n");
    menu.push_str("@Wemail <email address>@n - Change your email address.\n");
    menu.push_str("@Wquit@n - Quit the game.\n");

    core.send_text_to_connection(conn_id, &menu);
    Ok(())
}

pub(crate) async fn login_to_account(
    core: &mut Core,
    conn_id: i64,
    account: i64,
) -> Result<(), CoreError> {
    core.db.touch_account_login(account).await?;
    let record = core.db.account_record(account).await?;
    if let Some(conn) = core.connections.get_mut(conn_id) {
        conn.account = Some(account);
        conn.admin_level = record.as_ref().map(|r| r.admin_level).unwrap_or(0);
    }
    let name = record.map(|r| r.username).unwrap_or_default();
    core.send_text_to_connection(conn_id, &format!("Welcome back, {}!\r\n", name));
    show_account_menu(core, conn_id).await
}

// ---------------------------------------------------------------------------

struct Connect {
    auth: Regex,
}

impl ConnectCommand for Connect {
    fn name(&self) -> &str {
        "connect"
    }

    fn aliases(&self) -> &[&str] {
        &["c", "co", "con", "cd", "ch"]
    }

    fn help(&self) -> &str {
        "Log in to an existing account: connect <username> <password>"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let (username, password) = match split_credentials(&self.auth, &input.args) {
                Some(parts) => parts,
                None => {
                    core.send_text_to_connection(
                        conn_id,
                        "syntax: connect <username> <password>, or connect \"<user name>\" <password>\r\n",
                    );
                    return Ok(());
                }
            };
            let credentials = core.db.account_credentials(&username).await?;
            let (account, hash) = match credentials {
                Some(found) => found,
                None => {
                    core.send_text_to_connection(conn_id, "No such account.\r\n");
                    return Ok(());
                }
            };
            if !(core.hooks.verify_password)(&hash, &password) {
                core.send_text_to_connection(conn_id, "Passwords do not match.\r\n");
                return Ok(());
            }
            login_to_account(core, conn_id, account).await
        })
    }
}

struct Create {
    auth: Regex,
}

impl ConnectCommand for Create {
    fn name(&self) -> &str {
        "create"
    }

    fn aliases(&self) -> &[&str] {
        &["cr", "register"]
    }

    fn help(&self) -> &str {
        "Create a new account: create <username> <password>"
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let (username, password) = match split_credentials(&self.auth, &input.args) {
                Some(parts) => parts,
                None => {
                    core.send_text_to_connection(
                        conn_id,
                        "syntax: create <username> <password>, or create \"<user name>\" <password>\r\n",
                    );
                    return Ok(());
                }
            };

            let host = core
                .connections
                .get(conn_id)
                .map(|c| c.capabilities.host_address.clone())
                .unwrap_or_default();
            if !core.account_creation_allowed(&host) {
                core.send_text_to_connection(
                    conn_id,
                    "You have created too many accounts recently. Please try again later.\r\n",
                );
                return Ok(());
            }

            let validators = core.username_validators.clone();
            crate::accounts::validate_username(&validators, &username, None)?;
            let hash = (core.hooks.hash_password)(&password)?;
            let account = core.db.create_account(&username, &hash).await?;
            core.note_account_created(&host);

            core.send_text_to_connection(
                conn_id,
                &format!("Account created successfully. Welcome, {}!\r\n", username),
            );
            core.send_text_to_connection(
                conn_id,
                "Please keep your password safe and secure. If you forget it, contact staff.\r\n",
            );
            login_to_account(core, conn_id, account).await
        })
    }
}

struct Look;

impl ConnectCommand for Look {
    fn name(&self) -> &str {
        "look"
    }

    fn aliases(&self) -> &[&str] {
        &["l"]
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            core.send_text_to_connection(conn_id, "Welcome to the game!\r\n");
            Ok(())
        })
    }
}

struct Help;

impl ConnectCommand for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn aliases(&self) -> &[&str] {
        &["h", "?"]
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let mut out = String::from("Available commands:\r\n");
            let mut entries: Vec<(String, String)> = core
                .commands
                .expanded_connect
                .values()
                .map(|cmd| (cmd.name().to_string(), cmd.help().to_string()))
                .collect();
            entries.sort();
            entries.dedup();
            for (name, help) in entries {
                if help.is_empty() {
                    out.push_str(&format!("  {}\r\n", name));
                } else {
                    out.push_str(&format!("  {:<10} {}\r\n", name, help));
                }
            }
            core.send_text_to_connection(conn_id, &out);
            Ok(())
        })
    }
}

struct Who;

impl ConnectCommand for Who {
    fn name(&self) -> &str {
        "who"
    }

    fn aliases(&self) -> &[&str] {
        &["w", "wh"]
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            let names: Vec<String> = core
                .sessions
                .values()
                .map(|session| crate::hooks::name(&core.world, session.character))
                .collect();
            let text = if names.is_empty() {
                "Nobody is playing right now.\r\n".to_string()
            } else {
                format!("Online: {}\r\n", names.join(", "))
            };
            core.send_text_to_connection(conn_id, &text);
            Ok(())
        })
    }
}

struct Quit;

impl ConnectCommand for Quit {
    fn name(&self) -> &str {
        "quit"
    }

    fn aliases(&self) -> &[&str] {
        &["q", "qq", "exit", "logout"]
    }

    fn execute<'a>(
        &'a self,
        core: &'a mut Core,
        conn_id: i64,
        _input: CommandInput,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            core.send_text_to_connection(conn_id, "Goodbye!\r\n");
            // the edge owns the socket; we just stop tracking the client
            core.connections.apply(
                crate::link::LinkEvent::ClientGone { id: conn_id },
                &core.world.logger.clone(),
            );
            Ok(())
        })
    }
}

pub fn register(tables: &mut CommandTables) -> Result<(), CoreError> {
    tables.register_connect(Arc::new(Connect { auth: auth_regex() }))?;
    tables.register_connect(Arc::new(Create { auth: auth_regex() }))?;
    tables.register_connect(Arc::new(Look))?;
    tables.register_connect(Arc::new(Help))?;
    tables.register_connect(Arc::new(Who))?;
    tables.register_connect(Arc::new(Quit))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_split_with_and_without_quotes() {
        let re = auth_regex();
        assert_eq!(
            split_credentials(&re, "alice secret"),
            Some(("alice".into(), "secret".into()))
        );
        assert_eq!(
            split_credentials(&re, "\"alice m\" s3cret words"),
            Some(("alice m".into(), "s3cret words".into()))
        );
        assert_eq!(
            split_credentials(&re, "alice"),
            Some(("alice".into(), "".into()))
        );
    }
}
