//! Account storage and the login bookkeeping around it.
//!
//! Accounts are rows, not entities: they exist before any character does and
//! survive character deletion. Characters link back to their account through
//! the `playerCharacters` join table and the `Player` component.

use crate::error::CoreError;
use crate::persist::Db;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub admin_level: i64,
}

#[derive(Debug, Clone)]
pub struct CharacterRow {
    pub character: i64,
    pub last_login: i64,
    pub last_logout: i64,
    pub total_play_time: f64,
}

impl Db {
    /// Insert a new account with an already-hashed password. A username
    /// collision comes back as an auth failure, not a database error.
    pub async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<i64, CoreError> {
        let result = sqlx::query("INSERT INTO accounts (username, password) VALUES (?, ?)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await;
        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(err)) if err.message().contains("UNIQUE") => Err(
                CoreError::auth("That account name is already in use."),
            ),
            Err(err) => Err(CoreError::Persistence(err)),
        }
    }

    /// `(id, password hash)` for a username, if any.
    pub async fn account_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(i64, String)>, CoreError> {
        let row = sqlx::query("SELECT id, password FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| (row.get(0), row.get(1))))
    }

    pub async fn account_record(&self, id: i64) -> Result<Option<AccountRecord>, CoreError> {
        let row = sqlx::query("SELECT id, username, email, adminLevel FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| AccountRecord {
            id: row.get(0),
            username: row.get(1),
            email: row.get(2),
            admin_level: row.get(3),
        }))
    }

    pub async fn touch_account_login(&self, id: i64) -> Result<(), CoreError> {
        sqlx::query("UPDATE accounts SET lastLogin = strftime('%s','now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_account_password(&self, id: i64, hash: &str) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE accounts SET password = ?, lastPasswordChanged = strftime('%s','now')
             WHERE id = ?",
        )
        .bind(hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_account_email(&self, id: i64, email: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE accounts SET email = ? WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Register a character entity as playable by an account.
    pub async fn link_character(&self, character: i64, account: i64) -> Result<(), CoreError> {
        sqlx::query("INSERT OR REPLACE INTO playerCharacters (character, account) VALUES (?, ?)")
            .bind(character)
            .bind(account)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop a character's playable link, for character deletion. The object
    /// row itself dies through the dirty set.
    pub async fn unlink_character(&self, character: i64) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM playerCharacters WHERE character = ?")
            .bind(character)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn characters_for_account(
        &self,
        account: i64,
    ) -> Result<Vec<CharacterRow>, CoreError> {
        let rows = sqlx::query(
            "SELECT character, lastLogin, lastLogout, totalPlayTime
             FROM playerCharacters WHERE account = ?",
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| CharacterRow {
                character: row.get(0),
                last_login: row.get(1),
                last_logout: row.get(2),
                total_play_time: row.get(3),
            })
            .collect())
    }

    pub async fn touch_character_login(&self, character: i64) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE playerCharacters SET lastLogin = strftime('%s','now') WHERE character = ?",
        )
        .bind(character)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn touch_character_logout(&self, character: i64) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE playerCharacters SET lastLogout = strftime('%s','now') WHERE character = ?",
        )
        .bind(character)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Composable checks applied before creating or renaming.
pub type UsernameValidator = fn(&str, Option<i64>) -> Result<(), CoreError>;
pub type CharacterNameValidator = fn(&str, Option<crate::objects::ObjectId>) -> Result<(), CoreError>;

pub fn validate_username(
    validators: &[UsernameValidator],
    username: &str,
    existing: Option<i64>,
) -> Result<(), CoreError> {
    if username.trim().is_empty() {
        return Err(CoreError::auth("Account names cannot be empty."));
    }
    for validator in validators {
        validator(username, existing)?;
    }
    Ok(())
}

pub fn validate_character_name(
    validators: &[CharacterNameValidator],
    name: &str,
    existing: Option<crate::objects::ObjectId>,
) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::auth("Character names cannot be empty."));
    }
    for validator in validators {
        validator(name, existing)?;
    }
    Ok(())
}

/// Case-insensitive match helper for names: an exact match wins outright,
/// otherwise a unique-enough prefix does.
pub fn partial_match<'a, T>(
    needle: &str,
    candidates: impl IntoIterator<Item = (&'a str, T)> + Clone,
) -> Option<T> {
    for (key, value) in candidates.clone() {
        if key.eq_ignore_ascii_case(needle) {
            return Some(value);
        }
    }
    let needle = needle.to_lowercase();
    candidates
        .into_iter()
        .find(|(key, _)| key.to_lowercase().starts_with(&needle))
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn account_creation_and_lookup() {
        let db = Db::in_memory().await.unwrap();
        db.ready().await.unwrap();

        let id = db.create_account("Alice", "hash-a").await.unwrap();
        let creds = db.account_credentials("alice").await.unwrap();
        // usernames collate case-insensitively
        assert_eq!(creds, Some((id, "hash-a".to_string())));

        let err = db.create_account("ALICE", "hash-b").await.unwrap_err();
        assert!(matches!(err, CoreError::AuthFailure(_)));

        let record = db.account_record(id).await.unwrap().unwrap();
        assert_eq!(record.username, "Alice");
        assert_eq!(record.admin_level, 0);
    }

    #[async_std::test]
    async fn character_links_round_trip() {
        let db = Db::in_memory().await.unwrap();
        db.ready().await.unwrap();
        let account = db.create_account("bob", "x").await.unwrap();
        db.link_character(3, account).await.unwrap();
        db.link_character(9, account).await.unwrap();

        let rows = db.characters_for_account(account).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.character).collect();
        assert_eq!(ids, vec![3, 9]);
        assert!(db.characters_for_account(999).await.unwrap().is_empty());

        db.unlink_character(3).await.unwrap();
        let rows = db.characters_for_account(account).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.character).collect();
        assert_eq!(ids, vec![9]);
    }

    #[async_std::test]
    async fn email_updates_show_in_the_record() {
        let db = Db::in_memory().await.unwrap();
        db.ready().await.unwrap();
        let account = db.create_account("carol", "x").await.unwrap();
        assert_eq!(db.account_record(account).await.unwrap().unwrap().email, "");

        db.update_account_email(account, "carol@example.com")
            .await
            .unwrap();
        assert_eq!(
            db.account_record(account).await.unwrap().unwrap().email,
            "carol@example.com"
        );
    }

    #[test]
    fn exact_name_matches_beat_prefixes() {
        let names = vec![("Alice", 1), ("Alicent", 2), ("Bob", 3)];
        assert_eq!(partial_match("alice", names.clone()), Some(1));
        assert_eq!(partial_match("ali", vec![("Alicent", 2), ("Bob", 3)]), Some(2));
        assert_eq!(partial_match("bo", names.clone()), Some(3));
        assert_eq!(partial_match("carol", names), None);
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(validate_username(&[], "  ", None).is_err());
        assert!(validate_username(&[], "alice", None).is_ok());
        assert!(validate_character_name(&[], "", None).is_err());
    }
}
