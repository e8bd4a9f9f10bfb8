use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::store::StoreError;
use crate::users::{Role, UserCredential};

/// Inserts `user`, returning `false` when the contact number is taken.
pub fn insert_user(conn: &Connection, user: &UserCredential) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        r#"
INSERT INTO user_credentials(contact_number, name, address, password, role, enable)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(contact_number) DO NOTHING
"#,
        params![
            user.contact_number,
            user.name,
            user.address,
            user.password,
            user.role.as_str(),
            user.enable,
        ],
    )?;
    Ok(inserted == 1)
}

pub fn find_user(conn: &Connection, contact_number: &str) -> Result<Option<UserCredential>, StoreError> {
    let user = conn
        .query_row(
            r#"
SELECT contact_number, name, address, password, role, enable
FROM user_credentials
WHERE contact_number = ?1
"#,
            params![contact_number],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn list_users(conn: &Connection) -> Result<Vec<UserCredential>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
SELECT contact_number, name, address, password, role, enable
FROM user_credentials
ORDER BY name, contact_number
"#,
    )?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Returns `false` when no such user exists.
pub fn set_enabled(conn: &Connection, contact_number: &str, enable: bool) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE user_credentials SET enable = ?2 WHERE contact_number = ?1",
        params![contact_number, enable],
    )?;
    Ok(updated == 1)
}

/// Returns `false` when no such user exists.
pub fn delete_user(conn: &Connection, contact_number: &str) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM user_credentials WHERE contact_number = ?1",
        params![contact_number],
    )?;
    Ok(deleted == 1)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserCredential> {
    let role_raw: String = row.get(4)?;
    let role = Role::from_str(&role_raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(UserCredential {
        contact_number: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        password: row.get(3)?,
        role,
        enable: row.get(5)?,
    })
}
