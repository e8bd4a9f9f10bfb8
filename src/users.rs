//! User directory: single-row management of `user_credentials` and the
//! plain credential check behind `/login`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::payload::{required_text, value_as_text};
use crate::store::{users as user_store, StoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// A `user_credentials` row. Passwords are stored and compared as given.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCredential {
    pub contact_number: String,
    pub name: String,
    pub address: String,
    pub password: String,
    pub role: Role,
    pub enable: bool,
}

/// What the API reveals about a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub contact_number: String,
    pub name: String,
    pub address: String,
    pub role: Role,
    pub enable: bool,
}

impl From<UserCredential> for UserProfile {
    fn from(user: UserCredential) -> Self {
        Self {
            contact_number: user.contact_number,
            name: user.name,
            address: user.address,
            role: user.role,
            enable: user.enable,
        }
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error(transparent)]
    UnknownRole(#[from] RoleParseError),
    #[error("user {0} already exists")]
    AlreadyExists(String),
    #[error("user {0} not found")]
    NotFound(String),
    #[error("invalid contact number or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    Disabled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUserRequest {
    #[serde(default, alias = "contactNumber")]
    pub contact_number: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub address: Option<Value>,
    #[serde(default)]
    pub password: Option<Value>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub enable: Option<bool>,
}

impl NewUserRequest {
    /// Role defaults to `user` and new accounts start enabled.
    pub fn into_credential(self) -> Result<UserCredential, UserError> {
        let mut missing = Vec::new();
        let contact_number =
            required_text(&mut missing, "contact_number", self.contact_number.as_ref());
        let name = required_text(&mut missing, "name", self.name.as_ref());
        let password = required_text(&mut missing, "password", self.password.as_ref());
        let (Some(contact_number), Some(name), Some(password)) = (contact_number, name, password)
        else {
            return Err(UserError::MissingFields(missing));
        };
        let role = match self.role.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Role::from_str(raw)?,
            _ => Role::User,
        };
        Ok(UserCredential {
            contact_number,
            name,
            address: value_as_text(self.address.as_ref()).unwrap_or_default(),
            password,
            role,
            enable: self.enable.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "contactNumber")]
    pub contact_number: Option<Value>,
    #[serde(default)]
    pub password: Option<Value>,
}

pub fn create_user(conn: &Connection, request: NewUserRequest) -> Result<UserProfile, UserError> {
    let user = request.into_credential()?;
    if !user_store::insert_user(conn, &user)? {
        return Err(UserError::AlreadyExists(user.contact_number));
    }
    info!(contact = %user.contact_number, role = %user.role, "user created");
    Ok(user.into())
}

pub fn list_users(conn: &Connection) -> Result<Vec<UserProfile>, UserError> {
    Ok(user_store::list_users(conn)?
        .into_iter()
        .map(UserProfile::from)
        .collect())
}

pub fn set_enabled(conn: &Connection, contact_number: &str, enable: bool) -> Result<(), UserError> {
    if !user_store::set_enabled(conn, contact_number, enable)? {
        return Err(UserError::NotFound(contact_number.to_string()));
    }
    info!(contact = %contact_number, enable, "user access changed");
    Ok(())
}

pub fn delete_user(conn: &Connection, contact_number: &str) -> Result<(), UserError> {
    if !user_store::delete_user(conn, contact_number)? {
        return Err(UserError::NotFound(contact_number.to_string()));
    }
    info!(contact = %contact_number, "user deleted");
    Ok(())
}

/// Compares the supplied credentials with the stored row.
///
/// The password is checked before the enable flag so a disabled account
/// is only reported to someone who knows its password.
pub fn authenticate(conn: &Connection, request: &LoginRequest) -> Result<UserProfile, UserError> {
    let contact_number = value_as_text(request.contact_number.as_ref());
    let password = value_as_text(request.password.as_ref());
    let (Some(contact_number), Some(password)) = (contact_number, password) else {
        return Err(UserError::InvalidCredentials);
    };
    let user = user_store::find_user(conn, &contact_number)?.ok_or(UserError::InvalidCredentials)?;
    if user.password != password {
        return Err(UserError::InvalidCredentials);
    }
    if !user.enable {
        return Err(UserError::Disabled);
    }
    Ok(user.into())
}
