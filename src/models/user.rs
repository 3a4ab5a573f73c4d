//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use validator::Validate;

use super::fields::{self, pick_datetime, pick_id, pick_str, Object};

const ID_KEYS: &[&str] = &["id", "userId", "user_id", "_id"];
const FIRST_NAME_KEYS: &[&str] = &["firstName", "first_name", "firstname", "givenName"];
const LAST_NAME_KEYS: &[&str] = &["lastName", "last_name", "lastname", "surname", "familyName"];
const FULL_NAME_KEYS: &[&str] = &["fullName", "full_name", "name"];
const EMAIL_KEYS: &[&str] = &["email", "emailAddress", "userEmail", "mail"];
const ROLE_KEYS: &[&str] = &["role", "userRole", "accountType", "account_type"];
const ROLES_KEYS: &[&str] = &["roles", "authorities"];
const REGISTERED_KEYS: &[&str] = &[
    "registrationDate",
    "registeredAt",
    "createdAt",
    "created_at",
    "crea_date",
];
const PHONE_KEYS: &[&str] = &["phone", "phoneNumber", "phone_number"];

/// Envelopes the API wraps a single user in
pub(crate) const USER_ENVELOPES: &[&str] = &["data", "user", "profile"];

/// User role as understood by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Reader,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Reader => "reader",
            Role::Librarian => "librarian",
            Role::Admin => "admin",
        }
    }

    /// Librarians and admins may manage the catalog
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        match s.strip_prefix("role_").unwrap_or(&s) {
            "reader" | "user" | "member" => Role::Reader,
            "librarian" | "staff" => Role::Librarian,
            "admin" | "administrator" => Role::Admin,
            _ => Role::Guest,
        }
    }
}

/// Canonical user record held in the session and persisted storage
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct User {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub registered_at: Option<DateTime<Utc>>,
    pub phone: Option<String>,
    /// Server fields the client does not interpret
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl User {
    /// Normalize a user payload, bare or enveloped. Returns `None` for non-objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        fields::entity(value, USER_ENVELOPES).map(Self::from_object)
    }

    pub(crate) fn from_object(obj: &Object) -> Self {
        let mut first_name = pick_str(obj, FIRST_NAME_KEYS);
        let mut last_name = pick_str(obj, LAST_NAME_KEYS);

        if first_name.is_none() && last_name.is_none() {
            if let Some(full) = pick_str(obj, FULL_NAME_KEYS) {
                let mut parts = full.splitn(2, char::is_whitespace);
                first_name = parts.next().map(str::to_string);
                last_name = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            }
        }

        let role = pick_str(obj, ROLE_KEYS)
            .or_else(|| first_role(obj))
            .map(|r| Role::from(r.as_str()));

        let known = [
            ID_KEYS,
            FIRST_NAME_KEYS,
            LAST_NAME_KEYS,
            FULL_NAME_KEYS,
            EMAIL_KEYS,
            ROLE_KEYS,
            ROLES_KEYS,
            REGISTERED_KEYS,
            PHONE_KEYS,
        ];
        let extra = obj
            .iter()
            .filter(|(key, _)| !known.iter().any(|keys| keys.contains(&key.as_str())))
            .filter(|(key, _)| !key.to_lowercase().contains("password"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            id: pick_id(obj, ID_KEYS),
            first_name,
            last_name,
            email: pick_str(obj, EMAIL_KEYS).map(|e| e.to_lowercase()),
            role,
            registered_at: pick_datetime(obj, REGISTERED_KEYS),
            phone: pick_str(obj, PHONE_KEYS),
            extra,
        }
    }

    /// Minimal record known right after login, before the profile is fetched
    pub fn with_email(email: &str) -> Self {
        Self {
            email: Some(email.trim().to_lowercase()),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.email.clone().unwrap_or_default(),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.as_ref().map(Role::is_staff).unwrap_or(false)
    }

    /// Fill gaps in `self` with values from `other` (used when the server returns a partial record)
    pub fn merge_missing(mut self, other: &User) -> Self {
        self.id = self.id.or_else(|| other.id.clone());
        self.first_name = self.first_name.or_else(|| other.first_name.clone());
        self.last_name = self.last_name.or_else(|| other.last_name.clone());
        self.email = self.email.or_else(|| other.email.clone());
        self.role = self.role.or_else(|| other.role.clone());
        self.registered_at = self.registered_at.or(other.registered_at);
        self.phone = self.phone.or_else(|| other.phone.clone());
        self
    }
}

fn first_role(obj: &Object) -> Option<String> {
    ROLES_KEYS.iter().find_map(|key| match obj.get(*key)? {
        Value::Array(roles) => roles.iter().find_map(|role| match role {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => pick_str(o, &["authority", "name", "role"]),
            _ => None,
        }),
        _ => None,
    })
}

/// Registration form
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProfile {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl RegisterProfile {
    /// Trimmed names and phone, lowercased email. Validate the result, not the raw form.
    pub fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            password: self.password,
            phone: self.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        }
    }
}

/// Result of a successful registration: the address the verification code goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEmail {
    pub email: String,
}

/// Update own profile request
#[derive(Debug, Clone, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Current password (required to change password)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: Option<String>,
}

impl UpdateProfile {
    /// Trimmed text fields; a blank name stays present so validation rejects it
    pub fn normalized(self) -> Self {
        let trim = |v: Option<String>| v.map(|v| v.trim().to_string());
        Self {
            first_name: trim(self.first_name),
            last_name: trim(self.last_name),
            email: trim(self.email).map(|e| e.to_lowercase()),
            phone: trim(self.phone),
            current_password: self.current_password,
            new_password: self.new_password,
        }
    }

    /// Apply the non-secret fields locally, used when the server answers without a body
    pub fn apply_to(&self, user: &User) -> User {
        let mut updated = user.clone();
        if let Some(ref v) = self.first_name {
            updated.first_name = Some(v.clone());
        }
        if let Some(ref v) = self.last_name {
            updated.last_name = Some(v.clone());
        }
        if let Some(ref v) = self.email {
            updated.email = Some(v.trim().to_lowercase());
        }
        if let Some(ref v) = self.phone {
            updated.phone = Some(v.clone());
        }
        updated
    }
}
