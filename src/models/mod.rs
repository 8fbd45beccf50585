use crate::entities::{collectibles, files, users};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Anonymous,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Anonymous => "anonymous",
        }
    }

    /// Parse the comma separated column value, skipping unknown names
    pub fn parse_list(raw: &str) -> Vec<Role> {
        let mut roles: Vec<Role> = Vec::new();
        for role in raw.split(',').filter_map(|r| r.trim().parse().ok()) {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        roles
    }

    pub fn join(roles: &[Role]) -> String {
        let mut seen: Vec<&str> = Vec::new();
        for role in roles {
            if !seen.contains(&role.as_str()) {
                seen.push(role.as_str());
            }
        }
        seen.join(",")
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "anonymous" => Ok(Role::Anonymous),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Identity attached to every request by the auth middleware.
/// Requests without a bearer token carry the anonymous identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: Option<String>,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            roles: vec![Role::Anonymous],
        }
    }

    pub fn from_model(user: &users::Model) -> Self {
        Self {
            id: Some(user.id.clone()),
            roles: Role::parse_list(&user.roles),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_user(&self) -> bool {
        self.has_role(Role::User)
    }

    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    /// True when the identity is exactly this user id
    pub fn is(&self, user_id: &str) -> bool {
        self.id.as_deref() == Some(user_id)
    }

    /// Owner or admin
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.is_admin() || self.is(owner_id)
    }

    /// Whether a record with this owner and visibility may be read
    pub fn can_view(&self, owner_id: &str, public: bool) -> bool {
        public || self.can_manage(owner_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PersonName {
    pub first: Option<String>,
    pub middle: Option<String>,
    pub last: Option<String>,
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: String,
    pub name: PersonName,
    pub alias: Option<String>,
    pub url: String,
    pub email: String,
    pub profile: Option<String>,
    pub image_id: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserDto {
    fn from(u: users::Model) -> Self {
        Self {
            roles: Role::parse_list(&u.roles),
            name: PersonName {
                first: u.name_first,
                middle: u.name_middle,
                last: u.name_last,
                suffix: u.name_suffix,
            },
            id: u.id,
            alias: u.alias,
            url: u.url,
            email: u.email,
            profile: u.profile,
            image_id: u.image_id,
            created_at: u.created_at,
        }
    }
}

/// Owner view embedded in collectible responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicUserDto {
    pub id: String,
    pub name: PersonName,
    pub alias: Option<String>,
    pub url: String,
    pub profile: Option<String>,
    pub image_id: Option<String>,
}

impl From<users::Model> for PublicUserDto {
    fn from(u: users::Model) -> Self {
        let full = UserDto::from(u);
        Self {
            id: full.id,
            name: full.name,
            alias: full.alias,
            url: full.url,
            profile: full.profile,
            image_id: full.image_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileDto {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub public: bool,
    pub url: String,
    pub path: String,
    pub full_url: String,
    pub thumbnail_url: String,
    pub content_type: String,
    pub size: i64,
    pub width: i32,
    pub height: i32,
    pub created_at: DateTime<Utc>,
}

impl From<files::Model> for FileDto {
    fn from(f: files::Model) -> Self {
        Self {
            id: f.id,
            user_id: f.user_id,
            name: f.name,
            public: f.public,
            url: f.url,
            path: f.path,
            full_url: f.full_url,
            thumbnail_url: f.thumbnail_url,
            content_type: f.content_type,
            size: f.size,
            width: f.width,
            height: f.height,
            created_at: f.created_at,
        }
    }
}

/// How long an item was held
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Acquired {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Meta {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectibleDto {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub file_ids: Vec<String>,
    pub files: Vec<FileDto>,
    pub url: String,
    pub public: bool,
    pub acquired: Acquired,
    pub meta: Meta,
    /// Owning user, absent when the account no longer exists
    pub user: Option<PublicUserDto>,
    /// Absolute display URL
    pub link: String,
}

impl CollectibleDto {
    /// Base record without related data; `load_all` fills the rest
    pub fn bare(c: collectibles::Model, link: String) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            name: c.name,
            description: c.description,
            file_ids: Vec::new(),
            files: Vec::new(),
            url: c.url,
            public: c.public,
            acquired: Acquired {
                from: c.acquired_from,
                to: c.acquired_to,
                description: c.acquired_description,
            },
            meta: Meta {
                created: c.created_at,
                updated: c.updated_at,
            },
            user: None,
            link,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// The number of records to skip
    pub offset: Option<u64>,
    /// The number of records to retrieve
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_list_round_trip() {
        let roles = Role::parse_list("admin, user,bogus,user");
        assert_eq!(roles, vec![Role::Admin, Role::User]);
        assert_eq!(Role::join(&roles), "admin,user");
        assert!(Role::parse_list("").is_empty());
    }

    #[test]
    fn test_anonymous_identity() {
        let anon = CurrentUser::anonymous();
        assert!(anon.is_anonymous());
        assert!(!anon.is_registered());
        assert!(!anon.is_user());
        assert!(anon.can_view("someone", true));
        assert!(!anon.can_view("someone", false));
    }

    #[test]
    fn test_ownership_predicates() {
        let owner = CurrentUser {
            id: Some("u1".to_string()),
            roles: vec![Role::User],
        };
        let admin = CurrentUser {
            id: Some("a1".to_string()),
            roles: vec![Role::Admin, Role::User],
        };
        assert!(owner.can_manage("u1"));
        assert!(!owner.can_manage("u2"));
        assert!(admin.can_manage("u2"));
        assert!(admin.can_view("u2", false));
    }
}
