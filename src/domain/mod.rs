//! Domain vocabulary shared by the storage, service and HTTP layers.
//!
//! Roles, content kinds and audit actions are closed enumerations so that a
//! misspelled tag is a compile error (or a parse error at the boundary)
//! instead of a silent typo in the audit trail.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a stored or submitted tag is not part of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {vocabulary} tag: {tag}")]
pub struct UnknownTag {
    pub vocabulary: &'static str,
    pub tag: String,
}

impl UnknownTag {
    fn new(vocabulary: &'static str, tag: &str) -> Self {
        Self {
            vocabulary,
            tag: tag.to_string(),
        }
    }
}

/// Administrative role carried by a user and copied into their session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    /// Roles allowed to create, update and delete published content.
    pub const CONTENT_EDITORS: &'static [Self] = &[Self::Admin, Self::Editor];

    /// Roles allowed to read the audit trail and operational metrics.
    pub const ADMINS: &'static [Self] = &[Self::Admin];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(UnknownTag::new("role", other)),
        }
    }
}

/// Kinds of published documents managed from the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Public announcement.
    Anunt,
    /// Local council decision.
    Decizie,
    /// Mayoral disposition.
    Dispozitie,
}

impl ContentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anunt => "anunt",
            Self::Decizie => "decizie",
            Self::Dispozitie => "dispozitie",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anunt" => Ok(Self::Anunt),
            "decizie" => Ok(Self::Decizie),
            "dispozitie" => Ok(Self::Dispozitie),
            other => Err(UnknownTag::new("content kind", other)),
        }
    }
}

/// Entity type recorded next to an audit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    Content(ContentKind),
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Content(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vocabulary of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    LoginSuccess,
    LoginFailed,
    LoginFailedUnknown,
    LoginBlockedInactive,
    LoginBlockedLockout,
    Logout,
    ChangePassword,
    Create(ContentKind),
    Update(ContentKind),
    Delete(ContentKind),
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        use ContentKind::{Anunt, Decizie, Dispozitie};

        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailed => "login_failed",
            Self::LoginFailedUnknown => "login_failed_unknown",
            Self::LoginBlockedInactive => "login_blocked_inactive",
            Self::LoginBlockedLockout => "login_blocked_lockout",
            Self::Logout => "logout",
            Self::ChangePassword => "change_password",
            Self::Create(Anunt) => "create_anunt",
            Self::Create(Decizie) => "create_decizie",
            Self::Create(Dispozitie) => "create_dispozitie",
            Self::Update(Anunt) => "update_anunt",
            Self::Update(Decizie) => "update_decizie",
            Self::Update(Dispozitie) => "update_dispozitie",
            Self::Delete(Anunt) => "delete_anunt",
            Self::Delete(Decizie) => "delete_decizie",
            Self::Delete(Dispozitie) => "delete_dispozitie",
        }
    }

    /// Tag prefix shared by every content creation action.
    pub const CREATE_PREFIX: &'static str = "create_";
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login_success" => return Ok(Self::LoginSuccess),
            "login_failed" => return Ok(Self::LoginFailed),
            "login_failed_unknown" => return Ok(Self::LoginFailedUnknown),
            "login_blocked_inactive" => return Ok(Self::LoginBlockedInactive),
            "login_blocked_lockout" => return Ok(Self::LoginBlockedLockout),
            "logout" => return Ok(Self::Logout),
            "change_password" => return Ok(Self::ChangePassword),
            _ => {}
        }

        let (verb, kind) = s
            .split_once('_')
            .ok_or_else(|| UnknownTag::new("audit action", s))?;
        let kind: ContentKind = kind
            .parse()
            .map_err(|_| UnknownTag::new("audit action", s))?;

        match verb {
            "create" => Ok(Self::Create(kind)),
            "update" => Ok(Self::Update(kind)),
            "delete" => Ok(Self::Delete(kind)),
            _ => Err(UnknownTag::new("audit action", s)),
        }
    }
}

impl Serialize for AuditAction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("viewer".parse::<Role>().unwrap(), Role::Viewer);
        assert!("Admin".parse::<Role>().is_err());
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_audit_action_tags() {
        assert_eq!(AuditAction::LoginFailed.as_str(), "login_failed");
        assert_eq!(
            AuditAction::Delete(ContentKind::Decizie).as_str(),
            "delete_decizie"
        );
        assert_eq!(
            "create_anunt".parse::<AuditAction>().unwrap(),
            AuditAction::Create(ContentKind::Anunt)
        );
        assert_eq!(
            "login_blocked_lockout".parse::<AuditAction>().unwrap(),
            AuditAction::LoginBlockedLockout
        );
    }

    #[test]
    fn test_audit_action_rejects_typos() {
        assert!("delete_decizia".parse::<AuditAction>().is_err());
        assert!("login_fail".parse::<AuditAction>().is_err());
        assert!("purge_anunt".parse::<AuditAction>().is_err());
        assert!("".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_create_actions_share_prefix() {
        for kind in [ContentKind::Anunt, ContentKind::Decizie, ContentKind::Dispozitie] {
            assert!(
                AuditAction::Create(kind)
                    .as_str()
                    .starts_with(AuditAction::CREATE_PREFIX)
            );
        }
    }

    #[test]
    fn test_audit_action_serde() {
        let json = serde_json::to_string(&AuditAction::ChangePassword).unwrap();
        assert_eq!(json, "\"change_password\"");
        let parsed: AuditAction = serde_json::from_str("\"update_dispozitie\"").unwrap();
        assert_eq!(parsed, AuditAction::Update(ContentKind::Dispozitie));
    }
}
