//! Private channel names and who may subscribe to them.
//!
//! - `private-user.{id}`: events addressed to one account (status updates)
//! - `private-sector.{id}`: events addressed to a sector account (new issues)

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::features::auth::model::{AuthenticatedUser, UserRole};

const USER_PREFIX: &str = "private-user.";
const SECTOR_PREFIX: &str = "private-sector.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    User(Uuid),
    Sector(Uuid),
}

impl Channel {
    /// The channel a client with this identity subscribes to
    pub fn for_identity(id: Uuid, role: UserRole) -> Self {
        match role {
            UserRole::Sector => Channel::Sector(id),
            UserRole::Citizen | UserRole::Admin => Channel::User(id),
        }
    }

    /// Whether `user` may subscribe to this channel
    pub fn authorizes(&self, user: &AuthenticatedUser) -> bool {
        if user.is_admin() {
            return true;
        }
        match self {
            Channel::User(id) => *id == user.id,
            Channel::Sector(id) => *id == user.id && user.is_sector(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::User(id) => write!(f, "{}{}", USER_PREFIX, id),
            Channel::Sector(id) => write!(f, "{}{}", SECTOR_PREFIX, id),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let parse_id = |raw: &str| {
            Uuid::parse_str(raw).map_err(|_| format!("Malformed channel '{}'", name))
        };

        if let Some(rest) = name.strip_prefix(USER_PREFIX) {
            parse_id(rest).map(Channel::User)
        } else if let Some(rest) = name.strip_prefix(SECTOR_PREFIX) {
            parse_id(rest).map(Channel::Sector)
        } else {
            Err(format!("Unknown channel '{}'", name))
        }
    }
}

/// Authorization predicate for a raw channel name; unparseable names are denied
pub fn can_access(user: &AuthenticatedUser, channel_name: &str) -> bool {
    channel_name
        .parse::<Channel>()
        .map(|channel| channel.authorizes(user))
        .unwrap_or(false)
}
