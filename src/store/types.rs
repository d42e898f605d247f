//! Shared records, identifiers, and helpers for the store subsystem.
//!
//! Everything in this module is backend-agnostic and shared by the
//! in-memory and SQLite backends.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Account (household member) identifier.
    AccountId
);
string_id!(
    /// Group (household) identifier.
    GroupId
);
string_id!(
    /// Task identifier.
    TaskId
);

/// External chat identity (Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// Recurrence granularity of a task.
///
/// Unrecognised unit strings are kept verbatim in [`IntervalUnit::Other`]
/// rather than rejected; they behave as "due now".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    OneTime,
    Day,
    Week,
    Month,
    Other(String),
}

impl IntervalUnit {
    /// Parse a stored or user-supplied unit string. Matching is exact;
    /// plurals and other spellings land in [`IntervalUnit::Other`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "onetime" => Self::OneTime,
            "day" => Self::Day,
            "week" => Self::Week,
            "month" => Self::Month,
            _ => Self::Other(raw.to_owned()),
        }
    }

    /// Canonical storage form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::OneTime => "onetime",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IntervalUnit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IntervalUnit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A household member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    /// Group the account belongs to; an account is in at most one group.
    ///
    /// Read back from the membership record. Stores ignore this field on
    /// insert; use [`AccountStore::add_group_member`](super::AccountStore::add_group_member).
    pub group_id: Option<GroupId>,
    pub created_at: DateTime<Utc>,
}

/// A household sharing a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub owner_id: AccountId,
    pub created_at: DateTime<Utc>,
}

/// A recurring (or one-time) task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub group_id: GroupId,
    pub title: String,
    pub description: String,
    pub assignee: Option<AccountId>,
    pub rotating_assignee: bool,
    pub interval_unit: IntervalUnit,
    pub interval_size: u32,
    /// Always derived from the interval; never set directly by callers.
    pub next_due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Group-level webhook endpoint (one per group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWebhook {
    pub group_id: GroupId,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Single-use token pairing a chat identity to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectCode {
    pub code: String,
    pub chat_id: ChatId,
    pub issued_at: DateTime<Utc>,
    /// `None` until redeemed; set exactly once.
    pub account_id: Option<AccountId>,
}

/// How long an issued connect code stays redeemable.
pub const CONNECT_CODE_TTL_HOURS: i64 = 24;

impl ConnectCode {
    /// A code exactly [`CONNECT_CODE_TTL_HOURS`] old is still valid.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at > Duration::hours(CONNECT_CODE_TTL_HOURS)
    }
}

// ---------------------------------------------------------------------------
// Time helpers
// ---------------------------------------------------------------------------

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}
