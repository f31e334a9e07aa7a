//! Typed identifiers. Each wraps a v4 UUID and serializes as its plain string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// True for the all-zero id, which never identifies a stored entity.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// A submitted group of IP lookups.
    BatchId
);
define_id!(
    /// One IP within a batch.
    BatchItemId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_parse_back_from_display() {
        let a = BatchId::new();
        let b = BatchId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<BatchId>().unwrap(), a);
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!("not-a-uuid".parse::<BatchId>().is_err());
        assert!("".parse::<BatchItemId>().is_err());
    }

    #[test]
    fn nil_id_is_detected() {
        assert!(BatchId::from_uuid(Uuid::nil()).is_nil());
        assert!(!BatchItemId::new().is_nil());
    }

    #[test]
    fn ids_serialize_as_plain_uuid_strings() {
        let id = BatchId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id));
    }
}
