//! Strongly-typed string wrappers
//!
//! Distinct newtypes for the different string-ish concepts in the game so a
//! creature type can never be passed where a card name is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_newtype! {
    /// Card subtype (creature type, land type, etc.), e.g. "Elf" or "Island".
    Subtype
}

string_newtype! {
    /// Counter type placed on permanents, e.g. "+1/+1" or "loyalty".
    CounterType
}

string_newtype! {
    /// Card name. Catalog lookups key on this.
    CardName
}

string_newtype! {
    /// Player display name.
    PlayerName
}

impl CounterType {
    pub fn plus_one_plus_one() -> Self {
        CounterType("+1/+1".to_string())
    }

    pub fn minus_one_minus_one() -> Self {
        CounterType("-1/-1".to_string())
    }

    pub fn loyalty() -> Self {
        CounterType("loyalty".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newtype_round_trip() {
        let subtype = Subtype::new("Elf");
        assert_eq!(subtype.as_str(), "Elf");
        assert_eq!(subtype.to_string(), "Elf");

        let name: CardName = "Grizzly Bears".into();
        assert_eq!(name.as_str(), "Grizzly Bears");
    }

    #[test]
    fn test_counter_constructors() {
        assert_eq!(CounterType::plus_one_plus_one().as_str(), "+1/+1");
        assert_eq!(CounterType::loyalty().as_str(), "loyalty");
    }
}
