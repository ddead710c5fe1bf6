//! Closed vocabularies.
//!
//! Every vocabulary is stored as snake_case text in PostgreSQL and serialized
//! with the same spelling, so the database, serde and `FromStr` all agree.

use thiserror::Error;

/// Returned when a stored or submitted value is not part of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {vocabulary}")]
pub struct UnknownTerm {
    pub vocabulary: &'static str,
    pub value: String,
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::vocabulary::UnknownTerm;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    _ => Err($crate::vocabulary::UnknownTerm {
                        vocabulary: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

vocabulary! {
    /// Kind of excavation context.
    ContextType {
        Fill => "fill",
        Layer => "layer",
        Structure => "structure",
        Cut => "cut",
        Deposit => "deposit",
        Burial => "burial",
    }
}

vocabulary! {
    /// Material collected as a sample.
    SampleType {
        Sediment => "sediment",
        Charcoal => "charcoal",
        Seeds => "seeds",
        Bone => "bone",
        Mortar => "mortar",
        Other => "other",
    }
}

vocabulary! {
    /// Anatomical side of a zoological find.
    BoneSide {
        Left => "left",
        Right => "right",
        Axial => "axial",
        Indeterminate => "indeterminate",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_vocabulary_text_roundtrip() {
        for ty in ContextType::ALL {
            assert_eq!(ContextType::from_str(ty.as_str()).unwrap(), *ty);
        }
    }

    #[test]
    fn test_unknown_term() {
        let err = SampleType::from_str("plankton").unwrap_err();
        assert_eq!(err.vocabulary, "SampleType");
        assert_eq!(err.to_string(), "'plankton' is not a valid SampleType");
    }

    #[test]
    fn test_serde_uses_stored_spelling() {
        let json = serde_json::to_string(&BoneSide::Indeterminate).unwrap();
        assert_eq!(json, "\"indeterminate\"");
    }
}
