//! Closed literal sets used by the patient profile.
//!
//! Every enumerated field of a patient record accepts exactly one of a fixed
//! set of spellings. Each set becomes a plain Rust enum that knows its own
//! spelling, so validation, serialization and the generated JSON schema all
//! read from the same table.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A closed set of string literals.
pub trait Literal: Sized + Copy + 'static {
    /// Name of the set, used in error messages and the JSON schema.
    const NAME: &'static str;

    /// All accepted spellings, in declaration order.
    fn literals() -> &'static [&'static str];

    /// Parse an exact spelling.
    fn parse(value: &str) -> Option<Self>;

    /// The spelling of this value.
    fn as_str(&self) -> &'static str;
}

macro_rules! literal_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $literal:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every value of the set, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl Literal for $name {
            const NAME: &'static str = stringify!($name);

            fn literals() -> &'static [&'static str] {
                &[$($literal),+]
            }

            fn parse(value: &str) -> Option<Self> {
                match value {
                    $( $literal => Some($name::$variant), )+
                    _ => None,
                }
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $literal ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(Literal::as_str(self))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(Literal::as_str(self))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                <$name as Literal>::parse(&raw)
                    .ok_or_else(|| D::Error::unknown_variant(&raw, &[$($literal),+]))
            }
        }
    };
}

literal_enum! {
    /// Gender category.
    GenderCategory {
        Male => "Male",
        Female => "Female",
        Other => "Other",
    }
}

literal_enum! {
    /// Recorded intersex condition.
    IntersexCondition {
        Klinefelter => "Klinefelter",
        Turner => "Turner",
        Other => "Other",
        AndrogenInsensitivitySyndrome => "Androgen Insensitivity Syndrome",
        KlinefelterSyndrome => "Klinefelter Syndrome",
    }
}

literal_enum! {
    /// BMI band as recorded by the clinician.
    BmiCategory {
        Underweight => "Underweight",
        Healthy => "Healthy",
        Normal => "Normal",
        Overweight => "Overweight",
        Obese => "Obese",
    }
}

literal_enum! {
    Ethnicity {
        SouthAsian => "South Asian",
        EastAsian => "East Asian",
        Black => "Black",
        White => "White",
        Hispanic => "Hispanic",
        IndigenousAustralian => "Indigenous Australian",
        MiddleEastern => "Middle Eastern",
        Mixed => "Mixed",
        Indigenous => "Indigenous",
        Other => "Other",
        WhiteEuropean => "White European",
        African => "African",
        HispanicLatino => "Hispanic/Latino",
    }
}

literal_enum! {
    /// Course of a disease or comorbidity.
    Prognosis {
        Stable => "Stable",
        Improving => "Improving",
        Worsening => "Worsening",
        Terminal => "Terminal",
        Unknown => "Unknown",
    }
}

literal_enum! {
    /// What a treatment is given for.
    Indication {
        Primary => "Primary",
        Comorbidity => "Comorbidity",
        Other => "Other",
        Secondary => "Secondary",
    }
}
