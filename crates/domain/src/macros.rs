//! Macro for implementing Display and FromStr for wire-level enums
//!
//! Descriptors are declared in configuration files and on the command line,
//! so every enum that names an HTTP concept needs the same pair of
//! conversions. Parsing is case-insensitive; display uses the canonical
//! spelling given in the mapping.
//!
//! # Example
//!
//! ```rust
//! use tokenrelay_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Verb {
//!     Fetch,
//!     Store,
//! }
//!
//! impl_domain_enum_conversions!(Verb {
//!     Fetch => "FETCH",
//!     Store => "STORE",
//! });
//!
//! assert_eq!(Verb::Fetch.to_string(), "FETCH");
//! assert_eq!("store".parse::<Verb>().unwrap(), Verb::Store);
//! ```

/// Implements Display and FromStr traits for enums with a fixed spelling
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their canonical string
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
