//! Newtype IDs for type-safe entity references.
//!
//! The PetVerse API hands out opaque string identifiers (document IDs). Use
//! the `define_id!` macro to wrap them so product IDs cannot be passed where
//! a thread ID is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<String>`, `From<&str>` and `Display`
///
/// # Example
///
/// ```rust
/// # use petverse_core::define_id;
/// define_id!(ToyId);
/// define_id!(TreatId);
///
/// let toy = ToyId::new("65f0c2");
/// assert_eq!(toy.as_str(), "65f0c2");
///
/// // These are different types, so this won't compile:
/// // let _: TreatId = toy;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(ThreadId);
define_id!(AppointmentId);
define_id!(PaymentId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let id = ProductId::new("6650a1f3");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"6650a1f3\"");

        let back: ProductId = serde_json::from_str("\"6650a1f3\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_display_and_conversions() {
        let id = ThreadId::from("t-1");
        assert_eq!(id.to_string(), "t-1");
        assert_eq!(String::from(id), "t-1");
    }
}
