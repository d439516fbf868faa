//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. IDs are opaque strings
//! because products are keyed by a slug of their SKU and orders by a prefixed
//! random token, both of which travel through URLs and JSON documents as-is.

use uuid::Uuid;

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use bubbling_bath_core::define_id;
/// define_id!(ReviewId);
/// define_id!(CouponId);
///
/// let review_id = ReviewId::new("rev_1");
/// let coupon_id = CouponId::new("rev_1");
///
/// // These are different types, so this won't compile:
/// // let _: ReviewId = coupon_id;
/// # let _ = (review_id, coupon_id);
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

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(ProductId);
define_id!(OrderId);

impl ProductId {
    /// Derive a stable slug ID from a SKU.
    ///
    /// Lowercases the SKU, replaces every run of non-alphanumeric characters
    /// with a single `-` and trims leading/trailing dashes. Returns `None` when
    /// nothing alphanumeric is left.
    #[must_use]
    pub fn from_sku(sku: &str) -> Option<Self> {
        let mut slug = String::with_capacity(sku.len());
        let mut pending_dash = false;

        for c in sku.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        (!slug.is_empty()).then_some(Self(slug))
    }

    /// Generate a random product ID for products created without a SKU.
    #[must_use]
    pub fn random() -> Self {
        Self(format!("prod_{}", Uuid::new_v4().simple()))
    }

    /// Use the SKU slug when one can be derived, otherwise a random ID.
    #[must_use]
    pub fn for_sku(sku: Option<&str>) -> Self {
        sku.and_then(Self::from_sku).unwrap_or_else(Self::random)
    }
}

impl OrderId {
    /// Generate a fresh order ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ord_{}", Uuid::new_v4().simple()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sku_slugifies() {
        assert_eq!(
            ProductId::from_sku("BB-Lavender Fizz 01"),
            Some(ProductId::new("bb-lavender-fizz-01"))
        );
        assert_eq!(
            ProductId::from_sku("  --Rose__Petal--  "),
            Some(ProductId::new("rose-petal"))
        );
    }

    #[test]
    fn test_from_sku_rejects_empty_slug() {
        assert_eq!(ProductId::from_sku(""), None);
        assert_eq!(ProductId::from_sku("---"), None);
    }

    #[test]
    fn test_for_sku_falls_back_to_random() {
        let id = ProductId::for_sku(None);
        assert!(id.as_str().starts_with("prod_"));

        let id = ProductId::for_sku(Some("%%%"));
        assert!(id.as_str().starts_with("prod_"));
    }

    #[test]
    fn test_order_ids_are_unique() {
        let a = OrderId::generate();
        let b = OrderId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("ord_"));
    }

    #[test]
    fn test_serde_transparent() {
        let id = OrderId::new("ord_123");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"ord_123\""));
    }
}
