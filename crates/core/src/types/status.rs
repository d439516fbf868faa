//! Status enums for orders, payments and the product catalog.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not one of the known values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct StatusParseError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `Display` and case-insensitive `FromStr` for a
/// closed enum from a list of `Variant => "wire"` pairs.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire name of the variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = StatusParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| StatusParseError {
                        kind: $kind,
                        value: trimmed.to_owned(),
                    })
            }
        }
    };
}

/// Order status.
///
/// `Pending` is entered at checkout and leaves through exactly one of
/// `Approved` or `Denied`. After approval the fulfilment statuses may be set
/// in any order; `Refunded` undoes an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Approved,
    Denied,
    Processing,
    Ready,
    Shipped,
    Completed,
    Refunded,
}

wire_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Approved => "approved",
    Denied => "denied",
    Processing => "processing",
    Ready => "ready",
    Shipped => "shipped",
    Completed => "completed",
    Refunded => "refunded",
});

impl OrderStatus {
    /// Fulfilment sub-statuses that staff may set freely.
    #[must_use]
    pub const fn is_fulfilment(self) -> bool {
        matches!(
            self,
            Self::Processing | Self::Ready | Self::Shipped | Self::Completed
        )
    }

    /// Whether an order in this status has already passed the approval gate,
    /// which means stock for it has already been taken.
    #[must_use]
    pub const fn is_past_approval(self) -> bool {
        matches!(self, Self::Approved) || self.is_fulfilment()
    }
}

/// Payment status as reported by the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Authorized,
    Captured,
    Refunded,
    Failed,
}

wire_enum!(PaymentStatus, "payment status", {
    Authorized => "authorized",
    Captured => "captured",
    Refunded => "refunded",
    Failed => "failed",
});

/// Season a product is merchandised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
    Holiday,
}

wire_enum!(Season, "season", {
    Spring => "spring",
    Summer => "summer",
    Fall => "fall",
    Winter => "winter",
    Holiday => "holiday",
});

/// How an order leaves the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    #[default]
    Standard,
    Express,
    Pickup,
}

wire_enum!(DeliveryMethod, "delivery method", {
    Standard => "standard",
    Express => "express",
    Pickup => "pickup",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_parse() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        let err = "lost".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.kind, "order status");
        assert_eq!(err.value, "lost");
    }

    #[test]
    fn test_fulfilment_statuses() {
        let fulfilment: Vec<_> = OrderStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.is_fulfilment())
            .collect();
        assert_eq!(
            fulfilment,
            vec![
                OrderStatus::Processing,
                OrderStatus::Ready,
                OrderStatus::Shipped,
                OrderStatus::Completed,
            ]
        );
    }

    #[test]
    fn test_past_approval() {
        assert!(OrderStatus::Approved.is_past_approval());
        assert!(OrderStatus::Shipped.is_past_approval());
        assert!(!OrderStatus::Pending.is_past_approval());
        assert!(!OrderStatus::Denied.is_past_approval());
        assert!(!OrderStatus::Refunded.is_past_approval());
    }

    #[test]
    fn test_serde_wire_names_match_display() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        for season in Season::ALL {
            let json = serde_json::to_string(season).unwrap();
            assert_eq!(json, format!("\"{season}\""));
        }
    }
}
