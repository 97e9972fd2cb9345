//! Typed identifier newtypes backed by non-zero 64-bit integers.
//!
//! Random identifiers draw their entropy from a v4 UUID folded down to 64
//! bits. Zero is never produced; uniqueness within a namespace is enforced by
//! the allocator that owns the namespace (re-rolling on collision).

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Draw a random non-zero 64-bit value.
#[must_use]
pub fn random_nonzero() -> u64 {
    loop {
        let (hi, lo) = uuid::Uuid::new_v4().as_u64_pair();
        let value = hi ^ lo;
        if value != 0 {
            return value;
        }
    }
}

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw value. Zero is representable but never valid.
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Draw a random non-zero identifier. Collision checks are the
            /// caller's responsibility.
            #[must_use]
            pub fn random() -> Self {
                Self(random_nonzero())
            }

            /// Access the raw value.
            #[must_use]
            pub const fn as_raw(self) -> u64 {
                self.0
            }

            /// Whether this identifier is the reserved zero value.
            #[must_use]
            pub const fn is_zero(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:016x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                u64::from_str_radix(s, 16).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`Action`](crate::action::Action).
    ActionId
);

define_id!(
    /// Unique identifier for a [`Parameter`](crate::parameter::Parameter).
    ParamId
);

define_id!(
    /// Unique identifier for a [`Trigger`](crate::trigger::Trigger).
    TriggerId
);

define_id!(
    /// Unique identifier for an [`Event`](crate::event::Event).
    EventId
);

define_id!(
    /// Identifier of a physical device, assigned by the device catalog.
    DeviceId
);

define_id!(
    /// Identifier of a function exposed by a device, assigned by the device catalog.
    FunctionId
);

impl ActionId {
    /// Well-known identifier of the built-in anonymous Delay Action type.
    ///
    /// Never returned by an allocator.
    pub const DELAY_TYPE: Self = Self(0x0000_0000_0000_0de1);

    /// Whether this identifier may be handed out by an allocator.
    #[must_use]
    pub const fn is_allocatable(self) -> bool {
        self.0 != 0 && self.0 != Self::DELAY_TYPE.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn should_never_draw_zero() {
        for _ in 0..1_000 {
            assert_ne!(random_nonzero(), 0);
        }
    }

    #[test]
    fn should_generate_distinct_ids_when_called_repeatedly() {
        let ids: HashSet<_> = (0..1_000).map(|_| ParamId::random()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn should_display_as_sixteen_hex_digits() {
        let id = ActionId::from_raw(0xab);
        assert_eq!(id.to_string(), "00000000000000ab");
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = EventId::random();
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_as_plain_integer() {
        let id = TriggerId::from_raw(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn should_return_error_when_parsing_invalid_hex() {
        assert!(DeviceId::from_str("not-hex").is_err());
    }

    #[test]
    fn should_not_allocate_reserved_delay_type() {
        assert!(!ActionId::DELAY_TYPE.is_allocatable());
        assert!(!ActionId::from_raw(0).is_allocatable());
        assert!(ActionId::from_raw(7).is_allocatable());
    }
}
