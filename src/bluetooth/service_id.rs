//! Service identifiers and the per-device candidate list.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use {
    serde::{Deserialize, Serialize},
    uuid::{Error as UuidError, Uuid},
};

use crate::bluetooth::device::DeviceType;

/// Builds a well-known identifier from its 16-bit short form on the Bluetooth base UUID.
const fn base_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5F9B_34FB)
}

/// A 128-bit identifier of a communication profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    /// Advanced audio distribution.
    pub const AUDIO_ADVANCED: Self = Self(base_uuid(0x110D));
    /// Headset.
    pub const HEADSET: Self = Self(base_uuid(0x1108));
    /// Headset audio gateway.
    pub const HEADSET_GATEWAY: Self = Self(base_uuid(0x1112));
    /// Audio/video remote control.
    pub const REMOTE_CONTROL: Self = Self(base_uuid(0x110E));
    /// Serial port, the universal fallback.
    pub const SERIAL_PORT: Self = Self(base_uuid(0x1101));
    /// Object exchange (phones).
    pub const OBJECT_EXCHANGE: Self = Self(base_uuid(0x1105));
    /// Human interface device.
    pub const HUMAN_INTERFACE: Self = Self(base_uuid(0x1124));

    /// Wraps an arbitrary identifier, e.g. one advertised by a device.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Builds an identifier on the Bluetooth base UUID.
    #[must_use]
    pub const fn from_short(short: u16) -> Self {
        Self(base_uuid(short))
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for ServiceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ServiceId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Fixed candidates for a device type, in connection order.
#[must_use]
pub fn type_candidates(device_type: DeviceType) -> &'static [ServiceId] {
    use DeviceType::{
        Earbuds, Headphones, Headset, Keyboard, Mouse, Phone, Speakers, Tablet, Unknown, Watch,
    };

    match device_type {
        Headphones | Earbuds | Speakers => &[
            ServiceId::AUDIO_ADVANCED,
            ServiceId::HEADSET,
            ServiceId::HEADSET_GATEWAY,
            ServiceId::REMOTE_CONTROL,
        ],
        Headset => &[
            ServiceId::HEADSET,
            ServiceId::HEADSET_GATEWAY,
            ServiceId::AUDIO_ADVANCED,
        ],
        Phone | Tablet => &[ServiceId::OBJECT_EXCHANGE, ServiceId::SERIAL_PORT],
        Watch => &[ServiceId::SERIAL_PORT, ServiceId::HUMAN_INTERFACE],
        Keyboard | Mouse => &[ServiceId::HUMAN_INTERFACE, ServiceId::SERIAL_PORT],
        Unknown => &[
            ServiceId::SERIAL_PORT,
            ServiceId::AUDIO_ADVANCED,
            ServiceId::OBJECT_EXCHANGE,
        ],
    }
}

/// Ordered, de-duplicated candidate list for one connection attempt.
///
/// Advertised identifiers come first, then the type's fixed list, then the
/// serial port fallback if it is not already present. The first occurrence
/// of a duplicate wins.
#[must_use]
pub fn candidate_services(advertised: &[ServiceId], device_type: DeviceType) -> Vec<ServiceId> {
    let mut candidates: Vec<ServiceId> = Vec::with_capacity(advertised.len() + 5);

    for service in advertised
        .iter()
        .chain(type_candidates(device_type))
        .chain([ServiceId::SERIAL_PORT].iter())
    {
        if !candidates.contains(service) {
            candidates.push(*service);
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use crate::bluetooth::{
        device::DeviceType,
        service_id::{ServiceId, candidate_services, type_candidates},
    };

    const ALL_TYPES: [DeviceType; 10] = [
        DeviceType::Headphones,
        DeviceType::Earbuds,
        DeviceType::Speakers,
        DeviceType::Headset,
        DeviceType::Phone,
        DeviceType::Tablet,
        DeviceType::Watch,
        DeviceType::Keyboard,
        DeviceType::Mouse,
        DeviceType::Unknown,
    ];

    #[test]
    fn test_well_known_identifiers() {
        assert_eq!(
            ServiceId::SERIAL_PORT.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            ServiceId::AUDIO_ADVANCED.to_string(),
            "0000110d-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            "00001124-0000-1000-8000-00805F9B34FB"
                .parse::<ServiceId>()
                .unwrap(),
            ServiceId::HUMAN_INTERFACE
        );
        assert_eq!(ServiceId::from_short(0x1108), ServiceId::HEADSET);
    }

    #[test]
    fn test_headphones_candidates() {
        assert_eq!(
            candidate_services(&[], DeviceType::Headphones),
            vec![
                ServiceId::AUDIO_ADVANCED,
                ServiceId::HEADSET,
                ServiceId::HEADSET_GATEWAY,
                ServiceId::REMOTE_CONTROL,
                ServiceId::SERIAL_PORT,
            ]
        );
    }

    #[test]
    fn test_fallback_not_duplicated() {
        assert_eq!(
            candidate_services(&[], DeviceType::Phone),
            vec![ServiceId::OBJECT_EXCHANGE, ServiceId::SERIAL_PORT]
        );
        assert_eq!(
            candidate_services(&[], DeviceType::Unknown),
            vec![
                ServiceId::SERIAL_PORT,
                ServiceId::AUDIO_ADVANCED,
                ServiceId::OBJECT_EXCHANGE,
            ]
        );
    }

    #[test]
    fn test_advertised_first_and_deduplicated() {
        let custom = ServiceId::from_short(0x2000);
        let advertised = [custom, ServiceId::HEADSET, custom];

        assert_eq!(
            candidate_services(&advertised, DeviceType::Headset),
            vec![
                custom,
                ServiceId::HEADSET,
                ServiceId::HEADSET_GATEWAY,
                ServiceId::AUDIO_ADVANCED,
                ServiceId::SERIAL_PORT,
            ]
        );
    }

    #[test]
    fn test_candidate_properties_for_every_type() {
        let custom = ServiceId::from_short(0x3333);
        let advertised = [custom, ServiceId::SERIAL_PORT];

        for device_type in ALL_TYPES {
            let candidates = candidate_services(&advertised, device_type);

            assert_eq!(&candidates[..2], &advertised, "{device_type:?}");

            let fixed: Vec<_> = type_candidates(device_type)
                .iter()
                .filter(|service| !advertised.contains(*service))
                .copied()
                .collect();
            assert_eq!(&candidates[2..2 + fixed.len()], fixed.as_slice());

            let mut unique = candidates.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), candidates.len());
            assert!(candidates.contains(&ServiceId::SERIAL_PORT));
        }
    }

    #[test]
    fn test_fallback_appended_last_when_absent() {
        for device_type in ALL_TYPES {
            let candidates = candidate_services(&[], device_type);
            if !type_candidates(device_type).contains(&ServiceId::SERIAL_PORT) {
                assert_eq!(candidates.last(), Some(&ServiceId::SERIAL_PORT));
            }
            assert!(!candidates.is_empty());
        }
    }
}
