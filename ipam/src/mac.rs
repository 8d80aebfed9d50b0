// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use std::fmt::Display;
use std::str::FromStr;

/// A MAC address: a transparent wrapper around `[u8; 6]`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

/// Errors which can occur while converting a string to a [`Mac`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MacFromStringError {
    /// Invalid string representation of mac address
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl FromStr for Mac {
    type Err = MacFromStringError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || MacFromStringError::Invalid(value.to_string());
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in value.split(':') {
            if count == octets.len() || part.len() != 2 {
                return Err(invalid());
            }
            octets[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            count += 1;
        }
        if count != octets.len() {
            return Err(invalid());
        }
        Ok(Mac(octets))
    }
}

impl TryFrom<&str> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Mac {
    /// Generate a random locally-administered unicast `Mac`.
    ///
    /// Used when a logical port of the expected name does not exist yet;
    /// re-runs must read the stored value back instead of calling this
    /// again so the port's MAC stays stable.
    #[must_use]
    pub fn random_unicast() -> Mac {
        use rand::Rng;
        let mut octets: [u8; 6] = rand::rng().random();
        // set locally-administered, clear multicast
        octets[0] = (octets[0] | 0x02) & 0xfe;
        Mac(octets)
    }

    /// Returns true iff the least significant bit of the first octet is zero.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }

    /// Returns true iff the locally-administered bit is set.
    #[must_use]
    pub fn is_local_admin(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let mac: Mac = "0a:58:fe:00:12:af".parse().unwrap();
        assert_eq!(mac.to_string(), "0a:58:fe:00:12:af");
        assert_eq!(mac, Mac([0x0a, 0x58, 0xfe, 0x00, 0x12, 0xaf]));
    }

    #[test]
    fn parse_accepts_upper_case() {
        let mac: Mac = "0A:58:FE:00:12:AF".parse().unwrap();
        assert_eq!(mac.to_string(), "0a:58:fe:00:12:af");
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        for bad in ["", "0a:58:fe:00:12", "0a:58:fe:00:12:af:01", "0a:58:fe:00:12:zz", "0a58fe0012af"] {
            assert!(bad.parse::<Mac>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn random_macs_are_local_unicast() {
        for _ in 0..64 {
            let mac = Mac::random_unicast();
            assert!(mac.is_unicast());
            assert!(mac.is_local_admin());
        }
    }
}
