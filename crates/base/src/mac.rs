/*
 * Copyright (c) 2024 Elide Technologies, Inc.
 *
 * Licensed under the MIT license (the "License"); you may not use this file except in compliance
 * with the License. You may obtain a copy of the License at
 *
 *   https://opensource.org/license/mit/
 *
 * Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on
 * an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
 * License for the specific language governing permissions and limitations under the License.
 */

#![forbid(unsafe_op_in_unsafe_fn, unused_unsafe)]

use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// An IEEE 802 link-layer address.
///
/// Used throughout the daemon as the identity of an interface or a peer; `MacAddr` is `Copy` so
/// sessions and routing tables can hold it by value rather than borrowing an `Interface`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
  pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
  pub const ZERO: MacAddr = MacAddr([0; 6]);

  #[inline]
  pub fn is_broadcast(&self) -> bool {
    *self == Self::BROADCAST
  }

  #[inline]
  pub fn is_multicast(&self) -> bool {
    self.0[0] & 0x01 != 0
  }

  /// Generate a locally-administered, unicast random MAC, for loopback-simulated interfaces that
  /// have no real NIC to borrow an address from.
  pub fn random_local() -> MacAddr {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[0] = (bytes[0] & !0x01) | 0x02;
    MacAddr(bytes)
  }

  pub fn as_bytes(&self) -> &[u8; 6] {
    &self.0
  }

  pub fn to_hex(&self) -> String {
    hex::encode(self.0)
  }

  pub fn from_hex(s: &str) -> Option<MacAddr> {
    let cleaned: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
    if cleaned.len() != 12 {
      return None;
    }
    let bytes = hex::decode(&cleaned).ok()?;
    let mut out = [0u8; 6];
    out.copy_from_slice(&bytes);
    Some(MacAddr(out))
  }
}

impl From<[u8; 6]> for MacAddr {
  fn from(value: [u8; 6]) -> Self {
    MacAddr(value)
  }
}

impl AsRef<[u8]> for MacAddr {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

impl TryFrom<&[u8]> for MacAddr {
  type Error = MacAddrParseError;

  fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
    if value.len() != 6 {
      return Err(MacAddrParseError);
    }
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(value);
    Ok(MacAddr(bytes))
  }
}

impl FromStr for MacAddr {
  type Err = MacAddrParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    MacAddr::from_hex(s).ok_or(MacAddrParseError)
  }
}

impl fmt::Display for MacAddr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
      self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
    )
  }
}

impl fmt::Debug for MacAddr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("invalid MAC address")]
pub struct MacAddrParseError;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn broadcast_is_all_ff() {
    assert!(MacAddr::BROADCAST.is_broadcast());
    assert_eq!(MacAddr::BROADCAST.to_hex(), "ffffffffffff");
  }

  #[test]
  fn parses_colon_and_hyphen_forms() {
    let expect = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    assert_eq!("02:00:00:00:00:01".parse::<MacAddr>().unwrap(), expect);
    assert_eq!("02-00-00-00-00-01".parse::<MacAddr>().unwrap(), expect);
    assert_eq!("020000000001".parse::<MacAddr>().unwrap(), expect);
  }

  #[test]
  fn rejects_wrong_length() {
    assert!("02:00:00".parse::<MacAddr>().is_err());
  }

  #[test]
  fn random_local_is_unicast_and_locally_administered() {
    let mac = MacAddr::random_local();
    assert_eq!(mac.0[0] & 0x01, 0);
    assert_eq!(mac.0[0] & 0x02, 0x02);
  }

  #[test]
  fn display_round_trips_through_from_str() {
    let mac = MacAddr([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
    let text = mac.to_string();
    assert_eq!(text.parse::<MacAddr>().unwrap(), mac);
  }
}
