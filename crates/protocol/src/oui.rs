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

/// The Wi-Fi Alliance DPP OUI, as carried in the vendor-specific public action frame body.
pub const DPP_OUI: [u8; 3] = [0x50, 0x6f, 0x9a];

/// The WFA vendor-specific subtype that identifies a DPP (as opposed to some other WFA-OUI)
/// action frame.
pub const DPP_WFA_SUBTYPE: u8 = 0x1a;

/// The 802.11 public action category.
pub const ACTION_CATEGORY_PUBLIC: u8 = 4;

/// The `field` byte of a public action frame: either the WFA-vendor-specific subtype (under which
/// DPP's own `FrameType` further discriminates) or one of the four 802.11u GAS subtypes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ActionField {
  Vendor,
  GasInitialRequest,
  GasInitialResponse,
  GasComebackRequest,
  GasComebackResponse,
  /// Any public-action field value this daemon does not recognize; carried so the Demultiplexer
  /// can log-and-drop instead of refusing to parse.
  Other(u8),
}

impl ActionField {
  pub const VENDOR: u8 = 0x09;
  pub const GAS_INITIAL_REQUEST: u8 = 0x0a;
  pub const GAS_INITIAL_RESPONSE: u8 = 0x0b;
  pub const GAS_COMEBACK_REQUEST: u8 = 0x0c;
  pub const GAS_COMEBACK_RESPONSE: u8 = 0x0d;

  pub fn is_gas(&self) -> bool {
    matches!(
      self,
      ActionField::GasInitialRequest
        | ActionField::GasInitialResponse
        | ActionField::GasComebackRequest
        | ActionField::GasComebackResponse
    )
  }
}

impl From<u8> for ActionField {
  fn from(value: u8) -> Self {
    match value {
      Self::VENDOR => ActionField::Vendor,
      Self::GAS_INITIAL_REQUEST => ActionField::GasInitialRequest,
      Self::GAS_INITIAL_RESPONSE => ActionField::GasInitialResponse,
      Self::GAS_COMEBACK_REQUEST => ActionField::GasComebackRequest,
      Self::GAS_COMEBACK_RESPONSE => ActionField::GasComebackResponse,
      other => ActionField::Other(other),
    }
  }
}

impl From<ActionField> for u8 {
  fn from(value: ActionField) -> Self {
    match value {
      ActionField::Vendor => ActionField::VENDOR,
      ActionField::GasInitialRequest => ActionField::GAS_INITIAL_REQUEST,
      ActionField::GasInitialResponse => ActionField::GAS_INITIAL_RESPONSE,
      ActionField::GasComebackRequest => ActionField::GAS_COMEBACK_REQUEST,
      ActionField::GasComebackResponse => ActionField::GAS_COMEBACK_RESPONSE,
      ActionField::Other(b) => b,
    }
  }
}

/// The one-byte `frame_type` that follows the DPP OUI and WFA subtype in a vendor action frame
/// body. Discriminants are bit-exact with the wire format: `AuthRequest = 0`, `Chirp = 13`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum FrameType {
  AuthRequest = 0,
  AuthResponse = 1,
  AuthConfirm = 2,
  PeerDiscoveryRequest = 3,
  PeerDiscoveryResponse = 4,
  ConfigurationResult = 5,
  PkexExchV1Request = 6,
  PkexExchRequest = 7,
  PkexExchResponse = 8,
  PkexCommitRevealRequest = 9,
  PkexCommitRevealResponse = 10,
  Chirp = 13,
}

impl FrameType {
  pub fn from_byte(b: u8) -> Option<FrameType> {
    Some(match b {
      0 => FrameType::AuthRequest,
      1 => FrameType::AuthResponse,
      2 => FrameType::AuthConfirm,
      3 => FrameType::PeerDiscoveryRequest,
      4 => FrameType::PeerDiscoveryResponse,
      5 => FrameType::ConfigurationResult,
      6 => FrameType::PkexExchV1Request,
      7 => FrameType::PkexExchRequest,
      8 => FrameType::PkexExchResponse,
      9 => FrameType::PkexCommitRevealRequest,
      10 => FrameType::PkexCommitRevealResponse,
      13 => FrameType::Chirp,
      _ => return None,
    })
  }

  pub fn is_pkex(&self) -> bool {
    matches!(
      self,
      FrameType::PkexExchV1Request
        | FrameType::PkexExchRequest
        | FrameType::PkexExchResponse
        | FrameType::PkexCommitRevealRequest
        | FrameType::PkexCommitRevealResponse
    )
  }

  pub fn is_auth(&self) -> bool {
    matches!(
      self,
      FrameType::AuthRequest | FrameType::AuthResponse | FrameType::AuthConfirm
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_type_anchors_are_bit_exact() {
    assert_eq!(FrameType::AuthRequest as u8, 0);
    assert_eq!(FrameType::Chirp as u8, 13);
  }

  #[test]
  fn from_byte_rejects_reserved_gap() {
    assert!(FrameType::from_byte(11).is_none());
    assert!(FrameType::from_byte(12).is_none());
  }

  #[test]
  fn action_field_round_trips() {
    for field in [
      ActionField::Vendor,
      ActionField::GasInitialRequest,
      ActionField::GasInitialResponse,
      ActionField::GasComebackRequest,
      ActionField::GasComebackResponse,
    ] {
      let byte: u8 = field.into();
      assert_eq!(ActionField::from(byte), field);
    }
  }

  #[test]
  fn unknown_field_is_other() {
    assert_eq!(ActionField::from(0x42), ActionField::Other(0x42));
  }
}
