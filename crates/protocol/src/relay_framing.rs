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

//! The Relay↔Controller TCP message framing (§4.7): `u32 big-endian length || length bytes`,
//! where the first byte of the payload is either an action-frame `field` or the `0xFF` sentinel
//! that introduces an out-of-band `wired_control` preamble.

use base::mac::MacAddr;
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Sentinel first byte marking a `wired_control` preamble rather than an action-frame body.
pub const WIRED_CONTROL_SENTINEL: u8 = 0xff;

const LEN_PREFIX: usize = 4;
const WIRED_CONTROL_BODY_LEN: usize = 8; // mac[6] + opclass + channel

#[derive(Debug, Error)]
pub enum RelayFramingError {
  #[error("message body empty")]
  Empty,
  #[error("wired_control preamble truncated: need {WIRED_CONTROL_BODY_LEN} bytes, got {0}")]
  ShortWiredControl(usize),
  #[error("declared length {declared} exceeds configured maximum {max}")]
  TooLarge { declared: u32, max: u32 },
}

/// One message on the Relay↔Controller wire: either a tunnelled action-frame body (tagged by its
/// public-action `field` byte) or a `wired_control` preamble.
#[derive(Debug, Clone)]
pub enum RelayMessage {
  /// `field` is the raw public-action field byte (`PUB_ACTION_VENDOR` or one of the four GAS
  /// codes); `body` is the action-frame body exactly as it would appear over the air.
  ActionFrame { field: u8, body: Vec<u8> },
  WiredControl(WiredControl),
}

/// The controller-originated preamble that pins a peer MAC and channel for subsequent frames
/// tunnelled over this TCP connection (§4.7).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WiredControl {
  pub peer_mac: MacAddr,
  pub opclass: u8,
  pub channel: u8,
}

/// Prepend the `u32` big-endian length prefix to `payload` (the sentinel/field byte plus body).
pub fn frame(payload: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(LEN_PREFIX + payload.len());
  let mut len_bytes = [0u8; LEN_PREFIX];
  BigEndian::write_u32(&mut len_bytes, payload.len() as u32);
  out.extend_from_slice(&len_bytes);
  out.extend_from_slice(payload);
  out
}

/// Encode an action-frame tunnel message, ready for `frame()`.
pub fn encode_action_frame(field: u8, body: &[u8]) -> Vec<u8> {
  let mut payload = Vec::with_capacity(1 + body.len());
  payload.push(field);
  payload.extend_from_slice(body);
  frame(&payload)
}

/// Encode a `wired_control` preamble, ready for `frame()`.
pub fn encode_wired_control(control: &WiredControl) -> Vec<u8> {
  let mut payload = Vec::with_capacity(1 + WIRED_CONTROL_BODY_LEN);
  payload.push(WIRED_CONTROL_SENTINEL);
  payload.extend_from_slice(control.peer_mac.as_bytes());
  payload.push(control.opclass);
  payload.push(control.channel);
  frame(&payload)
}

/// Read the `u32` big-endian length prefix. Returns `None` if fewer than 4 bytes are available.
pub fn read_length_prefix(buf: &[u8]) -> Option<u32> {
  if buf.len() < LEN_PREFIX {
    return None;
  }
  Some(BigEndian::read_u32(&buf[..LEN_PREFIX]))
}

pub const LENGTH_PREFIX_BYTES: usize = LEN_PREFIX;

/// Decode one message payload (the bytes after the length prefix has already been stripped and
/// read in full by the caller's framed reader).
pub fn decode_message(payload: &[u8]) -> Result<RelayMessage, RelayFramingError> {
  if payload.is_empty() {
    return Err(RelayFramingError::Empty);
  }
  let tag = payload[0];
  let rest = &payload[1..];
  if tag == WIRED_CONTROL_SENTINEL {
    if rest.len() < WIRED_CONTROL_BODY_LEN {
      return Err(RelayFramingError::ShortWiredControl(rest.len()));
    }
    let peer_mac = MacAddr::try_from(&rest[0..6]).expect("checked length");
    Ok(RelayMessage::WiredControl(WiredControl {
      peer_mac,
      opclass: rest[6],
      channel: rest[7],
    }))
  } else {
    Ok(RelayMessage::ActionFrame {
      field: tag,
      body: rest.to_vec(),
    })
  }
}

/// Validate a just-read length prefix against a configured ceiling before allocating a read
/// buffer for it, so a corrupt or hostile peer can't force an unbounded allocation.
pub fn check_length(declared: u32, max: u32) -> Result<(), RelayFramingError> {
  if declared > max {
    return Err(RelayFramingError::TooLarge { declared, max });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn action_frame_round_trips() {
    let framed = encode_action_frame(0x09, &[1, 2, 3]);
    let declared = read_length_prefix(&framed).unwrap();
    let payload = &framed[LENGTH_PREFIX_BYTES..];
    assert_eq!(declared as usize, payload.len());
    match decode_message(payload).unwrap() {
      RelayMessage::ActionFrame { field, body } => {
        assert_eq!(field, 0x09);
        assert_eq!(body, vec![1, 2, 3]);
      }
      _ => panic!("expected ActionFrame"),
    }
  }

  #[test]
  fn wired_control_round_trips() {
    let control = WiredControl {
      peer_mac: MacAddr([2, 0, 0, 0, 0, 1]),
      opclass: 81,
      channel: 11,
    };
    let framed = encode_wired_control(&control);
    let payload = &framed[LENGTH_PREFIX_BYTES..];
    match decode_message(payload).unwrap() {
      RelayMessage::WiredControl(parsed) => assert_eq!(parsed, control),
      _ => panic!("expected WiredControl"),
    }
  }

  #[test]
  fn empty_payload_is_an_error() {
    assert!(matches!(decode_message(&[]), Err(RelayFramingError::Empty)));
  }

  #[test]
  fn oversized_length_is_rejected_before_allocation() {
    assert!(check_length(10_000_000, 65536).is_err());
    assert!(check_length(100, 65536).is_ok());
  }
}
