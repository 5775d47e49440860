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

//! The minimal slice of the IEEE 802.11 MAC header this daemon needs to construct and parse:
//! management-frame `frame_control`, the three address fields, and the public-action body that
//! follows it. This is not a general 802.11 frame parser; it only covers ACTION and BEACON
//! management frames, the two subtypes the Frame I/O Adapter and Demultiplexer care about.

use crate::oui::{ActionField, ACTION_CATEGORY_PUBLIC, DPP_OUI, DPP_WFA_SUBTYPE};
use base::mac::MacAddr;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

pub const FRAME_TYPE_MGMT: u16 = 0;
pub const SUBTYPE_BEACON: u16 = 8;
pub const SUBTYPE_AUTH: u16 = 11;
pub const SUBTYPE_ACTION: u16 = 13;

const MGMT_HEADER_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum FrameError {
  #[error("frame shorter than the 24-byte management header")]
  Truncated,
  #[error("not a management frame (type={0})")]
  NotManagement(u16),
  #[error("action frame body too short to carry category + OUI")]
  ShortActionBody,
  #[error("action category {0} is not PUBLIC")]
  NotPublicAction,
  #[error("OUI {0:02x?} is not the DPP OUI")]
  NotDppOui([u8; 3]),
}

/// A parsed 802.11 management frame: header addresses plus the body that follows the header.
#[derive(Debug, Clone)]
pub struct MgmtFrame<'a> {
  pub subtype: u16,
  pub dst: MacAddr,
  pub src: MacAddr,
  pub bssid: MacAddr,
  pub body: &'a [u8],
}

fn frame_control(subtype: u16) -> u16 {
  // type=MGMT(0) at bits 2-3, subtype at bits 4-7, protocol version 0.
  (subtype << 4) | (FRAME_TYPE_MGMT << 2)
}

/// Build a bare management-frame header (no body) with `bssid` set to broadcast, matching the
/// loopback adapter's synthesized header.
pub fn build_header(subtype: u16, src: MacAddr, dst: MacAddr, bssid: MacAddr) -> Vec<u8> {
  let mut out = vec![0u8; MGMT_HEADER_LEN];
  LittleEndian::write_u16(&mut out[0..2], frame_control(subtype));
  LittleEndian::write_u16(&mut out[2..4], 0); // duration
  out[4..10].copy_from_slice(dst.as_bytes());
  out[10..16].copy_from_slice(src.as_bytes());
  out[16..22].copy_from_slice(bssid.as_bytes());
  LittleEndian::write_u16(&mut out[22..24], 0); // seq-ctl
  out
}

/// Parse a raw management frame, splitting the fixed header from the body.
pub fn parse_mgmt_frame(raw: &[u8]) -> Result<MgmtFrame<'_>, FrameError> {
  if raw.len() < MGMT_HEADER_LEN {
    return Err(FrameError::Truncated);
  }
  let fc = LittleEndian::read_u16(&raw[0..2]);
  let ftype = (fc >> 2) & 0x3;
  if ftype != FRAME_TYPE_MGMT {
    return Err(FrameError::NotManagement(ftype));
  }
  let subtype = (fc >> 4) & 0xf;
  let dst = MacAddr::try_from(&raw[4..10]).map_err(|_| FrameError::Truncated)?;
  let src = MacAddr::try_from(&raw[10..16]).map_err(|_| FrameError::Truncated)?;
  let bssid = MacAddr::try_from(&raw[16..22]).map_err(|_| FrameError::Truncated)?;
  Ok(MgmtFrame {
    subtype,
    dst,
    src,
    bssid,
    body: &raw[MGMT_HEADER_LEN..],
  })
}

/// A parsed public action frame body: `category || field || (OUI-tagged DPP payload | GAS body)`.
#[derive(Debug, Clone)]
pub struct PublicActionBody<'a> {
  pub field: ActionField,
  /// For `ActionField::Vendor`, the bytes after the WFA subtype (i.e. `frame_type || TLVs`).
  /// For GAS fields, the raw GAS body.
  pub payload: &'a [u8],
}

/// Parse the body of a public-action management frame (the bytes after the 802.11 header).
pub fn parse_public_action(body: &[u8]) -> Result<PublicActionBody<'_>, FrameError> {
  if body.len() < 2 {
    return Err(FrameError::ShortActionBody);
  }
  if body[0] != ACTION_CATEGORY_PUBLIC {
    return Err(FrameError::NotPublicAction);
  }
  let field = ActionField::from(body[1]);
  let rest = &body[2..];
  if matches!(field, ActionField::Vendor) {
    if rest.len() < 4 {
      return Err(FrameError::ShortActionBody);
    }
    let oui: [u8; 3] = rest[0..3].try_into().expect("slice of len 3");
    if oui != DPP_OUI {
      return Err(FrameError::NotDppOui(oui));
    }
    if rest[3] != DPP_WFA_SUBTYPE {
      return Err(FrameError::NotDppOui(oui));
    }
    Ok(PublicActionBody {
      field,
      payload: &rest[4..],
    })
  } else {
    Ok(PublicActionBody {
      field,
      payload: rest,
    })
  }
}

/// Build the body of a public-action vendor (DPP) frame: `category || VENDOR || OUI || subtype ||
/// frame_type || payload`.
pub fn build_vendor_action_body(frame_type: u8, payload: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(2 + 4 + 1 + payload.len());
  out.push(ACTION_CATEGORY_PUBLIC);
  out.push(ActionField::VENDOR);
  out.extend_from_slice(&DPP_OUI);
  out.push(DPP_WFA_SUBTYPE);
  out.push(frame_type);
  out.extend_from_slice(payload);
  out
}

/// Build the body of a public-action GAS frame: `category || gas-field || gas_body`.
pub fn build_gas_action_body(field: ActionField, gas_body: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(2 + gas_body.len());
  out.push(ACTION_CATEGORY_PUBLIC);
  out.push(field.into());
  out.extend_from_slice(gas_body);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_round_trip() {
    let src = MacAddr([1, 2, 3, 4, 5, 6]);
    let dst = MacAddr::BROADCAST;
    let header = build_header(SUBTYPE_ACTION, src, dst, MacAddr::BROADCAST);
    let mut raw = header.clone();
    raw.extend_from_slice(&[0xaa, 0xbb]);
    let parsed = parse_mgmt_frame(&raw).unwrap();
    assert_eq!(parsed.subtype, SUBTYPE_ACTION);
    assert_eq!(parsed.src, src);
    assert_eq!(parsed.dst, dst);
    assert_eq!(parsed.body, &[0xaa, 0xbb]);
  }

  #[test]
  fn truncated_frame_is_rejected() {
    assert!(matches!(
      parse_mgmt_frame(&[0u8; 10]),
      Err(FrameError::Truncated)
    ));
  }

  #[test]
  fn vendor_action_round_trip() {
    let auth_req = crate::oui::FrameType::AuthRequest as u8;
    let body = build_vendor_action_body(auth_req, &[1, 2, 3]);
    let parsed = parse_public_action(&body).unwrap();
    assert!(matches!(parsed.field, ActionField::Vendor));
    assert_eq!(parsed.payload, &[auth_req, 1, 2, 3]);
  }

  #[test]
  fn rejects_non_dpp_oui() {
    let mut body = vec![ACTION_CATEGORY_PUBLIC, ActionField::VENDOR];
    body.extend_from_slice(&[0x00, 0x00, 0x00, DPP_WFA_SUBTYPE]);
    assert!(matches!(
      parse_public_action(&body),
      Err(FrameError::NotDppOui(_))
    ));
  }

  #[test]
  fn gas_body_round_trip() {
    let body = build_gas_action_body(ActionField::GasComebackResponse, &[9, 9]);
    let parsed = parse_public_action(&body).unwrap();
    assert!(matches!(parsed.field, ActionField::GasComebackResponse));
    assert_eq!(parsed.payload, &[9, 9]);
  }
}
