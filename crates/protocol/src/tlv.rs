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

//! DPP attribute TLVs: `u16le type || u16le length || value`, repeated to fill an action-frame
//! payload. Core and the daemon binaries only need to read the two TLVs that disambiguate a
//! session (the bootstrap-key hash and, incidentally, a handful of others passed through
//! opaquely to the external DPP engine) — this module does not attempt to model every DPP
//! attribute, only the generic envelope plus the one attribute type this repository's own logic
//! inspects.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// The DPP attribute carrying a peer or responder bootstrapping-key hash (`Br`/`Bi`), the TLV this
/// daemon's own routing logic (not the external DPP engine) needs to read.
pub const ATTR_BOOTSTRAPPING_KEY_HASH: u16 = 0x0203;

#[derive(Debug, Error)]
pub enum TlvError {
  #[error("TLV header truncated")]
  ShortHeader,
  #[error("TLV value truncated: declared {declared}, available {available}")]
  ShortValue { declared: usize, available: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
  pub kind: u16,
  pub value: &'a [u8],
}

/// Iterate the TLVs of a DPP attribute blob, stopping at the first malformed TLV.
pub struct TlvIter<'a> {
  rest: &'a [u8],
}

impl<'a> TlvIter<'a> {
  pub fn new(buf: &'a [u8]) -> Self {
    TlvIter { rest: buf }
  }
}

impl<'a> Iterator for TlvIter<'a> {
  type Item = Result<Tlv<'a>, TlvError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.rest.is_empty() {
      return None;
    }
    if self.rest.len() < 4 {
      self.rest = &[];
      return Some(Err(TlvError::ShortHeader));
    }
    let kind = LittleEndian::read_u16(&self.rest[0..2]);
    let len = LittleEndian::read_u16(&self.rest[2..4]) as usize;
    if self.rest.len() - 4 < len {
      let available = self.rest.len() - 4;
      self.rest = &[];
      return Some(Err(TlvError::ShortValue {
        declared: len,
        available,
      }));
    }
    let value = &self.rest[4..4 + len];
    self.rest = &self.rest[4 + len..];
    Some(Ok(Tlv { kind, value }))
  }
}

/// Find the first TLV of the given `kind`, ignoring any parse error in a later TLV.
pub fn find(buf: &[u8], kind: u16) -> Option<&[u8]> {
  TlvIter::new(buf).find_map(|t| match t {
    Ok(tlv) if tlv.kind == kind => Some(tlv.value),
    _ => None,
  })
}

/// Append one TLV to `out`.
pub fn encode(out: &mut Vec<u8>, kind: u16, value: &[u8]) {
  let mut header = [0u8; 4];
  LittleEndian::write_u16(&mut header[0..2], kind);
  LittleEndian::write_u16(&mut header[2..4], value.len() as u16);
  out.extend_from_slice(&header);
  out.extend_from_slice(value);
}

/// Read the `Br`/`Bi` bootstrapping-key-hash TLV (32 bytes, a SHA-256 digest) out of a DPP
/// attribute blob, per §3 ("the first TLV following the Status field").
pub fn bootstrap_key_hash(attrs: &[u8]) -> Option<[u8; 32]> {
  let value = find(attrs, ATTR_BOOTSTRAPPING_KEY_HASH)?;
  if value.len() != 32 {
    return None;
  }
  let mut out = [0u8; 32];
  out.copy_from_slice(value);
  Some(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encode_then_iter_one_tlv() {
    let mut buf = Vec::new();
    encode(&mut buf, 0x1234, &[1, 2, 3]);
    let mut it = TlvIter::new(&buf);
    let tlv = it.next().unwrap().unwrap();
    assert_eq!(tlv.kind, 0x1234);
    assert_eq!(tlv.value, &[1, 2, 3]);
    assert!(it.next().is_none());
  }

  #[test]
  fn iter_multiple_tlvs_in_order() {
    let mut buf = Vec::new();
    encode(&mut buf, 1, &[0xaa]);
    encode(&mut buf, 2, &[0xbb, 0xcc]);
    let kinds: Vec<u16> = TlvIter::new(&buf).map(|r| r.unwrap().kind).collect();
    assert_eq!(kinds, vec![1, 2]);
  }

  #[test]
  fn short_value_is_an_error_and_terminates_iteration() {
    let mut buf = Vec::new();
    LittleEndian::write_u16(&mut [0u8; 2], 0); // no-op, just exercising byteorder import
    buf.extend_from_slice(&[0x01, 0x00, 0x05, 0x00]); // declares 5 bytes, supplies 0
    let mut it = TlvIter::new(&buf);
    assert!(matches!(it.next(), Some(Err(TlvError::ShortValue { .. }))));
    assert!(it.next().is_none());
  }

  #[test]
  fn bootstrap_key_hash_extracts_32_byte_digest() {
    let digest = [7u8; 32];
    let mut buf = Vec::new();
    encode(&mut buf, ATTR_BOOTSTRAPPING_KEY_HASH, &digest);
    assert_eq!(bootstrap_key_hash(&buf), Some(digest));
  }

  #[test]
  fn bootstrap_key_hash_rejects_wrong_length() {
    let mut buf = Vec::new();
    encode(&mut buf, ATTR_BOOTSTRAPPING_KEY_HASH, &[1, 2, 3]);
    assert_eq!(bootstrap_key_hash(&buf), None);
  }
}
