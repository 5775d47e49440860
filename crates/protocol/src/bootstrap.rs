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

//! The bootstrap file's text line format: `idx opclass channel macHex spkiB64\n`. Pure parsing
//! and formatting lives here; the Bootstrap Key Store (in `core`) owns the file handle, the
//! index allocation, and the hash scan.

use base::mac::MacAddr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct BootstrapLine {
  pub index: u32,
  pub opclass: u8,
  pub channel: u8,
  pub peer_mac: MacAddr,
  pub spki_b64: String,
}

#[derive(Debug, Error)]
pub enum BootstrapLineError {
  #[error("expected 5 space-separated fields, found {0}")]
  FieldCount(usize),
  #[error("invalid integer field: {0}")]
  Integer(#[from] std::num::ParseIntError),
  #[error("invalid MAC address field")]
  Mac,
}

impl BootstrapLine {
  pub fn parse(line: &str) -> Result<BootstrapLine, BootstrapLineError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() != 5 {
      return Err(BootstrapLineError::FieldCount(fields.len()));
    }
    let index: u32 = fields[0].parse()?;
    let opclass: u8 = fields[1].parse()?;
    let channel: u8 = fields[2].parse()?;
    let peer_mac = MacAddr::from_hex(fields[3]).ok_or(BootstrapLineError::Mac)?;
    Ok(BootstrapLine {
      index,
      opclass,
      channel,
      peer_mac,
      spki_b64: fields[4].to_string(),
    })
  }

  pub fn format(&self) -> String {
    format!(
      "{} {} {} {} {}\n",
      self.index,
      self.opclass,
      self.channel,
      self.peer_mac.to_hex(),
      self.spki_b64
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_format_and_parse() {
    let line = BootstrapLine {
      index: 3,
      opclass: 81,
      channel: 11,
      peer_mac: MacAddr([2, 0, 0, 0, 0, 1]),
      spki_b64: "Zm9v".to_string(),
    };
    let text = line.format();
    let parsed = BootstrapLine::parse(&text).unwrap();
    assert_eq!(parsed.index, 3);
    assert_eq!(parsed.opclass, 81);
    assert_eq!(parsed.channel, 11);
    assert_eq!(parsed.peer_mac, line.peer_mac);
    assert_eq!(parsed.spki_b64, "Zm9v");
  }

  #[test]
  fn rejects_wrong_field_count() {
    assert!(matches!(
      BootstrapLine::parse("1 2 3"),
      Err(BootstrapLineError::FieldCount(3))
    ));
  }

  #[test]
  fn rejects_bad_mac() {
    assert!(matches!(
      BootstrapLine::parse("1 81 11 zz Zm9v"),
      Err(BootstrapLineError::Mac)
    ));
  }
}
