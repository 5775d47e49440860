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

//! Base64 codec for the one place the daemon needs it: the bootstrap file's `spkiB64` field
//! (§3, §4.2). Standard alphabet, accepting both padded and unpadded input since entries may have
//! been written by either this implementation or the original C daemon.

use base64::{engine::general_purpose::STANDARD, engine::general_purpose::STANDARD_NO_PAD, Engine};

/// Encode `der` as padded standard-alphabet base64, the form `save_bootstrap_key` writes.
pub fn encode(der: &[u8]) -> String {
  STANDARD.encode(der)
}

/// Decode a `spkiB64` field, accepting padded or unpadded input.
pub fn decode(spki_b64: &str) -> Result<Vec<u8>, base64::DecodeError> {
  if spki_b64.contains('=') {
    STANDARD.decode(spki_b64)
  } else {
    STANDARD_NO_PAD.decode(spki_b64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encode_decode_round_trip() {
    let der = [0x30, 0x59, 0x01, 0x02, 0x03];
    let encoded = encode(&der);
    assert_eq!(decode(&encoded).unwrap(), der);
  }

  #[test]
  fn decode_accepts_unpadded_input() {
    let der = b"hello world";
    let padded = STANDARD.encode(der);
    let unpadded = padded.trim_end_matches('=');
    assert_eq!(decode(unpadded).unwrap(), der);
  }

  #[test]
  fn decode_rejects_invalid_base64() {
    assert!(decode("not base64!!").is_err());
  }
}
