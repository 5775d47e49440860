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

use sha2::{Digest, Sha256};

/// Plain `SHA256(data)`, returned as a fixed-size array rather than a `Vec` so callers can compare
/// by value without an extra allocation.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hasher.finalize().into()
}

/// The on-wire "chirp hash" convention: `SHA256("chirp" || der[..der.len()-1])`.
///
/// The trailing byte of the DER-encoded SubjectPublicKeyInfo is excluded because the Chirp TLV on
/// the wire only ever carries the hash of the curve point without its final compression-form
/// byte; this function exists so the Bootstrap Key Store and the Chirp Resolver compute the exact
/// same value from the exact same rule instead of re-deriving it independently.
pub fn chirp_hash(spki_der: &[u8]) -> [u8; 32] {
  let mut hasher = Sha256::new();
  hasher.update(b"chirp");
  if !spki_der.is_empty() {
    hasher.update(&spki_der[..spki_der.len() - 1]);
  }
  hasher.finalize().into()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sha256_known_vector() {
    let digest = sha256(b"abc");
    assert_eq!(
      hex::encode(digest),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn chirp_hash_excludes_trailing_byte() {
    let der = [1u8, 2, 3, 4];
    let direct = sha256(b"chirp\x01\x02\x03");
    assert_eq!(chirp_hash(&der), direct);
  }

  #[test]
  fn chirp_hash_empty_input_does_not_panic() {
    let _ = chirp_hash(&[]);
  }
}
