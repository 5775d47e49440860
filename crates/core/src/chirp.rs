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

//! The Chirp Resolver (§4.6): on inbound Chirp, scan the Bootstrap Store recomputing the chirp
//! hash per entry, and return the first match so the caller (the Demultiplexer) can create an
//! initiator DPP session against the chirping peer. Pure lookup logic; the Demultiplexer owns
//! session creation so the engine-handle allocation failure path stays in one place (§4.3).

use crate::bootstrap_store::{self, BootstrapEntry, BootstrapStoreError};
use std::path::Path;

/// Find the bootstrap entry whose SPKI's chirp hash equals `target`. No match returns `Ok(None)`;
/// the caller logs that case (§4.6: "No match results in a log line").
pub fn resolve(path: &Path, target: &[u8; 32]) -> Result<Option<BootstrapEntry>, BootstrapStoreError> {
  bootstrap_store::lookup_by_chirp_hash(path, target)
}

#[cfg(test)]
mod tests {
  use super::*;
  use base::mac::MacAddr;
  use base::sha::chirp_hash;

  #[test]
  fn idempotent_resolve_finds_same_entry_twice() {
    let path = std::env::temp_dir().join(format!("dpp-chirp-test-{}.txt", std::process::id()));
    let der = vec![9u8, 8, 7, 6, 5];
    let b64 = base::b64::encode(&der);
    bootstrap_store::append(&path, 81, 6, MacAddr([2, 0, 0, 0, 0, 9]), &b64).unwrap();
    let target = chirp_hash(&der);

    let first = resolve(&path, &target).unwrap().unwrap();
    let second = resolve(&path, &target).unwrap().unwrap();
    assert_eq!(first.index, second.index);

    let _ = std::fs::remove_file(&path);
  }
}
