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

//! The Bootstrap Key Store (§4.2): an append-only text file indexed by integer key-id, with
//! lookup by index and by chirp hash. Per §5, the file handle is opened, read or written, and
//! closed within a single callback — never kept open across a suspension point — so every public
//! operation here takes `&Path` and does its own open/close.

use base::mac::MacAddr;
use protocol::bootstrap::{BootstrapLine, BootstrapLineError};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapStoreError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("malformed bootstrap file line {line}: {source}")]
  Malformed {
    line: usize,
    #[source]
    source: BootstrapLineError,
  },
}

#[derive(Debug, Clone)]
pub struct BootstrapEntry {
  pub index: u32,
  pub opclass: u8,
  pub channel: u8,
  pub peer_mac: MacAddr,
  pub spki_b64: String,
}

impl From<BootstrapLine> for BootstrapEntry {
  fn from(line: BootstrapLine) -> Self {
    BootstrapEntry {
      index: line.index,
      opclass: line.opclass,
      channel: line.channel,
      peer_mac: line.peer_mac,
      spki_b64: line.spki_b64,
    }
  }
}

/// Read every line of the bootstrap file, skipping (and logging) lines that fail to parse rather
/// than aborting the whole scan — a single corrupt line must not make every other entry
/// unreachable.
pub fn read_all(path: &Path) -> Result<Vec<BootstrapEntry>, BootstrapStoreError> {
  if !path.exists() {
    return Ok(Vec::new());
  }
  let text = std::fs::read_to_string(path)?;
  let mut entries = Vec::new();
  for (lineno, line) in text.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }
    match BootstrapLine::parse(line) {
      Ok(parsed) => entries.push(parsed.into()),
      Err(e) => log::warn!("bootstrap file {}: skipping malformed line {}: {e}", path.display(), lineno + 1),
    }
  }
  Ok(entries)
}

/// `bootstrap_peer` index lookup (§4.2, §3 "consumed by").
pub fn lookup_by_index(path: &Path, index: u32) -> Result<Option<BootstrapEntry>, BootstrapStoreError> {
  Ok(read_all(path)?.into_iter().find(|e| e.index == index))
}

/// The Chirp Resolver's hash scan (§4.2, §4.6): base64-decode each entry's SPKI, compute
/// `chirp_hash`, and return the first entry whose hash matches.
pub fn lookup_by_chirp_hash(
  path: &Path,
  target: &[u8; 32],
) -> Result<Option<BootstrapEntry>, BootstrapStoreError> {
  for entry in read_all(path)? {
    let Ok(der) = base::b64::decode(&entry.spki_b64) else {
      log::warn!(
        "bootstrap file {}: entry {} has unparseable base64, skipping",
        path.display(),
        entry.index
      );
      continue;
    };
    if base::sha::chirp_hash(&der) == *target {
      return Ok(Some(entry));
    }
  }
  Ok(None)
}

/// `save_bootstrap_key` (§3, §4.2): append a new entry with `idx = max(existing_idx) + 1`.
///
/// Open question (§9), resolved here per SPEC_FULL.md: append unconditionally even if
/// `spki_b64` duplicates an existing entry, logging a warning rather than rejecting, matching the
/// original daemon's observed behavior ("TODO: stop appending everything").
pub fn append(
  path: &Path,
  opclass: u8,
  channel: u8,
  peer_mac: MacAddr,
  spki_b64: &str,
) -> Result<BootstrapEntry, BootstrapStoreError> {
  use std::io::Write;

  let existing = read_all(path)?;
  if existing.iter().any(|e| e.spki_b64 == spki_b64) {
    log::warn!(
      "bootstrap file {}: appending duplicate SPKI (already present under a different index)",
      path.display()
    );
  }
  let next_index = existing.iter().map(|e| e.index).max().map(|m| m + 1).unwrap_or(0);
  let line = BootstrapLine {
    index: next_index,
    opclass,
    channel,
    peer_mac,
    spki_b64: spki_b64.to_string(),
  };
  let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
  file.write_all(line.format().as_bytes())?;
  Ok(line.into())
}

#[cfg(test)]
mod tests {
  use super::*;
  use base::sha::chirp_hash;
  use tempfile_shim::temp_file_path;

  mod tempfile_shim {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    pub fn temp_file_path(label: &str) -> PathBuf {
      let n = COUNTER.fetch_add(1, Ordering::Relaxed);
      std::env::temp_dir().join(format!("dpp-bootstrap-test-{label}-{}-{}.txt", std::process::id(), n))
    }
  }

  #[test]
  fn append_then_lookup_by_index() {
    let path = temp_file_path("index");
    let mac = MacAddr([2, 0, 0, 0, 0, 1]);
    let entry = append(&path, 81, 11, mac, "Zm9v").unwrap();
    assert_eq!(entry.index, 0);
    let second = append(&path, 81, 6, mac, "YmFy").unwrap();
    assert_eq!(second.index, 1);
    let found = lookup_by_index(&path, 1).unwrap().unwrap();
    assert_eq!(found.spki_b64, "YmFy");
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn lookup_by_chirp_hash_finds_matching_entry() {
    let path = temp_file_path("chirp");
    let mac = MacAddr([2, 0, 0, 0, 0, 2]);
    let der = vec![1u8, 2, 3, 4, 5];
    let b64 = base::b64::encode(&der);
    append(&path, 81, 1, mac, &b64).unwrap();
    let target = chirp_hash(&der);
    let found = lookup_by_chirp_hash(&path, &target).unwrap().unwrap();
    assert_eq!(found.spki_b64, b64);
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn lookup_by_chirp_hash_returns_none_when_no_entry_matches() {
    let path = temp_file_path("chirp-miss");
    append(&path, 81, 1, MacAddr([2, 0, 0, 0, 0, 3]), "Zm9v").unwrap();
    let found = lookup_by_chirp_hash(&path, &[0xffu8; 32]).unwrap();
    assert!(found.is_none());
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn duplicate_spki_is_appended_not_rejected() {
    let path = temp_file_path("dup");
    let mac = MacAddr([2, 0, 0, 0, 0, 4]);
    append(&path, 81, 1, mac, "Zm9v").unwrap();
    let second = append(&path, 81, 1, mac, "Zm9v").unwrap();
    assert_eq!(second.index, 1);
    let all = read_all(&path).unwrap();
    assert_eq!(all.len(), 2);
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn missing_file_reads_as_empty() {
    let path = temp_file_path("missing");
    assert!(read_all(&path).unwrap().is_empty());
  }
}
