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

//! The Test harness (§2.1 item 11, §6): a deterministic stand-in for the real DPP/PKEX
//! cryptographic engine, which is out of scope for this repository (§1). `StubEngine` accepts
//! every frame handed to it and hands back fixed, deterministic values, so the Session Registry
//! and Frame Demultiplexer can be exercised end to end without a real protocol implementation.
//! Used both by this crate's own tests and, in lieu of a real engine, by the `sss` and
//! `controller` binaries — a production deployment links a real engine satisfying `DppEngine` +
//! `PkexEngine` in its place.

use crate::engine::{DppCreateParams, DppEngine, EngineError, EngineHandle, PkexEngine};
use base::mac::MacAddr;
use std::collections::HashSet;

/// Hands out monotonically increasing handles and never rejects a frame. `tid` cycles through
/// `0..=255` so repeated discovery rounds in a test still get distinct transaction ids.
pub struct StubEngine {
  next_handle: u64,
  next_tid: u8,
  live_dpp: HashSet<u64>,
  live_pkex: HashSet<u64>,
  pub begin_discovery_calls: Vec<u8>,
  pub chirp_freqs: Vec<(MacAddr, u32)>,
  pub pkex_update_macs_calls: Vec<(EngineHandle, MacAddr, MacAddr)>,
}

impl StubEngine {
  pub fn new() -> StubEngine {
    StubEngine {
      next_handle: 1,
      next_tid: 0,
      live_dpp: HashSet::new(),
      live_pkex: HashSet::new(),
      begin_discovery_calls: Vec::new(),
      chirp_freqs: Vec::new(),
      pkex_update_macs_calls: Vec::new(),
    }
  }

  fn alloc_handle(&mut self) -> EngineHandle {
    let h = self.next_handle;
    self.next_handle += 1;
    EngineHandle(h)
  }
}

impl Default for StubEngine {
  fn default() -> StubEngine {
    StubEngine::new()
  }
}

impl DppEngine for StubEngine {
  fn dpp_create_peer(&mut self, _params: DppCreateParams) -> Result<EngineHandle, EngineError> {
    let handle = self.alloc_handle();
    self.live_dpp.insert(handle.0);
    Ok(handle)
  }

  fn dpp_free_peer(&mut self, handle: EngineHandle) {
    self.live_dpp.remove(&handle.0);
  }

  fn process_dpp_auth_frame(&mut self, _bytes: &[u8], handle: EngineHandle) -> Result<(), EngineError> {
    if self.live_dpp.contains(&handle.0) {
      Ok(())
    } else {
      Err(EngineError::FrameRejected("unknown handle".into()))
    }
  }

  fn process_dpp_config_frame(&mut self, _field: u8, _bytes: &[u8], handle: EngineHandle) -> Result<(), EngineError> {
    if self.live_dpp.contains(&handle.0) {
      Ok(())
    } else {
      Err(EngineError::FrameRejected("unknown handle".into()))
    }
  }

  fn process_dpp_discovery_frame(&mut self, _bytes: &[u8], _tid: u8) -> Result<([u8; 32], [u8; 16]), EngineError> {
    Ok(([0u8; 32], [0u8; 16]))
  }

  fn dpp_begin_discovery(&mut self, tid: u8) -> bool {
    self.begin_discovery_calls.push(tid);
    true
  }

  fn get_dpp_discovery_tid(&mut self) -> u8 {
    let tid = self.next_tid;
    self.next_tid = self.next_tid.wrapping_add(1);
    tid
  }

  fn dpp_add_chirp_freq(&mut self, iface_mac: MacAddr, freq_mhz: u32) {
    self.chirp_freqs.push((iface_mac, freq_mhz));
  }
}

impl PkexEngine for StubEngine {
  fn pkex_create_peer(&mut self, _version: u8) -> Result<EngineHandle, EngineError> {
    let handle = self.alloc_handle();
    self.live_pkex.insert(handle.0);
    Ok(handle)
  }

  fn pkex_destroy_peer(&mut self, handle: EngineHandle) {
    self.live_pkex.remove(&handle.0);
  }

  fn process_pkex_frame(&mut self, _bytes: &[u8], handle: EngineHandle) -> Result<(), EngineError> {
    if self.live_pkex.contains(&handle.0) {
      Ok(())
    } else {
      Err(EngineError::FrameRejected("unknown handle".into()))
    }
  }

  fn pkex_update_macs(&mut self, handle: EngineHandle, my_mac: MacAddr, peer_mac: MacAddr) {
    self.pkex_update_macs_calls.push((handle, my_mac, peer_mac));
  }

  fn pkex_initiate(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
    if self.live_pkex.contains(&handle.0) {
      Ok(())
    } else {
      Err(EngineError::FrameRejected("unknown handle".into()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handles_are_unique_and_freeing_drops_liveness() {
    let mut engine = StubEngine::new();
    let a = engine.dpp_create_peer(DppCreateParams {
      bootstrap_key_b64: String::new(),
      is_initiator: true,
      mutual_auth: false,
      mtu: 1400,
    }).unwrap();
    let b = engine.dpp_create_peer(DppCreateParams {
      bootstrap_key_b64: String::new(),
      is_initiator: true,
      mutual_auth: false,
      mtu: 1400,
    }).unwrap();
    assert_ne!(a, b);
    engine.dpp_free_peer(a);
    assert!(engine.process_dpp_auth_frame(&[], a).is_err());
    assert!(engine.process_dpp_auth_frame(&[], b).is_ok());
  }

  #[test]
  fn discovery_tid_cycles_through_u8_range() {
    let mut engine = StubEngine::new();
    assert_eq!(engine.get_dpp_discovery_tid(), 0);
    assert_eq!(engine.get_dpp_discovery_tid(), 1);
  }
}
