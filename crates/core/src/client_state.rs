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

//! Relay/Controller client state (§3) and the GAS Fragmentation Engine's stateful half (§4.5):
//! `protocol::gas` supplies the pure wire codec, this module owns the per-client `frag_buf` /
//! `frag_sent` / `frag_left` fields and the rule that only a Comeback Request may consume them.

use base::mac::MacAddr;
use protocol::gas::{
  build_gas_comeback_response, build_gas_initial_response_deferred, plan_fragments, GasError, GasHeader,
};
use std::time::Instant;
use thiserror::Error;

/// Default client-state timeout (§3): 10 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum FragmentationError {
  #[error(transparent)]
  Gas(#[from] GasError),
  #[error("received a non-Comeback-Request while {0} bytes remain to be fragmented")]
  UnexpectedFrameDuringFragmentation(usize),
  #[error("controller attempted to write a non-GAS frame while fragmentation is in progress")]
  NonGasWriteDuringFragmentation,
}

/// One Relay/Controller client state (§3): created on TCP accept or outbound connect; destroyed
/// on TCP close, 10s timeout, or terminal DPP state.
pub struct ClientState {
  pub peer_mac: MacAddr,
  pub my_mac: MacAddr,
  pub bkhash: [u8; 32],
  pub last_activity: Instant,
  frag: Option<Fragmentation>,
}

struct Fragmentation {
  header: GasHeader,
  /// Fragments queued for delivery, in delivery order (largest `fragment_id` first, matching
  /// `protocol::gas::plan_fragments`'s ordering), not yet consumed by a Comeback Request.
  pending: std::collections::VecDeque<(u8, bool, Vec<u8>)>,
}

impl ClientState {
  pub fn new(peer_mac: MacAddr, my_mac: MacAddr, bkhash: [u8; 32]) -> ClientState {
    ClientState {
      peer_mac,
      my_mac,
      bkhash,
      last_activity: Instant::now(),
      frag: None,
    }
  }

  pub fn touch(&mut self) {
    self.last_activity = Instant::now();
  }

  pub fn is_expired(&self, timeout_secs: u64) -> bool {
    self.last_activity.elapsed().as_secs() >= timeout_secs
  }

  pub fn is_fragmenting(&self) -> bool {
    self.frag.is_some()
  }

  /// §4.5 step 1: begin fragmenting `payload` for `header`. Returns the deferred GAS Initial
  /// Response to transmit immediately; the payload itself is queued for Comeback Requests.
  pub fn begin_fragmentation(&mut self, header: GasHeader, payload: &[u8], mtu: usize) -> Result<Vec<u8>, FragmentationError> {
    let plan = plan_fragments(payload, mtu)?;
    let pending = plan
      .into_iter()
      .map(|(id, more, chunk)| (id, more, chunk.to_vec()))
      .collect();
    let initial_response = build_gas_initial_response_deferred(&header);
    self.frag = Some(Fragmentation { header, pending });
    Ok(initial_response)
  }

  /// §4.5 step 2-3: produce the next Comeback Response in response to an inbound Comeback
  /// Request. Frees `frag` state on the last fragment.
  pub fn next_comeback_response(&mut self) -> Result<Vec<u8>, FragmentationError> {
    let left = self.frag.as_ref().map(|f| f.pending.len()).unwrap_or(0);
    let Some(frag) = self.frag.as_mut() else {
      return Err(FragmentationError::UnexpectedFrameDuringFragmentation(0));
    };
    let Some((id, more, chunk)) = frag.pending.pop_front() else {
      return Err(FragmentationError::UnexpectedFrameDuringFragmentation(left));
    };
    let response = build_gas_comeback_response(&frag.header, id, more, 0, &chunk);
    if !more {
      self.frag = None;
    }
    Ok(response)
  }

  /// §4.5 errors: receiving a non-Comeback-Request while fragments remain is logged and the
  /// frame dropped; state is retained (the caller is expected to call this instead of
  /// `next_comeback_response` for any other inbound frame type while `is_fragmenting()`).
  pub fn reject_non_comeback_during_fragmentation(&self) -> FragmentationError {
    let left = self.frag.as_ref().map(|f| f.pending.len()).unwrap_or(0);
    FragmentationError::UnexpectedFrameDuringFragmentation(left)
  }

  /// §4.5 errors: a controller-side write of a non-GAS frame type during fragmentation is
  /// refused outright rather than silently dropped, since it indicates the Controller and Relay
  /// have desynchronized about which protocol phase they are in.
  pub fn guard_controller_write(&self, is_gas: bool) -> Result<(), FragmentationError> {
    if self.is_fragmenting() && !is_gas {
      return Err(FragmentationError::NonGasWriteDuringFragmentation);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn header() -> GasHeader {
    GasHeader {
      dialog_token: 1,
      status_code: 0,
      advertisement_protocol: vec![0x7f, 0x6a],
    }
  }

  #[test]
  fn fragmentation_lifecycle_drains_in_order_then_clears() {
    let mut client = ClientState::new(MacAddr::BROADCAST, MacAddr([1, 0, 0, 0, 0, 1]), [0u8; 32]);
    let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    client.begin_fragmentation(header(), &payload, 1400).unwrap();
    assert!(client.is_fragmenting());

    let mut reassembled = Vec::new();
    while client.is_fragmenting() {
      let resp = client.next_comeback_response().unwrap();
      let parsed = protocol::gas::parse_gas_comeback_response(&resp).unwrap();
      reassembled.extend_from_slice(&parsed.query_resp);
    }
    assert_eq!(reassembled, payload);
  }

  #[test]
  fn comeback_request_after_completion_errors() {
    let mut client = ClientState::new(MacAddr::BROADCAST, MacAddr([1, 0, 0, 0, 0, 1]), [0u8; 32]);
    client.begin_fragmentation(header(), b"short", 1400).unwrap();
    let _ = client.next_comeback_response().unwrap();
    assert!(!client.is_fragmenting());
    assert!(matches!(
      client.next_comeback_response(),
      Err(FragmentationError::UnexpectedFrameDuringFragmentation(0))
    ));
  }

  #[test]
  fn expiry_uses_the_configured_timeout() {
    let client = ClientState::new(MacAddr::BROADCAST, MacAddr([1, 0, 0, 0, 0, 1]), [0u8; 32]);
    assert!(!client.is_expired(DEFAULT_TIMEOUT_SECS));
  }
}
