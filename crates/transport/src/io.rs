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

//! The Frame I/O Adapter (§4.1): a small capability set — `send_action`, `set_channel`,
//! `subscribe` (design notes §9) — implemented once per transport variant and dispatched through
//! a single [`FrameIo`] enum rather than a trait object, since the variant set is closed and small.

use base::mac::MacAddr;
use protocol::ActionField;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
  #[error("send failed: {0}")]
  Send(#[source] std::io::Error),
  #[error("recv failed: {0}")]
  Recv(#[source] std::io::Error),
  #[error("channel change failed: {0}")]
  ChannelChange(String),
  #[error("no frequency mapping for opclass {0} channel {1}")]
  UnknownChannel(u8, u8),
  #[error("netlink error: {0}")]
  Netlink(String),
}

/// Driver capabilities reported by real-radio transports (§3 Interface attributes); loopback and
/// TCP transports report a maximal, inert capability set since there is no radio to query.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
  pub offchannel_tx_ok: bool,
  pub max_roc_ms: u32,
  pub current_freq_mhz: Option<u32>,
}

impl Default for Capabilities {
  fn default() -> Self {
    Capabilities {
      offchannel_tx_ok: true,
      max_roc_ms: 5000,
      current_freq_mhz: None,
    }
  }
}

/// One inbound frame as surfaced to the Demultiplexer, already past the adapter's two universal
/// receive filters (§4.1): the frame did not originate from a local interface, and if unicast its
/// destination matched a local interface MAC.
#[derive(Debug, Clone)]
pub struct RecvFrame {
  pub src: MacAddr,
  pub dst: MacAddr,
  pub field: ActionField,
  /// For `ActionField::Vendor`, the bytes starting at `frame_type`. For GAS fields and the beacon
  /// pseudo-frame, the raw body.
  pub payload: Vec<u8>,
  /// `true` for the beacon pseudo-frame the Frame I/O Adapter surfaces to let the Demultiplexer
  /// drive Discovery (§4.4 last row); such frames carry `field = ActionField::Other(0)` and the
  /// raw beacon SSID information element as `payload`.
  pub is_beacon: bool,
}

/// 500 ms duration for public-action frames (§4.1).
pub const ROC_PUBLIC_ACTION_MS: u32 = 500;

/// Apply the adapter's two universal receive filters (§4.1): drop frames whose source is any
/// local interface MAC, and drop unicast frames whose destination matches neither a local
/// interface MAC nor broadcast.
pub fn passes_receive_filters(src: MacAddr, dst: MacAddr, local_macs: &[MacAddr]) -> bool {
  if local_macs.contains(&src) {
    return false;
  }
  if dst.is_broadcast() || dst.is_multicast() {
    return true;
  }
  local_macs.contains(&dst)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drops_frames_from_local_mac() {
    let me = MacAddr([1, 2, 3, 4, 5, 6]);
    assert!(!passes_receive_filters(me, MacAddr::BROADCAST, &[me]));
  }

  #[test]
  fn drops_unicast_to_other_station() {
    let me = MacAddr([1, 2, 3, 4, 5, 6]);
    let peer = MacAddr([9, 9, 9, 9, 9, 9]);
    let other = MacAddr([8, 8, 8, 8, 8, 8]);
    assert!(!passes_receive_filters(peer, other, &[me]));
  }

  #[test]
  fn accepts_broadcast_and_unicast_to_self() {
    let me = MacAddr([1, 2, 3, 4, 5, 6]);
    let peer = MacAddr([9, 9, 9, 9, 9, 9]);
    assert!(passes_receive_filters(peer, MacAddr::BROADCAST, &[me]));
    assert!(passes_receive_filters(peer, me, &[me]));
  }
}
