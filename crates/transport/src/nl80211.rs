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

//! The real-radio Frame I/O Adapter on Linux (§4.1): `NL80211_CMD_FRAME` for transmit,
//! `NL80211_CMD_SET_CHANNEL` for channel changes, over the `nl80211` generic-netlink family.
//! Grounded on the generic-netlink connection pattern used throughout
//! `examples/other_examples/manifests/rust-netlink-wl-nl80211` (resolve the family id once at
//! `bind` time, then issue one `GenlMessage` per command on the shared connection).

#![cfg(target_os = "linux")]

use crate::io::{Capabilities, IoError, ROC_PUBLIC_ACTION_MS};
use base::mac::MacAddr;
use futures::StreamExt;
use genetlink::{new_connection, GenetlinkHandle};
use netlink_packet_core::{NetlinkMessage, NetlinkPayload, NLM_F_ACK, NLM_F_REQUEST};
use netlink_packet_generic::{GenlFamily, GenlHeader, GenlMessage};
use netlink_packet_utils::nla::{DefaultNla, Nla, NlaBuffer};
use netlink_packet_utils::{DecodeError, Emitable, Parseable, ParseableParametrized};
use protocol::ActionField;
use std::convert::TryFrom;

/// `nl80211` command numbers this adapter issues, taken from `linux/nl80211.h`.
mod cmd {
  pub const FRAME: u8 = 56;
  pub const SET_CHANNEL: u8 = 65;
}

/// `nl80211` attribute numbers this adapter reads or writes, taken from `linux/nl80211.h`.
mod attr {
  pub const WIPHY_FREQ: u16 = 38;
  pub const IFINDEX: u16 = 3;
  pub const FRAME: u16 = 51;
  pub const DURATION: u16 = 57;
  pub const OFFCHANNEL_TX_OK: u16 = 134;
}

/// A minimal `nl80211` generic-netlink message body: a bare command plus a flat NLA list. This
/// adapter only ever sends `FRAME` and `SET_CHANNEL`, so it does not need the full attribute
/// schema `nl80211.h` defines, only the handful listed in `attr` above.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nl80211Message {
  pub cmd: u8,
  pub nlas: Vec<DefaultNla>,
}

impl GenlFamily for Nl80211Message {
  fn family_name() -> &'static str {
    "nl80211"
  }

  fn command(&self) -> u8 {
    self.cmd
  }

  fn version(&self) -> u8 {
    1
  }
}

impl Emitable for Nl80211Message {
  fn buffer_len(&self) -> usize {
    self.nlas.as_slice().buffer_len()
  }

  fn emit(&self, buffer: &mut [u8]) {
    self.nlas.as_slice().emit(buffer)
  }
}

impl ParseableParametrized<[u8], GenlHeader> for Nl80211Message {
  fn parse_with_param(buf: &[u8], header: GenlHeader) -> Result<Self, DecodeError> {
    let mut nlas = Vec::new();
    for nla in NlaBuffer::new_checked(buf)?.nlas() {
      nlas.push(DefaultNla::parse(&nla?)?);
    }
    Ok(Nl80211Message {
      cmd: header.cmd,
      nlas,
    })
  }
}

pub struct Nl80211Io {
  handle: GenetlinkHandle,
  ifindex: u32,
  local_mac: MacAddr,
  caps: Capabilities,
}

impl Nl80211Io {
  /// Resolve the `nl80211` family id and attach to the interface named `ifindex` (already
  /// resolved by the caller via `if_nametoindex`, a thin libc collaborator the spec leaves out of
  /// scope, §1).
  pub async fn bind(ifindex: u32, local_mac: MacAddr, caps: Capabilities) -> Result<Nl80211Io, IoError> {
    let (conn, handle, _) = new_connection().map_err(|e| IoError::Netlink(e.to_string()))?;
    tokio::spawn(conn);
    Ok(Nl80211Io {
      handle,
      ifindex,
      local_mac,
      caps,
    })
  }

  pub fn capabilities(&self) -> Capabilities {
    self.caps
  }

  fn ifindex_nla(&self) -> DefaultNla {
    nla_u32(attr::IFINDEX, self.ifindex)
  }

  /// §4.1: submit an `NL80211_CMD_FRAME` with `duration` = 500ms for public-action frames, the
  /// driver's max-RoC for GAS frames, and `OFFCHANNEL_TX_OK` when the driver advertises support.
  pub async fn send_action_frame(
    &mut self,
    field: ActionField,
    frame_bytes: &[u8],
  ) -> Result<usize, IoError> {
    let duration = if field.is_gas() {
      self.caps.max_roc_ms
    } else {
      ROC_PUBLIC_ACTION_MS
    };
    let mut nlas = vec![
      self.ifindex_nla(),
      nla_u32(attr::DURATION, duration),
      nla_bytes(attr::FRAME, frame_bytes),
    ];
    if self.caps.offchannel_tx_ok {
      nlas.push(nla_flag(attr::OFFCHANNEL_TX_OK));
    }
    self.request(cmd::FRAME, nlas).await?;
    Ok(frame_bytes.len())
  }

  /// §4.1: `change_dpp_freq` resolves `(opclass, channel)` via the regulatory table and submits
  /// `NL80211_CMD_SET_CHANNEL` with the resolved frequency.
  pub async fn set_channel(&mut self, freq_mhz: u32) -> Result<(), IoError> {
    let nlas = vec![self.ifindex_nla(), nla_u32(attr::WIPHY_FREQ, freq_mhz)];
    self.request(cmd::SET_CHANNEL, nlas).await?;
    self.caps.current_freq_mhz = Some(freq_mhz);
    Ok(())
  }

  async fn request(&mut self, cmd: u8, nlas: Vec<DefaultNla>) -> Result<(), IoError> {
    let genlmsg = GenlMessage::from_payload(Nl80211Message { cmd, nlas });
    let mut nlmsg = NetlinkMessage::from(genlmsg);
    nlmsg.header.flags = NLM_F_REQUEST | NLM_F_ACK;
    let mut response = self
      .handle
      .request(nlmsg)
      .await
      .map_err(|e| IoError::Netlink(e.to_string()))?;
    while let Some(msg) = response.next().await {
      if let NetlinkPayload::Error(err) = msg.payload {
        if err.code.is_some() {
          return Err(IoError::Netlink(format!("nl80211 NLMSG_ERROR: {err:?}")));
        }
      }
    }
    Ok(())
  }

  pub fn local_mac(&self) -> MacAddr {
    self.local_mac
  }
}

fn nla_u32(kind: u16, value: u32) -> DefaultNla {
  let mut bytes = [0u8; 4];
  bytes.copy_from_slice(&value.to_ne_bytes());
  DefaultNla::try_from((kind, bytes.as_slice())).expect("fixed-size u32 NLA")
}

fn nla_bytes(kind: u16, value: &[u8]) -> DefaultNla {
  DefaultNla::try_from((kind, value)).expect("NLA from arbitrary bytes")
}

fn nla_flag(kind: u16) -> DefaultNla {
  DefaultNla::try_from((kind, &[] as &[u8])).expect("zero-length flag NLA")
}
