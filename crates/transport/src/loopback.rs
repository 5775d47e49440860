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

//! The loopback Frame I/O Adapter (§4.1): a shared broadcast medium standing in for the BPF/raw
//! socket the real daemon opens on `lo`. We cannot open an actual `/dev/bpf` or `AF_PACKET` raw
//! socket without elevated privileges inside a test process, so the medium is a UDP multicast
//! group on `127.0.0.1`: every participating `Interface` joins the same group, and the adapter
//! prepends the same 4-byte pseudo-AF header the real implementation writes ahead of the 802.11
//! header, so the framing on the wire is otherwise identical to what `parse_mgmt_frame` expects.

use crate::io::{passes_receive_filters, Capabilities, IoError, RecvFrame};
use base::mac::MacAddr;
use byteorder::{ByteOrder, LittleEndian};
use protocol::ieee80211::{
  build_gas_action_body, build_header, build_vendor_action_body, parse_mgmt_frame,
  parse_public_action, FrameError, SUBTYPE_ACTION, SUBTYPE_BEACON,
};
use protocol::ActionField;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::UdpSocket;

/// Pseudo address-family header value the real daemon's loopback mode prepends ahead of the
/// synthesized 802.11 header (§4.1); chosen to match `ARPHRD_IEEE80211_RADIOTAP` (802) so a
/// tcpdump of the medium would decode the same way a real monitor-mode capture would.
const PSEUDO_AF_HEADER: u32 = 802;

const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 80, 21);
const MULTICAST_PORT: u16 = 18741;

pub struct LoopbackIo {
  socket: UdpSocket,
  group: SocketAddrV4,
  local_mac: MacAddr,
}

impl LoopbackIo {
  /// Join the shared loopback medium. `local_mac` is used only for the universal receive filter
  /// (§4.1); every `Interface` on `lo` shares one multicast group regardless of how many
  /// processes are bound to it, matching a real BPF device's promiscuous delivery to all readers.
  ///
  /// `SO_REUSEADDR`/`SO_REUSEPORT` are set before `bind` so more than one participant (two `sss`
  /// processes in the §8 scenario-1 loopback echo, or two `Interface`s in one process under the
  /// test harness) can claim the same fixed multicast port instead of the second bind failing
  /// with `EADDRINUSE`.
  pub async fn bind(local_mac: MacAddr) -> Result<LoopbackIo, IoError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(IoError::Recv)?;
    socket.set_reuse_address(true).map_err(IoError::Recv)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(IoError::Recv)?;
    socket.set_nonblocking(true).map_err(IoError::Recv)?;
    let bind_addr: std::net::SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MULTICAST_PORT).into();
    socket.bind(&bind_addr.into()).map_err(IoError::Recv)?;
    let socket = UdpSocket::from_std(socket.into()).map_err(IoError::Recv)?;
    socket
      .join_multicast_v4(MULTICAST_GROUP, Ipv4Addr::UNSPECIFIED)
      .map_err(IoError::Recv)?;
    Ok(LoopbackIo {
      socket,
      group: SocketAddrV4::new(MULTICAST_GROUP, MULTICAST_PORT),
      local_mac,
    })
  }

  pub fn capabilities(&self) -> Capabilities {
    Capabilities {
      offchannel_tx_ok: true,
      max_roc_ms: 5000,
      current_freq_mhz: None,
    }
  }

  /// §4.1: prepend the 4-byte pseudo-AF header, then a synthesized 802.11 header with
  /// `bssid = broadcast`, then the body.
  pub async fn send_action_frame(
    &self,
    src: MacAddr,
    dst: MacAddr,
    field: ActionField,
    payload: &[u8],
  ) -> Result<usize, IoError> {
    let body = if matches!(field, ActionField::Vendor) {
      let (frame_type, rest) = payload.split_first().unwrap_or((&0, &[]));
      build_vendor_action_body(*frame_type, rest)
    } else {
      build_gas_action_body(field, payload)
    };
    let mut out = vec![0u8; 4];
    LittleEndian::write_u32(&mut out, PSEUDO_AF_HEADER);
    out.extend_from_slice(&build_header(SUBTYPE_ACTION, src, dst, MacAddr::BROADCAST));
    out.extend_from_slice(&body);
    let n = self
      .socket
      .send_to(&out, self.group)
      .await
      .map_err(IoError::Send)?;
    Ok(n)
  }

  /// Blocks until a frame passes the universal receive filters (§4.1); on a malformed datagram,
  /// logs and keeps reading rather than surfacing an error that would close the socket.
  pub async fn recv_frame(&self) -> Result<RecvFrame, IoError> {
    let mut buf = vec![0u8; 2048];
    loop {
      let n = self.socket.recv(&mut buf).await.map_err(IoError::Recv)?;
      match self.parse_datagram(&buf[..n]) {
        Ok(Some(frame)) => return Ok(frame),
        Ok(None) => continue,
        Err(e) => {
          log::warn!("loopback: dropping malformed datagram: {e}");
          continue;
        }
      }
    }
  }

  fn parse_datagram(&self, datagram: &[u8]) -> Result<Option<RecvFrame>, FrameError> {
    if datagram.len() < 4 {
      return Err(FrameError::Truncated);
    }
    let mgmt = parse_mgmt_frame(&datagram[4..])?;
    if !passes_receive_filters(mgmt.src, mgmt.dst, std::slice::from_ref(&self.local_mac)) {
      return Ok(None);
    }
    if mgmt.subtype == SUBTYPE_BEACON {
      // §4.4 last row: beacons drive Discovery, not the vendor/GAS action dispatch below. Surface
      // the raw body (SSID information element and all) so the Demultiplexer can pull the SSID
      // out without this adapter needing to know anything about IE parsing.
      return Ok(Some(RecvFrame {
        src: mgmt.src,
        dst: mgmt.dst,
        field: ActionField::Other(0),
        payload: mgmt.body.to_vec(),
        is_beacon: true,
      }));
    }
    let action = parse_public_action(mgmt.body)?;
    Ok(Some(RecvFrame {
      src: mgmt.src,
      dst: mgmt.dst,
      field: action.field,
      payload: action.payload.to_vec(),
      is_beacon: false,
    }))
  }

  /// Loopback interfaces report channel-change success without side effect (§4.1).
  pub async fn set_channel(&self, _opclass: u8, _channel: u8) -> Result<(), IoError> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// §8 "Framing round-trip": for `body.len <= MTU`, sending and receiving over the loopback
  /// adapter yields the identical `(field, src, dst, body)` tuple after filtering. Exercising this
  /// needs two co-resident sockets on the fixed multicast port, which only works with
  /// `SO_REUSEADDR`/`SO_REUSEPORT` set before `bind` (§8 scenario 1, two `sss` processes on `lo`).
  #[tokio::test]
  async fn vendor_frame_round_trips_between_two_bound_endpoints() {
    let src = MacAddr::random_local();
    let dst = MacAddr::random_local();
    let sender = LoopbackIo::bind(src).await.expect("sender bind");
    let receiver = LoopbackIo::bind(dst).await.expect("receiver bind");

    let mut payload = vec![protocol::oui::FrameType::AuthRequest as u8];
    payload.extend_from_slice(b"auth request body");

    sender
      .send_action_frame(src, dst, ActionField::Vendor, &payload)
      .await
      .expect("send");

    let frame = receiver.recv_frame().await.expect("recv");
    assert_eq!(frame.src, src);
    assert_eq!(frame.dst, dst);
    assert!(matches!(frame.field, ActionField::Vendor));
    assert_eq!(frame.payload, payload);
    assert!(!frame.is_beacon);
  }

  /// The same round trip for a GAS field, whose body is carried without the vendor OUI/subtype
  /// wrapper (`build_gas_action_body` vs. `build_vendor_action_body`).
  #[tokio::test]
  async fn gas_frame_round_trips_between_two_bound_endpoints() {
    let src = MacAddr::random_local();
    let dst = MacAddr::random_local();
    let sender = LoopbackIo::bind(src).await.expect("sender bind");
    let receiver = LoopbackIo::bind(dst).await.expect("receiver bind");

    let payload = vec![7u8, 0, 0, 1, 2, 3];
    sender
      .send_action_frame(src, dst, ActionField::GasComebackResponse, &payload)
      .await
      .expect("send");

    let frame = receiver.recv_frame().await.expect("recv");
    assert_eq!(frame.src, src);
    assert!(matches!(frame.field, ActionField::GasComebackResponse));
    assert_eq!(frame.payload, payload);
  }

  /// A second endpoint must be able to bind the same fixed multicast port at all — the bug this
  /// test guards against is `bind` failing outright with `EADDRINUSE` on the second call.
  #[tokio::test]
  async fn two_endpoints_can_bind_the_same_port_concurrently() {
    let a = LoopbackIo::bind(MacAddr::random_local()).await;
    let b = LoopbackIo::bind(MacAddr::random_local()).await;
    assert!(a.is_ok(), "first bind: {:?}", a.err());
    assert!(b.is_ok(), "second bind: {:?}", b.err());
  }
}
