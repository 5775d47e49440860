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

//! Peer-to-client-state correlation (§4.7): the Relay and Controller both keep one `ClientState` +
//! one TCP connection per over-the-air peer exchange. This module is the bookkeeping that's common
//! to both sides; `relay.rs`/`controller.rs` differ only in which end opens the connection and
//! which direction frames are pulled from first.

use base::mac::MacAddr;
use core_dpp::client_state::ClientState;
use transport::tcp::TcpTunnelWriter;

/// The write half of a client's TCP connection, paired with its `ClientState`. The read half is
/// owned by a spawned reader task that feeds controller-originated messages back into the main
/// event loop (§4.7), so the two directions never contend for the same `&mut` across an `.await`.
///
/// `id` is a process-local, monotonically increasing handle assigned at `insert` time. A reader
/// task tags every message it forwards into the main loop's channel with the `id` of the
/// connection it read from, so the main loop can find the right `RelayClient` even though the
/// backing `Vec`'s indices shift as other clients are removed.
pub struct RelayClient {
  pub id: u64,
  pub tcp: TcpTunnelWriter,
  pub state: ClientState,
}

/// The Relay/Controller's client-state table (§3 "Client state"). Plain `Vec` rather than a map
/// keyed by MAC because lookups may need to match on `bkhash` instead of `peer_mac` while the peer
/// is still the broadcast address (§4.7), which a MAC-keyed map can't express without doubling as
/// a secondary index anyway.
pub struct RelayClients {
  clients: Vec<RelayClient>,
  next_id: u64,
}

impl RelayClients {
  pub fn new() -> RelayClients {
    RelayClients { clients: Vec::new(), next_id: 0 }
  }

  /// Assign the next stable id, without inserting a client yet. Lets a caller register a reader
  /// task (which needs the id to tag its messages) before the connection's `ClientState` exists.
  pub fn next_id(&mut self) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  pub fn insert(&mut self, client: RelayClient) -> u64 {
    let id = client.id;
    self.clients.push(client);
    id
  }

  pub fn find_by_id(&mut self, id: u64) -> Option<&mut RelayClient> {
    self.clients.iter_mut().find(|c| c.id == id)
  }

  /// §4.7 "Inbound AUTH_REQ from air": route to any existing client state whose `peer_mac`
  /// matches the sender exactly (no late-binding here, the sender is never broadcast).
  pub fn find_by_peer_mac(&mut self, mac: MacAddr) -> Option<&mut RelayClient> {
    self.clients.iter_mut().find(|c| c.state.peer_mac == mac)
  }

  /// §4.7 "Inbound AUTH_RESP or PKEX_RESP from air": match on exact peer MAC, or on a still-
  /// broadcast peer whose recorded `bkhash` matches the frame's hash TLV, rewriting broadcast to
  /// `sender` on that second kind of match (late binding, mirroring the Session Registry's rule).
  pub fn find_by_mac_or_bkhash(&mut self, sender: MacAddr, bkhash: &[u8; 32]) -> Option<&mut RelayClient> {
    if let Some(idx) = self.clients.iter().position(|c| c.state.peer_mac == sender) {
      return Some(&mut self.clients[idx]);
    }
    let idx = self
      .clients
      .iter()
      .position(|c| c.state.peer_mac == MacAddr::BROADCAST && c.state.bkhash == *bkhash)?;
    self.clients[idx].state.peer_mac = sender;
    Some(&mut self.clients[idx])
  }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RelayClient> {
    self.clients.iter_mut()
  }

  /// Drop every client state past its timeout (§3: TCP close, 10s timeout, or terminal DPP
  /// state), returning the removed entries so the caller can shut down their sockets.
  pub fn drain_expired(&mut self, timeout_secs: u64) -> Vec<RelayClient> {
    let (expired, live): (Vec<_>, Vec<_>) = self
      .clients
      .drain(..)
      .partition(|c| c.state.is_expired(timeout_secs));
    self.clients = live;
    expired
  }

  pub fn remove_by_peer_mac(&mut self, mac: MacAddr) -> Option<RelayClient> {
    let idx = self.clients.iter().position(|c| c.state.peer_mac == mac)?;
    Some(self.clients.remove(idx))
  }

  pub fn remove_by_id(&mut self, id: u64) -> Option<RelayClient> {
    let idx = self.clients.iter().position(|c| c.id == id)?;
    Some(self.clients.remove(idx))
  }

  pub fn len(&self) -> usize {
    self.clients.len()
  }

  pub fn is_empty(&self) -> bool {
    self.clients.is_empty()
  }
}

impl Default for RelayClients {
  fn default() -> RelayClients {
    RelayClients::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::net::{TcpListener, TcpStream};
  use transport::tcp::TcpTunnelIo;

  fn peer_mac(last: u8) -> MacAddr {
    MacAddr([2, 0, 0, 0, 0, last])
  }

  /// These tests only exercise MAC/bkhash bookkeeping, never an actual read or write, so the
  /// accept-side socket can be dropped immediately after the connection completes.
  async fn writer_half() -> TcpTunnelWriter {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (a, (b, _)) = tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
    drop(b);
    let (_reader, writer) = TcpTunnelIo::new(a.unwrap()).into_split();
    writer
  }

  #[tokio::test]
  async fn exact_mac_match_is_found_without_rewriting_anything() {
    let tcp = writer_half().await;
    let mut clients = RelayClients::new();
    clients.insert(RelayClient {
      id: 0,
      tcp,
      state: ClientState::new(peer_mac(1), MacAddr([1, 0, 0, 0, 0, 1]), [0u8; 32]),
    });
    assert!(clients.find_by_peer_mac(peer_mac(1)).is_some());
    assert!(clients.find_by_peer_mac(peer_mac(2)).is_none());
  }

  #[tokio::test]
  async fn bkhash_match_rewrites_broadcast_peer_exactly_once() {
    let tcp = writer_half().await;
    let hash = [7u8; 32];
    let mut clients = RelayClients::new();
    clients.insert(RelayClient {
      id: 0,
      tcp,
      state: ClientState::new(MacAddr::BROADCAST, MacAddr([1, 0, 0, 0, 0, 1]), hash),
    });
    let found = clients.find_by_mac_or_bkhash(peer_mac(5), &hash).unwrap();
    assert_eq!(found.state.peer_mac, peer_mac(5));
    // Second lookup now matches by exact MAC, not by hash fallback.
    assert!(clients.find_by_mac_or_bkhash(peer_mac(5), &[0u8; 32]).is_some());
  }

  #[tokio::test]
  async fn expired_clients_are_drained_and_removed() {
    let tcp = writer_half().await;
    let mut clients = RelayClients::new();
    clients.insert(RelayClient {
      id: 0,
      tcp,
      state: ClientState::new(peer_mac(1), MacAddr([1, 0, 0, 0, 0, 1]), [0u8; 32]),
    });
    assert!(clients.drain_expired(core_dpp::client_state::DEFAULT_TIMEOUT_SECS).is_empty());
    assert_eq!(clients.len(), 1);
  }

  #[tokio::test]
  async fn ids_stay_stable_across_removal_of_other_clients() {
    let mut clients = RelayClients::new();
    let first_id = clients.next_id();
    clients.insert(RelayClient {
      id: first_id,
      tcp: writer_half().await,
      state: ClientState::new(peer_mac(1), MacAddr([1, 0, 0, 0, 0, 1]), [0u8; 32]),
    });
    let second_id = clients.next_id();
    clients.insert(RelayClient {
      id: second_id,
      tcp: writer_half().await,
      state: ClientState::new(peer_mac(2), MacAddr([1, 0, 0, 0, 0, 1]), [0u8; 32]),
    });
    assert_ne!(first_id, second_id);
    clients.remove_by_peer_mac(peer_mac(1));
    assert!(clients.find_by_id(second_id).is_some());
    assert!(clients.find_by_id(first_id).is_none());
  }
}
