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

//! The Session Registry (§4.3) and its two element types, DPP session and PKEX session (§3).
//!
//! Broadcast late-binding (design notes §9) is modeled as a tagged `PeerAddr::{Unknown, Bound}`;
//! the lookup that finds a broadcast-pending session is the same operation that mutates it,
//! so there is no separate search-then-mutate step for a concurrent caller to race against (moot
//! under the single-threaded cooperative scheduler of §5, but it keeps the invariant explicit).

use crate::engine::EngineHandle;
use base::mac::MacAddr;

/// The peer address of a session: either still broadcast-pending, or bound to a specific MAC
/// after the first unicast reply (§3 DPP/PKEX session invariants).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PeerAddr {
  Unknown,
  Bound(MacAddr),
}

impl PeerAddr {
  pub fn broadcast() -> PeerAddr {
    PeerAddr::Bound(MacAddr::BROADCAST)
  }

  pub fn is_unbound_broadcast(&self) -> bool {
    matches!(self, PeerAddr::Bound(mac) if mac.is_broadcast())
  }

  pub fn mac(&self) -> Option<MacAddr> {
    match self {
      PeerAddr::Unknown => None,
      PeerAddr::Bound(mac) => Some(*mac),
    }
  }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
  Initiator,
  Responder,
}

/// A DPP session (§3): created by an inbound Auth-Request/Chirp/PKEX completion, or by an
/// outbound initiator startup; destroyed on Config-Result terminal state or explicit
/// `dpp_free_peer`.
#[derive(Debug, Clone)]
pub struct DppSession {
  pub handle: EngineHandle,
  pub tid: Option<u8>,
  pub my_mac: MacAddr,
  pub peer_mac: PeerAddr,
  pub role: Role,
  pub mutual_auth: bool,
}

/// A PKEX session (§3). `version = None` is the degenerate bootstrap-peer-from-file session that
/// carries no crypto state, existing purely to remember MACs.
#[derive(Debug, Clone)]
pub struct PkexSession {
  pub handle: EngineHandle,
  pub my_mac: MacAddr,
  pub peer_mac: PeerAddr,
  pub version: Option<u8>,
}

/// Per-role sets of DPP and PKEX sessions (§4.3), keyed simultaneously by `(local_mac, peer_mac)`,
/// opaque handle, and transaction id.
#[derive(Default)]
pub struct SessionRegistry {
  dpp: Vec<DppSession>,
  pkex: Vec<PkexSession>,
}

impl SessionRegistry {
  pub fn new() -> SessionRegistry {
    SessionRegistry::default()
  }

  pub fn insert_dpp(&mut self, session: DppSession) {
    self.dpp.push(session);
  }

  pub fn insert_pkex(&mut self, session: PkexSession) {
    self.pkex.push(session);
  }

  /// §4.4 `by_mac`: first session whose local MAC matches; then either the peer MAC matches
  /// exactly, or the recorded peer is still broadcast, in which case it is rewritten to `peer`
  /// before returning — the late-binding rule.
  pub fn dpp_by_mac(&mut self, my: MacAddr, peer: MacAddr) -> Option<&mut DppSession> {
    self.dpp.iter_mut().find(|s| {
      if s.my_mac != my {
        return false;
      }
      match s.peer_mac {
        PeerAddr::Bound(mac) if mac == peer => true,
        PeerAddr::Bound(mac) if mac.is_broadcast() => {
          s.peer_mac = PeerAddr::Bound(peer);
          true
        }
        _ => false,
      }
    })
  }

  pub fn dpp_by_handle(&mut self, handle: EngineHandle) -> Option<&mut DppSession> {
    self.dpp.iter_mut().find(|s| s.handle == handle)
  }

  pub fn dpp_by_tid(&mut self, tid: u8) -> Option<&mut DppSession> {
    self.dpp.iter_mut().find(|s| s.tid == Some(tid))
  }

  pub fn remove_dpp_by_handle(&mut self, handle: EngineHandle) -> Option<DppSession> {
    let idx = self.dpp.iter().position(|s| s.handle == handle)?;
    Some(self.dpp.remove(idx))
  }

  /// Same late-binding lookup for PKEX sessions, additionally reporting whether this call was the
  /// one that performed the broadcast-to-unicast rewrite (mirroring the original's pre-rewrite
  /// `memcmp(broadcast)` check, §3: `pkex_update_macs` is owed exactly once, on the rewrite, not on
  /// every subsequent lookup of an already-bound session).
  pub fn pkex_by_mac(&mut self, my: MacAddr, peer: MacAddr) -> Option<(&mut PkexSession, bool)> {
    self.pkex.iter_mut().find_map(|s| {
      if s.my_mac != my {
        return None;
      }
      match s.peer_mac {
        PeerAddr::Bound(mac) if mac == peer => Some((s, false)),
        PeerAddr::Bound(mac) if mac.is_broadcast() => {
          s.peer_mac = PeerAddr::Bound(peer);
          Some((s, true))
        }
        _ => None,
      }
    })
  }

  pub fn pkex_by_handle(&mut self, handle: EngineHandle) -> Option<&mut PkexSession> {
    self.pkex.iter_mut().find(|s| s.handle == handle)
  }

  pub fn remove_pkex_by_handle(&mut self, handle: EngineHandle) -> Option<PkexSession> {
    let idx = self.pkex.iter().position(|s| s.handle == handle)?;
    Some(self.pkex.remove(idx))
  }

  pub fn dpp_sessions(&self) -> &[DppSession] {
    &self.dpp
  }

  pub fn pkex_sessions(&self) -> &[PkexSession] {
    &self.pkex
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn handle(n: u64) -> EngineHandle {
    EngineHandle(n)
  }

  #[test]
  fn late_binding_rewrites_broadcast_peer_exactly_once() {
    let mut reg = SessionRegistry::new();
    let me = MacAddr([1, 0, 0, 0, 0, 1]);
    let responder = MacAddr([2, 0, 0, 0, 0, 1]);
    reg.insert_pkex(PkexSession {
      handle: handle(1),
      my_mac: me,
      peer_mac: PeerAddr::broadcast(),
      version: None,
    });

    let (session, rebound) = reg.pkex_by_mac(me, responder).expect("session found");
    assert_eq!(session.peer_mac, PeerAddr::Bound(responder));
    assert!(rebound);

    // Subsequent lookups by the now-bound mac succeed without further rewriting.
    let (session2, rebound2) = reg.pkex_by_mac(me, responder).expect("still found");
    assert_eq!(session2.peer_mac, PeerAddr::Bound(responder));
    assert!(!rebound2);
  }

  #[test]
  fn lookup_fails_for_wrong_local_mac() {
    let mut reg = SessionRegistry::new();
    let me = MacAddr([1, 0, 0, 0, 0, 1]);
    let other_local = MacAddr([9, 9, 9, 9, 9, 9]);
    reg.insert_dpp(DppSession {
      handle: handle(1),
      tid: None,
      my_mac: me,
      peer_mac: PeerAddr::broadcast(),
      role: Role::Initiator,
      mutual_auth: false,
    });
    assert!(reg.dpp_by_mac(other_local, MacAddr([2, 0, 0, 0, 0, 2])).is_none());
  }

  #[test]
  fn by_handle_and_by_tid_exact_match() {
    let mut reg = SessionRegistry::new();
    reg.insert_dpp(DppSession {
      handle: handle(7),
      tid: Some(3),
      my_mac: MacAddr([1, 0, 0, 0, 0, 1]),
      peer_mac: PeerAddr::broadcast(),
      role: Role::Responder,
      mutual_auth: true,
    });
    assert!(reg.dpp_by_handle(handle(7)).is_some());
    assert!(reg.dpp_by_handle(handle(8)).is_none());
    assert!(reg.dpp_by_tid(3).is_some());
    assert!(reg.dpp_by_tid(4).is_none());
  }

  #[test]
  fn remove_by_handle_drops_the_session() {
    let mut reg = SessionRegistry::new();
    reg.insert_dpp(DppSession {
      handle: handle(1),
      tid: None,
      my_mac: MacAddr([1, 0, 0, 0, 0, 1]),
      peer_mac: PeerAddr::broadcast(),
      role: Role::Initiator,
      mutual_auth: false,
    });
    assert!(reg.remove_dpp_by_handle(handle(1)).is_some());
    assert!(reg.dpp_by_handle(handle(1)).is_none());
  }
}
