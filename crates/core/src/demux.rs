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

//! The Frame Demultiplexer (§4.4): classifies inbound action frames by `(field, frame_type)` and
//! routes to the Session Registry, creating sessions gratuitously for the frame types §4.4
//! permits to do so (AUTH_REQ, CHIRP, PKEX_EXCH_{V1,}REQ). Demultiplex errors are logged and never
//! fatal (§4.4, §7(c)).

use crate::bootstrap_store;
use crate::chirp;
use crate::engine::{DppCreateParams, DppEngine, PkexEngine};
use crate::session::{DppSession, PeerAddr, PkexSession, Role, SessionRegistry};
use base::mac::MacAddr;
use protocol::oui::FrameType;
use protocol::tlv;
use protocol::ActionField;
use std::path::PathBuf;

/// Whether a discovered DPP session should be created gratuitously for this frame type, or the
/// frame should be dropped on a routing miss (§4.4, §7(c)).
fn may_create_session(frame_type: FrameType) -> bool {
  matches!(
    frame_type,
    FrameType::AuthRequest | FrameType::Chirp | FrameType::PkexExchV1Request | FrameType::PkexExchRequest
  )
}

pub struct Demultiplexer<E> {
  pub registry: SessionRegistry,
  pub engine: E,
  pub bootstrap_path: PathBuf,
  pub our_ssid: Option<String>,
  pub mtu: usize,
  discovered: bool,
  pkex_version: u8,
}

impl<E: DppEngine + PkexEngine> Demultiplexer<E> {
  pub fn new(engine: E, bootstrap_path: PathBuf, our_ssid: Option<String>, mtu: usize, pkex_version: u8) -> Self {
    Demultiplexer {
      registry: SessionRegistry::new(),
      engine,
      bootstrap_path,
      our_ssid,
      mtu,
      discovered: false,
      pkex_version,
    }
  }

  /// Dispatch one already-filtered inbound frame (§4.1's adapter has already dropped frames this
  /// daemon itself sent, and unicast frames not addressed to a local interface).
  pub fn handle_frame(&mut self, my_mac: MacAddr, src: MacAddr, field: ActionField, payload: &[u8]) {
    match field {
      ActionField::Vendor => self.handle_vendor(my_mac, src, payload),
      ActionField::GasInitialRequest
      | ActionField::GasInitialResponse
      | ActionField::GasComebackRequest
      | ActionField::GasComebackResponse => self.handle_gas(my_mac, src, field, payload),
      ActionField::Other(code) => {
        log::debug!("demux: dropping action frame with unsupported field 0x{code:02x}");
      }
    }
  }

  /// The beacon row of §4.4's table: if not-yet-discovered and the SSID matches, create a
  /// discovery session and kick off `dpp_begin_discovery`.
  pub fn handle_beacon(&mut self, my_mac: MacAddr, ssid: &str) {
    if self.discovered {
      return;
    }
    let Some(want) = &self.our_ssid else {
      return;
    };
    if want != ssid {
      return;
    }
    let tid = self.engine.get_dpp_discovery_tid();
    match self.create_or_reuse_discovery_session(my_mac, MacAddr::BROADCAST, tid, true) {
      Ok(_) => {
        self.discovered = self.engine.dpp_begin_discovery(tid);
      }
      Err(e) => log::warn!("demux: failed to begin discovery: {e}"),
    }
  }

  fn handle_vendor(&mut self, my_mac: MacAddr, src: MacAddr, payload: &[u8]) {
    let Some((&frame_type_byte, attrs)) = payload.split_first() else {
      log::debug!("demux: vendor frame shorter than frame_type byte, dropping");
      return;
    };
    let Some(frame_type) = FrameType::from_byte(frame_type_byte) else {
      log::debug!("demux: unknown DPP frame_type {frame_type_byte}, dropping");
      return;
    };

    match frame_type {
      FrameType::AuthRequest => self.route_or_create_auth(my_mac, src, attrs),
      FrameType::AuthResponse | FrameType::AuthConfirm => self.route_dpp_auth(my_mac, src, attrs, frame_type),
      FrameType::PeerDiscoveryRequest => self.route_or_create_discovery(my_mac, src, attrs),
      FrameType::PeerDiscoveryResponse => self.route_discovery_response(my_mac, src, attrs),
      FrameType::ConfigurationResult => self.route_config_result(my_mac, src, attrs),
      FrameType::PkexExchV1Request => self.create_pkex_and_route(my_mac, src, attrs, 1),
      FrameType::PkexExchRequest => self.create_pkex_and_route(my_mac, src, attrs, self.pkex_version),
      FrameType::PkexExchResponse
      | FrameType::PkexCommitRevealRequest
      | FrameType::PkexCommitRevealResponse => self.route_pkex(my_mac, src, attrs),
      FrameType::Chirp => self.handle_chirp(my_mac, src, attrs),
    }
  }

  fn route_dpp_auth(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8], frame_type: FrameType) {
    let Some(session) = self.registry.dpp_by_mac(my_mac, src) else {
      log::info!("demux: no session for {frame_type:?} from {src}, dropping (no gratuitous create)");
      return;
    };
    if let Err(e) = self.engine.process_dpp_auth_frame(attrs, session.handle) {
      log::warn!("demux: engine rejected {frame_type:?}: {e}");
      let handle = session.handle;
      self.registry.remove_dpp_by_handle(handle);
      self.engine.dpp_free_peer(handle);
    }
  }

  fn route_or_create_auth(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8]) {
    if self.registry.dpp_by_mac(my_mac, src).is_some() {
      self.route_dpp_auth(my_mac, src, attrs, FrameType::AuthRequest);
      return;
    }
    if !may_create_session(FrameType::AuthRequest) {
      return;
    }
    let bskey = tlv::bootstrap_key_hash(attrs)
      .map(|h| hex::encode(h))
      .unwrap_or_default();
    match self.engine.dpp_create_peer(DppCreateParams {
      bootstrap_key_b64: bskey,
      is_initiator: false,
      mutual_auth: false,
      mtu: self.mtu,
    }) {
      Ok(handle) => {
        self.registry.insert_dpp(DppSession {
          handle,
          tid: None,
          my_mac,
          peer_mac: PeerAddr::Bound(src),
          role: Role::Responder,
          mutual_auth: false,
        });
        if let Err(e) = self.engine.process_dpp_auth_frame(attrs, handle) {
          log::warn!("demux: engine rejected gratuitous AUTH_REQ: {e}");
          self.registry.remove_dpp_by_handle(handle);
          self.engine.dpp_free_peer(handle);
        }
      }
      Err(e) => log::warn!("demux: could not allocate DPP session for AUTH_REQ: {e}"),
    }
  }

  /// Design notes §9, open question: on Linux the original reuses an existing discovery session
  /// rather than always creating a new one (the FreeBSD behavior); this implementation follows
  /// the Linux behavior as canonical regardless of target platform.
  fn create_or_reuse_discovery_session(
    &mut self,
    my_mac: MacAddr,
    peer: MacAddr,
    tid: u8,
    is_initiator: bool,
  ) -> Result<&mut DppSession, String> {
    if self.registry.dpp_by_tid(tid).is_some() {
      return Ok(self.registry.dpp_by_tid(tid).expect("just checked"));
    }
    let handle = self
      .engine
      .dpp_create_peer(DppCreateParams {
        bootstrap_key_b64: String::new(),
        is_initiator,
        mutual_auth: false,
        mtu: self.mtu,
      })
      .map_err(|e| e.to_string())?;
    self.registry.insert_dpp(DppSession {
      handle,
      tid: Some(tid),
      my_mac,
      peer_mac: PeerAddr::Bound(peer),
      role: if is_initiator { Role::Initiator } else { Role::Responder },
      mutual_auth: false,
    });
    Ok(self.registry.dpp_by_tid(tid).expect("just inserted"))
  }

  fn route_or_create_discovery(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8]) {
    let tid = self.engine.get_dpp_discovery_tid();
    if let Err(e) = self.create_or_reuse_discovery_session(my_mac, src, tid, false) {
      log::warn!("demux: could not create discovery session: {e}");
      return;
    }
    match self.engine.process_dpp_discovery_frame(attrs, tid) {
      Ok((_pmk, _pmkid)) => self.discovered = true,
      Err(e) => log::warn!("demux: discovery frame rejected: {e}"),
    }
  }

  fn route_discovery_response(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8]) {
    let Some(session) = self.registry.dpp_by_mac(my_mac, src) else {
      log::info!("demux: no discovery session for response from {src}, dropping");
      return;
    };
    let Some(tid) = session.tid else {
      log::warn!("demux: discovery response routed to a session with no tid");
      return;
    };
    match self.engine.process_dpp_discovery_frame(attrs, tid) {
      Ok(_) => {}
      Err(e) => log::warn!("demux: discovery response rejected: {e}"),
    }
  }

  fn route_config_result(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8]) {
    let Some(session) = self.registry.dpp_by_mac(my_mac, src) else {
      log::info!("demux: no session for CONFIG_RESULT from {src}, dropping");
      return;
    };
    let handle = session.handle;
    if let Err(e) = self.engine.process_dpp_config_frame(FrameType::ConfigurationResult as u8, attrs, handle) {
      log::warn!("demux: CONFIG_RESULT rejected: {e}");
    }
    // Terminal state per §3 DPP session lifecycle: the session is torn down regardless of the
    // engine's verdict, since CONFIG_RESULT is always the last frame of the Configuration
    // exchange.
    self.registry.remove_dpp_by_handle(handle);
    self.engine.dpp_free_peer(handle);
  }

  fn create_pkex_and_route(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8], version: u8) {
    let handle = match self.engine.pkex_create_peer(version) {
      Ok(h) => h,
      Err(e) => {
        log::warn!("demux: could not allocate PKEX session: {e}");
        return;
      }
    };
    self.registry.insert_pkex(PkexSession {
      handle,
      my_mac,
      peer_mac: PeerAddr::Bound(src),
      version: Some(version),
    });
    self.engine.pkex_update_macs(handle, my_mac, src);
    if let Err(e) = self.engine.process_pkex_frame(attrs, handle) {
      log::warn!("demux: engine rejected PKEX exchange request: {e}");
      self.registry.remove_pkex_by_handle(handle);
      self.engine.pkex_destroy_peer(handle);
    }
  }

  fn route_pkex(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8]) {
    let Some((session, rebound)) = self.registry.pkex_by_mac(my_mac, src) else {
      log::info!("demux: no PKEX session for frame from {src}, dropping");
      return;
    };
    let handle = session.handle;
    if rebound {
      self.engine.pkex_update_macs(handle, my_mac, src);
    }
    if let Err(e) = self.engine.process_pkex_frame(attrs, handle) {
      log::warn!("demux: PKEX frame rejected: {e}");
    }
  }

  fn handle_chirp(&mut self, my_mac: MacAddr, src: MacAddr, attrs: &[u8]) {
    let Some(hash) = tlv::bootstrap_key_hash(attrs) else {
      log::debug!("demux: chirp carried no bootstrap-key-hash TLV, dropping");
      return;
    };
    // §9 chirp idempotence: delegate to the ordinary by-mac lookup before creating a session, so
    // two identical chirps against a still-alive session collapse to one instead of piling up.
    if self.registry.dpp_by_mac(my_mac, src).is_some() {
      log::debug!("demux: chirp from {src} matches an already-live session, ignoring");
      return;
    }
    match chirp::resolve(&self.bootstrap_path, &hash) {
      Ok(Some(entry)) => match self.engine.dpp_create_peer(DppCreateParams {
        bootstrap_key_b64: entry.spki_b64,
        is_initiator: true,
        mutual_auth: false,
        mtu: self.mtu,
      }) {
        Ok(handle) => self.registry.insert_dpp(DppSession {
          handle,
          tid: None,
          my_mac,
          peer_mac: PeerAddr::Bound(src),
          role: Role::Initiator,
          mutual_auth: false,
        }),
        Err(e) => log::warn!("demux: could not create initiator session for chirp match: {e}"),
      },
      Ok(None) => log::info!("demux: chirp from {src} matched no bootstrap entry"),
      Err(e) => log::warn!("demux: bootstrap store scan failed: {e}"),
    }
  }

  fn handle_gas(&mut self, my_mac: MacAddr, src: MacAddr, field: ActionField, payload: &[u8]) {
    let Some(session) = self.registry.dpp_by_mac(my_mac, src) else {
      log::info!("demux: no session for GAS frame from {src}, dropping");
      return;
    };
    let handle = session.handle;
    if let Err(e) = self.engine.process_dpp_config_frame(field.into(), payload, handle) {
      log::warn!("demux: GAS/Configuration frame rejected: {e}");
    }
  }
}

/// Extract the SSID information element (tag 0) from a raw beacon body, for the §4.4 beacon row.
/// This is deliberately not part of `protocol::ieee80211`: it is the one piece of beacon-body
/// parsing this daemon's own logic needs, not a general information-element codec.
pub fn beacon_ssid(body: &[u8]) -> Option<&str> {
  const FIXED_PARAMS_LEN: usize = 12; // timestamp(8) + beacon interval(2) + capability(2)
  if body.len() < FIXED_PARAMS_LEN {
    return None;
  }
  let mut rest = &body[FIXED_PARAMS_LEN..];
  while rest.len() >= 2 {
    let tag = rest[0];
    let len = rest[1] as usize;
    if rest.len() < 2 + len {
      return None;
    }
    let value = &rest[2..2 + len];
    if tag == 0 {
      return std::str::from_utf8(value).ok();
    }
    rest = &rest[2 + len..];
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::PkexSession;
  use crate::testing::StubEngine;

  fn demux() -> Demultiplexer<StubEngine> {
    Demultiplexer::new(StubEngine::new(), PathBuf::new(), None, 1400, 1)
  }

  /// §3: a PKEX session parked on a still-broadcast peer is owed exactly one
  /// `pkex_update_macs` call, fired on the frame that rewrites it to the sender's concrete
  /// MAC, not on every frame that subsequently arrives from that now-bound peer.
  #[test]
  fn route_pkex_updates_macs_exactly_once_on_rebind() {
    let mut d = demux();
    let me = MacAddr([1, 0, 0, 0, 0, 1]);
    let peer = MacAddr([2, 0, 0, 0, 0, 1]);
    let handle = d.engine.pkex_create_peer(1).unwrap();
    d.registry.insert_pkex(PkexSession {
      handle,
      my_mac: me,
      peer_mac: PeerAddr::broadcast(),
      version: Some(1),
    });

    d.route_pkex(me, peer, &[]);
    assert_eq!(d.engine.pkex_update_macs_calls, vec![(handle, me, peer)]);

    d.route_pkex(me, peer, &[]);
    assert_eq!(d.engine.pkex_update_macs_calls.len(), 1, "no further rebind for an already-bound peer");
  }

  /// §8 "Chirp idempotence": two identical chirps against a bootstrap entry that still has a
  /// live session for the chirping peer collapse to that one session, per §9's resolved decision
  /// to delegate to the ordinary by-mac lookup rather than track chirps separately.
  #[test]
  fn identical_chirps_against_a_live_session_do_not_duplicate() {
    use base::sha::chirp_hash;
    let path = std::env::temp_dir().join(format!("dpp-demux-chirp-test-{}.txt", std::process::id()));
    let der = vec![1u8, 2, 3, 4, 5];
    let b64 = base::b64::encode(&der);
    bootstrap_store::append(&path, 81, 6, MacAddr([9, 9, 9, 9, 9, 9]), &b64).unwrap();
    let hash = chirp_hash(&der);

    let mut d = Demultiplexer::new(StubEngine::new(), path.clone(), None, 1400, 1);
    let me = MacAddr([1, 0, 0, 0, 0, 1]);
    let peer = MacAddr([2, 0, 0, 0, 0, 1]);
    let mut attrs = Vec::new();
    tlv::encode(&mut attrs, tlv::ATTR_BOOTSTRAPPING_KEY_HASH, &hash);

    d.handle_chirp(me, peer, &attrs);
    assert_eq!(d.registry.dpp_sessions().len(), 1);

    d.handle_chirp(me, peer, &attrs);
    assert_eq!(d.registry.dpp_sessions().len(), 1, "second identical chirp must not create another session");

    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn beacon_ssid_extracts_tag_zero() {
    let mut body = vec![0u8; 12];
    body.push(0); // tag SSID
    body.push(4); // length
    body.extend_from_slice(b"test");
    assert_eq!(beacon_ssid(&body), Some("test"));
  }

  #[test]
  fn beacon_ssid_none_when_absent() {
    let body = vec![0u8; 12];
    assert_eq!(beacon_ssid(&body), None);
  }
}
