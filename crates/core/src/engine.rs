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

//! The DPP/PKEX cryptographic engine surface (§6, §1): treated as an external collaborator. This
//! crate never implements the protocol itself (explicit Non-goal, §1); it only defines the
//! interface the Session Registry and Frame Demultiplexer call through, and the callback
//! interface the engine uses to ask the core to transmit, change channel, persist a bootstrap
//! key, or terminate.

use base::mac::MacAddr;
use thiserror::Error;

/// Opaque handle the external DPP/PKEX engine allocates; the core never interprets its value,
/// only uses it as an index into its own session tables (design notes §9).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EngineHandle(pub u64);

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("engine refused to allocate a session handle")]
  HandleAllocationFailed,
  #[error("engine rejected frame: {0}")]
  FrameRejected(String),
}

/// `dpp_create_peer` parameters (§6).
#[derive(Debug, Clone)]
pub struct DppCreateParams {
  pub bootstrap_key_b64: String,
  pub is_initiator: bool,
  pub mutual_auth: bool,
  pub mtu: usize,
}

/// The surface the external DPP engine exposes to the core (§6, first bullet list).
pub trait DppEngine {
  fn dpp_create_peer(&mut self, params: DppCreateParams) -> Result<EngineHandle, EngineError>;
  fn dpp_free_peer(&mut self, handle: EngineHandle);
  fn process_dpp_auth_frame(&mut self, bytes: &[u8], handle: EngineHandle) -> Result<(), EngineError>;
  fn process_dpp_config_frame(&mut self, field: u8, bytes: &[u8], handle: EngineHandle) -> Result<(), EngineError>;
  /// Returns the derived `(pmk, pmkid)` pair on success, per §6.
  fn process_dpp_discovery_frame(&mut self, bytes: &[u8], tid: u8) -> Result<([u8; 32], [u8; 16]), EngineError>;
  fn dpp_begin_discovery(&mut self, tid: u8) -> bool;
  fn get_dpp_discovery_tid(&mut self) -> u8;
  fn dpp_add_chirp_freq(&mut self, iface_mac: MacAddr, freq_mhz: u32);
}

/// The surface the external PKEX engine exposes to the core (§6, second bullet list).
pub trait PkexEngine {
  fn pkex_create_peer(&mut self, version: u8) -> Result<EngineHandle, EngineError>;
  fn pkex_destroy_peer(&mut self, handle: EngineHandle);
  fn process_pkex_frame(&mut self, bytes: &[u8], handle: EngineHandle) -> Result<(), EngineError>;
  fn pkex_update_macs(&mut self, handle: EngineHandle, my_mac: MacAddr, peer_mac: MacAddr);
  fn pkex_initiate(&mut self, handle: EngineHandle) -> Result<(), EngineError>;
}

/// The callbacks an engine invokes into the core (§6, third bullet list). The core implements
/// this trait and hands `&mut dyn EngineCallbacks` (or an owning value) to the engine at
/// construction time; exactly how the two sides wire together is an engine-specific detail this
/// crate does not prescribe, since the cryptographic engine itself is out of scope (§1).
pub trait EngineCallbacks {
  fn transmit_auth_frame(&mut self, handle: EngineHandle, bytes: &[u8]);
  fn transmit_config_frame(&mut self, handle: EngineHandle, field: u8, bytes: &[u8]);
  fn transmit_discovery_frame(&mut self, tid: u8, bytes: &[u8]);
  fn transmit_pkex_frame(&mut self, handle: EngineHandle, bytes: &[u8]);
  fn change_dpp_channel(&mut self, handle: EngineHandle, opclass: u8, channel: u8);
  fn change_dpp_freq(&mut self, handle: EngineHandle, freq_mhz: u32);
  fn provision_connector(&mut self, handle: EngineHandle, connector: &[u8]);
  fn save_bootstrap_key(&mut self, opclass: u8, channel: u8, peer_mac: MacAddr, spki_b64: &str);
  fn term(&mut self, handle: EngineHandle, reason_code: i32);
}
