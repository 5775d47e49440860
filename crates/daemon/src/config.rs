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

//! Config & CLI (§2.1 item 9, §6): the typed form of the flag set every binary in this workspace
//! parses a subset of. Each `src/bin/*.rs` defines its own `clap::Parser` struct carrying only the
//! flags relevant to its role, then converts it into this shared `Config` and validates
//! cross-field constraints before handing it to `core_dpp::endpoint::Endpoint::new`.

use base::mac::MacAddr;
use core_dpp::error::DaemonError;
use std::path::PathBuf;

/// `-e` enrollee sub-role; absent entirely for a Configurator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EnrolleeRole {
  Sta,
  Ap,
}

impl std::str::FromStr for EnrolleeRole {
  type Err = String;

  fn from_str(s: &str) -> Result<EnrolleeRole, String> {
    match s {
      "sta" => Ok(EnrolleeRole::Sta),
      "ap" => Ok(EnrolleeRole::Ap),
      other => Err(format!("unknown enrollee role {other:?}, expected \"sta\" or \"ap\"")),
    }
  }
}

/// Typed form of the full §6 flag set (§3.1 "Config"). Individual binaries populate only the
/// fields their role uses; the rest stay at their defaults.
#[derive(Debug, Clone)]
pub struct Config {
  /// `-I`
  pub iface: String,
  /// `-B`
  pub bootstrap_file: PathBuf,
  /// `-k`
  pub keyfile: Option<PathBuf>,
  /// `-c`: configurator sign-key, absent for an Enrollee.
  pub sign_key: Option<PathBuf>,
  /// `-e`: absent for a Configurator.
  pub enrollee_role: Option<EnrolleeRole>,
  /// `-i`/`-r`
  pub is_initiator: bool,
  /// `-a`: `false` (mutual auth on) unless passed.
  pub mutual_auth: bool,
  /// `-p`
  pub password: Option<String>,
  /// `-n`
  pub identifier: Option<String>,
  /// `-x`
  pub key_index: Option<u32>,
  /// `-m`
  pub peer_mac: Option<MacAddr>,
  /// `-g`
  pub opclass: u8,
  /// `-f`
  pub channel: u8,
  /// `-t`
  pub chirp: bool,
  /// `-q`
  pub quit_at_fin: bool,
  /// `-C`: dial address for the Relay, listen address for the Controller.
  pub controller_addr: Option<String>,
  /// `-v`
  pub dpp_version: u8,
}

impl Config {
  /// Cross-field validation beyond what `clap` can express (§2.1 item 9). Failures become the
  /// `Configuration` bucket of §7 and exit the process with code 1 (§6).
  pub fn validate(&self) -> Result<(), DaemonError> {
    if transport::regulatory::resolve_frequency(self.opclass, self.channel).is_none() {
      return Err(DaemonError::Config(format!(
        "opclass {} channel {} does not resolve to a known frequency",
        self.opclass, self.channel
      )));
    }
    if self.sign_key.is_some() && self.enrollee_role.is_some() {
      return Err(DaemonError::Config(
        "-c (configurator sign-key) and -e (enrollee role) are mutually exclusive".into(),
      ));
    }
    Ok(())
  }
}

/// Default opclass/channel (§8 scenario 6: opclass 81 channel 11, 2.4 GHz channel 11).
pub const DEFAULT_OPCLASS: u8 = 81;
pub const DEFAULT_CHANNEL: u8 = 11;
/// Default DPP version this daemon speaks absent `-v`.
pub const DEFAULT_DPP_VERSION: u8 = 2;
/// Default PKEX version offered for `PKEX_EXCH_REQ` absent a negotiated value.
pub const DEFAULT_PKEX_VERSION: u8 = 2;
