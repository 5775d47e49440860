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

//! The Interface data model (§3): owned exclusively by the daemon, created at startup, alive for
//! process lifetime.

use base::mac::MacAddr;
use transport::Capabilities;

/// One L2 endpoint the daemon bridges frames through. `loopback` interfaces get a random MAC
/// (§3) since there is no NIC to borrow an address from; real-radio interfaces report driver
/// capabilities queried at bind time.
#[derive(Debug, Clone)]
pub struct Interface {
  pub name: String,
  pub mac: MacAddr,
  pub loopback: bool,
  pub capabilities: Capabilities,
}

impl Interface {
  pub fn new_loopback(name: impl Into<String>) -> Interface {
    Interface {
      name: name.into(),
      mac: MacAddr::random_local(),
      loopback: true,
      capabilities: Capabilities::default(),
    }
  }

  pub fn new_radio(name: impl Into<String>, mac: MacAddr, capabilities: Capabilities) -> Interface {
    Interface {
      name: name.into(),
      mac,
      loopback: false,
      capabilities,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn loopback_interface_gets_a_random_locally_administered_mac() {
    let iface = Interface::new_loopback("lo");
    assert!(iface.loopback);
    assert_eq!(iface.mac.as_bytes()[0] & 0x02, 0x02);
  }
}
