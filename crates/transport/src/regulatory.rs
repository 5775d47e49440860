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

//! The static `(opclass, channel) -> frequency` regulatory table (§4.1, §8 scenario 6), covering
//! the global operating classes a DPP bootstrap QR code is expected to name: 2.4 GHz (opclass 81),
//! and the common 5 GHz classes (115, 118, 121, 125).

/// Resolve `(opclass, channel)` to a center frequency in MHz, or `None` if this table has no
/// entry for the pair.
pub fn resolve_frequency(opclass: u8, channel: u8) -> Option<u32> {
  match opclass {
    // 2.4 GHz, 20 MHz channels 1-13.
    81 => match channel {
      1..=13 => Some(2407 + 5 * channel as u32),
      14 => Some(2484),
      _ => None,
    },
    // 5 GHz, 20 MHz channels, class 115 (36-48), 118 (52-64), 121 (100-144), 125 (149-161).
    115 | 118 | 121 | 125 => {
      if (36..=173).contains(&channel) {
        Some(5000 + 5 * channel as u32)
      } else {
        None
      }
    }
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn opclass_81_channel_11_is_2462() {
    assert_eq!(resolve_frequency(81, 11), Some(2462));
  }

  #[test]
  fn opclass_81_channel_1_is_2412() {
    assert_eq!(resolve_frequency(81, 1), Some(2412));
  }

  #[test]
  fn opclass_115_channel_36_is_5180() {
    assert_eq!(resolve_frequency(115, 36), Some(5180));
  }

  #[test]
  fn unknown_opclass_is_none() {
    assert_eq!(resolve_frequency(200, 1), None);
  }
}
