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

#![forbid(unsafe_op_in_unsafe_fn, unused_unsafe)]

//! On-the-wire formats shared by every endpoint role: the IEEE 802.11 management-frame envelope,
//! the DPP OUI-tagged action frame body and its TLVs, the GAS fragmentation headers, the
//! bootstrap-file line format, and the Relay/Controller TCP framing.

/// IEEE 802.11 management-frame header construction and parsing.
pub mod ieee80211;

/// DPP OUI, action-frame `field` codes, and the vendor `frame_type` enum.
pub mod oui;

/// Generic `u16le type || u16le length || value` TLV codec.
pub mod tlv;

/// GAS (Generic Advertisement Service) headers and comeback fragmentation framing.
pub mod gas;

/// The bootstrap file's one-line-per-entry text format.
pub mod bootstrap;

/// The Relay↔Controller length-prefixed TCP message framing.
pub mod relay_framing;

pub use oui::{ActionField, FrameType, DPP_OUI, DPP_WFA_SUBTYPE};
