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

//! 802.11u Generic Advertisement Service headers, and the comeback-fragmentation framing the
//! Configuration protocol rides over. Only the Relay and Controller roles produce fragmented
//! responses (§4.5); the Client reassembles implicitly by driving the GAS request/response
//! dialogue, so this module's encode/decode pair is shared by both directions.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Per-action-frame payload budget for BPF-based transports (FreeBSD loopback/radio).
pub const MTU_BPF: usize = 1300;
/// Per-action-frame payload budget for nl80211-based transports (Linux radio).
pub const MTU_NL80211: usize = 1400;

/// `fragment_id` is 7 bits wide (the high bit is the more-fragments flag), so a Configuration
/// payload can span at most 127 fragments before the id would wrap.
pub const MAX_FRAGMENTS: usize = 127;

pub fn max_payload_len(mtu: usize) -> usize {
  MAX_FRAGMENTS * mtu
}

const MORE_FRAGMENTS_BIT: u8 = 0x80;

#[derive(Debug, Error)]
pub enum GasError {
  #[error("GAS body truncated")]
  Truncated,
  #[error("configuration payload of {0} bytes exceeds the {1}-fragment cap for MTU {2}")]
  PayloadTooLarge(usize, usize, usize),
}

/// Fields recorded off the initiating GAS Initial Request, carried forward into every response
/// in the same fragmentation sequence.
#[derive(Debug, Clone)]
pub struct GasHeader {
  pub dialog_token: u8,
  pub status_code: u16,
  pub advertisement_protocol: Vec<u8>,
}

/// A received GAS Initial Request, as far as this daemon needs to parse it: header plus opaque
/// query-request bytes (the Configuration-protocol request, handed to the external DPP engine
/// unparsed).
#[derive(Debug, Clone)]
pub struct GasInitialRequest {
  pub dialog_token: u8,
  pub advertisement_protocol: Vec<u8>,
  pub query_request: Vec<u8>,
}

pub fn parse_gas_initial_request(body: &[u8]) -> Result<GasInitialRequest, GasError> {
  if body.len() < 1 + 2 {
    return Err(GasError::Truncated);
  }
  let dialog_token = body[0];
  let ap_len = body[1] as usize;
  let mut off = 2;
  if body.len() < off + ap_len + 2 {
    return Err(GasError::Truncated);
  }
  let advertisement_protocol = body[off..off + ap_len].to_vec();
  off += ap_len;
  let qr_len = LittleEndian::read_u16(&body[off..off + 2]) as usize;
  off += 2;
  if body.len() < off + qr_len {
    return Err(GasError::Truncated);
  }
  Ok(GasInitialRequest {
    dialog_token,
    advertisement_protocol,
    query_request: body[off..off + qr_len].to_vec(),
  })
}

/// Build a GAS Initial Response carrying the full (unfragmented) Configuration payload.
pub fn build_gas_initial_response(header: &GasHeader, comeback_delay: u16, query_resp: &[u8]) -> Vec<u8> {
  build_initial_response_raw(header, comeback_delay, query_resp)
}

/// Build a GAS Initial Response that defers the payload to Comeback Responses: `comeback_delay =
/// 1`, `query_resplen = 0`, per §4.5 step 1.
pub fn build_gas_initial_response_deferred(header: &GasHeader) -> Vec<u8> {
  build_initial_response_raw(header, 1, &[])
}

fn build_initial_response_raw(header: &GasHeader, comeback_delay: u16, query_resp: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(7 + header.advertisement_protocol.len() + query_resp.len());
  out.push(header.dialog_token);
  let mut status = [0u8; 2];
  LittleEndian::write_u16(&mut status, header.status_code);
  out.extend_from_slice(&status);
  let mut delay = [0u8; 2];
  LittleEndian::write_u16(&mut delay, comeback_delay);
  out.extend_from_slice(&delay);
  out.push(header.advertisement_protocol.len() as u8);
  out.extend_from_slice(&header.advertisement_protocol);
  let mut resp_len = [0u8; 2];
  LittleEndian::write_u16(&mut resp_len, query_resp.len() as u16);
  out.extend_from_slice(&resp_len);
  out.extend_from_slice(query_resp);
  out
}

/// A received GAS Initial Response, parsed generically enough to cover both the deferred form
/// (`query_resplen = 0`, `comeback_delay = 1`) and a non-deferred form carrying the full
/// Configuration payload in one frame. The Relay reads the Controller's wired representation of
/// an Initial Response this way, regardless of which form the Controller chose to send (§4.5).
#[derive(Debug, Clone)]
pub struct GasInitialResponseBody {
  pub header: GasHeader,
  pub comeback_delay: u16,
  pub query_resp: Vec<u8>,
}

pub fn parse_gas_initial_response(body: &[u8]) -> Result<GasInitialResponseBody, GasError> {
  if body.len() < 6 {
    return Err(GasError::Truncated);
  }
  let dialog_token = body[0];
  let status_code = LittleEndian::read_u16(&body[1..3]);
  let comeback_delay = LittleEndian::read_u16(&body[3..5]);
  let ap_len = body[5] as usize;
  let mut off = 6;
  if body.len() < off + ap_len + 2 {
    return Err(GasError::Truncated);
  }
  let advertisement_protocol = body[off..off + ap_len].to_vec();
  off += ap_len;
  let resp_len = LittleEndian::read_u16(&body[off..off + 2]) as usize;
  off += 2;
  if body.len() < off + resp_len {
    return Err(GasError::Truncated);
  }
  Ok(GasInitialResponseBody {
    header: GasHeader {
      dialog_token,
      status_code,
      advertisement_protocol,
    },
    comeback_delay,
    query_resp: body[off..off + resp_len].to_vec(),
  })
}

#[derive(Debug, Clone, Copy)]
pub struct GasComebackRequest {
  pub dialog_token: u8,
}

pub fn parse_gas_comeback_request(body: &[u8]) -> Result<GasComebackRequest, GasError> {
  if body.is_empty() {
    return Err(GasError::Truncated);
  }
  Ok(GasComebackRequest {
    dialog_token: body[0],
  })
}

/// Build a single Comeback Response fragment.
///
/// `fragment_index` counts down from the last fragment (`frag_left / mtu` at call time, per
/// §4.5 step 2); `more_fragments` sets the high bit.
pub fn build_gas_comeback_response(
  header: &GasHeader,
  fragment_index: u8,
  more_fragments: bool,
  comeback_delay: u16,
  chunk: &[u8],
) -> Vec<u8> {
  let mut out = Vec::with_capacity(8 + header.advertisement_protocol.len() + chunk.len());
  out.push(header.dialog_token);
  let mut status = [0u8; 2];
  LittleEndian::write_u16(&mut status, header.status_code);
  out.extend_from_slice(&status);
  let mut delay = [0u8; 2];
  LittleEndian::write_u16(&mut delay, comeback_delay);
  out.extend_from_slice(&delay);
  let fragment_byte = (fragment_index & 0x7f) | if more_fragments { MORE_FRAGMENTS_BIT } else { 0 };
  out.push(fragment_byte);
  out.push(header.advertisement_protocol.len() as u8);
  out.extend_from_slice(&header.advertisement_protocol);
  let mut resp_len = [0u8; 2];
  LittleEndian::write_u16(&mut resp_len, chunk.len() as u16);
  out.extend_from_slice(&resp_len);
  out.extend_from_slice(chunk);
  out
}

#[derive(Debug, Clone)]
pub struct GasComebackResponse {
  pub dialog_token: u8,
  pub status_code: u16,
  pub comeback_delay: u16,
  pub fragment_index: u8,
  pub more_fragments: bool,
  pub advertisement_protocol: Vec<u8>,
  pub query_resp: Vec<u8>,
}

pub fn parse_gas_comeback_response(body: &[u8]) -> Result<GasComebackResponse, GasError> {
  if body.len() < 7 {
    return Err(GasError::Truncated);
  }
  let dialog_token = body[0];
  let status_code = LittleEndian::read_u16(&body[1..3]);
  let comeback_delay = LittleEndian::read_u16(&body[3..5]);
  let fragment_byte = body[5];
  let ap_len = body[6] as usize;
  let mut off = 7;
  if body.len() < off + ap_len + 2 {
    return Err(GasError::Truncated);
  }
  let advertisement_protocol = body[off..off + ap_len].to_vec();
  off += ap_len;
  let resp_len = LittleEndian::read_u16(&body[off..off + 2]) as usize;
  off += 2;
  if body.len() < off + resp_len {
    return Err(GasError::Truncated);
  }
  Ok(GasComebackResponse {
    dialog_token,
    status_code,
    comeback_delay,
    fragment_index: fragment_byte & 0x7f,
    more_fragments: fragment_byte & MORE_FRAGMENTS_BIT != 0,
    advertisement_protocol,
    query_resp: body[off..off + resp_len].to_vec(),
  })
}

/// Split `payload` into MTU-sized chunks in the order the Comeback Response chain must deliver
/// them (largest `fragment_index` first, `0` last), after checking the §4.5 size cap.
pub fn plan_fragments(payload: &[u8], mtu: usize) -> Result<Vec<(u8, bool, &[u8])>, GasError> {
  if payload.len() > max_payload_len(mtu) {
    return Err(GasError::PayloadTooLarge(
      payload.len(),
      MAX_FRAGMENTS,
      mtu,
    ));
  }
  let mut chunks: Vec<&[u8]> = payload.chunks(mtu).collect();
  if chunks.is_empty() {
    chunks.push(&[]);
  }
  let total = chunks.len();
  Ok(
    chunks
      .into_iter()
      .enumerate()
      .map(|(i, chunk)| {
        let remaining_after = total - i - 1;
        (remaining_after as u8, remaining_after > 0, chunk)
      })
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn header() -> GasHeader {
    GasHeader {
      dialog_token: 7,
      status_code: 0,
      advertisement_protocol: vec![0x7f, 0x6a],
    }
  }

  #[test]
  fn initial_response_deferred_has_zero_len_and_delay_one() {
    let body = build_gas_initial_response_deferred(&header());
    assert_eq!(body[0], 7); // dialog token
    let delay = LittleEndian::read_u16(&body[3..5]);
    assert_eq!(delay, 1);
  }

  #[test]
  fn initial_response_non_deferred_round_trips_full_payload() {
    let body = build_gas_initial_response(&header(), 0, b"the whole configuration payload");
    let parsed = parse_gas_initial_response(&body).unwrap();
    assert_eq!(parsed.comeback_delay, 0);
    assert_eq!(parsed.query_resp, b"the whole configuration payload");
    assert_eq!(parsed.header.advertisement_protocol, header().advertisement_protocol);
  }

  #[test]
  fn initial_response_deferred_parses_as_empty_query_resp() {
    let body = build_gas_initial_response_deferred(&header());
    let parsed = parse_gas_initial_response(&body).unwrap();
    assert_eq!(parsed.comeback_delay, 1);
    assert!(parsed.query_resp.is_empty());
  }

  #[test]
  fn initial_response_exactly_at_ap_len_boundary_is_truncated_not_a_panic() {
    let body = [0u8; 6]; // ap_len byte present, nothing past it
    assert!(matches!(parse_gas_initial_response(&body), Err(GasError::Truncated)));
    let short = [0u8; 5]; // one byte short of the ap_len byte itself
    assert!(matches!(parse_gas_initial_response(&short), Err(GasError::Truncated)));
  }

  #[test]
  fn comeback_request_roundtrip() {
    let req = parse_gas_comeback_request(&[42]).unwrap();
    assert_eq!(req.dialog_token, 42);
  }

  #[test]
  fn comeback_response_round_trip_preserves_fragment_bits() {
    let body = build_gas_comeback_response(&header(), 3, true, 0, b"hello");
    let parsed = parse_gas_comeback_response(&body).unwrap();
    assert_eq!(parsed.fragment_index, 3);
    assert!(parsed.more_fragments);
    assert_eq!(parsed.query_resp, b"hello");
    assert_eq!(parsed.advertisement_protocol, header().advertisement_protocol);
  }

  #[test]
  fn comeback_response_last_fragment_clears_more_bit() {
    let body = build_gas_comeback_response(&header(), 0, false, 0, b"tail");
    let parsed = parse_gas_comeback_response(&body).unwrap();
    assert_eq!(parsed.fragment_index, 0);
    assert!(!parsed.more_fragments);
  }

  #[test]
  fn comeback_response_exactly_at_ap_len_boundary_is_truncated_not_a_panic() {
    let body = [0u8; 7]; // ap_len byte present, nothing past it
    assert!(matches!(parse_gas_comeback_response(&body), Err(GasError::Truncated)));
    let short = [0u8; 6]; // one byte short of the ap_len byte itself
    assert!(matches!(parse_gas_comeback_response(&short), Err(GasError::Truncated)));
  }

  #[test]
  fn plan_fragments_orders_descending_then_zero() {
    let payload = vec![0u8; 2 * MTU_NL80211 + 37];
    let plan = plan_fragments(&payload, MTU_NL80211).unwrap();
    let ids: Vec<u8> = plan.iter().map(|(id, _, _)| *id).collect();
    assert_eq!(ids, vec![2, 1, 0]);
    assert!(plan[0].1 && plan[1].1 && !plan[2].1);
  }

  #[test]
  fn plan_fragments_rejects_oversized_payload() {
    let payload = vec![0u8; max_payload_len(MTU_NL80211) + 1];
    assert!(matches!(
      plan_fragments(&payload, MTU_NL80211),
      Err(GasError::PayloadTooLarge(..))
    ));
  }

  #[test]
  fn fragmentation_law_concatenation_reproduces_payload() {
    let payload: Vec<u8> = (0..(3 * MTU_BPF + 123)).map(|i| (i % 251) as u8).collect();
    let plan = plan_fragments(&payload, MTU_BPF).unwrap();
    let mut reassembled = Vec::new();
    for (_, _, chunk) in &plan {
      reassembled.extend_from_slice(chunk);
    }
    assert_eq!(reassembled, payload);
  }
}
