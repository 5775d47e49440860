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

//! Diagnostics (§2.1 item 10, §7.1): every binary calls `init()` once at startup, before parsing
//! arguments fails in a way that needs to be logged. Default level is `info`; `RUST_LOG` overrides
//! per the usual `env_logger` convention.

pub fn init() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
