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

//! Shared pieces of the three role binaries (`sss`, `relay`, `controller`): the typed `Config`
//! every role's CLI args convert into, logging setup, and the relay client-state bookkeeping the
//! Relay and Controller binaries both need.

pub mod config;
pub mod logging;
pub mod relay_clients;

pub use config::{Config, EnrolleeRole};
