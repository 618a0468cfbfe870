// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod users;
pub mod stocks;
pub mod transactions;
pub mod holdings;
pub mod gains;
pub mod importer;
pub mod exporter;
pub mod schema;
