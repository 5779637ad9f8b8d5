// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Station occupancy.

/// Bikes available as a percentage of total station capacity.
///
/// Capacity is `bikes + slots`. A station with no capacity at all reports
/// `0.0` instead of a non-finite value, so it classifies as empty.
#[must_use]
pub fn fill_percentage(bikes: u32, slots: u32) -> f64 {
    if bikes == 0 && slots == 0 {
        return 0.0;
    }

    100.0 * f64::from(bikes) / (f64::from(bikes) + f64::from(slots))
}
