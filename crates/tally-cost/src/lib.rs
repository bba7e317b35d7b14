// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-time views over the ingested relations.
//!
//! Nothing here writes to the sink. [`SpendRollup`] sums the cost relation for
//! one day; [`CostAllocationView`] estimates per-API-key spend from the cost
//! and usage relations.

pub mod allocation;
pub mod rollup;

pub use allocation::{
    ALLOCATION_SCALE, Allocation, CostAllocationView, KeyAllocation, UNATTRIBUTED_KEY,
};
pub use rollup::SpendRollup;
