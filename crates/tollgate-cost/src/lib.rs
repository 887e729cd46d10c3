// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost accounting for Tollgate sessions.
//!
//! The [`CostLedger`] owns the live [`SessionCostRecord`] for the active
//! session, prices each executed query against the tier cost model, and
//! tracks savings relative to the reference tier. Persistence goes through
//! an injected `CostStore`; failed writes wait in a pending queue until the
//! next flush.
//!
//! [`SessionCostRecord`]: tollgate_core::SessionCostRecord

pub mod ledger;
pub mod pricing;
pub mod trends;

pub use ledger::CostLedger;
pub use pricing::{charge, truncate_prompt, Charge, PROMPT_PREVIEW_CHARS};
pub use trends::{cache_hit_rate, local_rate, CostTrends, DailyCost};
