// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security policy for the Tollgate dispatch layer.
//!
//! The classification gate decides which tiers a query may legally use, and
//! the redaction helpers keep secrets out of audit previews and log output.

pub mod gate;
pub mod redact;

pub use gate::{permitted_tiers, ClassificationGate, PermittedTiers, Restriction, CLOUD_PROHIBITED_AT};
pub use redact::{preview, redact, RedactingWriter};
