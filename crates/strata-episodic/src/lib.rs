// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Episodic lifecycle pipeline for the Strata memory engine.
//!
//! Messages progress one way: `new -> episodized -> archived`. Two
//! idempotent, crash-safe jobs drive the transitions:
//!
//! - **Episodization**: groups un-episodized messages by window / cap /
//!   idle-gap and turns each closed group into an embedded episode inside
//!   one store transaction
//! - **Instancization**: archives episodes past retention into instances,
//!   flags compression candidates, and reports orphaned episodes
//!
//! [`JobScheduler`] runs both as plain timer loops; either can also be
//! triggered manually.

pub mod episodize;
pub mod grouping;
pub mod instancize;
pub mod scheduler;

pub use episodize::{EpisodizationJob, EpisodizationReport};
pub use grouping::{group_messages, GroupingPolicy};
pub use instancize::{InstancizationJob, InstancizationReport};
pub use scheduler::JobScheduler;
