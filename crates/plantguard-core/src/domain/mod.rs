//! Domain entities for PlantGuard.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code has no imports from serial
//! drivers, network libraries or async runtimes, so it can be compiled and
//! tested anywhere without hardware attached.
//!
//! The bridge, relay and peer crates depend on these types; the types never
//! depend on them.

/// Commands sent from peers to the microcontroller.
pub mod command;

/// Serial port descriptors and the heuristic that picks the target board.
pub mod device;

/// Sensor readings decoded from serial frames.
pub mod reading;

/// Presentation tiers for readings (threshold bands).
pub mod tier;
