//! # MARS: a Memory Array Redcode Simulator
//!
//! This crate executes assembled Core War warriors in a shared circular
//! core, implementing the ICWS '94 semantics for operand evaluation,
//! modifiers, and the task scheduler.
//!
//! ## Usage
//!
//! [`Mars`] owns the core, the warriors, and their task queues.  Warriors
//! are loaded at spaced positions when the simulation is constructed, and
//! executed one task per warrior per [`Mars::step`].  [`Mars::run`] drives
//! `step` until the cycle budget is exhausted or at most one warrior
//! remains.
//!
//! ```rust
//! use mars_core::{Mars, MarsOptions};
//! use redcode_asm::{assemble, Environment};
//!
//! let dwarf = assemble(
//!     ";name dwarf
//!      ORG start
//!      loop   ADD.AB #2004, start
//!      start  MOV    2,     2
//!             JMP    loop",
//!     &Environment::standard(),
//! )
//! .unwrap();
//! let imp = assemble("MOV 0, 1", &Environment::standard()).unwrap();
//!
//! let mut mars =
//!     Mars::new(MarsOptions::default(), &[dwarf, imp]).unwrap();
//! let cycles = mars.run().unwrap();
//! assert!(cycles <= MarsOptions::default().cycles);
//! ```
//!
//! ## Observing a battle
//!
//! A [`CoreObserver`] receives fine-grained [`CoreEvent`]s as instructions
//! execute: which addresses were read, written, incremented, or bombed.
//! Visualizers subscribe by supplying one through [`Mars::set_observer`];
//! the default observer discards everything.  Events are best-effort
//! reporting and never affect simulation state.
//!
//! ## Determinism
//!
//! The simulation is single-threaded and deterministic: with
//! `randomize = false`, or with a fixed `seed`, two runs over the same
//! warrior list produce identical cores and task queues cycle for cycle.

// Make clippy as annoying as possible
#![deny(
    // All typically enabled warnings are converted into errors
    // includes correctness, suspicious, style, complexity, and perf
    clippy::all,
    // Error on cargo lints
    clippy::cargo,
)]
#![warn(
    // Warn on pedantic and in-development nursery lints
    clippy::pedantic,
    clippy::nursery,
    // Lints from "restriction" group - enforce a consistent if arbitrary style
    clippy::alloc_instead_of_core,
    clippy::arithmetic_side_effects,
    clippy::unnecessary_cast,
    clippy::as_underscore,
    clippy::assertions_on_result_states,
    clippy::clone_on_ref_ptr,
    clippy::create_dir,
    clippy::dbg_macro,
    clippy::decimal_literal_representation,
    clippy::default_numeric_fallback,
    clippy::deref_by_slicing,
    clippy::empty_drop,
    clippy::empty_structs_with_brackets,
    clippy::exit,
    clippy::expect_used,
    clippy::filetype_is_file,
    clippy::float_arithmetic,
    clippy::fn_to_numeric_cast_any,
    clippy::format_push_string,
    clippy::get_unwrap,
    clippy::if_then_some_else_none,
    clippy::indexing_slicing,
    clippy::large_include_file,
    clippy::let_underscore_must_use,
    clippy::lossy_float_literal,
    clippy::map_err_ignore,
    clippy::mem_forget,
    clippy::missing_docs_in_private_items,
    clippy::missing_enforced_import_renames,
    clippy::mixed_read_write_in_expression,
    clippy::mod_module_files,
    clippy::multiple_inherent_impl,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::partial_pub_fields,
    clippy::pattern_type_mismatch,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::rc_buffer,
    clippy::rc_mutex,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::unseparated_literal_suffix,
    clippy::shadow_unrelated,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::str_to_string,
    clippy::string_slice,
    clippy::string_to_string,
    clippy::suspicious_xor_used_as_pow,
    clippy::todo,
    clippy::try_err,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unnecessary_safety_comment,
    clippy::unnecessary_safety_doc,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::unreachable,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::use_debug,
    clippy::verbose_file_reads,
)]
#![allow(clippy::needless_pass_by_value)]

/// An offset into the core, valid from 0 to `core_size - 1` inclusive.
///
/// Addresses, field values, and pointers all share this type: every number
/// stored in the core is an offset reduced modulo the core size.
pub type CoreAddr = redcode::FieldValue;

/// The circular core memory with modular addressing and limit folding
mod memory;
pub use memory::Core;

/// The observer hook and the events it receives
mod events;
pub use events::{CoreEvent, CoreObserver, NullObserver};

/// Capped FIFO queues of program counters, one per warrior
mod processes;
pub use processes::TaskQueues;

/// Operand evaluation: pointer resolution, predecrement, postincrement, and
/// register snapshots
mod operands;
pub use operands::EvaluatedOperands;

/// Logic for executing evaluated instructions against the core
mod execute;

/// The simulation itself: options, warrior loading, and the scheduler
mod mars;
pub use crate::mars::{Mars, MarsError, MarsOptions};
