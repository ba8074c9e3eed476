/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! # Scope analysis
//!
//! Binding resolution and storage allocation for an ECMAScript front
//! end: takes the scope tree the parser built, binds every identifier
//! reference to a variable, classifies each variable's storage (stack
//! slot, context slot, parameter, module cell or dynamic lookup) and
//! emits per-scope allocation plans for the code generator.
//!
//! ## Architecture
//!
//! ```text
//! Parser (external)
//!     │ scopes, declarations, unresolved references
//!     ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  Scope tree (scope.rs)                              │
//! │  Declaration rules, eval/with recording,            │
//! │  snapshot/reparent, block elision                   │
//! └──────────────────────┬──────────────────────────────┘
//!                        │ analyze()
//!                        ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  Resolver (scope/resolve.rs)       top-down         │
//! │  Allocator (scope/allocate.rs)     bottom-up        │
//! └──────────────────────┬──────────────────────────────┘
//!                        │ locations, slot counts
//!                        ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  Serialized records (scope_info.rs)                 │
//! │  Ride on runtime contexts (context.rs); reopened by │
//! │  the deserializer (scope/deserialize.rs) for lazy   │
//! │  compilation of inner functions                     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module overview
//!
//! - `interner.rs` — interned identifier names (`Name` handles)
//! - `ast.rs` — the AST slice the analysis consumes (references,
//!   declarations)
//! - `variable.rs` — variables and the per-scope name map
//! - `scope.rs` — the scope tree and its arena
//! - `scope/resolve.rs` — reference resolution
//! - `scope/allocate.rs` — storage allocation
//! - `scope/deserialize.rs` — scope-chain reconstruction
//! - `scope_info.rs` — serialized scope records
//! - `context.rs` — the runtime context chain model
//! - `scope_dump.rs` — debug printer

pub mod ast;
pub mod context;
pub mod interner;
pub mod scope;
pub mod scope_dump;
pub mod scope_info;
pub mod variable;

pub use ast::{AstNodeFactory, Declaration, SloppyBlockFunction, VariableProxy};
pub use context::{Context, SharedFunctionInfo, MIN_CONTEXT_SLOTS};
pub use interner::{Name, StringInterner};
pub use scope::{
    AnalysisInfo, DeclaredVariable, DeserializationMode, FunctionKind, LanguageMode, ScopeArena,
    ScopeError, ScopeId, ScopeType, Snapshot,
};
pub use scope_info::ScopeInfo;
pub use variable::{
    InitializationFlag, Variable, VariableId, VariableKind, VariableLocation, VariableMode,
};

/// Convert a `usize` to `u32`, panicking if the value exceeds `u32::MAX`.
/// Prefer this over `as u32` which silently truncates on 64-bit platforms.
pub(crate) fn u32_from_usize(value: usize) -> u32 {
    u32::try_from(value).expect("value exceeds u32::MAX")
}
