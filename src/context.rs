/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! The runtime context chain, as the deserializer sees it.
//!
//! A closure's context chain is a linked list of heap objects, one per
//! context-bearing scope, ending at the native context. Each non-native
//! context carries the serialized record of the scope that created it —
//! function contexts indirectly, through their closure's shared function
//! info. The real objects live in the host VM's heap; these types model
//! exactly the fields the deserializer reads.

use std::rc::Rc;

use crate::interner::Name;
use crate::scope_info::ScopeInfo;

/// Slots reserved at the bottom of every context for the runtime's own
/// bookkeeping. Scope-allocated slots start here.
pub const MIN_CONTEXT_SLOTS: u32 = 4;

/// The per-function metadata object shared by all closures of one
/// function. The deserializer only needs the scope record.
pub struct SharedFunctionInfo {
    pub scope_info: Rc<ScopeInfo>,
}

/// One runtime context. `previous` points outward; a script context is
/// always followed by the native context.
pub enum Context {
    Native,
    Script {
        scope_info: Rc<ScopeInfo>,
        previous: Rc<Context>,
    },
    Function {
        closure: Rc<SharedFunctionInfo>,
        previous: Rc<Context>,
    },
    Eval {
        scope_info: Rc<ScopeInfo>,
        previous: Rc<Context>,
    },
    With {
        previous: Rc<Context>,
    },
    Block {
        scope_info: Rc<ScopeInfo>,
        previous: Rc<Context>,
    },
    Catch {
        /// The exception binding's name.
        name: Name,
        previous: Rc<Context>,
    },
    DebugEvaluate {
        previous: Rc<Context>,
    },
}

impl Context {
    pub fn is_native(&self) -> bool {
        matches!(self, Context::Native)
    }

    pub fn previous(&self) -> Option<&Rc<Context>> {
        match self {
            Context::Native => None,
            Context::Script { previous, .. }
            | Context::Function { previous, .. }
            | Context::Eval { previous, .. }
            | Context::With { previous }
            | Context::Block { previous, .. }
            | Context::Catch { previous, .. }
            | Context::DebugEvaluate { previous } => Some(previous),
        }
    }
}
