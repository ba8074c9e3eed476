/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Test harness that plays the parser: builds scopes, declarations and
//! references through the same entry points the real front end uses.

#![allow(dead_code)]

use std::rc::Rc;

use js_scopes::{
    AnalysisInfo, AstNodeFactory, Declaration, InitializationFlag, Name, ScopeArena, ScopeId,
    StringInterner, VariableId, VariableMode, VariableProxy,
};

pub struct Harness {
    pub arena: ScopeArena,
    pub interner: StringInterner,
    pub factory: AstNodeFactory,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            arena: ScopeArena::new(),
            interner: StringInterner::new(),
            factory: AstNodeFactory,
        }
    }

    pub fn name(&mut self, text: &str) -> Name {
        self.interner.intern(text)
    }

    /// Register an identifier reference on `scope`, as the parser does
    /// for every name it cannot bind itself.
    pub fn reference(&mut self, scope: ScopeId, name: &str) -> Rc<VariableProxy> {
        let name = self.interner.intern(name);
        let proxy = self.factory.new_variable_proxy(name, 0);
        self.arena.add_unresolved(scope, proxy.clone());
        proxy
    }

    pub fn assigned_reference(&mut self, scope: ScopeId, name: &str) -> Rc<VariableProxy> {
        let proxy = self.reference(scope, name);
        proxy.set_is_assigned();
        proxy
    }

    fn initialization_for(mode: VariableMode) -> InitializationFlag {
        if mode.is_lexical() {
            InitializationFlag::NeedsInitialization
        } else {
            InitializationFlag::CreatedInitialized
        }
    }

    /// Run a declaration through the checked parser entry point.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        mode: VariableMode,
    ) -> (VariableId, Rc<Declaration>) {
        let name = self.interner.intern(name);
        let proxy = self.factory.new_variable_proxy(name, 0);
        let declaration = self.factory.new_variable_declaration(proxy, scope, 0);
        let declared = self
            .arena
            .declare_variable(scope, &declaration, mode, Self::initialization_for(mode), false)
            .expect("declaration succeeds");
        (declared.variable, declaration)
    }

    pub fn declare_var(&mut self, scope: ScopeId, name: &str) -> VariableId {
        self.declare(scope, name, VariableMode::Var).0
    }

    pub fn declare_let(&mut self, scope: ScopeId, name: &str) -> VariableId {
        self.declare(scope, name, VariableMode::Let).0
    }

    pub fn analyze(&mut self, root: ScopeId) {
        self.arena
            .analyze(root, &AnalysisInfo::default())
            .expect("analysis succeeds");
    }
}
