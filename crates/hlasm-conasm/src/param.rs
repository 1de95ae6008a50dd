//! Macro parameters and system variables.
//!
//! One call frame binds three kinds of names: positional parameters (bound
//! by operand order), keyword parameters (bound by `NAME=value`, falling
//! back to the declared default), and the read-only system variables
//! SYSLIST and SYSMAC. All three answer the same questions — value, N', K',
//! size — by walking a [`ParamData`] tree, so they are one enum with a
//! shared walk rather than a class hierarchy.
//!
//! Subscript walk rules:
//! - offset elements are 1-based; element 0 keeps the current node
//! - SYSLIST shifts the FIRST element only: 0 selects the label slot,
//!   k selects operand k (stored one past the label). Nested elements
//!   follow the normal rule. SYSMAC addresses its nesting-name list the
//!   same way but its unsubscripted value is the current level's name.

use std::sync::Arc;

use hlasm_lang_core::{DiagnosticSink, Span};

use crate::data::ParamData;
use crate::diags;
use crate::ident::Ident;

/// Which system variable a [`SystemVariable`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemVariableKind {
    /// Ordered operand list of the current macro call; index 0 is the label.
    Syslist,
    /// Macro-nesting name list; index 0 is the macro being expanded.
    Sysmac,
}

/// A parameter bound by operand position.
#[derive(Debug, Clone)]
pub struct PositionalParam {
    pub id: Ident,
    /// Slot index in the call; the label parameter occupies slot 0.
    pub position: usize,
    pub data: Arc<ParamData>,
}

/// A parameter bound by `NAME=value`, with a declared default.
#[derive(Debug, Clone)]
pub struct KeywordParam {
    pub id: Ident,
    pub default_data: Arc<ParamData>,
    /// Value supplied on this call; takes precedence over the default.
    pub assigned_data: Option<Arc<ParamData>>,
}

/// A read-only system variable.
#[derive(Debug, Clone)]
pub struct SystemVariable {
    pub id: Ident,
    pub data: Arc<ParamData>,
    pub is_global: bool,
    pub kind: SystemVariableKind,
}

impl SystemVariable {
    /// Build a SYSLIST from the completed slot list (label first).
    pub fn syslist(id: Ident, slots: Vec<Arc<ParamData>>) -> Self {
        Self {
            id,
            data: Arc::new(ParamData::composite(slots)),
            is_global: false,
            kind: SystemVariableKind::Syslist,
        }
    }

    /// Build a SYSMAC from the nesting name list (current macro first,
    /// open code last).
    pub fn sysmac(id: Ident, names: Vec<String>) -> Self {
        let children = names
            .into_iter()
            .map(|n| Arc::new(ParamData::single(n)))
            .collect();
        Self {
            id,
            data: Arc::new(ParamData::composite(children)),
            is_global: true,
            kind: SystemVariableKind::Sysmac,
        }
    }
}

/// A macro parameter of any kind.
#[derive(Debug, Clone)]
pub enum MacroParam {
    Positional(PositionalParam),
    Keyword(KeywordParam),
    System(SystemVariable),
}

impl MacroParam {
    pub fn id(&self) -> Ident {
        match self {
            MacroParam::Positional(p) => p.id,
            MacroParam::Keyword(k) => k.id,
            MacroParam::System(s) => s.id,
        }
    }

    /// The kind tag when this is a system variable.
    pub fn system_kind(&self) -> Option<SystemVariableKind> {
        match self {
            MacroParam::System(s) => Some(s.kind),
            _ => None,
        }
    }

    /// The data tree this parameter currently resolves to. A keyword
    /// parameter resolves to its assigned value if the call supplied one,
    /// else to its declared default.
    pub fn data(&self) -> &ParamData {
        match self {
            MacroParam::Positional(p) => &p.data,
            MacroParam::Keyword(k) => k.assigned_data.as_deref().unwrap_or(&k.default_data),
            MacroParam::System(s) => &s.data,
        }
    }

    /// Walk the data tree by `offset`, one `get_ith` step per element.
    fn node_at(&self, offset: &[usize]) -> &ParamData {
        let mut node = self.data();
        for (depth, &element) in offset.iter().enumerate() {
            if depth == 0 && self.system_kind().is_some() {
                // System variables store the label/current level at child 1,
                // so subscript 0 reaches it and subscript k reaches k+1.
                node = node.get_ith(element + 1);
            } else if element == 0 {
                // Whole node.
            } else {
                node = node.get_ith(element);
            }
        }
        node
    }

    /// The parameter value addressed by `offset`.
    pub fn get_value(&self, offset: &[usize]) -> &str {
        if offset.is_empty() {
            if let Some(SystemVariableKind::Sysmac) = self.system_kind() {
                // &SYSMAC is the name of the macro being expanded, not the
                // joined nesting list.
                return self.data().get_ith(1).get_value();
            }
        }
        self.node_at(offset).get_value()
    }

    /// The N' attribute of the node addressed by `offset`.
    pub fn number(&self, offset: &[usize]) -> usize {
        if offset.is_empty() {
            match self.system_kind() {
                // N'&SYSLIST counts operands; the label slot is not one.
                Some(SystemVariableKind::Syslist) => {
                    return self.data().number().saturating_sub(1)
                }
                // N'&SYSMAC is the nesting depth, open code included.
                Some(SystemVariableKind::Sysmac) => return self.data().number(),
                None => {}
            }
        }
        self.node_at(offset).number()
    }

    /// The K' attribute of the value addressed by `offset`.
    pub fn count(&self, offset: &[usize]) -> usize {
        self.get_value(offset).len()
    }

    /// The sublist size of the node addressed by `offset`.
    pub fn size(&self, offset: &[usize]) -> usize {
        self.node_at(offset).size()
    }

    /// Validate a subscript for reading. Subscript values must be at least
    /// 1; a leading 0 is permitted on system variables only (it selects the
    /// label slot / current nesting level). Violations are reported to
    /// `sink` and the read yields a default instead of failing hard.
    pub fn can_read(
        &self,
        subscript: &[i32],
        name: &str,
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        for (depth, &value) in subscript.iter().enumerate() {
            let zero_ok = depth == 0 && self.system_kind().is_some();
            if value < 0 || (value == 0 && !zero_ok) {
                sink.report(diags::subscript_below_one(name, span));
                return false;
            }
        }
        true
    }
}
