//! The unified view over variable symbols.
//!
//! A name in a conditional-assembly statement resolves to either a SET
//! symbol or a macro parameter. Lookup yields one closed [`VariableSymbol`]
//! variant; callers probe for the capability they need (`as_set`,
//! `as_param`) and get `None` instead of a failed downcast.

use crate::expr::arithmetic::parse_self_defining_term;
use crate::param::MacroParam;
use crate::set_symbol::{SetSymbol, SetSymbolKind, TypedValue};

/// A resolved variable symbol.
#[derive(Debug, Clone, Copy)]
pub enum VariableSymbol<'a> {
    Set(&'a SetSymbol),
    Param(&'a MacroParam),
}

impl<'a> VariableSymbol<'a> {
    /// The SET symbol behind this name, if it is one.
    pub fn as_set(&self) -> Option<&'a SetSymbol> {
        match self {
            VariableSymbol::Set(s) => Some(s),
            VariableSymbol::Param(_) => None,
        }
    }

    /// The macro parameter behind this name, if it is one.
    pub fn as_param(&self) -> Option<&'a MacroParam> {
        match self {
            VariableSymbol::Param(p) => Some(p),
            VariableSymbol::Set(_) => None,
        }
    }

    /// The N' attribute.
    pub fn number(&self, subscript: &[usize]) -> usize {
        match self {
            VariableSymbol::Set(s) => s.number(),
            VariableSymbol::Param(p) => p.number(subscript),
        }
    }

    /// The K' attribute.
    pub fn count(&self, subscript: &[usize]) -> usize {
        match self {
            VariableSymbol::Set(s) => s.count(subscript.first().copied().unwrap_or(0)),
            VariableSymbol::Param(p) => p.count(subscript),
        }
    }

    /// The T' attribute: 'O' for an omitted/empty value, 'N' for a value
    /// that forms a self-defining term, otherwise 'U'.
    pub fn type_attr(&self, subscript: &[usize]) -> char {
        let text = match self {
            VariableSymbol::Set(s) => match s.get_value(subscript.first().copied().unwrap_or(0)) {
                TypedValue::Arithmetic(v) => v.to_string(),
                TypedValue::Boolean(b) => if b { "1" } else { "0" }.to_string(),
                TypedValue::Character(c) => c,
            },
            VariableSymbol::Param(p) => p.get_value(subscript).to_string(),
        };
        if text.is_empty() {
            'O'
        } else if parse_self_defining_term(&text).is_some() {
            'N'
        } else {
            'U'
        }
    }

    /// The declared SET type, for SET symbols.
    pub fn set_kind(&self) -> Option<SetSymbolKind> {
        self.as_set().map(|s| s.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ParamData;
    use crate::ident::IdentTable;
    use crate::param::PositionalParam;
    use std::sync::Arc;

    #[test]
    fn test_capability_probing() {
        let mut idents = IdentTable::new();
        let sym = SetSymbol::new(SetSymbolKind::Arithmetic, idents.intern("A"), true, false);
        let var = VariableSymbol::Set(&sym);
        assert!(var.as_set().is_some());
        assert!(var.as_param().is_none());
        assert_eq!(var.set_kind(), Some(SetSymbolKind::Arithmetic));
    }

    #[test]
    fn test_attributes_over_set_symbol() {
        let mut idents = IdentTable::new();
        let mut sym = SetSymbol::new(SetSymbolKind::Arithmetic, idents.intern("A"), false, false);
        sym.as_arithmetic_mut().unwrap().set_value(100, 2);
        let var = VariableSymbol::Set(&sym);
        assert_eq!(var.number(&[]), 3);
        assert_eq!(var.count(&[2]), 3);
        assert_eq!(var.type_attr(&[2]), 'N');
    }

    #[test]
    fn test_attributes_over_param() {
        let mut idents = IdentTable::new();
        let data = Arc::new(ParamData::composite(vec![
            Arc::new(ParamData::single("12")),
            Arc::new(ParamData::single("abc")),
        ]));
        let param = MacroParam::Positional(PositionalParam {
            id: idents.intern("P"),
            position: 1,
            data,
        });
        let var = VariableSymbol::Param(&param);
        assert_eq!(var.number(&[]), 2);
        assert_eq!(var.count(&[1]), 2);
        assert_eq!(var.type_attr(&[1]), 'N');
        assert_eq!(var.type_attr(&[2]), 'U');
        assert_eq!(var.type_attr(&[3]), 'O');
    }

    #[test]
    fn test_type_attr_of_character_set_symbol() {
        let mut idents = IdentTable::new();
        let mut sym = SetSymbol::new(SetSymbolKind::Character, idents.intern("C"), true, false);
        let var = VariableSymbol::Set(&sym);
        assert_eq!(var.type_attr(&[]), 'O');
        sym.as_character_mut().unwrap().set_value("X'1F'".into(), 0);
        let var = VariableSymbol::Set(&sym);
        assert_eq!(var.type_attr(&[]), 'N');
    }
}
