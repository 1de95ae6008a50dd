//! Macro definition and invocation.
//!
//! A [`MacroDefinition`] is built once when `MACRO … MEND` is parsed and is
//! immutable afterwards; it is shared by `Arc` so that every live
//! [`MacroInvocation`] keeps its cached body, sequence-symbol labels, and
//! copy-nest table alive. The macro table in the context retains the
//! definition for the lifetime of any invocation.
//!
//! Binding rules, in call order: SYSLIST starts with the label slot; each
//! keyword actual must name a declared keyword formal; each positional
//! actual is appended to SYSLIST and also binds the declared slot at that
//! position, if the definition has one; leftovers get dummies and declared
//! defaults. Malformed definitions are hard errors at definition time —
//! call-time problems are diagnostics and never abort the call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hlasm_lang_core::{DiagnosticSink, Location, Span};
use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;
use tracing::debug;

use crate::data::ParamData;
use crate::diags;
use crate::ident::{Ident, IdentTable};
use crate::param::{KeywordParam, MacroParam, PositionalParam, SystemVariable};

/// Errors that reject a macro definition outright.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
pub enum DefinitionError {
    /// Two keyword parameters with the same name.
    #[error("duplicate keyword parameter '{name}' in macro '{macro_name}'")]
    #[diagnostic(code(D001))]
    DuplicateKeyword { macro_name: String, name: String },

    /// A default value with no parameter name to attach it to.
    #[error("keyword parameter without a name in macro '{macro_name}'")]
    #[diagnostic(code(D002))]
    UnnamedKeyword { macro_name: String },

    /// Two positional parameters with the same name.
    #[error("duplicate positional parameter '{name}' in macro '{macro_name}'")]
    #[diagnostic(code(D003))]
    DuplicatePositional { macro_name: String, name: String },
}

/// One formal argument from the prototype statement.
///
/// `name` and `default` decide the kind: both present is a keyword
/// parameter, name alone is a positional parameter, neither is an anonymous
/// hole (the slot is reserved but unaddressable), and a default without a
/// name is a definition error.
#[derive(Debug, Clone)]
pub struct FormalArg {
    pub name: Option<Ident>,
    pub default: Option<Arc<ParamData>>,
}

impl FormalArg {
    pub fn positional(name: Ident) -> Self {
        Self {
            name: Some(name),
            default: None,
        }
    }

    pub fn keyword(name: Ident, default: Arc<ParamData>) -> Self {
        Self {
            name: Some(name),
            default: Some(default),
        }
    }

    pub fn hole() -> Self {
        Self {
            name: None,
            default: None,
        }
    }
}

/// One actual argument of a macro call.
#[derive(Debug, Clone)]
pub struct MacroArg {
    /// Keyword name for `NAME=value` actuals; `None` for positional ones.
    pub name: Option<Ident>,
    pub data: Arc<ParamData>,
}

impl MacroArg {
    pub fn positional(data: Arc<ParamData>) -> Self {
        Self { name: None, data }
    }

    pub fn keyword(name: Ident, data: Arc<ParamData>) -> Self {
        Self {
            name: Some(name),
            data,
        }
    }
}

/// A statement captured in a macro body.
///
/// HLASM re-lexes macro-body statements after parameter substitution, so the
/// cached form keeps the raw source text together with its span.
#[derive(Debug, Clone)]
pub struct CachedStatement {
    pub source: String,
    pub span: Span,
}

/// An immutable macro definition.
#[derive(Debug)]
pub struct MacroDefinition {
    id: Ident,
    /// Name of the label parameter, which occupies positional slot 0.
    label_param: Option<Ident>,
    /// Positional slots by position; slot 0 is the label, `None` entries are
    /// anonymous holes.
    positional: Vec<Option<Ident>>,
    /// Declared keyword defaults.
    keyword_defaults: HashMap<Ident, Arc<ParamData>>,
    /// Cached body statements, replayed per invocation.
    body: Vec<Arc<CachedStatement>>,
    /// Sequence symbol → statement index.
    labels: HashMap<Ident, usize>,
    /// COPY-member stack active at each statement.
    copy_nests: Vec<Vec<Ident>>,
    /// Where the prototype statement was read from.
    location: Location,
}

impl MacroDefinition {
    /// Validate the formal parameter list and build the definition.
    ///
    /// `idents` supplies the spelling for error messages; definitions fail
    /// here, immediately, never at call time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Ident,
        label_param: Option<Ident>,
        formals: Vec<FormalArg>,
        body: Vec<Arc<CachedStatement>>,
        labels: HashMap<Ident, usize>,
        copy_nests: Vec<Vec<Ident>>,
        location: Location,
        idents: &IdentTable,
    ) -> Result<Self, DefinitionError> {
        let macro_name = idents.resolve(id).to_string();

        let mut positional: Vec<Option<Ident>> = vec![label_param];
        let mut keyword_defaults = HashMap::new();
        let mut seen_positional: HashSet<Ident> = HashSet::new();
        if let Some(label) = label_param {
            seen_positional.insert(label);
        }

        for formal in formals {
            match (formal.name, formal.default) {
                (Some(name), Some(default)) => {
                    if keyword_defaults.insert(name, default).is_some() {
                        return Err(DefinitionError::DuplicateKeyword {
                            macro_name,
                            name: idents.resolve(name).to_string(),
                        });
                    }
                }
                (Some(name), None) => {
                    if !seen_positional.insert(name) {
                        return Err(DefinitionError::DuplicatePositional {
                            macro_name,
                            name: idents.resolve(name).to_string(),
                        });
                    }
                    positional.push(Some(name));
                }
                (None, None) => positional.push(None),
                (None, Some(_)) => {
                    return Err(DefinitionError::UnnamedKeyword { macro_name });
                }
            }
        }

        Ok(Self {
            id,
            label_param,
            positional,
            keyword_defaults,
            body,
            labels,
            copy_nests,
            location,
        })
    }

    pub fn id(&self) -> Ident {
        self.id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn body(&self) -> &[Arc<CachedStatement>] {
        &self.body
    }

    pub fn copy_nests(&self) -> &[Vec<Ident>] {
        &self.copy_nests
    }

    /// Whether `name` is a declared keyword parameter.
    pub fn is_keyword(&self, name: Ident) -> bool {
        self.keyword_defaults.contains_key(&name)
    }

    /// Number of declared positional slots, label slot included.
    pub fn positional_slots(&self) -> usize {
        self.positional.len()
    }

    /// Bind actual arguments and produce an invocation.
    ///
    /// Call-time problems (an unknown keyword name) are reported to `sink`;
    /// the offending argument is left unbound and the call proceeds.
    pub fn call(
        self: &Arc<Self>,
        label_data: Option<Arc<ParamData>>,
        args: Vec<MacroArg>,
        syslist_name: Ident,
        idents: &IdentTable,
        sink: &mut dyn DiagnosticSink,
    ) -> MacroInvocation {
        let macro_name = idents.resolve(self.id);
        debug!(macro_name, args = args.len(), "binding macro call");

        let mut named_params: HashMap<Ident, MacroParam> = HashMap::new();
        let mut syslist: Vec<Arc<ParamData>> =
            vec![label_data.unwrap_or_else(|| Arc::new(ParamData::Dummy))];

        // The label parameter sees the label slot.
        if let Some(label_name) = self.label_param {
            named_params.insert(
                label_name,
                MacroParam::Positional(PositionalParam {
                    id: label_name,
                    position: 0,
                    data: syslist[0].clone(),
                }),
            );
        }

        for arg in args {
            match arg.name {
                Some(keyword) => {
                    if self.is_keyword(keyword) {
                        named_params.insert(
                            keyword,
                            MacroParam::Keyword(KeywordParam {
                                id: keyword,
                                default_data: self.keyword_defaults[&keyword].clone(),
                                assigned_data: Some(arg.data),
                            }),
                        );
                    } else {
                        // Unknown keyword (or a positional-only name): report
                        // and leave the argument unbound.
                        sink.report(diags::unknown_keyword_argument(
                            macro_name,
                            idents.resolve(keyword),
                            Span::dummy(),
                        ));
                    }
                }
                None => {
                    syslist.push(arg.data.clone());
                    let position = syslist.len() - 1;
                    if let Some(Some(slot_name)) = self.positional.get(position) {
                        named_params.insert(
                            *slot_name,
                            MacroParam::Positional(PositionalParam {
                                id: *slot_name,
                                position,
                                data: arg.data,
                            }),
                        );
                    }
                }
            }
        }

        // Positional slots beyond the actual count read as omitted.
        for position in syslist.len()..self.positional.len() {
            if let Some(slot_name) = self.positional[position] {
                named_params.insert(
                    slot_name,
                    MacroParam::Positional(PositionalParam {
                        id: slot_name,
                        position,
                        data: Arc::new(ParamData::Dummy),
                    }),
                );
            }
        }

        // Keywords the call did not supply fall back to their defaults.
        for (&keyword, default) in &self.keyword_defaults {
            named_params.entry(keyword).or_insert_with(|| {
                MacroParam::Keyword(KeywordParam {
                    id: keyword,
                    default_data: default.clone(),
                    assigned_data: None,
                })
            });
        }

        named_params.insert(
            syslist_name,
            MacroParam::System(SystemVariable::syslist(syslist_name, syslist)),
        );

        MacroInvocation {
            id: self.id,
            named_params,
            definition: self.clone(),
            cursor: 0,
        }
    }
}

/// One live expansion of a macro.
///
/// The invocation owns its bound parameters; the definition is shared.
/// Two invocations of the same macro never share parameter state.
#[derive(Debug)]
pub struct MacroInvocation {
    id: Ident,
    named_params: HashMap<Ident, MacroParam>,
    definition: Arc<MacroDefinition>,
    cursor: usize,
}

impl MacroInvocation {
    pub fn id(&self) -> Ident {
        self.id
    }

    pub fn definition(&self) -> &Arc<MacroDefinition> {
        &self.definition
    }

    /// Look up a bound parameter by name.
    pub fn get_param(&self, name: Ident) -> Option<&MacroParam> {
        self.named_params.get(&name)
    }

    /// Bind an additional system variable (SYSMAC and friends, whose data
    /// depends on the nesting context rather than on the call operands).
    pub fn bind_system_variable(&mut self, variable: SystemVariable) {
        self.named_params
            .insert(variable.id, MacroParam::System(variable));
    }

    /// Number of bound names (parameters plus system variables).
    pub fn param_count(&self) -> usize {
        self.named_params.len()
    }

    /// The statement under the cursor, advancing past it. `None` when the
    /// body is exhausted and the invocation should be left.
    pub fn next_statement(&mut self) -> Option<Arc<CachedStatement>> {
        let stmt = self.definition.body.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(stmt)
    }

    /// Current replay position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor to a sequence symbol. Returns `false` when the label
    /// is not defined in this macro.
    pub fn branch_to(&mut self, label: Ident) -> bool {
        match self.definition.labels.get(&label) {
            Some(&index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlasm_lang_core::Diagnostic;

    fn single(s: &str) -> Arc<ParamData> {
        Arc::new(ParamData::single(s))
    }

    fn location() -> Location {
        Location::new("SYSLIB(MAC)", 1, 1)
    }

    /// `&LBL MAC &KEY=,&OP1,<hole>,&OP3` — the prototype used throughout.
    fn definition(idents: &mut IdentTable) -> Arc<MacroDefinition> {
        let id = idents.intern("MAC");
        let lbl = idents.intern("LBL");
        let key = idents.intern("KEY");
        let op1 = idents.intern("OP1");
        let op3 = idents.intern("OP3");
        Arc::new(
            MacroDefinition::new(
                id,
                Some(lbl),
                vec![
                    FormalArg::keyword(key, single("")),
                    FormalArg::positional(op1),
                    FormalArg::hole(),
                    FormalArg::positional(op3),
                ],
                vec![Arc::new(CachedStatement {
                    source: "         MEND".into(),
                    span: Span::dummy(),
                })],
                HashMap::new(),
                Vec::new(),
                location(),
                idents,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_duplicate_keyword_is_rejected() {
        let mut idents = IdentTable::new();
        let id = idents.intern("MAC");
        let key = idents.intern("KEY");
        let err = MacroDefinition::new(
            id,
            None,
            vec![
                FormalArg::keyword(key, single("A")),
                FormalArg::keyword(key, single("B")),
            ],
            Vec::new(),
            HashMap::new(),
            Vec::new(),
            location(),
            &idents,
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateKeyword { .. }));
    }

    #[test]
    fn test_unnamed_keyword_is_rejected() {
        let mut idents = IdentTable::new();
        let id = idents.intern("MAC");
        let err = MacroDefinition::new(
            id,
            None,
            vec![FormalArg {
                name: None,
                default: Some(single("D")),
            }],
            Vec::new(),
            HashMap::new(),
            Vec::new(),
            location(),
            &idents,
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::UnnamedKeyword { .. }));
    }

    #[test]
    fn test_duplicate_positional_is_rejected() {
        let mut idents = IdentTable::new();
        let id = idents.intern("MAC");
        let op = idents.intern("OP");
        let err = MacroDefinition::new(
            id,
            None,
            vec![FormalArg::positional(op), FormalArg::positional(op)],
            Vec::new(),
            HashMap::new(),
            Vec::new(),
            location(),
            &idents,
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicatePositional { .. }));
    }

    #[test]
    fn test_call_binds_positionals_holes_and_defaults() {
        let mut idents = IdentTable::new();
        let def = definition(&mut idents);
        let syslist_name = idents.intern("SYSLIST");
        let mut sink: Vec<Diagnostic> = Vec::new();

        // LBL MAC ada,mko,
        let inv = def.call(
            Some(single("LBL")),
            vec![
                MacroArg::positional(single("ada")),
                MacroArg::positional(single("mko")),
                MacroArg::positional(Arc::new(ParamData::Dummy)),
            ],
            syslist_name,
            &idents,
            &mut sink,
        );
        assert!(sink.is_empty());

        let op1 = idents.get("OP1").unwrap();
        let op3 = idents.get("OP3").unwrap();
        let key = idents.get("KEY").unwrap();
        let lbl = idents.get("LBL").unwrap();

        assert_eq!(inv.get_param(op1).unwrap().get_value(&[]), "ada");
        assert_eq!(inv.get_param(op3).unwrap().get_value(&[]), "");
        assert_eq!(inv.get_param(key).unwrap().get_value(&[]), "");
        assert_eq!(inv.get_param(lbl).unwrap().get_value(&[]), "LBL");

        let syslist = inv.get_param(syslist_name).unwrap();
        assert_eq!(syslist.get_value(&[0]), "LBL");
        assert_eq!(syslist.get_value(&[1]), "ada");
        assert_eq!(syslist.get_value(&[2]), "mko");
        assert_eq!(syslist.get_value(&[3]), "");
        assert_eq!(syslist.number(&[]), 3);
    }

    #[test]
    fn test_second_positional_lands_in_the_hole() {
        let mut idents = IdentTable::new();
        let def = definition(&mut idents);
        let syslist_name = idents.intern("SYSLIST");
        let mut sink: Vec<Diagnostic> = Vec::new();

        let inv = def.call(
            None,
            vec![
                MacroArg::positional(single("a")),
                MacroArg::positional(single("b")),
                MacroArg::positional(single("c")),
            ],
            syslist_name,
            &idents,
            &mut sink,
        );

        // Slot 2 is anonymous: "b" is reachable through SYSLIST only.
        let op3 = idents.get("OP3").unwrap();
        assert_eq!(inv.get_param(op3).unwrap().get_value(&[]), "c");
        let syslist = inv.get_param(syslist_name).unwrap();
        assert_eq!(syslist.get_value(&[2]), "b");
    }

    #[test]
    fn test_keyword_binding_and_unknown_keyword() {
        let mut idents = IdentTable::new();
        let def = definition(&mut idents);
        let syslist_name = idents.intern("SYSLIST");
        let key = idents.get("KEY").unwrap();
        let bogus = idents.intern("NOKEY");
        let mut sink: Vec<Diagnostic> = Vec::new();

        let inv = def.call(
            None,
            vec![
                MacroArg::keyword(key, single("given")),
                MacroArg::keyword(bogus, single("x")),
            ],
            syslist_name,
            &idents,
            &mut sink,
        );

        assert_eq!(inv.get_param(key).unwrap().get_value(&[]), "given");
        assert!(inv.get_param(bogus).is_none());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].code, "M010");

        // Keyword actuals never occupy SYSLIST slots.
        let syslist = inv.get_param(syslist_name).unwrap();
        assert_eq!(syslist.number(&[]), 0);
    }

    #[test]
    fn test_positional_name_used_as_keyword_is_unknown() {
        let mut idents = IdentTable::new();
        let def = definition(&mut idents);
        let syslist_name = idents.intern("SYSLIST");
        let op1 = idents.get("OP1").unwrap();
        let mut sink: Vec<Diagnostic> = Vec::new();

        def.call(
            None,
            vec![MacroArg::keyword(op1, single("v"))],
            syslist_name,
            &idents,
            &mut sink,
        );
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].code, "M010");
    }

    #[test]
    fn test_invocations_are_independent() {
        let mut idents = IdentTable::new();
        let def = definition(&mut idents);
        let syslist_name = idents.intern("SYSLIST");
        let op1 = idents.get("OP1").unwrap();
        let mut sink: Vec<Diagnostic> = Vec::new();

        let a = def.call(
            None,
            vec![MacroArg::positional(single("first"))],
            syslist_name,
            &idents,
            &mut sink,
        );
        let b = def.call(
            None,
            vec![MacroArg::positional(single("second"))],
            syslist_name,
            &idents,
            &mut sink,
        );

        assert_eq!(a.get_param(op1).unwrap().get_value(&[]), "first");
        assert_eq!(b.get_param(op1).unwrap().get_value(&[]), "second");

        // Exhausting one replay cursor leaves the other untouched.
        let mut a = a;
        while a.next_statement().is_some() {}
        assert_eq!(b.cursor(), 0);
    }

    #[test]
    fn test_statement_replay_and_branching() {
        let mut idents = IdentTable::new();
        let id = idents.intern("LOOPMAC");
        let seq = idents.intern(".TOP");
        let body: Vec<Arc<CachedStatement>> = (0..3)
            .map(|i| {
                Arc::new(CachedStatement {
                    source: format!("stmt{i}"),
                    span: Span::dummy(),
                })
            })
            .collect();
        let mut labels = HashMap::new();
        labels.insert(seq, 1);

        let def = Arc::new(
            MacroDefinition::new(
                id,
                None,
                Vec::new(),
                body,
                labels,
                Vec::new(),
                location(),
                &idents,
            )
            .unwrap(),
        );
        let mut sink: Vec<Diagnostic> = Vec::new();
        let mut inv = def.call(None, Vec::new(), idents.intern("SYSLIST"), &idents, &mut sink);

        assert_eq!(inv.next_statement().unwrap().source, "stmt0");
        assert_eq!(inv.next_statement().unwrap().source, "stmt1");
        assert!(inv.branch_to(seq));
        assert_eq!(inv.next_statement().unwrap().source, "stmt1");
        assert!(!inv.branch_to(idents.intern(".MISSING")));
        assert_eq!(inv.next_statement().unwrap().source, "stmt2");
        assert!(inv.next_statement().is_none());
    }
}
