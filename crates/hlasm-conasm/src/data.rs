//! Parameter-data trees.
//!
//! A macro-call operand is either a plain string or a parenthesized sublist
//! whose entries may themselves be sublists: `(A,(B,C),,D)`. [`ParamData`]
//! models that shape. Children are `Arc`-shared because one operand's data
//! can back several views at once — its SYSLIST slot and a named positional
//! parameter of the same call.
//!
//! Every operation is total. Indexing past the end, indexing a leaf, or
//! indexing with 0 yields [`ParamData::Dummy`], never an error: omitted
//! operands read as empty everywhere downstream.

use std::sync::Arc;

/// Shared dummy node returned for all out-of-range accesses.
static DUMMY: ParamData = ParamData::Dummy;

/// A node in a parameter-data tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamData {
    /// An omitted or empty operand.
    Dummy,
    /// A plain string operand.
    Single(String),
    /// A parenthesized sublist. `value` caches the joined representation
    /// `(child1,child2,...)` so [`ParamData::get_value`] stays borrowed and
    /// total.
    Composite {
        children: Vec<Arc<ParamData>>,
        value: String,
    },
}

impl ParamData {
    /// A leaf holding `value`.
    pub fn single(value: impl Into<String>) -> Self {
        ParamData::Single(value.into())
    }

    /// A sublist node. The parenthesized join is computed once here.
    pub fn composite(children: Vec<Arc<ParamData>>) -> Self {
        let mut value = String::from("(");
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                value.push(',');
            }
            value.push_str(child.get_value());
        }
        value.push(')');
        ParamData::Composite { children, value }
    }

    /// The shared dummy node.
    pub fn dummy() -> &'static ParamData {
        &DUMMY
    }

    /// The node's string value: the leaf text, the cached `(a,b,...)` join
    /// for a sublist, or `""` for a dummy.
    pub fn get_value(&self) -> &str {
        match self {
            ParamData::Dummy => "",
            ParamData::Single(s) => s,
            ParamData::Composite { value, .. } => value,
        }
    }

    /// The `idx`-th child, 1-based. Index 0, an out-of-range index, or a
    /// non-composite receiver all yield the dummy node.
    pub fn get_ith(&self, idx: usize) -> &ParamData {
        match self {
            ParamData::Composite { children, .. } if idx >= 1 => children
                .get(idx - 1)
                .map(|c| c.as_ref())
                .unwrap_or(&DUMMY),
            _ => &DUMMY,
        }
    }

    /// Child count for a sublist; 0 for leaves and dummies.
    pub fn size(&self) -> usize {
        match self {
            ParamData::Composite { children, .. } => children.len(),
            _ => 0,
        }
    }

    /// The N' attribute of the node itself: 0 for an omitted operand, 1 for
    /// a plain operand, the entry count for a sublist.
    pub fn number(&self) -> usize {
        match self {
            ParamData::Dummy => 0,
            ParamData::Single(_) => 1,
            ParamData::Composite { children, .. } => children.len(),
        }
    }

    /// Whether this node is the dummy.
    pub fn is_dummy(&self) -> bool {
        matches!(self, ParamData::Dummy)
    }
}

impl Default for ParamData {
    fn default() -> Self {
        ParamData::Dummy
    }
}
