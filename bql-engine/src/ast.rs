//! The BQL abstract syntax tree (§3, §9 "sum-typed AST"). A tagged
//! union per node kind, not string-tagged records, so that adding a
//! clause later (the design notes call out `UNWIND`) is a localized
//! change rather than a rewrite.

use bql_api::{NodeProperty, Relation};

/// The top-level BQL query (§3): a tagged union with one variant per
/// grammatically distinct query shape, rather than a single record of
/// optional fields. Combinations a record would permit but the
/// language forbids — a DELETE carrying a CREATE, a SET clause on a
/// delete query — are excluded by construction instead of being caught
/// by a runtime check after the fact; `ReadDeleteQuery` in particular
/// has no field a SET clause could occupy.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `MATCH ... [WHERE ...] [RETURN ...]` — a pure read.
    ReadQuery(ReadQuery),
    /// `CREATE ... [RETURN ...]` — a write with no preceding MATCH.
    WriteStandalone(WriteStandaloneQuery),
    /// `MATCH ... [WHERE ...] [SET ...] [CREATE ...] [RETURN ...]` — a
    /// read feeding a write (SET, CREATE, or both).
    ReadWrite(ReadWriteQuery),
    /// `MERGE ... [ON CREATE SET ...] [ON MATCH SET ...] [RETURN ...]`
    /// — an upsert with no preceding MATCH.
    UpsertQuery(UpsertQueryBody),
    /// `MATCH ... [WHERE ...] MERGE ... [RETURN ...]` — a read feeding
    /// an upsert.
    ReadUpsert(ReadUpsertQuery),
    /// `MATCH ... [WHERE ...] DETACH? DELETE ...` — a read feeding a
    /// delete. Cannot carry a SET clause.
    ReadDelete(ReadDeleteQuery),
}

impl Query {
    /// The MATCH clause, for every variant that has one.
    pub fn match_clause(&self) -> Option<&MatchClause> {
        match self {
            Query::ReadQuery(q) => Some(&q.match_clause),
            Query::ReadWrite(q) => Some(&q.match_clause),
            Query::ReadUpsert(q) => Some(&q.match_clause),
            Query::ReadDelete(q) => Some(&q.match_clause),
            Query::WriteStandalone(_) | Query::UpsertQuery(_) => None,
        }
    }

    pub fn where_clause(&self) -> Option<&WhereExpr> {
        self.match_clause().and_then(|mc| mc.where_clause.as_ref())
    }

    pub fn set_clause(&self) -> Option<&SetClause> {
        match self {
            Query::ReadWrite(q) => q.set_clause.as_ref(),
            _ => None,
        }
    }

    /// CREATE patterns, for the two variants that carry one.
    pub fn create_patterns(&self) -> &[Pattern] {
        match self {
            Query::WriteStandalone(q) => &q.create_patterns,
            Query::ReadWrite(q) => &q.create_patterns,
            _ => &[],
        }
    }

    pub fn merge(&self) -> Option<&MergePart> {
        match self {
            Query::UpsertQuery(q) => Some(&q.merge),
            Query::ReadUpsert(q) => Some(&q.merge),
            _ => None,
        }
    }

    pub fn return_part(&self) -> Option<&ReturnPart> {
        match self {
            Query::ReadQuery(q) => q.return_part.as_ref(),
            Query::WriteStandalone(q) => q.return_part.as_ref(),
            Query::ReadWrite(q) => q.return_part.as_ref(),
            Query::UpsertQuery(q) => q.return_part.as_ref(),
            Query::ReadUpsert(q) => q.return_part.as_ref(),
            Query::ReadDelete(_) => None,
        }
    }

    pub fn delete(&self) -> Option<&DeletePart> {
        match self {
            Query::ReadDelete(q) => Some(&q.delete),
            _ => None,
        }
    }

    /// Every pattern the query carries, across whichever clauses this
    /// variant has — used by the hop-limit check and the projector,
    /// which both need the full pattern set regardless of clause role.
    pub fn all_patterns(&self) -> Vec<&Pattern> {
        let mut patterns = Vec::new();
        if let Some(mc) = self.match_clause() {
            patterns.extend(mc.patterns.iter());
        }
        patterns.extend(self.create_patterns().iter());
        if let Some(merge) = self.merge() {
            patterns.extend(merge.patterns.iter());
        }
        patterns
    }
}

/// `MATCH pattern (, pattern)* [WHERE ...]`, shared by every variant
/// that reads before acting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchClause {
    pub patterns: Vec<Pattern>,
    pub where_clause: Option<WhereExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadQuery {
    pub match_clause: MatchClause,
    pub return_part: Option<ReturnPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteStandaloneQuery {
    pub create_patterns: Vec<Pattern>,
    pub return_part: Option<ReturnPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadWriteQuery {
    pub match_clause: MatchClause,
    pub set_clause: Option<SetClause>,
    pub create_patterns: Vec<Pattern>,
    pub return_part: Option<ReturnPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertQueryBody {
    pub merge: MergePart,
    pub return_part: Option<ReturnPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadUpsertQuery {
    pub match_clause: MatchClause,
    pub merge: MergePart,
    pub return_part: Option<ReturnPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadDeleteQuery {
    pub match_clause: MatchClause,
    pub delete: DeletePart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergePart {
    pub patterns: Vec<Pattern>,
    pub on_create: Vec<SetItem>,
    pub on_match: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPart {
    pub items: Vec<ReturnItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnItem {
    /// `RETURN v` — the full node record.
    Node(String),
    /// `RETURN v.name` / `RETURN v.id` — a single field.
    Field(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletePart {
    pub detach: bool,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub items: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    PropertyAssign {
        variable: String,
        property: NodeProperty,
        /// `None` clears the property (assignment to `NULL`).
        value: Option<String>,
    },
    TypeAssign {
        variable: String,
        type_label: String,
    },
}

impl SetItem {
    pub fn variable(&self) -> &str {
        match self {
            SetItem::PropertyAssign { variable, .. } => variable,
            SetItem::TypeAssign { variable, .. } => variable,
        }
    }
}

/// An alternating sequence of node and relationship patterns, beginning
/// and ending with a node pattern (§3). Multiple patterns within one
/// clause share a single variable scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub elements: Vec<PatternElement>,
}

impl Pattern {
    pub fn nodes(&self) -> impl Iterator<Item = &NodePattern> {
        self.elements.iter().filter_map(|e| match e {
            PatternElement::Node(n) => Some(n),
            PatternElement::Relationship(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    Node(NodePattern),
    Relationship(RelationshipPattern),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: String,
    /// Case-sensitive, optional.
    pub type_label: Option<String>,
    /// Exact string equality derived from inline `{name: "..."}`.
    pub name_constraint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<String>,
    pub relation_set: RelationSet,
    pub hop_min: u32,
    /// `Fixed(m)` from `*N` (m = N) or `*N..M` (m = M); default `(1,1)`
    /// hop is `Fixed(1)`. `Unbounded` is syntactically representable so
    /// the semantic validator — not the parser — can reject bare `*`
    /// and `*N..` with the specific "missing upper hop bound" rule §4.3
    /// requires (a parse-time rejection would conflate the two kinds of
    /// error the spec keeps separate).
    pub hop_max: HopBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopBound {
    Fixed(u32),
    Unbounded,
}

/// The expanded-or-not relation set of a relationship pattern (§3).
/// Wildcards never include `Parent` — see [`Relation::FORWARD`].
#[derive(Debug, Clone, PartialEq)]
pub enum RelationSet {
    Single(Relation),
    Union(Vec<Relation>),
    Wildcard,
}

impl RelationSet {
    /// The concrete relation codes a traversal over this set should
    /// filter `neighborhood` calls by (§4.6).
    pub fn expand(&self) -> Vec<Relation> {
        match self {
            RelationSet::Single(r) => vec![*r],
            RelationSet::Union(rs) => rs.clone(),
            RelationSet::Wildcard => Relation::FORWARD.to_vec(),
        }
    }

    /// Write patterns reject wildcard/union relations (§4.2).
    pub fn is_exact_single(&self) -> bool {
        matches!(self, RelationSet::Single(_))
    }
}

/// A boolean expression tree over atoms (§3). Precedence, lowest to
/// highest: `OR` < `XOR` < `AND` < `NOT`.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereExpr {
    Or(Box<WhereExpr>, Box<WhereExpr>),
    Xor(Box<WhereExpr>, Box<WhereExpr>),
    And(Box<WhereExpr>, Box<WhereExpr>),
    Not(Box<WhereExpr>),
    Atom(Atom),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    NameCompare {
        variable: String,
        op: CompareOp,
        literal: String,
    },
    IsNull {
        variable: String,
        property: NullableProperty,
    },
    IsNotNull {
        variable: String,
        property: NullableProperty,
    },
}

impl Atom {
    pub fn variable(&self) -> &str {
        match self {
            Atom::NameCompare { variable, .. } => variable,
            Atom::IsNull { variable, .. } => variable,
            Atom::IsNotNull { variable, .. } => variable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    /// `=~`: strict exact-name first, similarity-ranked search fallback.
    Similar,
}

/// Properties `IS NULL` / `IS NOT NULL` may test (§4.7). `name` and
/// `id` are never null; `kind` is never null; these are therefore not
/// members of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullableProperty {
    Label,
    TypeId,
    ForegroundColor,
    BackgroundColor,
}

impl NullableProperty {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "label" => Some(NullableProperty::Label),
            "typeId" => Some(NullableProperty::TypeId),
            "foregroundColor" => Some(NullableProperty::ForegroundColor),
            "backgroundColor" => Some(NullableProperty::BackgroundColor),
            _ => None,
        }
    }
}
