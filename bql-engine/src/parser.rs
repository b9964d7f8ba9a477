//! Recursive-descent parser over the grammar normatively defined for
//! BQL (§4.2):
//!
//! ```text
//! query := match_part? write_part? return_part? delete_part?
//! match_part := "MATCH" pattern ("," pattern)* where_clause? set_clause?
//! write_part := ("CREATE" pattern ("," pattern)*) | merge_part
//! merge_part := "MERGE" pattern ("," pattern)* on_create? on_match?
//! delete_part := "DETACH"? "DELETE" var ("," var)*
//! ```
//!
//! On any deviation this emits [`Error::ParseError`] with position and
//! an expected-token list. Structural legality not expressible in the
//! grammar alone (DELETE requires MATCH, SET/DELETE exclusivity, MERGE
//! name constraints, write-pattern wildcard rejection, unbound variable
//! references) is enforced here too, per §4.2's "post-structural rules".

use crate::ast::*;
use crate::error::Error;
use crate::lexer::{Lexer, Token, TokenType};
use bql_api::{NodeProperty, Relation};
use std::collections::HashSet;

pub struct Parser;

/// The write clause as parsed, before it is folded into whichever
/// [`Query`] variant its presence (and a preceding MATCH, if any)
/// selects.
enum ParsedWrite {
    Create(Vec<Pattern>),
    Merge(MergePart),
}

impl Parser {
    pub fn parse(input: &str) -> Result<Query, Error> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().map_err(|msg| Error::ParseError {
            line: 0,
            column: 0,
            expected: vec![],
            found: msg,
        })?;
        let mut parser = TokenParser::new(tokens);
        parser.parse_query()
    }
}

struct TokenParser {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn check(&self, tt: &TokenType) -> bool {
        &self.peek().token_type == tt
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.position += 1;
        }
        token
    }

    fn match_token(&mut self, tt: &TokenType) -> bool {
        if self.check(tt) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, tt: &TokenType, expected: &str) -> Result<Token, Error> {
        if self.check(tt) {
            Ok(self.advance())
        } else {
            Err(self.error(vec![expected.to_string()]))
        }
    }

    fn consume_identifier(&mut self, expected: &str) -> Result<String, Error> {
        match self.peek().token_type.clone() {
            TokenType::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(vec![expected.to_string()])),
        }
    }

    fn consume_string(&mut self, expected: &str) -> Result<String, Error> {
        match self.peek().token_type.clone() {
            TokenType::String(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.error(vec![expected.to_string()])),
        }
    }

    fn error(&self, expected: Vec<String>) -> Error {
        let token = self.peek();
        Error::ParseError {
            line: token.line,
            column: token.column,
            expected,
            found: format!("{:?}", token.token_type),
        }
    }

    // ---- top level ----

    fn parse_query(&mut self) -> Result<Query, Error> {
        let mut bound: HashSet<String> = HashSet::new();

        let (match_clause, set_clause) = if self.match_token(&TokenType::Match) {
            self.parse_match_clause(&mut bound)?
        } else {
            (None, None)
        };

        let write = if self.match_token(&TokenType::Create) {
            let patterns = self.parse_pattern_list(&mut bound)?;
            Self::reject_wildcard_relations(&patterns)?;
            Some(ParsedWrite::Create(patterns))
        } else if self.match_token(&TokenType::Merge) {
            let merge_part = self.parse_merge_part(&mut bound)?;
            Self::reject_wildcard_relations(&merge_part.patterns)?;
            Some(ParsedWrite::Merge(merge_part))
        } else {
            None
        };

        let return_part = if self.match_token(&TokenType::Return) {
            Some(self.parse_return_part(&bound)?)
        } else {
            None
        };

        let delete = if self.check(&TokenType::Detach) || self.check(&TokenType::Delete) {
            Some(self.parse_delete_part(&bound)?)
        } else {
            None
        };

        if !self.is_at_end() {
            return Err(self.error(vec!["end of query".to_string()]));
        }

        Self::build_query(match_clause, set_clause, write, return_part, delete)
    }

    /// Assembles the parsed clause fragments into the one [`Query`]
    /// variant they legally form. Combinations the grammar never
    /// forbade outright — DELETE without a preceding MATCH, DELETE
    /// alongside CREATE/MERGE, SET alongside DELETE — are rejected
    /// here; every surviving combination maps onto exactly one variant.
    fn build_query(
        match_clause: Option<MatchClause>,
        set_clause: Option<SetClause>,
        write: Option<ParsedWrite>,
        return_part: Option<ReturnPart>,
        delete: Option<DeletePart>,
    ) -> Result<Query, Error> {
        if let Some(delete) = delete {
            let Some(match_clause) = match_clause else {
                return Err(Error::semantic("DELETE requires a preceding MATCH"));
            };
            if write.is_some() {
                return Err(Error::semantic(
                    "DELETE cannot be combined with CREATE/MERGE in the same query",
                ));
            }
            if set_clause.is_some() {
                return Err(Error::semantic("SET and DELETE cannot coexist"));
            }
            return Ok(Query::ReadDelete(ReadDeleteQuery { match_clause, delete }));
        }

        match (match_clause, write) {
            (Some(match_clause), None) if set_clause.is_none() => {
                Ok(Query::ReadQuery(ReadQuery { match_clause, return_part }))
            }
            (Some(match_clause), None) => Ok(Query::ReadWrite(ReadWriteQuery {
                match_clause,
                set_clause,
                create_patterns: Vec::new(),
                return_part,
            })),
            (Some(match_clause), Some(ParsedWrite::Create(create_patterns))) => {
                Ok(Query::ReadWrite(ReadWriteQuery {
                    match_clause,
                    set_clause,
                    create_patterns,
                    return_part,
                }))
            }
            (Some(match_clause), Some(ParsedWrite::Merge(merge))) => {
                Ok(Query::ReadUpsert(ReadUpsertQuery { match_clause, merge, return_part }))
            }
            (None, Some(ParsedWrite::Create(create_patterns))) => {
                Ok(Query::WriteStandalone(WriteStandaloneQuery { create_patterns, return_part }))
            }
            (None, Some(ParsedWrite::Merge(merge))) => {
                Ok(Query::UpsertQuery(UpsertQueryBody { merge, return_part }))
            }
            (None, None) => Err(Error::semantic(
                "a query must contain at least MATCH, CREATE, or MERGE",
            )),
        }
    }

    fn parse_match_clause(
        &mut self,
        bound: &mut HashSet<String>,
    ) -> Result<(Option<MatchClause>, Option<SetClause>), Error> {
        let patterns = self.parse_pattern_list(bound)?;

        let where_clause = if self.match_token(&TokenType::Where) {
            Some(self.parse_where_expr(bound)?)
        } else {
            None
        };

        let set_clause = if self.match_token(&TokenType::Set) {
            Some(self.parse_set_clause(bound)?)
        } else {
            None
        };

        Ok((Some(MatchClause { patterns, where_clause }), set_clause))
    }

    fn parse_merge_part(&mut self, bound: &mut HashSet<String>) -> Result<MergePart, Error> {
        let newly_bound_before = bound.clone();
        let patterns = self.parse_pattern_list(bound)?;

        let has_name_constraint = patterns.iter().any(|p| {
            p.nodes()
                .any(|n| !newly_bound_before.contains(&n.variable) && n.name_constraint.is_some())
        });
        if !has_name_constraint {
            return Err(Error::semantic(
                "MERGE pattern must constrain at least one newly introduced variable by name",
            ));
        }

        let mut on_create = Vec::new();
        let mut on_match = Vec::new();
        loop {
            if self.check(&TokenType::On) {
                let save = self.position;
                self.advance();
                if self.match_token(&TokenType::Create) {
                    self.consume(&TokenType::Set, "SET")?;
                    on_create.extend(self.parse_set_items(bound)?);
                    continue;
                } else if self.match_token(&TokenType::Match) {
                    self.consume(&TokenType::Set, "SET")?;
                    on_match.extend(self.parse_set_items(bound)?);
                    continue;
                } else {
                    self.position = save;
                }
            }
            break;
        }

        Ok(MergePart {
            patterns,
            on_create,
            on_match,
        })
    }

    fn parse_return_part(&mut self, bound: &HashSet<String>) -> Result<ReturnPart, Error> {
        let mut items = Vec::new();
        loop {
            let var = self.consume_identifier("variable")?;
            if !bound.contains(&var) {
                return Err(Error::semantic(format!(
                    "RETURN references unbound variable `{var}`"
                )));
            }
            if self.match_token(&TokenType::Dot) {
                let field = self.consume_identifier("field name")?;
                items.push(ReturnItem::Field(var, field));
            } else {
                items.push(ReturnItem::Node(var));
            }
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(ReturnPart { items })
    }

    fn parse_delete_part(&mut self, bound: &HashSet<String>) -> Result<DeletePart, Error> {
        let detach = self.match_token(&TokenType::Detach);
        self.consume(&TokenType::Delete, "DELETE")?;
        let mut variables = Vec::new();
        loop {
            let var = self.consume_identifier("variable")?;
            if !bound.contains(&var) {
                return Err(Error::semantic(format!(
                    "DELETE references unbound variable `{var}`"
                )));
            }
            variables.push(var);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(DeletePart { detach, variables })
    }

    // ---- patterns ----

    fn reject_wildcard_relations(patterns: &[Pattern]) -> Result<(), Error> {
        for pattern in patterns {
            for element in &pattern.elements {
                if let PatternElement::Relationship(r) = element {
                    if !r.relation_set.is_exact_single() {
                        return Err(Error::semantic(
                            "write patterns cannot contain wildcard or union relations",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_pattern_list(&mut self, bound: &mut HashSet<String>) -> Result<Vec<Pattern>, Error> {
        let mut patterns = vec![self.parse_pattern(bound)?];
        while self.match_token(&TokenType::Comma) {
            patterns.push(self.parse_pattern(bound)?);
        }
        Ok(patterns)
    }

    fn parse_pattern(&mut self, bound: &mut HashSet<String>) -> Result<Pattern, Error> {
        let mut elements = vec![PatternElement::Node(self.parse_node_pattern(bound)?)];
        loop {
            if self.check(&TokenType::Arrow) {
                self.advance();
                elements.push(PatternElement::Relationship(RelationshipPattern {
                    variable: None,
                    relation_set: RelationSet::Wildcard,
                    hop_min: 1,
                    hop_max: HopBound::Fixed(1),
                }));
                elements.push(PatternElement::Node(self.parse_node_pattern(bound)?));
            } else if self.check(&TokenType::RelOpen) {
                self.advance();
                elements.push(PatternElement::Relationship(
                    self.parse_relationship_body(bound)?,
                ));
                elements.push(PatternElement::Node(self.parse_node_pattern(bound)?));
            } else {
                break;
            }
        }
        Ok(Pattern { elements })
    }

    fn parse_node_pattern(&mut self, bound: &mut HashSet<String>) -> Result<NodePattern, Error> {
        self.consume(&TokenType::LeftParen, "(")?;
        let variable = self.consume_identifier("variable")?;
        let already_bound = bound.contains(&variable);

        let type_label = if self.match_token(&TokenType::Colon) {
            Some(self.consume_identifier("type label")?)
        } else {
            None
        };

        let name_constraint = if self.match_token(&TokenType::LeftBrace) {
            let key = self.consume_identifier("name")?;
            if key != "name" {
                return Err(Error::semantic(
                    "inline node properties support only `name`",
                ));
            }
            self.consume(&TokenType::Colon, ":")?;
            let value = self.consume_string("string literal")?;
            self.consume(&TokenType::RightBrace, "}")?;
            Some(value)
        } else {
            None
        };

        self.consume(&TokenType::RightParen, ")")?;

        // A bare re-mention of an already-bound variable is a reference to the
        // existing binding (e.g. reusing `n` as a CREATE endpoint); attaching
        // new constraints to an already-bound variable is a redefinition.
        if already_bound && (type_label.is_some() || name_constraint.is_some()) {
            return Err(Error::semantic(format!(
                "variable `{variable}` redefined in the same scope"
            )));
        }
        bound.insert(variable.clone());

        Ok(NodePattern {
            variable,
            type_label,
            name_constraint,
        })
    }

    fn parse_relationship_body(
        &mut self,
        bound: &mut HashSet<String>,
    ) -> Result<RelationshipPattern, Error> {
        let variable = if let TokenType::Identifier(_) = self.peek().token_type {
            let name = self.consume_identifier("relation variable")?;
            if bound.contains(&name) {
                return Err(Error::semantic(format!(
                    "variable `{name}` redefined in the same scope"
                )));
            }
            bound.insert(name.clone());
            Some(name)
        } else {
            None
        };

        let relation_set = if self.match_token(&TokenType::Colon) {
            let mut relations = vec![self.parse_relation_type()?];
            while self.match_token(&TokenType::Pipe) {
                relations.push(self.parse_relation_type()?);
            }
            if relations.len() == 1 {
                RelationSet::Single(relations[0])
            } else {
                RelationSet::Union(relations)
            }
        } else {
            RelationSet::Wildcard
        };

        let (hop_min, hop_max) = if self.match_token(&TokenType::Asterisk) {
            match self.peek().token_type.clone() {
                TokenType::Integer(n) => {
                    self.advance();
                    if self.match_token(&TokenType::RangeDots) {
                        if let TokenType::Integer(m) = self.peek().token_type.clone() {
                            self.advance();
                            (n, HopBound::Fixed(m))
                        } else {
                            (n, HopBound::Unbounded)
                        }
                    } else {
                        (n, HopBound::Fixed(n))
                    }
                }
                _ => (1, HopBound::Unbounded),
            }
        } else {
            (1, HopBound::Fixed(1))
        };

        self.consume(&TokenType::RelClose, "]->")?;

        Ok(RelationshipPattern {
            variable,
            relation_set,
            hop_min,
            hop_max,
        })
    }

    fn parse_relation_type(&mut self) -> Result<Relation, Error> {
        let name = self.consume_identifier("relation type")?;
        match name.to_uppercase().as_str() {
            "CHILD" => Ok(Relation::Child),
            "PARENT" => Ok(Relation::Parent),
            "JUMP" => Ok(Relation::Jump),
            "SIBLING" => Ok(Relation::Sibling),
            _ => Err(Error::semantic(format!("unknown relation type `{name}`"))),
        }
    }

    // ---- SET ----

    fn parse_set_clause(&mut self, bound: &mut HashSet<String>) -> Result<SetClause, Error> {
        Ok(SetClause {
            items: self.parse_set_items(bound)?,
        })
    }

    fn parse_set_items(&mut self, bound: &HashSet<String>) -> Result<Vec<SetItem>, Error> {
        let mut items = Vec::new();
        loop {
            let var = self.consume_identifier("variable")?;
            if !bound.contains(&var) {
                return Err(Error::semantic(format!(
                    "SET references unbound variable `{var}`"
                )));
            }
            if self.match_token(&TokenType::Colon) {
                let type_label = self.consume_identifier("type label")?;
                items.push(SetItem::TypeAssign {
                    variable: var,
                    type_label,
                });
            } else {
                self.consume(&TokenType::Dot, ".")?;
                let prop_name = self.consume_identifier("property")?;
                let property = NodeProperty::from_str(&prop_name).ok_or_else(|| {
                    Error::semantic(format!("`{prop_name}` is not a settable property"))
                })?;
                self.consume(&TokenType::Equals, "=")?;
                let value = if self.match_token(&TokenType::Null) {
                    None
                } else {
                    Some(self.consume_string("string literal or NULL")?)
                };
                items.push(SetItem::PropertyAssign {
                    variable: var,
                    property,
                    value,
                });
            }
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        // `typeId` is not in NodeProperty's settable set (rejected above as
        // "not a settable property"), so `SET p:TypeName` vs `SET p.typeId = ...`
        // can never both appear — the §4.3 rule is enforced by construction.
        Ok(items)
    }

    // ---- WHERE ----

    fn parse_where_expr(&mut self, bound: &HashSet<String>) -> Result<WhereExpr, Error> {
        self.parse_or(bound)
    }

    fn parse_or(&mut self, bound: &HashSet<String>) -> Result<WhereExpr, Error> {
        let mut left = self.parse_xor(bound)?;
        while self.match_token(&TokenType::Or) {
            let right = self.parse_xor(bound)?;
            left = WhereExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_xor(&mut self, bound: &HashSet<String>) -> Result<WhereExpr, Error> {
        let mut left = self.parse_and(bound)?;
        while self.match_token(&TokenType::Xor) {
            let right = self.parse_and(bound)?;
            left = WhereExpr::Xor(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self, bound: &HashSet<String>) -> Result<WhereExpr, Error> {
        let mut left = self.parse_not(bound)?;
        while self.match_token(&TokenType::And) {
            let right = self.parse_not(bound)?;
            left = WhereExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self, bound: &HashSet<String>) -> Result<WhereExpr, Error> {
        if self.match_token(&TokenType::Not) {
            Ok(WhereExpr::Not(Box::new(self.parse_not(bound)?)))
        } else {
            self.parse_where_primary(bound)
        }
    }

    fn parse_where_primary(&mut self, bound: &HashSet<String>) -> Result<WhereExpr, Error> {
        if self.match_token(&TokenType::LeftParen) {
            let inner = self.parse_or(bound)?;
            self.consume(&TokenType::RightParen, ")")?;
            return Ok(inner);
        }
        Ok(WhereExpr::Atom(self.parse_atom(bound)?))
    }

    fn parse_atom(&mut self, bound: &HashSet<String>) -> Result<Atom, Error> {
        let variable = self.consume_identifier("variable")?;
        if !bound.contains(&variable) {
            return Err(Error::semantic(format!(
                "WHERE references unbound variable `{variable}`"
            )));
        }
        self.consume(&TokenType::Dot, ".")?;
        let property = self.consume_identifier("property")?;

        if property == "name" {
            if self.match_token(&TokenType::Equals) {
                let literal = self.consume_string("string literal")?;
                return Ok(Atom::NameCompare {
                    variable,
                    op: CompareOp::Equals,
                    literal,
                });
            }
            if self.match_token(&TokenType::Contains) {
                let literal = self.consume_string("string literal")?;
                return Ok(Atom::NameCompare {
                    variable,
                    op: CompareOp::Contains,
                    literal,
                });
            }
            if self.match_token(&TokenType::Starts) {
                self.consume(&TokenType::With, "WITH")?;
                let literal = self.consume_string("string literal")?;
                return Ok(Atom::NameCompare {
                    variable,
                    op: CompareOp::StartsWith,
                    literal,
                });
            }
            if self.match_token(&TokenType::Ends) {
                self.consume(&TokenType::With, "WITH")?;
                let literal = self.consume_string("string literal")?;
                return Ok(Atom::NameCompare {
                    variable,
                    op: CompareOp::EndsWith,
                    literal,
                });
            }
            if self.match_token(&TokenType::TildeEquals) {
                let literal = self.consume_string("string literal")?;
                return Ok(Atom::NameCompare {
                    variable,
                    op: CompareOp::Similar,
                    literal,
                });
            }
            return Err(self.error(vec!["=".into(), "CONTAINS".into(), "STARTS WITH".into(), "ENDS WITH".into(), "=~".into()]));
        }

        let nullable = NullableProperty::from_str(&property).ok_or_else(|| {
            Error::semantic(format!(
                "`{property}` supports only equality/IS NULL comparisons on `name` or nullable properties"
            ))
        })?;
        self.consume(&TokenType::Is, "IS")?;
        if self.match_token(&TokenType::Not) {
            self.consume(&TokenType::Null, "NULL")?;
            Ok(Atom::IsNotNull {
                variable,
                property: nullable,
            })
        } else {
            self.consume(&TokenType::Null, "NULL")?;
            Ok(Atom::IsNull {
                variable,
                property: nullable,
            })
        }
    }
}
