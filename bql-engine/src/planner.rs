//! Query planner (§4.4). Assigns each node-pattern variable a
//! resolution strategy before any graph-service call is made — the
//! resolver (§4.5) and traversal executor (§4.6) then simply carry out
//! the assignment.
//!
//! This does not attempt the general join/aggregate planning the wider
//! Cypher dialect needs; BQL's patterns are linear chains, so "planning"
//! here is choosing one of a handful of resolution strategies per
//! variable and nothing more.

use crate::ast::*;
use crate::error::Error;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub enum ResolutionStrategy {
    /// Inline `{name: "..."}` or a WHERE `=` atom.
    ExactName(String),
    /// `CONTAINS` / `STARTS WITH` / `ENDS WITH`.
    FullTextSearch { query: String, filter: NameFilter },
    /// `=~`: exact match first, similarity-ranked search fallback.
    SimilarityFallback(String),
    /// Only a type label, no name constraint: resolves to the type node
    /// itself, never to its instances.
    TypeOnly(String),
    /// No independent constraint, but reachable as the right-hand
    /// endpoint of a relationship — the traversal executor fills this
    /// variable's candidates in, not the resolver.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFilter {
    Contains,
    StartsWith,
    EndsWith,
}

impl NameFilter {
    fn matches(&self, name: &str, literal: &str) -> bool {
        let name = name.to_lowercase();
        let literal = literal.to_lowercase();
        match self {
            NameFilter::Contains => name.contains(&literal),
            NameFilter::StartsWith => name.starts_with(&literal),
            NameFilter::EndsWith => name.ends_with(&literal),
        }
    }

    pub fn apply(&self, name: &str, literal: &str) -> bool {
        self.matches(name, literal)
    }
}

#[derive(Debug, Clone)]
pub struct VariablePlan {
    pub strategy: ResolutionStrategy,
    /// A type label named on the pattern itself, applied as a post-hoc
    /// filter over whatever the strategy returns (§4.5 step 1) — except
    /// for `TypeOnly`, which already resolves to the type node.
    pub type_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub variables: HashMap<String, VariablePlan>,
}

impl Plan {
    pub fn variable(&self, name: &str) -> Option<&VariablePlan> {
        self.variables.get(name)
    }
}

pub fn plan(query: &Query) -> Result<Plan, Error> {
    let mut variables = HashMap::new();

    // MATCH and MERGE patterns are read-resolved: a name constraint,
    // WHERE atom, or type label on one of their variables picks a real
    // resolution strategy, because the node they describe is expected to
    // already exist. A CREATE pattern's variables are handled in the
    // second loop below instead — a node introduced only inside a
    // CREATE does not exist yet, so it must never be fed to
    // `choose_strategy`, which would otherwise hand an inline
    // `{name: "..."}` constraint straight to `ExactName` and have the
    // resolver look up a node before it has been created.
    let mut resolved_patterns: Vec<&Pattern> = Vec::new();
    if let Some(mc) = query.match_clause() {
        resolved_patterns.extend(mc.patterns.iter());
    }
    if let Some(merge) = query.merge() {
        resolved_patterns.extend(merge.patterns.iter());
    }
    let downstream = downstream_variables(&resolved_patterns);

    let where_clause = query.where_clause();
    let driving_atoms = where_clause
        .map(collect_driving_atoms)
        .unwrap_or_default();

    for pattern in &resolved_patterns {
        for node in pattern.nodes() {
            if variables.contains_key(&node.variable) {
                continue;
            }
            let strategy = choose_strategy(
                node,
                driving_atoms.get(node.variable.as_str()),
                downstream.contains(&node.variable),
            )?;
            variables.insert(
                node.variable.clone(),
                VariablePlan {
                    strategy,
                    type_label: node.type_label.clone(),
                },
            );
        }
    }

    for pattern in query.create_patterns() {
        for node in pattern.nodes() {
            if variables.contains_key(&node.variable) {
                // already bound by a MATCH/MERGE pattern, or by an
                // earlier occurrence of the same CREATE variable
                continue;
            }
            variables.insert(
                node.variable.clone(),
                VariablePlan {
                    strategy: ResolutionStrategy::Deferred,
                    type_label: node.type_label.clone(),
                },
            );
        }
    }

    Ok(Plan { variables })
}

fn downstream_variables(patterns: &[&Pattern]) -> HashSet<String> {
    let mut out = HashSet::new();
    for pattern in patterns {
        let mut seen_relationship = false;
        for element in &pattern.elements {
            match element {
                PatternElement::Relationship(_) => seen_relationship = true,
                PatternElement::Node(n) => {
                    if seen_relationship {
                        out.insert(n.variable.clone());
                    }
                    seen_relationship = false;
                }
            }
        }
    }
    out
}

/// Per variable, the first non-negated `NameCompare` atom found in the
/// WHERE tree — `NOT` never drives a resolution strategy (§4.3), it can
/// only post-filter a candidate set some other atom or traversal chain
/// already produced. When a variable carries more than one driving
/// atom (e.g. an `OR` of two `CONTAINS` clauses), the first one chosen
/// in tree order selects the resolver's initial net; the evaluator
/// (§4.7) re-checks the full boolean expression afterward, so a
/// narrower initial net never causes an incorrect result, only a
/// resolver call shaped by one branch of the predicate.
fn collect_driving_atoms(expr: &WhereExpr) -> HashMap<&str, &Atom> {
    let mut out = HashMap::new();
    collect_driving_atoms_into(expr, false, &mut out);
    out
}

fn collect_driving_atoms_into<'a>(
    expr: &'a WhereExpr,
    under_not: bool,
    out: &mut HashMap<&'a str, &'a Atom>,
) {
    match expr {
        WhereExpr::Or(l, r) | WhereExpr::Xor(l, r) | WhereExpr::And(l, r) => {
            collect_driving_atoms_into(l, under_not, out);
            collect_driving_atoms_into(r, under_not, out);
        }
        WhereExpr::Not(inner) => collect_driving_atoms_into(inner, true, out),
        WhereExpr::Atom(atom @ Atom::NameCompare { variable, .. }) => {
            if !under_not {
                out.entry(variable.as_str()).or_insert(atom);
            }
        }
        WhereExpr::Atom(_) => {}
    }
}

fn choose_strategy(
    node: &NodePattern,
    driving_atom: Option<&&Atom>,
    is_downstream: bool,
) -> Result<ResolutionStrategy, Error> {
    if let Some(name) = &node.name_constraint {
        return Ok(ResolutionStrategy::ExactName(name.clone()));
    }

    if let Some(Atom::NameCompare { op, literal, .. }) = driving_atom.map(|a| &**a) {
        let strategy = match op {
            CompareOp::Equals => ResolutionStrategy::ExactName(literal.clone()),
            CompareOp::Contains => ResolutionStrategy::FullTextSearch {
                query: literal.clone(),
                filter: NameFilter::Contains,
            },
            CompareOp::StartsWith => ResolutionStrategy::FullTextSearch {
                query: literal.clone(),
                filter: NameFilter::StartsWith,
            },
            CompareOp::EndsWith => ResolutionStrategy::FullTextSearch {
                query: literal.clone(),
                filter: NameFilter::EndsWith,
            },
            CompareOp::Similar => ResolutionStrategy::SimilarityFallback(literal.clone()),
        };
        return Ok(strategy);
    }

    if let Some(type_label) = &node.type_label {
        return Ok(ResolutionStrategy::TypeOnly(type_label.clone()));
    }

    if is_downstream {
        return Ok(ResolutionStrategy::Deferred);
    }

    Err(Error::resolution(
        &node.variable,
        "no name, type label, or WHERE constraint identifies this variable, and it is not reachable via a traversal chain",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn plan_of(q: &str) -> Plan {
        let query = Parser::parse(q).unwrap();
        plan(&query).unwrap()
    }

    #[test]
    fn inline_name_constraint_is_exact_name() {
        let p = plan_of(r#"MATCH (n {name: "Rust"}) RETURN n"#);
        assert!(matches!(
            p.variable("n").unwrap().strategy,
            ResolutionStrategy::ExactName(ref s) if s == "Rust"
        ));
    }

    #[test]
    fn contains_clause_is_full_text_search() {
        let p = plan_of(r#"MATCH (n) WHERE n.name CONTAINS "ru" RETURN n"#);
        assert!(matches!(
            p.variable("n").unwrap().strategy,
            ResolutionStrategy::FullTextSearch { filter: NameFilter::Contains, .. }
        ));
    }

    #[test]
    fn similar_operator_is_similarity_fallback() {
        let p = plan_of(r#"MATCH (n) WHERE n.name =~ "rst" RETURN n"#);
        assert!(matches!(
            p.variable("n").unwrap().strategy,
            ResolutionStrategy::SimilarityFallback(ref s) if s == "rst"
        ));
    }

    #[test]
    fn type_label_only_is_type_only() {
        let p = plan_of(r#"MATCH (n:Language) RETURN n"#);
        assert!(matches!(
            p.variable("n").unwrap().strategy,
            ResolutionStrategy::TypeOnly(ref s) if s == "Language"
        ));
    }

    #[test]
    fn downstream_unconstrained_variable_is_deferred() {
        let p = plan_of(r#"MATCH (n {name: "Rust"})-[:CHILD]->(m) RETURN m"#);
        assert!(matches!(
            p.variable("m").unwrap().strategy,
            ResolutionStrategy::Deferred
        ));
    }

    #[test]
    fn unconstrained_non_downstream_variable_is_rejected() {
        let query = Parser::parse(r#"MATCH (n) RETURN n"#).unwrap();
        assert!(plan(&query).is_err());
    }

    #[test]
    fn not_wrapped_atom_never_drives_resolution() {
        let query = Parser::parse(r#"MATCH (n) WHERE NOT n.name CONTAINS "x" RETURN n"#).unwrap();
        assert!(plan(&query).is_err());
    }

    #[test]
    fn create_only_variable_with_name_constraint_is_deferred_not_exact_name() {
        let p = plan_of(r#"CREATE (n {name: "X"})"#);
        assert!(matches!(
            p.variable("n").unwrap().strategy,
            ResolutionStrategy::Deferred
        ));
    }

    #[test]
    fn match_bound_variable_reused_in_create_keeps_its_resolution_strategy() {
        let p = plan_of(
            r#"MATCH (n {name: "A"}) CREATE (n)-[:CHILD]->(x {name: "Y"})"#,
        );
        assert!(matches!(
            p.variable("n").unwrap().strategy,
            ResolutionStrategy::ExactName(ref s) if s == "A"
        ));
        assert!(matches!(
            p.variable("x").unwrap().strategy,
            ResolutionStrategy::Deferred
        ));
    }
}
