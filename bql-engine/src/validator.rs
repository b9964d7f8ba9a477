//! Semantic validator (§4.3). Runs after a successful parse and rejects
//! queries that are grammatically well-formed but violate a static
//! rule: unbounded hop specifiers, cross-variable `OR`/`XOR`, and
//! `IS NULL`/`IS NOT NULL` atoms that would be the sole driver of a
//! variable's resolution.

use crate::ast::*;
use crate::error::Error;
use std::collections::HashSet;

pub fn validate(query: &Query) -> Result<(), Error> {
    validate_hops(query)?;

    if let Some(where_clause) = query.where_clause() {
        validate_no_cross_variable_or_xor(where_clause)?;
        validate_is_null_not_sole_driver(&query.all_patterns(), where_clause)?;
    }

    Ok(())
}

fn validate_hops(query: &Query) -> Result<(), Error> {
    for pattern in query.all_patterns() {
        for element in &pattern.elements {
            if let PatternElement::Relationship(rel) = element {
                match rel.hop_max {
                    HopBound::Unbounded => {
                        return Err(Error::semantic(
                            "hop specifier has no upper bound (bare `*` and `*N..` are rejected)",
                        ));
                    }
                    HopBound::Fixed(max) => {
                        if max > 5 {
                            return Err(Error::semantic(format!(
                                "hop upper bound {max} exceeds the maximum of 5"
                            )));
                        }
                        if max < rel.hop_min {
                            return Err(Error::semantic(format!(
                                "hop upper bound {max} is less than hop lower bound {}",
                                rel.hop_min
                            )));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn variables_used(expr: &WhereExpr, out: &mut HashSet<String>) {
    match expr {
        WhereExpr::Or(l, r) | WhereExpr::Xor(l, r) | WhereExpr::And(l, r) => {
            variables_used(l, out);
            variables_used(r, out);
        }
        WhereExpr::Not(inner) => variables_used(inner, out),
        WhereExpr::Atom(atom) => {
            out.insert(atom.variable().to_string());
        }
    }
}

fn validate_no_cross_variable_or_xor(expr: &WhereExpr) -> Result<(), Error> {
    match expr {
        WhereExpr::Or(l, r) | WhereExpr::Xor(l, r) => {
            let mut vars = HashSet::new();
            variables_used(l, &mut vars);
            variables_used(r, &mut vars);
            if vars.len() > 1 {
                return Err(Error::semantic(
                    "OR/XOR cannot combine predicates over different variables",
                ));
            }
            validate_no_cross_variable_or_xor(l)?;
            validate_no_cross_variable_or_xor(r)?;
        }
        WhereExpr::And(l, r) => {
            validate_no_cross_variable_or_xor(l)?;
            validate_no_cross_variable_or_xor(r)?;
        }
        WhereExpr::Not(inner) => validate_no_cross_variable_or_xor(inner)?,
        WhereExpr::Atom(_) => {}
    }
    Ok(())
}

/// Variables that are the right-hand endpoint of some relationship in
/// some pattern — the planner will defer their resolution to the
/// traversal executor (§4.4), so an `IS NULL`-only predicate on them is
/// a legitimate post-filter, not their sole resolution driver.
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

fn collect_atoms<'a>(expr: &'a WhereExpr, out: &mut Vec<&'a Atom>) {
    match expr {
        WhereExpr::Or(l, r) | WhereExpr::Xor(l, r) | WhereExpr::And(l, r) => {
            collect_atoms(l, out);
            collect_atoms(r, out);
        }
        WhereExpr::Not(inner) => collect_atoms(inner, out),
        WhereExpr::Atom(atom) => out.push(atom),
    }
}

fn validate_is_null_not_sole_driver(
    patterns: &[&Pattern],
    where_clause: &WhereExpr,
) -> Result<(), Error> {
    let downstream = downstream_variables(patterns);

    let mut atoms = Vec::new();
    collect_atoms(where_clause, &mut atoms);

    let mut has_name_atom: HashSet<String> = HashSet::new();
    let mut has_null_atom: HashSet<String> = HashSet::new();
    for atom in &atoms {
        match atom {
            Atom::NameCompare { variable, .. } => {
                has_name_atom.insert(variable.clone());
            }
            Atom::IsNull { variable, .. } | Atom::IsNotNull { variable, .. } => {
                has_null_atom.insert(variable.clone());
            }
        }
    }

    for variable in &has_null_atom {
        let has_name = has_name_atom.contains(variable);
        let is_downstream = downstream.contains(variable);
        if !has_name && !is_downstream {
            return Err(Error::semantic(format!(
                "IS NULL/IS NOT NULL on `{variable}` cannot be the sole driver of its resolution"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse(q: &str) -> Query {
        Parser::parse(q).unwrap()
    }

    #[test]
    fn rejects_unbounded_hop_upper_bound() {
        let q = parse(r#"MATCH (n {name: "A"})-[:CHILD*1..6]->(m) RETURN m"#);
        assert!(validate(&q).is_err());
    }

    #[test]
    fn accepts_hop_bound_at_the_maximum() {
        let q = parse(r#"MATCH (n {name: "A"})-[:CHILD*1..5]->(m) RETURN m"#);
        assert!(validate(&q).is_ok());
    }

    #[test]
    fn rejects_is_null_as_sole_driver() {
        let q = parse(r#"MATCH (n) WHERE n.label IS NULL RETURN n"#);
        assert!(validate(&q).is_err());
    }

    #[test]
    fn accepts_is_null_when_sharing_clause_with_name_atom() {
        let q = parse(r#"MATCH (n) WHERE n.name = "A" AND n.label IS NULL RETURN n"#);
        assert!(validate(&q).is_ok());
    }

    #[test]
    fn accepts_is_null_on_downstream_variable() {
        let q = parse(
            r#"MATCH (n {name: "A"})-[:CHILD]->(m) WHERE m.label IS NULL RETURN m"#,
        );
        assert!(validate(&q).is_ok());
    }

    #[test]
    fn rejects_cross_variable_or() {
        let q = parse(
            r#"MATCH (n {name: "A"}), (m {name: "B"}) WHERE n.name = "A" OR m.name = "B" RETURN n"#,
        );
        assert!(validate(&q).is_err());
    }

    #[test]
    fn accepts_same_variable_or() {
        let q = parse(
            r#"MATCH (n) WHERE n.name CONTAINS "a" OR n.name CONTAINS "b" RETURN n"#,
        );
        assert!(validate(&q).is_ok());
    }
}
