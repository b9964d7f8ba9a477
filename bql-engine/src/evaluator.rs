//! Predicate evaluator (§4.7). Runs over already-resolved candidates —
//! it never triggers a graph-service call of its own.

use crate::ast::{Atom, CompareOp, NullableProperty, WhereExpr};
use bql_api::NodeRecord;
use std::collections::HashMap;

pub fn evaluate_atom(atom: &Atom, node: &NodeRecord) -> bool {
    match atom {
        Atom::NameCompare { op, literal, .. } => match op {
            CompareOp::Equals => node.name == *literal,
            CompareOp::Contains => node.name.to_lowercase().contains(&literal.to_lowercase()),
            CompareOp::StartsWith => node.name.to_lowercase().starts_with(&literal.to_lowercase()),
            CompareOp::EndsWith => node.name.to_lowercase().ends_with(&literal.to_lowercase()),
            // Resolution already did the fuzzy work; by evaluation time
            // `=~` is just a name check against the candidate it surfaced.
            CompareOp::Similar => node.name == *literal,
        },
        Atom::IsNull { property, .. } => property_is_null(node, *property),
        Atom::IsNotNull { property, .. } => !property_is_null(node, *property),
    }
}

fn property_is_null(node: &NodeRecord, property: NullableProperty) -> bool {
    match property {
        NullableProperty::Label => node.label.as_deref().map(str::is_empty).unwrap_or(true),
        NullableProperty::TypeId => node.type_id.is_none(),
        NullableProperty::ForegroundColor => node.foreground_color.is_none(),
        NullableProperty::BackgroundColor => node.background_color.is_none(),
    }
}

/// Evaluates a WHERE tree over a fully-bound row — one node per
/// variable the tree mentions. Used once every pattern variable in a
/// query has a candidate (§4.7's final post-filter pass).
pub fn evaluate_row(expr: &WhereExpr, row: &HashMap<String, NodeRecord>) -> bool {
    match expr {
        WhereExpr::Or(l, r) => evaluate_row(l, row) || evaluate_row(r, row),
        WhereExpr::Xor(l, r) => evaluate_row(l, row) ^ evaluate_row(r, row),
        WhereExpr::And(l, r) => evaluate_row(l, row) && evaluate_row(r, row),
        WhereExpr::Not(inner) => !evaluate_row(inner, row),
        WhereExpr::Atom(atom) => match row.get(atom.variable()) {
            Some(node) => evaluate_atom(atom, node),
            None => false,
        },
    }
}

/// Partial filter restricted to one variable (§4.6's "WHERE-filtered
/// intermediates only continue traversal from surviving nodes"),
/// applied mid-traversal before every variable is bound. Clauses about
/// other variables pass through as neutral — the validator guarantees
/// `OR`/`XOR` never cross variables, so any subtree that mentions
/// `variable` at all consists entirely of atoms over `variable`.
pub fn matches_variable(expr: &WhereExpr, variable: &str, node: &NodeRecord) -> bool {
    match expr {
        WhereExpr::And(l, r) => {
            matches_variable(l, variable, node) && matches_variable(r, variable, node)
        }
        _ => {
            if mentions(expr, variable) {
                evaluate_single_variable(expr, node)
            } else {
                true
            }
        }
    }
}

fn evaluate_single_variable(expr: &WhereExpr, node: &NodeRecord) -> bool {
    match expr {
        WhereExpr::Or(l, r) => evaluate_single_variable(l, node) || evaluate_single_variable(r, node),
        WhereExpr::Xor(l, r) => evaluate_single_variable(l, node) ^ evaluate_single_variable(r, node),
        WhereExpr::And(l, r) => evaluate_single_variable(l, node) && evaluate_single_variable(r, node),
        WhereExpr::Not(inner) => !evaluate_single_variable(inner, node),
        WhereExpr::Atom(atom) => evaluate_atom(atom, node),
    }
}

fn mentions(expr: &WhereExpr, variable: &str) -> bool {
    match expr {
        WhereExpr::Or(l, r) | WhereExpr::Xor(l, r) | WhereExpr::And(l, r) => {
            mentions(l, variable) || mentions(r, variable)
        }
        WhereExpr::Not(inner) => mentions(inner, variable),
        WhereExpr::Atom(atom) => atom.variable() == variable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn where_clause(q: &str) -> WhereExpr {
        let ast = Parser::parse(q).unwrap();
        ast.where_clause().unwrap().clone()
    }

    fn node(name: &str) -> NodeRecord {
        NodeRecord {
            id: 1,
            name: name.to_string(),
            type_id: None,
            label: None,
            foreground_color: None,
            background_color: None,
            kind: "Thought".to_string(),
        }
    }

    #[test]
    fn contains_is_case_insensitive() {
        let expr = where_clause(r#"MATCH (n) WHERE n.name CONTAINS "RUS" RETURN n"#);
        assert!(evaluate_single_variable(&expr, &node("Rustacean")));
    }

    #[test]
    fn is_null_true_for_absent_label() {
        let mut n = node("Rust");
        n.label = None;
        assert!(property_is_null(&n, NullableProperty::Label));
        n.label = Some(String::new());
        assert!(property_is_null(&n, NullableProperty::Label));
        n.label = Some("x".into());
        assert!(!property_is_null(&n, NullableProperty::Label));
    }

    #[test]
    fn matches_variable_is_neutral_for_other_variables() {
        let expr = where_clause(
            r#"MATCH (n {name: "A"})-[:CHILD]->(m) WHERE m.label IS NULL RETURN m"#,
        );
        // n isn't mentioned at all — the filter must pass any n through.
        assert!(matches_variable(&expr, "n", &node("anything")));
    }

    #[test]
    fn matches_variable_filters_its_own_clause() {
        let expr = where_clause(r#"MATCH (n) WHERE n.label IS NULL RETURN n"#);
        let mut with_label = node("A");
        with_label.label = Some("x".into());
        assert!(!matches_variable(&expr, "n", &with_label));
        assert!(matches_variable(&expr, "n", &node("A")));
    }

    #[test]
    fn and_across_variables_decomposes_per_side() {
        let expr = where_clause(
            r#"MATCH (n {name: "A"}), (m {name: "B"}) WHERE n.name = "A" AND m.label IS NULL RETURN n"#,
        );
        assert!(matches_variable(&expr, "n", &node("A")));
        assert!(!matches_variable(&expr, "n", &node("Z")));
    }
}
