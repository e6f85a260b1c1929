//! SDC merge engine.
//!
//! Contract: strictly grow the existing claim graph. Pre-existing statements
//! are returned verbatim (same `hash`, `id`, qualifiers, qualifier order,
//! and references), and a proposed statement whose mainsnak already exists
//! contributes nothing, not even its qualifiers. Only genuinely new mainsnaks
//! are appended, with any server-assigned fields stripped.

use std::collections::BTreeMap;

use super::claim::{Reference, Snak, Statement};

pub type Qualifiers = BTreeMap<String, Vec<Snak>>;

/// Merge a proposed statement list into an existing one. Output order is the
/// existing statements (untouched, in order) followed by new statements in
/// proposed order.
pub fn merge_statements(existing: &[Statement], proposed: &[Statement]) -> Vec<Statement> {
    let mut merged: Vec<Statement> = existing.to_vec();

    for candidate in proposed {
        let already_present = merged
            .iter()
            .any(|s| s.mainsnak.value_eq(&candidate.mainsnak));
        if already_present {
            // First match wins and is kept verbatim; the candidate's
            // qualifiers and references are not overlaid onto it.
            continue;
        }
        merged.push(strip_server_fields(candidate.clone()));
    }

    merged
}

/// Merge qualifier snaks into an existing qualifier map. Existing entries and
/// their order are untouched; new snaks either join their property's list or
/// append a new property to the order.
pub fn merge_qualifiers(
    existing: &Qualifiers,
    existing_order: &[String],
    new_snaks: &[Snak],
) -> (Qualifiers, Vec<String>) {
    let mut merged = existing.clone();
    let mut order = existing_order.to_vec();

    for snak in new_snaks {
        match merged.get_mut(&snak.property) {
            Some(snaks) => {
                if !snaks.iter().any(|s| s.value_eq(snak)) {
                    snaks.push(snak.clone());
                }
            }
            None => {
                order.push(snak.property.clone());
                merged.insert(snak.property.clone(), vec![snak.clone()]);
            }
        }
    }

    (merged, order)
}

/// Append new references that are not structurally equal to any existing one.
pub fn merge_references(existing: &[Reference], new: &[Reference]) -> Vec<Reference> {
    let mut merged = existing.to_vec();

    for reference in new {
        if !merged.iter().any(|r| references_equal(r, reference)) {
            merged.push(reference.clone());
        }
    }

    merged
}

/// Two references are structurally equal iff their snak orders match and each
/// property's snak lists are pairwise value-equal. Hashes do not participate.
fn references_equal(a: &Reference, b: &Reference) -> bool {
    if a.snaks_order != b.snaks_order {
        return false;
    }
    if a.snaks.len() != b.snaks.len() {
        return false;
    }
    a.snaks.iter().all(|(prop, snaks)| match b.snaks.get(prop) {
        Some(other) => {
            snaks.len() == other.len()
                && snaks.iter().zip(other.iter()).all(|(x, y)| x.value_eq(y))
        }
        None => false,
    })
}

/// A statement appended from the proposed list must not carry server-assigned
/// identity: the wiki mints those on write.
fn strip_server_fields(mut statement: Statement) -> Statement {
    statement.id = None;
    statement.mainsnak.hash = None;
    if let Some(qualifiers) = statement.qualifiers.as_mut() {
        for snaks in qualifiers.values_mut() {
            for snak in snaks.iter_mut() {
                snak.hash = None;
            }
        }
    }
    if let Some(references) = statement.references.as_mut() {
        for reference in references.iter_mut() {
            reference.hash = None;
            for snaks in reference.snaks.values_mut() {
                for snak in snaks.iter_mut() {
                    snak.hash = None;
                }
            }
        }
    }
    statement
}
