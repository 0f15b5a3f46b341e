//! The transaction sort: every package must follow its
//! installable run-dependencies and precede its reverse dependencies.
//!
//! A dependency always ends up immediately before whichever package pulled
//! it in, the same effect `lib/transaction_sortdeps.c`'s linked-list
//! splicing achieves by a different route. This gets there directly via a
//! postorder DFS with a visited set, which also makes dependency cycles
//! terminate without an "already sorted" index heuristic.

use std::collections::{BTreeMap, HashSet};

use crate::matcher::Pattern;
use crate::pkgdb::{TransactionAction, TransactionEntry};

/// Orders `entries` so each package follows its installable run-dependencies
/// and precedes its reverse dependencies. Removals go to the
/// head, most-recently-discovered first, since within removes leaves must
/// go before their roots and ordering among independent removes is
/// otherwise unconstrained.
pub fn sort_transaction(entries: Vec<TransactionEntry>) -> Vec<TransactionEntry> {
    let order: Vec<String> = entries.iter().map(|e| e.name().to_owned()).collect();
    let input: BTreeMap<String, TransactionEntry> = entries.into_iter().map(|e| (e.name().to_owned(), e)).collect();

    let mut removals: Vec<String> = Vec::new();
    let mut installs: Vec<String> = Vec::new();
    let mut visiting: HashSet<String> = HashSet::new();
    let mut done: HashSet<String> = HashSet::new();

    for name in &order {
        match input.get(name).map(|e| e.action) {
            Some(TransactionAction::Remove) => removals.insert(0, name.clone()),
            Some(_) => visit(name, &input, &mut installs, &mut visiting, &mut done),
            None => {}
        }
    }

    removals
    .into_iter()
    .chain(installs)
    .filter_map(|name| input.get(&name).cloned())
    .collect()
}

fn visit(
    name: &str,
    input: &BTreeMap<String, TransactionEntry>,
    out: &mut Vec<String>,
    visiting: &mut HashSet<String>,
    done: &mut HashSet<String>,
) {
    if done.contains(name) || visiting.contains(name) {
        return;
    }
    let Some(entry) = input.get(name) else {
        return;
    };
    if entry.action == TransactionAction::Remove {
        return; // handled by the removal pass, not expanded here
    }

    visiting.insert(name.to_owned());
    for dep in &entry.pkg.run_depends {
        let Ok(pattern) = dep.parse::<Pattern>() else {
            continue;
        };
        let dep_name = pattern.name();
        if dep_name == name {
            continue; // self-edge, dropped
        }
        if !input.contains_key(dep_name) {
            continue; // satisfied by a package outside the transaction
        }
        visit(dep_name, input, out, visiting, done);
    }
    visiting.remove(name);

    done.insert(name.to_owned());
    out.push(name.to_owned());
}

#[cfg(test)]
#[path = "sort.test.rs"]
mod test;
