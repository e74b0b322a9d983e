//! Dependency graph validation
//!
//! Nodes are binding keys; edges are the component references each bound
//! provider declares. Edges through a `Provider` reference are checked for
//! existence but never followed, so deferred handles break cycles.

use crate::component::{Component, Wrapper};
use crate::storage::Bindings;
use crate::{DiError, Result};
use ahash::RandomState;
use std::collections::HashSet;

#[cfg(feature = "logging")]
use tracing::debug;

/// Check every binding for missing and cyclic dependencies
///
/// Every key is walked, not only the ones reachable from some root, so that
/// an unreferenced but broken binding still fails.
pub(crate) fn validate(bindings: &Bindings) -> Result<()> {
    let mut checked: HashSet<Component, RandomState> = HashSet::default();
    let mut visiting: Vec<Component> = Vec::new();

    for component in ordered(bindings) {
        visit(bindings, component, &mut visiting, &mut checked)?;
    }

    #[cfg(feature = "logging")]
    debug!(
        target: "inject_context",
        bindings = bindings.len(),
        "Dependency graph validated"
    );

    Ok(())
}

/// Binding keys sorted by display name, independent of hash order
pub(crate) fn ordered(bindings: &Bindings) -> Vec<&Component> {
    let mut keys: Vec<&Component> = bindings.keys().collect();
    keys.sort_by_cached_key(|component| component.to_string());
    keys
}

fn visit(
    bindings: &Bindings,
    component: &Component,
    visiting: &mut Vec<Component>,
    checked: &mut HashSet<Component, RandomState>,
) -> Result<()> {
    if checked.contains(component) {
        return Ok(());
    }
    if let Some(start) = visiting.iter().position(|c| c == component) {
        return Err(DiError::cyclic(visiting[start..].iter().cloned()));
    }
    let Some(provider) = bindings.get(component) else {
        return Ok(());
    };

    visiting.push(component.clone());
    for reference in provider.dependencies() {
        let dependency = reference.component();
        let missing = || DiError::DependencyNotFound {
            component: component.clone(),
            dependency: dependency.clone(),
        };

        match reference.container() {
            Some(Wrapper::Other(_)) => return Err(missing()),
            _ if !bindings.contains_key(&dependency) => return Err(missing()),
            Some(Wrapper::Provider) => continue,
            None => visit(bindings, &dependency, visiting, checked)?,
        }
    }
    visiting.pop();

    checked.insert(component.clone());
    Ok(())
}
