//! Build a query document without evaluating it.

use super::CliError;
use crate::query::NodeKind;
use crate::QueryDocument;

/// Shape of a built query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub model: Option<String>,
    pub nodes: usize,
    pub constraints: usize,
    pub virtual_fields: usize,
    pub includes: usize,
    pub selected: Vec<String>,
    pub has_variables: bool,
}

impl std::fmt::Display for CheckSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "model: {}", self.model.as_deref().unwrap_or("-"))?;
        writeln!(f, "nodes: {}", self.nodes)?;
        writeln!(f, "top-level constraints: {}", self.constraints)?;
        writeln!(f, "virtual-field constraints: {}", self.virtual_fields)?;
        writeln!(f, "includes: {}", self.includes)?;
        writeln!(f, "selected: {}", self.selected.join(", "))?;
        write!(f, "uses variables: {}", self.has_variables)
    }
}

pub fn execute_check(document: &str) -> Result<CheckSummary, CliError> {
    let query = QueryDocument::from_json(document)?.build()?;
    let tree = query.tree();
    let root = query.view().node()?;

    let mut virtual_fields = 0;
    let mut includes = 0;
    let mut pending = vec![query.root()];
    while let Some(id) = pending.pop() {
        match tree.node(id)?.kind() {
            NodeKind::VirtualField => virtual_fields += 1,
            NodeKind::IncludeVirtualField => includes += 1,
            _ => {}
        }
        pending.extend(tree.children(id)?);
    }

    Ok(CheckSummary {
        model: root.model().map(str::to_string),
        nodes: tree.len(),
        constraints: root.constraints().len(),
        virtual_fields,
        includes,
        selected: root.select().keys().cloned().collect(),
        has_variables: root.has_variables(),
    })
}
