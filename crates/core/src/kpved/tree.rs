// crates/core/src/kpved/tree.rs
//! In-memory classifier tree.
//!
//! Built once at startup from store records. Nodes live in one contiguous
//! array; a `code -> index` map and per-node child index lists give O(1)
//! lookup and ordered traversal. The tree is pure by construction: every
//! node except the synthetic root has exactly one parent, codes are unique,
//! children are sorted by code.

use std::collections::HashMap;

use thiserror::Error;

use nomenorm_types::{ClassifierLevel, ClassifierRecord};

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("duplicate classifier code: {0}")]
    DuplicateCode(String),

    #[error("classifier node {code} references missing parent {parent}")]
    MissingParent { code: String, parent: String },
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub code: String,
    pub name: String,
    pub level: ClassifierLevel,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug)]
pub struct ClassifierTree {
    nodes: Vec<TreeNode>,
    index: HashMap<String, usize>,
    /// Children of the synthetic root (sections), sorted by code.
    roots: Vec<usize>,
}

impl ClassifierTree {
    pub fn from_records(records: Vec<ClassifierRecord>) -> Result<Self, TreeError> {
        let mut nodes = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());

        for record in &records {
            if index.contains_key(&record.code) {
                return Err(TreeError::DuplicateCode(record.code.clone()));
            }
            index.insert(record.code.clone(), nodes.len());
            nodes.push(TreeNode {
                code: record.code.clone(),
                name: record.name.clone(),
                level: record.level,
                parent: None,
                children: Vec::new(),
            });
        }

        let mut roots = Vec::new();
        for (i, record) in records.iter().enumerate() {
            match &record.parent_code {
                None => roots.push(i),
                Some(parent_code) => {
                    let parent_idx =
                        *index
                            .get(parent_code)
                            .ok_or_else(|| TreeError::MissingParent {
                                code: record.code.clone(),
                                parent: parent_code.clone(),
                            })?;
                    nodes[parent_idx].children.push(i);
                    nodes[i].parent = Some(parent_idx);
                }
            }
        }

        roots.sort_by(|a, b| nodes[*a].code.cmp(&nodes[*b].code));
        let mut child_lists: Vec<Vec<usize>> =
            nodes.iter().map(|n| n.children.clone()).collect();
        for children in &mut child_lists {
            children.sort_by(|a, b| nodes[*a].code.cmp(&nodes[*b].code));
        }
        for (node, children) in nodes.iter_mut().zip(child_lists) {
            node.children = children;
        }

        Ok(Self {
            nodes,
            index,
            roots,
        })
    }

    pub fn get(&self, code: &str) -> Option<&TreeNode> {
        self.index.get(code).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// Children of `code`, or the sections when `code` is `None` (the
    /// synthetic root). Sorted by code.
    pub fn children(&self, code: Option<&str>) -> Vec<&TreeNode> {
        let indices = match code {
            None => &self.roots,
            Some(code) => match self.index.get(code) {
                Some(&i) => &self.nodes[i].children,
                None => return Vec::new(),
            },
        };
        indices.iter().map(|&i| &self.nodes[i]).collect()
    }

    pub fn parent(&self, code: &str) -> Option<&TreeNode> {
        let &i = self.index.get(code)?;
        self.nodes[i].parent.map(|p| &self.nodes[p])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn record(
    code: &str,
    name: &str,
    parent: Option<&str>,
) -> ClassifierRecord {
    ClassifierRecord {
        code: code.to_string(),
        name: name.to_string(),
        parent_code: parent.map(|s| s.to_string()),
        level: ClassifierLevel::from_code(code).unwrap_or(ClassifierLevel::Subgroup),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ClassifierTree {
        ClassifierTree::from_records(vec![
            record("C", "Обрабатывающая промышленность", None),
            record("A", "Сельское хозяйство", None),
            record("26", "Компьютеры и электроника", Some("C")),
            record("25", "Металлические изделия", Some("C")),
            record("26.2", "Компьютеры и периферия", Some("26")),
            record("26.20", "Компьютеры и комплектующие", Some("26.2")),
        ])
        .expect("valid tree")
    }

    #[test]
    fn test_lookup_by_code() {
        let tree = sample_tree();
        assert_eq!(tree.len(), 6);
        let node = tree.get("26").unwrap();
        assert_eq!(node.name, "Компьютеры и электроника");
        assert_eq!(node.level, ClassifierLevel::Class);
        assert!(tree.get("99").is_none());
    }

    #[test]
    fn test_roots_are_sorted_sections() {
        let tree = sample_tree();
        let sections: Vec<&str> = tree.children(None).iter().map(|n| n.code.as_str()).collect();
        assert_eq!(sections, vec!["A", "C"]);
    }

    #[test]
    fn test_children_sorted_by_code() {
        let tree = sample_tree();
        let classes: Vec<&str> = tree
            .children(Some("C"))
            .iter()
            .map(|n| n.code.as_str())
            .collect();
        assert_eq!(classes, vec!["25", "26"]);
    }

    #[test]
    fn test_children_of_leaf_empty() {
        let tree = sample_tree();
        assert!(tree.children(Some("26.20")).is_empty());
        assert!(tree.children(Some("unknown")).is_empty());
    }

    #[test]
    fn test_parent_link() {
        let tree = sample_tree();
        assert_eq!(tree.parent("26.2").unwrap().code, "26");
        assert!(tree.parent("C").is_none());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let err = ClassifierTree::from_records(vec![
            record("C", "one", None),
            record("C", "two", None),
        ])
        .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateCode(code) if code == "C"));
    }

    #[test]
    fn test_missing_parent_rejected() {
        let err =
            ClassifierTree::from_records(vec![record("26", "x", Some("C"))]).unwrap_err();
        assert!(matches!(err, TreeError::MissingParent { .. }));
    }

    #[test]
    fn test_empty_tree() {
        let tree = ClassifierTree::from_records(vec![]).unwrap();
        assert!(tree.is_empty());
        assert!(tree.children(None).is_empty());
    }
}
