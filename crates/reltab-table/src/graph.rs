//! Column roles for building a graph out of a table.
//!
//! The table only records which columns are the edge endpoints and which
//! carry edge or node attributes; the graph builder reads them back through
//! the kind-filtered getters below.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use reltab_core::error::{Error, Result};
use reltab_core::schema::AttrType;

use crate::aggregate::AggrPolicy;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphHints {
    pub src_col: Option<String>,
    pub dst_col: Option<String>,
    pub edge_attrs: Vec<String>,
    pub src_node_attrs: Vec<String>,
    pub dst_node_attrs: Vec<String>,
    /// (source attribute, destination attribute, merged node attribute name)
    pub common_node_attrs: Vec<(String, String, String)>,
    /// How attribute values of a node seen on several rows are combined.
    pub aggr_policy: AggrPolicy,
}

impl Default for GraphHints {
    fn default() -> Self {
        Self {
            src_col: None,
            dst_col: None,
            edge_attrs: Vec::new(),
            src_node_attrs: Vec::new(),
            dst_node_attrs: Vec::new(),
            common_node_attrs: Vec::new(),
            aggr_policy: AggrPolicy::First,
        }
    }
}

impl GraphHints {
    pub(crate) fn rename_column(&mut self, old: &str, new: &str) {
        let rename = |s: &mut String| {
            if *s == old {
                *s = new.to_owned();
            }
        };
        self.src_col.iter_mut().for_each(rename);
        self.dst_col.iter_mut().for_each(rename);
        self.edge_attrs.iter_mut().for_each(rename);
        self.src_node_attrs.iter_mut().for_each(rename);
        self.dst_node_attrs.iter_mut().for_each(rename);
        for (a, b, _) in &mut self.common_node_attrs {
            rename(a);
            rename(b);
        }
    }

    pub(crate) fn retain_columns(&mut self, keep: &HashSet<String>) {
        if self.src_col.as_ref().is_some_and(|c| !keep.contains(c)) {
            self.src_col = None;
        }
        if self.dst_col.as_ref().is_some_and(|c| !keep.contains(c)) {
            self.dst_col = None;
        }
        self.edge_attrs.retain(|c| keep.contains(c));
        self.src_node_attrs.retain(|c| keep.contains(c));
        self.dst_node_attrs.retain(|c| keep.contains(c));
        self.common_node_attrs
            .retain(|(a, b, _)| keep.contains(a) && keep.contains(b));
    }
}

macro_rules! kind_filtered {
    ($($fn_name:ident => ($list:ident, $kind:expr)),* $(,)?) => {
        impl Table {
            $(
                pub fn $fn_name(&self) -> Vec<String> {
                    self.attrs_of_kind(&self.graph.$list, $kind)
                }
            )*
        }
    };
}

kind_filtered! {
    edge_int_attrs => (edge_attrs, AttrType::Int),
    edge_flt_attrs => (edge_attrs, AttrType::Flt),
    edge_str_attrs => (edge_attrs, AttrType::Str),
    src_node_int_attrs => (src_node_attrs, AttrType::Int),
    src_node_flt_attrs => (src_node_attrs, AttrType::Flt),
    src_node_str_attrs => (src_node_attrs, AttrType::Str),
    dst_node_int_attrs => (dst_node_attrs, AttrType::Int),
    dst_node_flt_attrs => (dst_node_attrs, AttrType::Flt),
    dst_node_str_attrs => (dst_node_attrs, AttrType::Str),
}

impl Table {
    fn attrs_of_kind(&self, names: &[String], kind: AttrType) -> Vec<String> {
        names
            .iter()
            .filter(|n| self.col_map.get(n.as_str()).is_some_and(|c| c.kind == kind))
            .cloned()
            .collect()
    }

    pub fn graph_hints(&self) -> &GraphHints {
        &self.graph
    }

    pub fn src_col(&self) -> Option<&str> {
        self.graph.src_col.as_deref()
    }

    pub fn dst_col(&self) -> Option<&str> {
        self.graph.dst_col.as_deref()
    }

    /// Source and destination columns must have the same kind, which is
    /// checked once both are set.
    pub fn set_src_col(&mut self, col: &str) -> Result<()> {
        let kind = self.col_type(col)?;
        self.check_endpoint_kind(kind, self.graph.dst_col.as_deref())?;
        self.graph.src_col = Some(col.to_owned());
        Ok(())
    }

    pub fn set_dst_col(&mut self, col: &str) -> Result<()> {
        let kind = self.col_type(col)?;
        self.check_endpoint_kind(kind, self.graph.src_col.as_deref())?;
        self.graph.dst_col = Some(col.to_owned());
        Ok(())
    }

    fn check_endpoint_kind(&self, kind: AttrType, other: Option<&str>) -> Result<()> {
        if kind == AttrType::Flt {
            return Err(Error::Schema("edge endpoints cannot be float columns".into()));
        }
        if let Some(other) = other {
            let other_kind = self.col_type(other)?;
            if other_kind != kind {
                return Err(Error::Schema(format!(
                    "endpoint kinds differ: {kind} vs {other} ({other_kind})"
                )));
            }
        }
        Ok(())
    }

    pub fn add_edge_attr(&mut self, col: &str) -> Result<()> {
        self.col_ref(col)?;
        self.graph.edge_attrs.push(col.to_owned());
        Ok(())
    }

    pub fn add_src_node_attr(&mut self, col: &str) -> Result<()> {
        self.col_ref(col)?;
        self.graph.src_node_attrs.push(col.to_owned());
        Ok(())
    }

    pub fn add_dst_node_attr(&mut self, col: &str) -> Result<()> {
        self.col_ref(col)?;
        self.graph.dst_node_attrs.push(col.to_owned());
        Ok(())
    }

    /// Mark `col` as an attribute of both endpoint nodes.
    pub fn add_node_attr(&mut self, col: &str) -> Result<()> {
        self.add_src_node_attr(col)?;
        self.add_dst_node_attr(col)
    }

    /// Merge `src_attr` and `dst_attr` (same kind) into one node attribute.
    pub fn set_common_node_attrs(&mut self, src_attr: &str, dst_attr: &str, common: &str) -> Result<()> {
        let (a, b) = (self.col_type(src_attr)?, self.col_type(dst_attr)?);
        if a != b {
            return Err(Error::Schema(format!(
                "{src_attr} ({a}) and {dst_attr} ({b}) cannot share a node attribute"
            )));
        }
        self.graph
            .common_node_attrs
            .push((src_attr.to_owned(), dst_attr.to_owned(), common.to_owned()));
        Ok(())
    }

    pub fn set_aggr_policy(&mut self, policy: AggrPolicy) {
        self.graph.aggr_policy = policy;
    }
}
