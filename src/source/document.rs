//! Parsed XML documents and their typed projections.
//!
//! A [`Document`] is immutable once parsed. The poller swaps whole documents
//! and hands them out as `Arc<Document>`, so any number of accessor calls on
//! one snapshot observe the same server state.
//!
//! All projections are lenient: a missing element yields an empty result and
//! a malformed record is logged and skipped, so one bad entry never blanks
//! a whole view.

use std::collections::BTreeMap;

use admon_types::{
    ChartPoint, FixedRow, QuotaColumns, QuotaLimitRow, QuotaRow, StatRow, StatTable, StatsKind,
    SUM_LABEL,
};
use tracing::{debug, trace};

use crate::error::PollError;

/// Name of the root element of a document that has not been fetched yet.
pub const EMPTY_ROOT: &str = "data";

/// Key under which [`Document::attribute_records`] stores the element text.
pub const VALUE_KEY: &str = "value";

/// An XML element with its attributes, child elements and text value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    value: String,
}

impl Element {
    /// Create an element without attributes or content.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All text below this element, in document order.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All elements below this one with the given name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
        .filter(move |element| element.name == name)
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let mut element = Element::new(node.tag_name().name());
        element.attributes = node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect();

        for child in node.children() {
            if child.is_element() {
                let child = Element::from_node(child);
                element.value.push_str(&child.value);
                element.children.push(child);
            } else if let Some(text) = child.text().filter(|_| child.is_text()) {
                element.value.push_str(text);
            }
        }

        element
    }
}

/// One parsed daemon response.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// A document with an empty root element.
    pub fn empty() -> Self {
        Self::from_root(Element::new(EMPTY_ROOT))
    }

    /// Wrap an already built element tree.
    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// Parse a response body.
    pub fn parse(body: &[u8]) -> Result<Self, PollError> {
        let text = std::str::from_utf8(body).map_err(|e| PollError::Parse(e.to_string()))?;
        let text = text.trim_start_matches('\u{feff}');
        let xml = roxmltree::Document::parse(text)?;
        Ok(Self::from_root(Element::from_node(xml.root_element())))
    }

    /// The root element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The root itself, or its child with the given name.
    fn scope(&self, name: Option<&str>) -> Option<&Element> {
        match name {
            None => Some(&self.root),
            Some(name) => {
                let scope = self.root.child(name);
                if scope.is_none() {
                    trace!(element = name, "element not present in document");
                }
                scope
            }
        }
    }

    /// Value of a direct child of the root; empty if absent.
    pub fn scalar(&self, name: &str) -> &str {
        self.root.child(name).map(Element::value).unwrap_or_default()
    }

    /// Value of a child of the root's child `parent`; empty if absent.
    pub fn scalar_in(&self, name: &str, parent: &str) -> &str {
        self.root
            .child(parent)
            .and_then(|parent| parent.child(name))
            .map(Element::value)
            .unwrap_or_default()
    }

    /// Values of all children of the named element, or of the root.
    pub fn string_list(&self, name: Option<&str>) -> Vec<String> {
        self.scope(name)
            .map(|scope| {
                scope
                    .children()
                    .iter()
                    .map(|child| child.value().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tag name to value of all children of the named element, or of the root.
    ///
    /// Later duplicates of a tag name overwrite earlier ones.
    pub fn map(&self, name: Option<&str>) -> BTreeMap<String, String> {
        self.scope(name)
            .map(|scope| {
                scope
                    .children()
                    .iter()
                    .map(|child| (child.name().to_string(), child.value().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Attribute value to element value for the children of the named element.
    ///
    /// `<nodes><value node="foo">true</value></nodes>` with `attr = "node"`
    /// yields `{"foo": "true"}`. Children without the attribute are skipped.
    pub fn attribute_map(&self, name: Option<&str>, attr: &str) -> BTreeMap<String, String> {
        let Some(scope) = self.scope(name) else {
            return BTreeMap::new();
        };
        collect_attribute_map(scope, attr)
    }

    /// `(time, value)` samples below the named element.
    ///
    /// Entries whose `time` attribute or text is not a number are dropped.
    pub fn chart_series(&self, name: &str) -> Vec<ChartPoint> {
        let Some(series) = self.scope(Some(name)) else {
            return Vec::new();
        };

        series
            .children()
            .iter()
            .filter_map(|sample| {
                let time = sample
                    .attribute("time")
                    .and_then(|time| time.trim().parse::<f64>().ok());
                let value = sample.value().trim().parse::<f64>().ok();
                match (time, value) {
                    (Some(time), Some(value)) => Some(ChartPoint::new(time, value)),
                    _ => {
                        trace!(series = name, sample = ?sample, "dropping malformed chart point");
                        None
                    }
                }
            })
            .collect()
    }

    /// Operation counters of the `sum` and `hosts` collections.
    ///
    /// Row 0 is the aggregate; host rows follow in document order, labelled
    /// by their `ip` attribute.
    pub fn stat_table(&self, kind: StatsKind) -> StatTable {
        let family = kind.family();
        let (Some(sum), Some(hosts)) = (self.root.child("sum"), self.root.child("hosts")) else {
            debug!(%kind, "statistics response without sum or hosts collection");
            return StatTable::no_data(family);
        };

        let mut table = StatTable::new(family);
        let mut unknown_logged = false;

        fill_stat_row(table.push_row(SUM_LABEL), sum, &mut unknown_logged);
        for host in hosts.children() {
            let label = host.attribute("ip").unwrap_or_default();
            fill_stat_row(table.push_row(label), host, &mut unknown_logged);
        }

        table
    }

    /// Quota usage rows of the `quotas` collection.
    pub fn quota_rows(&self) -> Vec<QuotaRow> {
        self.fixed_rows()
    }

    /// Quota limit rows of the `quotas` collection.
    pub fn quota_limit_rows(&self) -> Vec<QuotaLimitRow> {
        self.fixed_rows()
    }

    fn fixed_rows<C: QuotaColumns>(&self) -> Vec<FixedRow<C>> {
        let Some(quotas) = self.scope(Some("quotas")) else {
            return Vec::new();
        };

        quotas
            .children()
            .iter()
            .map(|record| {
                FixedRow::from_lookup(|column: C| {
                    record
                        .child(column.element())
                        .map(|field| field.value().to_string())
                })
            })
            .collect()
    }

    /// One record per child of the named element (or the root): the element
    /// text under `"value"` plus one entry per attribute.
    pub fn attribute_records(&self, name: Option<&str>) -> Vec<BTreeMap<String, String>> {
        let Some(scope) = self.scope(name) else {
            return Vec::new();
        };

        scope
            .children()
            .iter()
            .map(|child| {
                let mut record = BTreeMap::new();
                record.insert(VALUE_KEY.to_string(), child.value().to_string());
                for (key, value) in child.attributes() {
                    record.insert(key.to_string(), value.to_string());
                }
                record
            })
            .collect()
    }

    /// For every element named `tag` anywhere in the document, the
    /// [`attribute_map`](Self::attribute_map) of its children.
    pub fn descendant_attribute_maps(&self, tag: &str, attr: &str) -> Vec<BTreeMap<String, String>> {
        self.root
            .descendants_named(tag)
            .map(|element| collect_attribute_map(element, attr))
            .collect()
    }
}

fn collect_attribute_map(scope: &Element, attr: &str) -> BTreeMap<String, String> {
    scope
        .children()
        .iter()
        .filter_map(|child| match child.attribute(attr) {
            Some(key) => Some((key.to_string(), child.value().to_string())),
            None => {
                trace!(element = child.name(), attr, "child without attribute skipped");
                None
            }
        })
        .collect()
}

fn fill_stat_row(row: &mut StatRow, source: &Element, unknown_logged: &mut bool) {
    for stat in source.children() {
        let Some(id) = stat
            .attribute("id")
            .and_then(|id| id.trim().parse::<usize>().ok())
        else {
            trace!(stat = ?stat, "dropping counter without numeric id");
            continue;
        };

        if !row.set_column(id + 1, stat.value()) && !*unknown_logged {
            trace!(id, "unknown counter id, newer server?");
            *unknown_logged = true;
        }
    }
}
