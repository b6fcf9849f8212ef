//! Console views bound to a refresh loop.
//!
//! An [`App`] consumes [`Update`]s of one loop and turns each new document
//! into text or JSON. The statistics view keeps requestor state and writes
//! it back into the poller before the next poll.

use std::fmt::Write as _;
use std::io::Write;

use admon_types::{
    QuotaColumn, QuotaColumns, QuotaIdType, StatTable, NO_IO_LABEL, NO_QUOTA_LABEL,
};
use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::data::{ChartHistory, StatsProgress, StatsSession, WAITING_LABEL};
use crate::refresh::{RefreshHandle, Update};
use crate::source::{Document, Element, Poller};

const SPARK_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// How views are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A projection of a generic document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The whole element tree.
    Tree,
    /// Tag name to value of the children of an element (or the root).
    Map(Option<String>),
    /// The value of one element.
    Scalar { name: String, parent: Option<String> },
    /// Child values of an element (or the root).
    List(Option<String>),
    /// Attribute value to element value.
    AttributeMap { name: Option<String>, attr: String },
    /// Value plus attributes of every child.
    Records(Option<String>),
    /// Attribute maps of every element with the given tag.
    Descendants { tag: String, attr: String },
}

impl Projection {
    pub fn render(&self, document: &Document, format: OutputFormat) -> Result<String> {
        let value = match self {
            Projection::Tree => {
                return Ok(match format {
                    OutputFormat::Text => render_tree(document.root()),
                    OutputFormat::Json => serde_json::to_string_pretty(&element_json(document.root()))?,
                });
            }
            Projection::Map(name) => json!(document.map(name.as_deref())),
            Projection::Scalar { name, parent } => match parent {
                Some(parent) => json!(document.scalar_in(name, parent)),
                None => json!(document.scalar(name)),
            },
            Projection::List(name) => json!(document.string_list(name.as_deref())),
            Projection::AttributeMap { name, attr } => {
                json!(document.attribute_map(name.as_deref(), attr))
            }
            Projection::Records(name) => json!(document.attribute_records(name.as_deref())),
            Projection::Descendants { tag, attr } => {
                json!(document.descendant_attribute_maps(tag, attr))
            }
        };

        Ok(match format {
            OutputFormat::Json => serde_json::to_string_pretty(&value)?,
            OutputFormat::Text => render_value(&value),
        })
    }
}

/// What an [`App`] shows.
#[derive(Debug, Clone)]
pub enum View {
    /// A generic projection of every document.
    Document(Projection),
    /// Chart series accumulated across documents.
    Chart {
        series: Vec<String>,
        history: ChartHistory,
    },
    /// A statistics table driven by a requestor session.
    Stats {
        session: StatsSession,
        table: Option<StatTable>,
    },
    /// The quota usage table.
    Quota { id_type: QuotaIdType },
}

impl View {
    pub fn chart(series: Vec<String>) -> Self {
        View::Chart {
            series,
            history: ChartHistory::new(),
        }
    }

    pub fn stats(session: StatsSession) -> Self {
        View::Stats {
            session,
            table: None,
        }
    }

    /// Render a new document. Returns None when there is nothing new to show.
    pub fn render(
        &mut self,
        document: &Document,
        poller: &Poller,
        format: OutputFormat,
    ) -> Result<Option<String>> {
        match self {
            View::Document(projection) => projection.render(document, format).map(Some),
            View::Chart { series, history } => {
                let names: Vec<&str> = series.iter().map(String::as_str).collect();
                history.record_document(document, &names);
                Ok(Some(render_chart(history, &names, format)?))
            }
            View::Stats { session, table } => {
                let progress = session.observe(document);
                session.apply(poller);
                match progress {
                    StatsProgress::Waiting => Ok(Some(match format {
                        OutputFormat::Text => WAITING_LABEL.to_string(),
                        OutputFormat::Json => status_json(WAITING_LABEL),
                    })),
                    StatsProgress::Unchanged => Ok(None),
                    StatsProgress::Fresh(fresh) => {
                        let rendered = match format {
                            OutputFormat::Text => render_stat_table(&fresh),
                            OutputFormat::Json if !fresh.has_data() => status_json(NO_IO_LABEL),
                            OutputFormat::Json => serde_json::to_string_pretty(&fresh)?,
                        };
                        *table = Some(fresh);
                        Ok(Some(rendered))
                    }
                }
            }
            View::Quota { id_type } => {
                if document.root().child("quotas").is_none() {
                    return Ok(Some(match format {
                        OutputFormat::Text => NO_QUOTA_LABEL.to_string(),
                        OutputFormat::Json => status_json(NO_QUOTA_LABEL),
                    }));
                }
                let rows = document.quota_rows();
                Ok(Some(match format {
                    OutputFormat::Json => serde_json::to_string_pretty(&rows)?,
                    OutputFormat::Text => {
                        let headers: Vec<&str> =
                            QuotaColumn::ALL.iter().map(|c| c.title(*id_type)).collect();
                        let body: Vec<Vec<String>> =
                            rows.iter().map(|row| row.values().to_vec()).collect();
                        format_table(&headers, &body)
                    }
                }))
            }
        }
    }
}

/// Consumer state of one refresh loop.
#[derive(Debug)]
pub struct App {
    pub view: View,
    pub format: OutputFormat,
    /// Number of documents rendered so far.
    pub updates_seen: usize,
    /// Last communication error reported, to avoid repeating it every wait.
    pub load_error: Option<String>,
}

impl App {
    pub fn new(view: View, format: OutputFormat) -> Self {
        Self {
            view,
            format,
            updates_seen: 0,
            load_error: None,
        }
    }

    /// Handle one update. Returns the text to print, if any.
    pub fn handle_update(&mut self, update: &Update, poller: &Poller) -> Result<Option<String>> {
        match update {
            Update::Data(document) => {
                self.updates_seen += 1;
                self.load_error = None;
                self.view.render(document, poller, self.format)
            }
            Update::TimedOut => {
                let error = poller.last_error();
                if error.is_some() && error != self.load_error {
                    self.load_error = error.clone();
                    return Ok(error.map(|message| self.status_line(&message)));
                }
                Ok(None)
            }
            Update::Stopped => Ok(None),
        }
    }

    fn status_line(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Text => format!("Communication error: {}", message),
            OutputFormat::Json => json!({ "error": message }).to_string(),
        }
    }

    /// Print updates of a loop until it stops or `limit` documents were shown.
    ///
    /// Returns the number of documents rendered.
    pub async fn run<W: Write>(
        &mut self,
        handle: &RefreshHandle,
        out: &mut W,
        limit: Option<usize>,
    ) -> Result<usize> {
        let start = self.updates_seen;
        if limit == Some(0) {
            handle.stop();
            return Ok(0);
        }
        let mut updates = handle.updates();

        loop {
            let update = updates.next().await;
            if let Some(text) = self.handle_update(&update, handle.poller())? {
                writeln!(out, "{}", text)?;
                out.flush()?;
            }

            match update {
                Update::Stopped => break,
                Update::Data(_) if limit.is_some_and(|limit| self.updates_seen - start >= limit) => {
                    handle.stop();
                    break;
                }
                _ => {}
            }
        }

        if self.updates_seen == start {
            if let Some(error) = handle.poller().last_error() {
                warn!("no data received: {}", error);
            }
        }
        Ok(self.updates_seen - start)
    }
}

fn render_chart(history: &ChartHistory, names: &[&str], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut series = Map::new();
            for name in names {
                let points: Vec<_> = history
                    .points(name)
                    .map(|points| points.iter().copied().collect())
                    .unwrap_or_default();
                series.insert(
                    name.to_string(),
                    json!({ "points": points, "rate": history.rate(name) }),
                );
            }
            Ok(serde_json::to_string_pretty(&Value::Object(series))?)
        }
        OutputFormat::Text => {
            let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
            let mut out = String::new();
            for name in names {
                let latest = history
                    .latest(name)
                    .map(|p| format!("{:.1}", p.value))
                    .unwrap_or_else(|| "-".to_string());
                let rate = history
                    .rate(name)
                    .map(|r| format!("{:+.2}/s", r))
                    .unwrap_or_default();
                let spark: String = history
                    .sparkline(name)
                    .into_iter()
                    .map(|level| SPARK_BARS[level as usize])
                    .collect();
                let _ = writeln!(out, "{:<width$}  {:>10}  {:>9}  {}", name, latest, rate, spark);
            }
            Ok(out.trim_end().to_string())
        }
    }
}

fn status_json(status: &str) -> String {
    json!({ "status": status }).to_string()
}

/// Text table of a statistics table, limited to counters with any value.
pub fn render_stat_table(table: &StatTable) -> String {
    if !table.has_data() {
        return NO_IO_LABEL.to_string();
    }
    let headers = table.headers();
    let columns: Vec<usize> = std::iter::once(0)
        .chain((1..table.column_count()).filter(|&c| {
            (0..table.row_count()).any(|r| table.cell(r, c).is_some())
        }))
        .collect();

    let header_row: Vec<&str> = columns.iter().map(|&c| headers[c]).collect();
    let rows: Vec<Vec<String>> = (0..table.row_count())
        .map(|r| {
            columns
                .iter()
                .map(|&c| table.cell(r, c).unwrap_or_default().to_string())
                .collect()
        })
        .collect();
    format_table(&header_row, &rows)
}

/// Left-aligned columns separated by two spaces.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = table_line(headers.iter().copied(), &widths);
    for row in rows {
        out.push('\n');
        out.push_str(&table_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(render_inline).collect::<Vec<_>>().join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{}: {}", key, render_inline(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => render_inline(other),
    }
}

fn render_inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{}={}", key, render_inline(value)))
            .collect::<Vec<_>>()
            .join(" "),
        Value::Array(items) => items.iter().map(render_inline).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn render_tree(root: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, root, 0);
    out.trim_end().to_string()
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let indent = "  ".repeat(depth);
    let attrs: String = element
        .attributes()
        .map(|(k, v)| format!(" {}=\"{}\"", k, v))
        .collect();

    if element.children().is_empty() {
        let _ = writeln!(out, "{}{}{}: {}", indent, element.name(), attrs, element.value().trim());
    } else {
        let _ = writeln!(out, "{}{}{}", indent, element.name(), attrs);
        for child in element.children() {
            write_element(out, child, depth + 1);
        }
    }
}

fn element_json(element: &Element) -> Value {
    let mut object = Map::new();
    object.insert("name".into(), json!(element.name()));

    let attributes: Map<String, Value> = element
        .attributes()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    if !attributes.is_empty() {
        object.insert("attributes".into(), Value::Object(attributes));
    }

    if element.children().is_empty() {
        object.insert("value".into(), json!(element.value()));
    } else {
        let children: Vec<Value> = element.children().iter().map(element_json).collect();
        object.insert("children".into(), Value::Array(children));
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::RefreshLoop;
    use crate::source::RequestDescriptor;
    use admon_types::{StatsKind, SUM_LABEL};
    use httpmock::prelude::*;
    use std::sync::Arc;

    fn doc(xml: &str) -> Document {
        Document::parse(xml.as_bytes()).unwrap()
    }

    fn poller() -> Poller {
        Poller::new(RequestDescriptor::new("http://h:1/XML_ClientStats"))
    }

    #[test]
    fn test_projection_map_text_and_json() {
        let document = doc("<data><general><nodeCount>4</nodeCount><rootNode>m1</rootNode></general></data>");
        let projection = Projection::Map(Some("general".into()));

        let text = projection.render(&document, OutputFormat::Text).unwrap();
        assert_eq!(text, "nodeCount: 4\nrootNode: m1");

        let json: Value =
            serde_json::from_str(&projection.render(&document, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["nodeCount"], "4");
    }

    #[test]
    fn test_projection_scalar_and_list() {
        let document = doc("<data><id>3</id><errors><e>a</e><e>b</e></errors></data>");
        let scalar = Projection::Scalar {
            name: "id".into(),
            parent: None,
        };
        assert_eq!(scalar.render(&document, OutputFormat::Text).unwrap(), "3");

        let list = Projection::List(Some("errors".into()));
        assert_eq!(list.render(&document, OutputFormat::Text).unwrap(), "a\nb");
    }

    #[test]
    fn test_tree_rendering() {
        let document = doc(r#"<data><status><v id="1">up</v></status></data>"#);
        let text = Projection::Tree.render(&document, OutputFormat::Text).unwrap();
        assert_eq!(text, "data\n  status\n    v id=\"1\": up");

        let json: Value =
            serde_json::from_str(&Projection::Tree.render(&document, OutputFormat::Json).unwrap())
                .unwrap();
        assert_eq!(json["children"][0]["children"][0]["attributes"]["id"], "1");
    }

    #[test]
    fn test_format_table() {
        let table = format_table(
            &["name", "id"],
            &[vec!["alice".into(), "1000".into()], vec!["bob".into(), "7".into()]],
        );
        assert_eq!(table, "name   id\nalice  1000\nbob    7");
    }

    #[test]
    fn test_stat_table_hides_empty_columns() {
        let document = doc(
            r#"<data><requestorID>1</requestorID><dataSequenceID>2</dataSequenceID>
                <sum><op id="0">5</op></sum>
                <hosts><host ip="10.0.0.1"><op id="0">5</op></host></hosts></data>"#,
        );
        let table = document.stat_table(StatsKind::ClientStorage);
        let text = render_stat_table(&table);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split_whitespace().collect::<Vec<_>>(), vec!["sum"]);
        assert!(lines[1].starts_with(SUM_LABEL));
        assert!(lines[2].starts_with("10.0.0.1"));
    }

    #[test]
    fn test_stats_view_flow() {
        let poller = poller();
        let mut app = App::new(View::stats(StatsSession::new(StatsKind::ClientStorage)), OutputFormat::Text);

        let waiting = doc("<data><requestorID>4</requestorID><dataSequenceID>0</dataSequenceID></data>");
        let out = app
            .handle_update(&Update::Data(waiting.into()), &poller)
            .unwrap();
        assert_eq!(out.as_deref(), Some(WAITING_LABEL));
        assert_eq!(poller.request().param("requestorID"), Some("4"));

        let fresh = doc(
            "<data><requestorID>4</requestorID><dataSequenceID>2</dataSequenceID><sum/><hosts/></data>",
        );
        let out = app.handle_update(&Update::Data(fresh.clone().into()), &poller).unwrap();
        assert!(out.unwrap().contains(SUM_LABEL));
        assert_eq!(poller.request().param("nextDataSequenceID"), Some("3"));

        let again = app.handle_update(&Update::Data(fresh.into()), &poller).unwrap();
        assert!(again.is_none());
        assert_eq!(app.updates_seen, 3);
    }

    #[test]
    fn test_chart_view_accumulates() {
        let poller = poller();
        let mut app = App::new(View::chart(vec!["workRequests".into()]), OutputFormat::Json);

        let first = doc(r#"<data><workRequests><v time="10">1</v><v time="20">3</v></workRequests></data>"#);
        let second = doc(r#"<data><workRequests><v time="20">3</v><v time="30">7</v></workRequests></data>"#);
        app.handle_update(&Update::Data(first.into()), &poller).unwrap();
        let out = app.handle_update(&Update::Data(second.into()), &poller).unwrap().unwrap();

        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["workRequests"]["points"].as_array().unwrap().len(), 3);
        assert_eq!(json["workRequests"]["rate"], 0.4);
    }

    #[test]
    fn test_quota_view_text() {
        let poller = poller();
        let mut app = App::new(View::Quota { id_type: QuotaIdType::Group }, OutputFormat::Text);
        let document = doc("<data><quotas><quota><name>staff</name><id>50</id></quota></quotas></data>");

        let out = app.handle_update(&Update::Data(document.into()), &poller).unwrap().unwrap();
        assert!(out.starts_with("group name"));
        assert!(out.lines().nth(1).unwrap().starts_with("staff"));
    }

    #[test]
    fn test_quota_view_without_collection() {
        let poller = poller();
        let mut text = App::new(View::Quota { id_type: QuotaIdType::User }, OutputFormat::Text);
        let out = text.handle_update(&Update::Data(doc("<data/>").into()), &poller).unwrap();
        assert_eq!(out.as_deref(), Some(NO_QUOTA_LABEL));

        let mut json = App::new(View::Quota { id_type: QuotaIdType::User }, OutputFormat::Json);
        let out = json.handle_update(&Update::Data(doc("<data/>").into()), &poller).unwrap().unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], NO_QUOTA_LABEL);

        let empty = doc("<data><quotas/></data>");
        let out = text.handle_update(&Update::Data(empty.into()), &poller).unwrap().unwrap();
        assert!(out.starts_with("user name"));
    }

    #[test]
    fn test_stats_view_without_io() {
        let poller = poller();
        let quiet = doc("<data><requestorID>4</requestorID><dataSequenceID>2</dataSequenceID></data>");

        let mut text = App::new(View::stats(StatsSession::new(StatsKind::UserMetadata)), OutputFormat::Text);
        let out = text.handle_update(&Update::Data(quiet.clone().into()), &poller).unwrap();
        assert_eq!(out.as_deref(), Some(NO_IO_LABEL));

        let mut json = App::new(View::stats(StatsSession::new(StatsKind::UserMetadata)), OutputFormat::Json);
        let out = json.handle_update(&Update::Data(quiet.into()), &poller).unwrap().unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], NO_IO_LABEL);
    }

    #[tokio::test]
    async fn test_run_with_zero_limit_prints_nothing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/XML_NodeList");
                then.status(200).body("<data><nodeCount>2</nodeCount></data>");
            })
            .await;

        let poller = Arc::new(Poller::new(RequestDescriptor::new(server.url("/XML_NodeList"))));
        let handle = RefreshLoop::one_shot(poller).start();
        let mut app = App::new(View::Document(Projection::Tree), OutputFormat::Text);
        let mut out = Vec::new();

        let shown = app.run(&handle, &mut out, Some(0)).await.unwrap();
        assert_eq!(shown, 0);
        assert!(out.is_empty());
        handle.shutdown().await;
    }

    #[test]
    fn test_timeout_reports_error_once() {
        let poller = poller();
        assert!(!poller.ingest(b"<broken"));
        let mut app = App::new(View::Document(Projection::Tree), OutputFormat::Text);

        let first = app.handle_update(&Update::TimedOut, &poller).unwrap();
        assert!(first.unwrap().starts_with("Communication error"));
        assert!(app.handle_update(&Update::TimedOut, &poller).unwrap().is_none());
        assert!(app.handle_update(&Update::Stopped, &poller).unwrap().is_none());
    }
}
