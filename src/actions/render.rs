use anyhow::anyhow;
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::{
    filter::{domain::Domain, predicate::parse_timestamp},
    geofile::feature::{Feature, FeatureCollection},
};

use super::descriptor::{ButtonAction, DropdownAction, RowAction};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d at %H:%M:%S";

/// Event table layout: the attribute shown in each column, then the action column.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TableConfig {
    pub columns: Vec<String>,
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub actions: Vec<RowAction>,
}

/// Renders events as `<tr>` rows of the dashboard's event table.
pub struct RowWriter {
    id_attribute: &'static str,
    time_attribute: &'static str,
    columns: Vec<String>,
    date_format: String,
    actions: Vec<RowAction>,
}

impl RowWriter {
    pub fn from_config(domain: Domain, config: &TableConfig) -> anyhow::Result<Self> {
        let date_format = config
            .date_format
            .clone()
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            return Err(anyhow!("Invalid date format '{}'", date_format));
        }
        Ok(Self {
            id_attribute: domain.id_attribute(),
            time_attribute: domain.time_attribute(),
            columns: config.columns.clone(),
            date_format,
            actions: config.actions.clone(),
        })
    }

    pub fn write_rows(&self, collection: &FeatureCollection) -> String {
        collection
            .iter()
            .map(|feature| self.write_row(feature))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn write_row(&self, feature: &Feature) -> String {
        let mut row = String::from("<tr>");
        for column in &self.columns {
            let text = if column == self.time_attribute {
                self.format_time(feature)
            } else {
                feature.attribute_text(column)
            };
            row.push_str("<td>");
            row.push_str(&esc(text.unwrap_or_default()));
            row.push_str("</td>");
        }

        let id = feature.attribute_text(self.id_attribute).unwrap_or_default();
        row.push_str("<td>");
        for action in &self.actions {
            match action {
                RowAction::SimpleButton(button) => write_button(&mut row, button, &id),
                RowAction::Dropdown(dropdown) => write_dropdown(&mut row, dropdown, feature, &id),
            }
        }
        row.push_str("</td></tr>");
        row
    }

    /// Time attribute in the configured format, keeping the timestamp's own offset.
    /// Values that are not timestamps are shown unchanged.
    fn format_time(&self, feature: &Feature) -> Option<String> {
        let text = feature.attribute_text(self.time_attribute)?;
        match parse_timestamp(&text) {
            Ok(time) => Some(time.format(&self.date_format).to_string()),
            Err(_) => Some(text),
        }
    }
}

fn write_button(row: &mut String, button: &ButtonAction, id: &str) {
    row.push_str(&format!(
        "<button class=\"btn btn-primary row-action-container\" title=\"{}\" onclick=\"{}\">",
        esc(&button.name),
        esc(handler_call(&button.handler, id))
    ));
    write_icon(row, &button.css_class, &button.name);
    row.push_str("</button>");
}

fn write_dropdown(row: &mut String, dropdown: &DropdownAction, feature: &Feature, id: &str) {
    row.push_str("<div class=\"btn-group\">");
    row.push_str(&format!(
        "<button class=\"btn btn-primary dropdown-toggle row-action-container\" title=\"{}\" \
         data-toggle=\"dropdown\" aria-haspopup=\"true\" aria-expanded=\"false\">",
        esc(&dropdown.name)
    ));
    write_icon(row, &dropdown.css_class, &dropdown.name);
    row.push_str("</button><ul class=\"dropdown-menu\">");
    for item in &dropdown.actions {
        if !item.visible_when.is_visible(feature) {
            continue;
        }
        let href = match &item.href {
            Some(template) => fill_template(template, feature),
            None => "#".to_string(),
        };
        row.push_str(&format!("<li><a href=\"{}\"", esc(href)));
        if let Some(template) = &item.download {
            row.push_str(&format!(" download=\"{}\"", esc(fill_template(template, feature))));
        }
        if let Some(handler) = &item.handler {
            row.push_str(&format!(" onclick=\"{}\"", esc(handler_call(handler, id))));
        }
        row.push_str(&format!(">{}</a></li>", esc(&item.text)));
    }
    row.push_str("</ul></div>");
}

fn write_icon(row: &mut String, css_class: &str, title: &str) {
    row.push_str(&format!(
        "<span class=\"row-action-icon {}\" title=\"{}\"></span>",
        esc(css_class),
        esc(title)
    ));
}

/// `handler('id')` with the id quoted as a script string literal.
fn handler_call(handler: &str, id: &str) -> String {
    let mut quoted = String::with_capacity(id.len());
    for ch in id.chars() {
        if ch == '\'' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    format!("{}('{}')", handler, quoted)
}

/// Replace every `{attribute}` with the feature's attribute text; missing attributes become empty.
pub fn fill_template(template: &str, feature: &Feature) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                out.push_str(&feature.attribute_text(key).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub(crate) fn esc<S: AsRef<str>>(s: S) -> String {
    let mut out = String::with_capacity(s.as_ref().len() + 8);
    for ch in s.as_ref().chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use crate::{
        actions::descriptor::{ButtonAction, DropdownAction, MenuItem, RowAction, Visibility},
        filter::{domain::Domain, feature_filter::fixtures::record},
        geofile::feature::{CollectionKind, FeatureCollection},
    };

    use super::{fill_template, RowWriter, TableConfig};

    fn show_report() -> RowAction {
        RowAction::SimpleButton(ButtonAction {
            name: "Show Report".to_string(),
            css_class: "icon-report".to_string(),
            handler: "showReport".to_string(),
        })
    }

    fn downloads() -> RowAction {
        RowAction::Dropdown(DropdownAction {
            name: "Downloads".to_string(),
            css_class: "icon-download".to_string(),
            actions: vec![
                MenuItem {
                    text: "Impact map".to_string(),
                    href: None,
                    download: None,
                    handler: Some("downloadImpactMap".to_string()),
                    visible_when: Visibility::Always,
                },
                MenuItem {
                    text: "Hazard layer".to_string(),
                    href: Some("{hazard_layer}".to_string()),
                    download: Some("{event_id}-hazard.zip".to_string()),
                    handler: None,
                    visible_when: Visibility::HasAttribute("hazard_layer".to_string()),
                },
            ],
        })
    }

    #[test]
    fn test_simple_button_row() {
        let config = TableConfig {
            columns: vec!["time".to_string(), "magnitude".to_string(), "location_description".to_string()],
            date_format: None,
            actions: vec![show_report()],
        };
        let writer = RowWriter::from_config(Domain::Earthquake, &config).unwrap();
        let feature = record(json!({
            "shake_id": "20200101120000",
            "time": "2020-01-01T12:00:00+07:00",
            "magnitude": 5.5,
            "location_description": "Sunda Strait <sea>"
        }));

        assert_eq!(
            writer.write_row(&feature),
            "<tr><td>2020-01-01 at 12:00:00</td><td>5.5</td><td>Sunda Strait &lt;sea&gt;</td>\
             <td><button class=\"btn btn-primary row-action-container\" title=\"Show Report\" \
             onclick=\"showReport(&#39;20200101120000&#39;)\">\
             <span class=\"row-action-icon icon-report\" title=\"Show Report\"></span></button></td></tr>"
        );
    }

    #[test]
    fn test_dropdown_skips_hidden_items() {
        let config = TableConfig {
            columns: vec!["event_id".to_string()],
            date_format: None,
            actions: vec![downloads()],
        };
        let writer = RowWriter::from_config(Domain::Flood, &config).unwrap();
        let with_layer = record(json!({
            "event_id": "2020010112-6-rw",
            "hazard_layer": "http://example.org/layer.zip?a=1&b=2"
        }));
        let without_layer = record(json!({"event_id": "2020010113-6-rw"}));

        let row = writer.write_row(&with_layer);
        assert!(row.contains(
            "<li><a href=\"#\" onclick=\"downloadImpactMap(&#39;2020010112-6-rw&#39;)\">Impact map</a></li>"
        ));
        assert!(row.contains(
            "<li><a href=\"http://example.org/layer.zip?a=1&amp;b=2\" \
             download=\"2020010112-6-rw-hazard.zip\">Hazard layer</a></li>"
        ));
        assert!(row.contains(
            "<div class=\"btn-group\"><button class=\"btn btn-primary dropdown-toggle row-action-container\" \
             title=\"Downloads\" data-toggle=\"dropdown\" aria-haspopup=\"true\" aria-expanded=\"false\">"
        ));

        let row = writer.write_row(&without_layer);
        assert!(row.contains("Impact map"));
        assert!(!row.contains("Hazard layer"));
    }

    #[test]
    fn test_custom_date_format_and_rows() {
        let config = TableConfig {
            columns: vec!["event_time".to_string()],
            date_format: Some("%d/%m/%Y %H:%M %z".to_string()),
            actions: vec![],
        };
        let writer = RowWriter::from_config(Domain::Ash, &config).unwrap();
        let collection = FeatureCollection::new(
            CollectionKind::Records,
            vec![
                record(json!({"id": 1, "event_time": "2019-06-30T09:15:00+08:00"})),
                record(json!({"id": 2, "event_time": "not a time"})),
            ],
        );
        assert_eq!(
            writer.write_rows(&collection),
            "<tr><td>30/06/2019 09:15 +0800</td><td></td></tr>\n<tr><td>not a time</td><td></td></tr>"
        );
    }

    #[test]
    fn test_invalid_date_format_is_rejected() {
        let config = TableConfig {
            columns: vec![],
            date_format: Some("%Y-%".to_string()),
            actions: vec![],
        };
        assert!(RowWriter::from_config(Domain::Earthquake, &config).is_err());
    }

    #[test]
    fn test_handler_id_is_quoted() {
        let config = TableConfig {
            columns: vec![],
            date_format: None,
            actions: vec![show_report()],
        };
        let writer = RowWriter::from_config(Domain::Ash, &config).unwrap();
        let row = writer.write_row(&record(json!({"id": "o'clock"})));
        assert!(row.contains("onclick=\"showReport(&#39;o\\&#39;clock&#39;)\""));
    }

    #[rstest]
    #[case("{event_id}-hazard.zip", "2020-6-rw-hazard.zip")]
    #[case("/report/{language}/{event_id}", "/report/id/2020-6-rw")]
    #[case("{missing}|{nothing}", "|")]
    #[case("no placeholders", "no placeholders")]
    #[case("{unclosed", "{unclosed")]
    fn test_fill_template(#[case] template: &str, #[case] expected: &str) {
        let feature = record(json!({"event_id": "2020-6-rw", "language": "id", "nothing": null}));
        assert_eq!(fill_template(template, &feature), expected);
    }
}
