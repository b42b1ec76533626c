//! Hover tooltips rendered as small HTML fragments.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::dashboard::format::{format_fixed, format_number};
use crate::types::{Row, Scalar};

type ValueFormatter = Box<dyn Fn(&Scalar) -> String + Send + Sync>;

/// One line of a tooltip.
pub struct TooltipField {
    pub key: String,
    pub label: String,
    /// CSS color of the label; white when unset.
    pub color: Option<String>,
    pub format: Option<ValueFormatter>,
}

impl TooltipField {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            color: None,
            format: None,
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn format(mut self, format: impl Fn(&Scalar) -> String + Send + Sync + 'static) -> Self {
        self.format = Some(Box::new(format));
        self
    }

    /// Numbers rendered with thousands separators.
    pub fn number(self) -> Self {
        self.format(|value| match value.as_f64() {
            Some(v) => format_number(v),
            None => value.to_string(),
        })
    }

    /// Numbers rendered with exactly `decimals` fractional digits.
    pub fn fixed(self, decimals: usize) -> Self {
        self.format(move |value| match value.as_f64() {
            Some(v) => format_fixed(v, decimals),
            None => value.to_string(),
        })
    }

    fn render(&self, value: &Scalar) -> String {
        match &self.format {
            Some(format) => format(value),
            None => value.to_string(),
        }
    }
}

impl fmt::Debug for TooltipField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TooltipField")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("color", &self.color)
            .field("format", &self.format.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub html: String,
    pub style: BTreeMap<String, String>,
}

pub fn default_style() -> BTreeMap<String, String> {
    [
        ("backgroundColor", "rgba(0, 0, 0, 0.9)"),
        ("color", "white"),
        ("fontSize", "12px"),
        ("padding", "12px"),
        ("borderRadius", "4px"),
        ("maxWidth", "250px"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Tooltip for `row`. Fields whose column is absent or null are skipped.
pub fn build_tooltip(row: &Row, fields: &[TooltipField]) -> Tooltip {
    let mut html = String::from(r#"<div style="font-family: sans-serif;">"#);
    for field in fields {
        let Some(value) = row.get(&field.key).filter(|value| !value.is_null()) else {
            continue;
        };
        let color = field.color.as_deref().unwrap_or("white");
        html.push_str(&format!(
            r#"<strong style="color: {};">{}:</strong> {}<br/>"#,
            escape_html(color),
            escape_html(&field.label),
            escape_html(&field.render(value)),
        ));
    }
    html.push_str("</div>");
    Tooltip {
        html,
        style: default_style(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_present_fields_in_order() {
        let row = Row::from_pairs([
            ("h3_id", Scalar::from("8a1f")),
            ("aantal_inwoners_sum", Scalar::Int(1234567)),
            ("verzilting", Scalar::Null),
        ]);
        let fields = [
            TooltipField::new("h3_id", "Hexagon"),
            TooltipField::new("aantal_inwoners_sum", "Inwoners")
                .color("#ffc300")
                .number(),
            TooltipField::new("verzilting", "Verzilting"),
            TooltipField::new("absent", "Absent"),
        ];
        let tooltip = build_tooltip(&row, &fields);
        assert_eq!(
            tooltip.html,
            concat!(
                r#"<div style="font-family: sans-serif;">"#,
                r#"<strong style="color: white;">Hexagon:</strong> 8a1f<br/>"#,
                r#"<strong style="color: #ffc300;">Inwoners:</strong> 1,234,567<br/>"#,
                "</div>",
            )
        );
        assert_eq!(tooltip.style["backgroundColor"], "rgba(0, 0, 0, 0.9)");
        assert_eq!(tooltip.style.len(), 6);
    }

    #[test]
    fn fixed_fields_render_with_decimals() {
        let row = Row::from_pairs([
            ("maaiveldhoogte", Scalar::Float(-2.125)),
            ("label", Scalar::from("polder")),
        ]);
        let fields = [
            TooltipField::new("maaiveldhoogte", "Height (m)").fixed(2),
            TooltipField::new("label", "Label").fixed(1),
        ];
        let tooltip = build_tooltip(&row, &fields);
        assert!(tooltip
            .html
            .contains(r#"<strong style="color: white;">Height (m):</strong> -2.13<br/>"#));
        assert!(tooltip.html.contains("Label:</strong> polder<br/>"));
    }

    #[test]
    fn escapes_values() {
        let row = Row::from_pairs([("name", Scalar::from("<b>&</b>"))]);
        let tooltip = build_tooltip(&row, &[TooltipField::new("name", "Name")]);
        assert!(tooltip.html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
    }

    #[test]
    fn serializes_for_the_frontend() -> anyhow::Result<()> {
        let tooltip = build_tooltip(&Row::from_pairs(Vec::<(String, Scalar)>::new()), &[]);
        let json = serde_json::to_value(&tooltip)?;
        assert_eq!(json["style"]["maxWidth"], "250px");
        assert_eq!(json["html"], r#"<div style="font-family: sans-serif;"></div>"#);
        Ok(())
    }
}
