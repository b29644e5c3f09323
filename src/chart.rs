use serde::Deserialize;

/// Body of `POST /generate-chart`: `{ "values": [["label", value], ...] }`.
/// Presence of `values` is validated by the handler.
#[derive(Debug, Deserialize)]
pub struct ChartRequest {
    pub values: Option<Vec<(String, f64)>>,
}

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 48.0;
const BAR_GAP: f64 = 12.0;

/// Renders the label/value pairs as a standalone SVG bar chart.
///
/// Deterministic output: fixed canvas, bars scaled against the largest value,
/// labels centered under their bars. Negative values are drawn as zero-height
/// bars rather than inverted ones.
pub fn render_bar_chart(values: &[(String, f64)]) -> String {
    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let max_value = values.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    ));
    // Axes
    svg.push_str(&format!(
        r##"<line x1="{MARGIN}" y1="{y0}" x2="{x1}" y2="{y0}" stroke="#333"/>"##,
        y0 = HEIGHT - MARGIN,
        x1 = WIDTH - MARGIN,
    ));
    svg.push_str(&format!(
        r##"<line x1="{MARGIN}" y1="{MARGIN}" x2="{MARGIN}" y2="{y0}" stroke="#333"/>"##,
        y0 = HEIGHT - MARGIN,
    ));

    if !values.is_empty() {
        let slot_w = plot_w / values.len() as f64;
        let bar_w = (slot_w - BAR_GAP).max(1.0);

        for (i, (label, value)) in values.iter().enumerate() {
            let scaled = if max_value > 0.0 {
                (value.max(0.0) / max_value) * plot_h
            } else {
                0.0
            };
            let x = MARGIN + i as f64 * slot_w + BAR_GAP / 2.0;
            let y = HEIGHT - MARGIN - scaled;
            svg.push_str(&format!(
                r##"<rect x="{x:.1}" y="{y:.1}" width="{bar_w:.1}" height="{scaled:.1}" fill="#4a90d9"/>"##
            ));
            svg.push_str(&format!(
                r#"<text x="{cx:.1}" y="{ty:.1}" font-size="12" text-anchor="middle">{label}</text>"#,
                cx = x + bar_w / 2.0,
                ty = HEIGHT - MARGIN + 16.0,
                label = xml_escape(label),
            ));
            svg.push_str(&format!(
                r#"<text x="{cx:.1}" y="{vy:.1}" font-size="11" text-anchor="middle">{value}</text>"#,
                cx = x + bar_w / 2.0,
                vy = (y - 4.0).max(12.0),
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
