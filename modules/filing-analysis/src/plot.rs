use std::fmt::Write;

use crate::ProjectedPoint;

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 600.0;
const MARGIN: f64 = 40.0;
const LEGEND_WIDTH: f64 = 140.0;

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Render projected points as a standalone SVG scatter plot, one color per
/// cluster. Each marker carries a `<title>` so viewers show the company
/// name and document id on hover.
pub fn render_scatter_svg(points: &[ProjectedPoint]) -> String {
    let plot_right = WIDTH - LEGEND_WIDTH;
    let (x_min, x_max) = bounds(points.iter().map(|p| p.x));
    let (y_min, y_max) = bounds(points.iter().map(|p| p.y));
    let sx = |x: f64| MARGIN + (x - x_min) / (x_max - x_min) * (plot_right - 2.0 * MARGIN);
    // SVG y grows downward.
    let sy = |y: f64| HEIGHT - MARGIN - (y - y_min) / (y_max - y_min) * (HEIGHT - 2.0 * MARGIN);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r##"<rect x="{MARGIN}" y="{MARGIN}" width="{}" height="{}" fill="none" stroke="#ccc"/>"##,
        plot_right - 2.0 * MARGIN,
        HEIGHT - 2.0 * MARGIN
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle">PC1</text>"#,
        (plot_right) / 2.0,
        HEIGHT - 10.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="12" y="{}" text-anchor="middle" transform="rotate(-90 12 {})">PC2</text>"#,
        HEIGHT / 2.0,
        HEIGHT / 2.0
    );

    for p in points {
        let _ = writeln!(
            svg,
            r#"<circle cx="{:.2}" cy="{:.2}" r="4" fill="{}" fill-opacity="0.8"><title>{} ({})</title></circle>"#,
            sx(p.x),
            sy(p.y),
            color(p.cluster),
            escape(&p.company_name),
            escape(&p.id)
        );
    }

    let mut clusters: Vec<usize> = points.iter().map(|p| p.cluster).collect();
    clusters.sort_unstable();
    clusters.dedup();
    for (row, cluster) in clusters.iter().enumerate() {
        let y = MARGIN + 10.0 + row as f64 * 20.0;
        let x = plot_right + 10.0;
        let _ = writeln!(
            svg,
            r#"<circle cx="{x}" cy="{y}" r="5" fill="{}"/><text x="{}" y="{}">cluster {cluster}</text>"#,
            color(*cluster),
            x + 12.0,
            y + 4.0
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn color(cluster: usize) -> &'static str {
    PALETTE[cluster % PALETTE.len()]
}

/// Min and max, widened so a degenerate axis still has a span.
fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    (min, max)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
