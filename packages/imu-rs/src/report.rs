// Alert summary text report

use crate::types::{AlertSummary, SignalSummary};
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

fn render_section(out: &mut String, section: &SignalSummary) {
    let _ = writeln!(out, "{}:", section.signal.title());
    for band in &section.bands {
        let _ = writeln!(out, "  {}: {} samples", band.label, band.count);
    }
}

/// Plain-text alert summary: acceleration bands, a blank line, then
/// gyroscope bands, each in the order they were configured.
pub fn render(summary: &AlertSummary) -> String {
    let mut out = String::new();
    out.push_str("Alert Summary\n");
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');

    render_section(&mut out, &summary.acceleration);
    out.push('\n');
    render_section(&mut out, &summary.gyroscope);

    out
}
