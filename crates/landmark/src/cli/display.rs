//! Rendering of the RESULT screen.

use std::fmt::Write;

use console::Style;
use landmark_core::{LandmarkRecord, Prediction};

/// Section titles, in display order.
pub const SECTIONS: [&str; 4] = ["History", "Fun Facts", "Architecture", "Visit Info"];

/// Render the guide as styled text for the terminal.
pub fn render_record(record: &LandmarkRecord, prediction: Option<&Prediction>) -> String {
    let title = Style::new().bold().yellow();
    let heading = Style::new().bold().cyan();
    let dim = Style::new().dim();

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", title.apply_to(&record.name));
    if let Some(p) = prediction {
        let _ = writeln!(
            out,
            "  {}",
            dim.apply_to(format!(
                "Recognized as {} ({:.0}% sure)",
                p.label,
                p.confidence * 100.0
            ))
        );
    }

    let bodies = [
        record.history.clone(),
        record
            .fun_facts
            .iter()
            .map(|fact| format!("• {fact}"))
            .collect::<Vec<_>>()
            .join("\n"),
        record.architecture.clone(),
        record.visit_info.clone(),
    ];

    for (section, body) in SECTIONS.iter().zip(bodies) {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", heading.apply_to(section));
        for line in body.lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
    out
}
