//! Dialoguer theme, banner and status lines for the scan flow.
//!
//! Everything here writes to stderr so stdout stays clean for the guide.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// Returns a `ColorfulTheme` with Landmark Guide's colors.
pub fn landmark_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().yellow(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: style("›".to_string()).for_stderr().bright().black(),
        active_item_prefix: style("▸".to_string()).for_stderr().yellow(),
        active_item_style: Style::new().for_stderr().yellow(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        success_suffix: style("·".to_string()).for_stderr().bright().black(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

/// Prints the Landmark Guide banner to stderr.
pub fn print_banner() {
    let version_line = format!("Landmark Guide v{}", landmark_core::VERSION);
    let tagline = "Point, snap, and explore!";

    let inner_width = version_line.len().max(tagline.len()) + 4;

    let top = format!("  ╔{:═<width$}╗", "", width = inner_width);
    let mid1 = format!("  ║{:^width$}║", version_line, width = inner_width);
    let mid2 = format!("  ║{:^width$}║", tagline, width = inner_width);
    let bot = format!("  ╚{:═<width$}╝", "", width = inner_width);

    let yellow = Style::new().for_stderr().yellow();

    eprintln!();
    eprintln!("{}", yellow.apply_to(&top));
    eprintln!("{}", yellow.apply_to(&mid1));
    eprintln!("{}", yellow.apply_to(&mid2));
    eprintln!("{}", yellow.apply_to(&bot));
    eprintln!();
}

/// Print a user-facing error line to stderr.
pub fn print_error(message: &str) {
    let red = Style::new().for_stderr().red();
    eprintln!("  {} {}", red.apply_to("✗"), message);
}

/// Print a dim hint line to stderr.
pub fn print_hint(message: &str) {
    let dim = Style::new().for_stderr().dim();
    eprintln!("  {}", dim.apply_to(message));
}
