use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use indicatif::{ProgressBar, ProgressStyle};

// Palette (cold ore → hot metal → pure steel)
pub const COLD: Color = Color::DarkGrey;
pub const WARM: Color = Color::Red;
pub const HOT: Color = Color::AnsiValue(208); // orange
pub const BRIGHT: Color = Color::AnsiValue(220); // yellow
pub const PURE: Color = Color::White;

// Progress goes to stderr; stdout carries only the final report.

pub fn hr() {
    eprintln!(
        "{}━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━{}",
        fg(COLD),
        reset()
    );
}

pub fn header(title: &str) {
    eprintln!();
    hr();
    eprintln!(
        "{}{}  \u{2692} {}{}{}",
        SetAttribute(Attribute::Bold),
        fg(PURE),
        title,
        reset(),
        SetAttribute(Attribute::Reset),
    );
    hr();
}

pub fn status_line(icon: &str, color: Color, msg: &str) {
    eprintln!("  {}{}{} {}", fg(color), icon, reset(), msg);
}

/// Status line with a wall-clock stamp, for long-running phases.
pub fn stamped_line(icon: &str, color: Color, msg: &str) {
    let ts = chrono::Local::now().format("%H:%M:%S");
    eprintln!(
        "  {}{ts}{} {}{icon}{} {msg}",
        fg(COLD),
        reset(),
        fg(color),
        reset()
    );
}

pub fn show_banner() {
    eprintln!();
    eprint!("  {}░░░", fg(COLD));
    eprint!("{}▒", fg(WARM));
    eprint!("{}▒", fg(HOT));
    eprint!("{}▓", fg(BRIGHT));
    eprint!("{}█", fg(PURE));
    eprint!(
        "  {}{}TEMPER{}",
        SetAttribute(Attribute::Bold),
        fg(PURE),
        SetAttribute(Attribute::Reset),
    );
    eprint!("  {}█", fg(PURE));
    eprint!("{}▓", fg(BRIGHT));
    eprint!("{}▒", fg(HOT));
    eprint!("{}▒", fg(WARM));
    eprintln!("{}░░░{}", fg(COLD), reset());

    eprintln!("  {}cold      hot       pure{}", fg(COLD), reset());
    eprintln!("  {}lint · provision · build · boot{}", fg(COLD), reset());
}

/// Create a spinner for long operations
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("◐◓◑◒ ")
            .template(&format!("   {{spinner}} {msg}"))
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(150));
    pb
}

/// Clip to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

/// Format elapsed time as "Xm YYs" or "Xs"
pub fn format_elapsed(secs: u64) -> String {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    if mins > 0 {
        format!("{mins}m{remaining_secs:02}s")
    } else {
        format!("{secs}s")
    }
}

// Helper to create crossterm foreground color string
fn fg(color: Color) -> SetForegroundColor {
    SetForegroundColor(color)
}

fn reset() -> ResetColor {
    ResetColor
}
