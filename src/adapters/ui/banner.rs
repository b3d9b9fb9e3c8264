//! Startup ASCII banner with a vertical color gradient.

use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use std::io::{Write, stdout};

/// Block-style "DOCFLOW" wordmark.
const WORDMARK: &[&str] = &[
    r" ____   ___   ____ _____ _     ___ __        __",
    r"|  _ \ / _ \ / ___|  ___| |   / _ \\ \      / /",
    r"| | | | | | | |   | |_  | |  | | | |\ \ /\ / / ",
    r"| |_| | |_| | |___|  _| | |__| |_| | \ V  V /  ",
    r"|____/ \___/ \____|_|   |_____\___/   \_/\_/   ",
];

/// Deep blue (#1e6cff).
const TOP: (u8, u8, u8) = (0x1e, 0x6c, 0xff);
/// Teal (#0ff0c8).
const BOTTOM: (u8, u8, u8) = (0x0f, 0xf0, 0xc8);

/// Linear interpolation between two RGB colors. `t` in [0.0, 1.0].
fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let r = (f64::from(a.0) * (1.0 - t) + f64::from(b.0) * t).round() as u8;
    let g = (f64::from(a.1) * (1.0 - t) + f64::from(b.1) * t).round() as u8;
    let bl = (f64::from(a.2) * (1.0 - t) + f64::from(b.2) * t).round() as u8;
    (r, g, bl)
}

/// Prints the wordmark with a top-to-bottom gradient, then the version line.
pub fn print_welcome() {
    let mut out = stdout();
    let total = WORDMARK.len().max(1);

    for (i, line) in WORDMARK.iter().enumerate() {
        let t = if total <= 1 {
            1.0
        } else {
            i as f64 / (total - 1) as f64
        };
        let (r, g, b) = lerp_rgb(TOP, BOTTOM, t);
        let _ = out.execute(SetForegroundColor(Color::Rgb { r, g, b }));
        let _ = out.execute(Print(line));
        let _ = out.execute(Print("\r\n"));
        let _ = out.execute(ResetColor);
    }

    let version = env!("CARGO_PKG_VERSION");
    let _ = out.execute(SetForegroundColor(Color::Rgb {
        r: BOTTOM.0,
        g: BOTTOM.1,
        b: BOTTOM.2,
    }));
    let _ = out.execute(Print(format!("v{version} — document sessions from your terminal\r\n")));
    let _ = out.execute(ResetColor);
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_endpoints_match_inputs() {
        assert_eq!(lerp_rgb(TOP, BOTTOM, 0.0), TOP);
        assert_eq!(lerp_rgb(TOP, BOTTOM, 1.0), BOTTOM);
    }
}
