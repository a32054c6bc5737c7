//! Textual color parsing: keywords, hex and functional notation.

use super::{named, Color};

/// Parses a textual color. `None` means the text is not a color.
pub(super) fn parse(input: &str) -> Option<Color> {
    let s = input.trim().to_ascii_lowercase();

    if s == "transparent" {
        return Some(Color::TRANSPARENT);
    }

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some(args) = functional_args(&s, "rgba").or_else(|| functional_args(&s, "rgb")) {
        return parse_rgb_args(args);
    }

    named::lookup(&s).map(|[r, g, b]| Color::from_rgba8(r, g, b, 255))
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let [r, g, b, a] = match hex.len() {
        3 => [nibble(0)?, nibble(1)?, nibble(2)?, 255],
        4 => [nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?],
        6 => [byte(0)?, byte(2)?, byte(4)?, 255],
        8 => [byte(0)?, byte(2)?, byte(4)?, byte(6)?],
        _ => return None,
    };

    Some(Color::from_rgba8(r, g, b, a))
}

fn functional_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// `r, g, b[, a]` with 0–255 channels (or percentages) and a 0–1 alpha.
/// Space- and slash-separated forms are accepted as well.
fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args
        .split([',', ' ', '/'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if !(parts.len() == 3 || parts.len() == 4) {
        return None;
    }

    let channel = |p: &str| -> Option<f32> {
        match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok().map(|v| v / 100.0),
            None => p.parse::<f32>().ok().map(|v| v / 255.0),
        }
    };
    let alpha = |p: &str| -> Option<f32> {
        match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok().map(|v| v / 100.0),
            None => p.parse::<f32>().ok(),
        }
    };

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = match parts.get(3) {
        Some(p) => alpha(p)?,
        None => 1.0,
    };

    Some(Color::new(r, g, b, a).clamped())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hex_expands_nibbles() {
        assert_eq!(parse("#f00"), Some(Color::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(parse("#0f08").map(|c| c.to_rgba8()), Some([0, 255, 0, 136]));
    }

    #[test]
    fn long_hex_with_alpha() {
        assert_eq!(parse("#00000080").map(|c| c.to_rgba8()), Some([0, 0, 0, 128]));
        assert_eq!(parse("#FFFFFF"), Some(Color::WHITE));
    }

    #[test]
    fn hex_rejects_bad_lengths_and_digits() {
        assert_eq!(parse("#12345"), None);
        assert_eq!(parse("#ggg"), None);
        assert_eq!(parse("#"), None);
    }

    #[test]
    fn functional_notation() {
        assert_eq!(parse("rgb(255, 0, 0)"), Some(Color::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(parse("rgba(0, 0, 255, 0.5)"), Some(Color::new(0.0, 0.0, 1.0, 0.5)));
        assert_eq!(parse("rgb(0 255 0 / 50%)"), Some(Color::new(0.0, 1.0, 0.0, 0.5)));
        assert_eq!(parse("rgb(1, 2)"), None);
    }

    #[test]
    fn named_colors_are_case_insensitive() {
        assert_eq!(parse("CornflowerBlue").map(|c| c.to_rgba8()), Some([100, 149, 237, 255]));
        assert_eq!(parse("rebeccapurple").map(|c| c.to_rgba8()), Some([102, 51, 153, 255]));
        assert_eq!(parse("not-a-color"), None);
    }
}
