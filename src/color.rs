/// Color utilities for counters.
use rand::RngExt;

const PALETTE: &[&str] = &[
    "#0F172A", "#6366F1", "#EC4899", "#F97316", "#10B981", "#0EA5E9", "#8B5CF6", "#EAB308",
    "#EF4444", "#14B8A6", "#F43F5E", "#84CC16",
];

/// Validate if a string is a valid hex color (e.g., #RRGGBB).
pub fn is_valid_hex(s: &str) -> bool {
    s.starts_with('#') && s.len() == 7 && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Pick a random color from the counter palette.
pub fn random_color() -> String {
    let mut rng = rand::rng();
    PALETTE[rng.random_range(0..PALETTE.len())].to_string()
}
