/// Render a horizontal bar whose length is proportional to `value / max`.
///
/// Non-zero values always get at least one cell so sparse buckets stay
/// visible next to busy ones.
///
/// # Examples
///
/// ```
/// use glucose_core::formatting::render_bar;
///
/// assert_eq!(render_bar(5, 10, 10), "█████");
/// assert_eq!(render_bar(0, 10, 10), "");
/// assert_eq!(render_bar(1, 100, 10), "█");
/// ```
pub fn render_bar(value: u32, max: u32, width: usize) -> String {
    if value == 0 || max == 0 || width == 0 {
        return String::new();
    }
    let cells = ((f64::from(value) / f64::from(max)) * width as f64).round() as usize;
    "█".repeat(cells.clamp(1, width))
}

/// Format a glucose value with its unit.
///
/// # Examples
///
/// ```
/// use glucose_core::formatting::format_glucose;
///
/// assert_eq!(format_glucose(123), "123 mg/dL");
/// ```
pub fn format_glucose(value: i64) -> String {
    format!("{} mg/dL", value)
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero to avoid division by zero.
///
/// # Examples
///
/// ```
/// use glucose_core::formatting::percentage;
///
/// assert!((percentage(50.0, 200.0, 1) - 25.0).abs() < 1e-9);
/// assert_eq!(percentage(0.0, 0.0, 2), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

/// Pad `title` with a rule underneath, e.g. for section headings.
pub fn heading(title: &str) -> String {
    format!("{}\n{}", title, "─".repeat(title.chars().count()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── render_bar ───────────────────────────────────────────────────────────

    #[test]
    fn test_render_bar_full_width() {
        assert_eq!(render_bar(10, 10, 4), "████");
    }

    #[test]
    fn test_render_bar_minimum_one_cell() {
        assert_eq!(render_bar(1, 1_000, 20).chars().count(), 1);
    }

    #[test]
    fn test_render_bar_zero_max() {
        assert_eq!(render_bar(3, 0, 10), "");
    }

    #[test]
    fn test_render_bar_never_exceeds_width() {
        assert_eq!(render_bar(20, 10, 5).chars().count(), 5);
    }

    // ── percentage ───────────────────────────────────────────────────────────

    #[test]
    fn test_percentage_rounding() {
        let p = percentage(1.0, 3.0, 2);
        assert!((p - 33.33).abs() < 1e-2, "percentage = {p}");
    }

    #[test]
    fn test_percentage_zero_whole() {
        assert_eq!(percentage(10.0, 0.0, 2), 0.0);
    }

    // ── heading ──────────────────────────────────────────────────────────────

    #[test]
    fn test_heading_underline_matches_title() {
        assert_eq!(heading("Carbs"), "Carbs\n─────");
    }
}
