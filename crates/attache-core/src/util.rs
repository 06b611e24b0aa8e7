//! Shared utility functions used across multiple modules.

/// Format a magnitude with SI decimal prefixes and three significant digits.
///
/// Zero stays `"0"`, negative values keep their sign, sub-unit magnitudes
/// use the milli/micro/... prefixes, and magnitudes beyond the largest
/// prefix are rendered without decimals.
#[must_use]
pub fn format_si(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let mut significand = value.abs();
    let mut exponent = 0i32;
    while significand >= 1000.0 && exponent < 24 {
        significand /= 1000.0;
        exponent += 3;
    }
    while significand < 1.0 && exponent > -24 {
        significand *= 1000.0;
        exponent -= 3;
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let prefix = prefix_for(exponent);
    if significand > 1000.0 {
        return format!("{sign}{significand:.0}{prefix}");
    }
    format!("{sign}{}{prefix}", three_significant(significand))
}

/// Human-readable byte-size label for attachment rows.
#[allow(clippy::cast_precision_loss)] // display only
#[must_use]
pub fn format_size_label(bytes: u64) -> String {
    format!("{}B", format_si(bytes as f64))
}

fn prefix_for(exponent: i32) -> &'static str {
    match exponent {
        24 => "Y",
        21 => "Z",
        18 => "E",
        15 => "P",
        12 => "T",
        9 => "G",
        6 => "M",
        3 => "k",
        0 => "",
        -3 => "m",
        -6 => "µ",
        -9 => "n",
        -12 => "p",
        -15 => "f",
        -18 => "a",
        -21 => "z",
        _ => "y",
    }
}

/// Render a significand in [1, 1000] with three significant digits,
/// trimming trailing zeros.
fn three_significant(significand: f64) -> String {
    let decimals = if significand >= 100.0 {
        0
    } else if significand >= 10.0 {
        1
    } else {
        2
    };
    let rendered = format!("{significand:.decimals$}");
    if rendered.contains('.') {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_si_handles_zero_and_small_values() {
        assert_eq!(format_si(0.0), "0");
        assert_eq!(format_si(1.0), "1");
        assert_eq!(format_si(500.0), "500");
        assert_eq!(format_si(999.0), "999");
    }

    #[test]
    fn format_si_scales_with_decimal_prefixes() {
        assert_eq!(format_si(1500.0), "1.5k");
        assert_eq!(format_si(1_500_000.0), "1.5M");
        assert_eq!(format_si(2_000_000_000.0), "2G");
        assert_eq!(format_si(1536.0), "1.54k");
    }

    #[test]
    fn format_si_preserves_sign() {
        assert_eq!(format_si(-500.0), "-500");
        assert_eq!(format_si(-1500.0), "-1.5k");
    }

    #[test]
    fn format_si_handles_sub_unit_magnitudes() {
        assert_eq!(format_si(0.5), "500m");
        assert_eq!(format_si(0.000_5), "500µ");
    }

    #[test]
    fn format_si_saturates_beyond_largest_prefix() {
        assert_eq!(format_si(2.5e27), "2500Y");
    }

    #[test]
    fn format_size_label_appends_unit() {
        assert_eq!(format_size_label(0), "0B");
        assert_eq!(format_size_label(1500), "1.5kB");
    }
}
