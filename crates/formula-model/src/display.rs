/// Render a number the way formula text and string concatenation show it.
///
/// Values are first rounded to 15 significant digits, then printed in their shortest
/// decimal form. Magnitudes of 1e21 and above, or below 1e-19, switch to scientific
/// notation (`1E+21`, `1.5E-20`).
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "#NUM!".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let rounded: f64 = format!("{n:.14e}").parse().unwrap_or(n);
    let abs = rounded.abs();
    if !(1e-19..1e21).contains(&abs) {
        return scientific(rounded);
    }
    format!("{rounded}")
}

fn scientific(n: f64) -> String {
    let raw = format!("{n:E}");
    match raw.split_once('E') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}E{sign}{digits}")
        }
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_have_no_fraction() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
    }

    #[test]
    fn binary_noise_is_rounded_away() {
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(1.0 / 3.0), "0.333333333333333");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn extreme_magnitudes_use_exponents() {
        assert_eq!(format_number(1e21), "1E+21");
        assert_eq!(format_number(1.5e-20), "1.5E-20");
        assert_eq!(format_number(123_456_789.0), "123456789");
    }
}
