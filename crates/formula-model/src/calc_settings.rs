use serde::{Deserialize, Serialize};

/// Grid dimensions of a worksheet.
///
/// Defaults to the BIFF8 grid (65,536 rows by 256 columns), which is also the range the
/// packed row/column fields of reference tokens can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLimits {
    pub max_rows: u32,
    pub max_cols: u32,
}

impl SheetLimits {
    pub const BIFF8: SheetLimits = SheetLimits {
        max_rows: 65_536,
        max_cols: 256,
    };

    #[inline]
    pub const fn last_row(&self) -> u32 {
        self.max_rows - 1
    }

    #[inline]
    pub const fn last_col(&self) -> u32 {
        self.max_cols - 1
    }
}

impl Default for SheetLimits {
    fn default() -> Self {
        Self::BIFF8
    }
}

/// Workbook-wide calculation settings.
///
/// Passed by reference into evaluation; nothing in the engine reads global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalcSettings {
    /// Workbook calculation mode (automatic vs manual).
    pub calculation_mode: CalculationMode,
    /// Grid bounds. Shared-formula instantiation wraps columns at `limits.max_cols`.
    pub limits: SheetLimits,
    /// Relative tolerance used when comparing numbers for equality and ordering.
    pub compare_epsilon: f64,
    /// Maximum nesting when a defined name refers to another name.
    pub max_name_depth: u32,
    /// Arrays larger than this evaluate to `#NUM!` instead of being materialized.
    pub max_array_cells: usize,
}

impl Default for CalcSettings {
    fn default() -> Self {
        Self {
            calculation_mode: CalculationMode::Automatic,
            limits: SheetLimits::default(),
            compare_epsilon: 1e-15,
            max_name_depth: 64,
            max_array_cells: 1 << 24,
        }
    }
}

impl CalcSettings {
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.calculation_mode == CalculationMode::Manual
    }

    #[must_use]
    pub fn is_automatic(&self) -> bool {
        !self.is_manual()
    }
}

/// Workbook calculation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    /// Edits mark dependent formulas dirty and the next read recalculates them.
    #[default]
    Automatic,
    /// Formulas only recalculate on an explicit pass.
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_biff8_grid() {
        let settings = CalcSettings::default();
        assert_eq!(settings.limits.max_rows, 65_536);
        assert_eq!(settings.limits.max_cols, 256);
        assert!(settings.is_automatic());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: CalcSettings =
            serde_json::from_str(r#"{"calculation_mode":"manual","limits":{"max_cols":16384}}"#)
                .unwrap();
        assert!(settings.is_manual());
        assert_eq!(settings.limits.max_cols, 16_384);
        assert_eq!(settings.limits.max_rows, 65_536);
        assert_eq!(settings.max_name_depth, 64);
    }
}
