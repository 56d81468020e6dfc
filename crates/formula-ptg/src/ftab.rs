//! Built-in function table (`iftab` ids used by `PtgFunc` / `PtgFuncVar`).

/// Function id used for add-in and user-defined calls; the callee name is the first argument.
pub const USER_DEFINED_FUNCTION: u16 = 255;

pub const SUM: u16 = 4;
pub const IF: u16 = 1;

/// Static metadata for one built-in function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FunctionInfo {
    pub id: u16,
    pub name: &'static str,
    pub min_args: u8,
    pub max_args: u8,
    /// Recalculated on every pass regardless of inputs.
    pub volatile: bool,
}

impl FunctionInfo {
    const fn new(id: u16, name: &'static str, min_args: u8, max_args: u8, volatile: bool) -> Self {
        Self {
            id,
            name,
            min_args,
            max_args,
            volatile,
        }
    }

    /// A fixed-arity function is the only kind a `PtgFunc` may call.
    pub const fn is_fixed_arity(&self) -> bool {
        self.min_args == self.max_args
    }
}

// Sorted by id; lookups binary-search.
static FUNCTIONS: &[FunctionInfo] = &[
    FunctionInfo::new(0, "COUNT", 0, 30, false),
    FunctionInfo::new(1, "IF", 2, 3, false),
    FunctionInfo::new(2, "ISNA", 1, 1, false),
    FunctionInfo::new(3, "ISERROR", 1, 1, false),
    FunctionInfo::new(4, "SUM", 0, 30, false),
    FunctionInfo::new(5, "AVERAGE", 1, 30, false),
    FunctionInfo::new(6, "MIN", 1, 30, false),
    FunctionInfo::new(7, "MAX", 1, 30, false),
    FunctionInfo::new(8, "ROW", 0, 1, false),
    FunctionInfo::new(9, "COLUMN", 0, 1, false),
    FunctionInfo::new(10, "NA", 0, 0, false),
    FunctionInfo::new(11, "NPV", 2, 30, false),
    FunctionInfo::new(12, "STDEV", 1, 30, false),
    FunctionInfo::new(13, "DOLLAR", 1, 2, false),
    FunctionInfo::new(14, "FIXED", 1, 3, false),
    FunctionInfo::new(15, "SIN", 1, 1, false),
    FunctionInfo::new(16, "COS", 1, 1, false),
    FunctionInfo::new(17, "TAN", 1, 1, false),
    FunctionInfo::new(18, "ATAN", 1, 1, false),
    FunctionInfo::new(19, "PI", 0, 0, false),
    FunctionInfo::new(20, "SQRT", 1, 1, false),
    FunctionInfo::new(21, "EXP", 1, 1, false),
    FunctionInfo::new(22, "LN", 1, 1, false),
    FunctionInfo::new(23, "LOG10", 1, 1, false),
    FunctionInfo::new(24, "ABS", 1, 1, false),
    FunctionInfo::new(25, "INT", 1, 1, false),
    FunctionInfo::new(26, "SIGN", 1, 1, false),
    FunctionInfo::new(27, "ROUND", 2, 2, false),
    FunctionInfo::new(28, "LOOKUP", 2, 3, false),
    FunctionInfo::new(29, "INDEX", 2, 4, false),
    FunctionInfo::new(30, "REPT", 2, 2, false),
    FunctionInfo::new(31, "MID", 3, 3, false),
    FunctionInfo::new(32, "LEN", 1, 1, false),
    FunctionInfo::new(33, "VALUE", 1, 1, false),
    FunctionInfo::new(34, "TRUE", 0, 0, false),
    FunctionInfo::new(35, "FALSE", 0, 0, false),
    FunctionInfo::new(36, "AND", 1, 30, false),
    FunctionInfo::new(37, "OR", 1, 30, false),
    FunctionInfo::new(38, "NOT", 1, 1, false),
    FunctionInfo::new(39, "MOD", 2, 2, false),
    FunctionInfo::new(40, "DCOUNT", 3, 3, false),
    FunctionInfo::new(41, "DSUM", 3, 3, false),
    FunctionInfo::new(42, "DAVERAGE", 3, 3, false),
    FunctionInfo::new(43, "DMIN", 3, 3, false),
    FunctionInfo::new(44, "DMAX", 3, 3, false),
    FunctionInfo::new(45, "DSTDEV", 3, 3, false),
    FunctionInfo::new(46, "VAR", 1, 30, false),
    FunctionInfo::new(47, "DVAR", 3, 3, false),
    FunctionInfo::new(48, "TEXT", 2, 2, false),
    FunctionInfo::new(49, "LINEST", 1, 4, false),
    FunctionInfo::new(50, "TREND", 1, 4, false),
    FunctionInfo::new(51, "LOGEST", 1, 4, false),
    FunctionInfo::new(52, "GROWTH", 1, 4, false),
    FunctionInfo::new(56, "PV", 3, 5, false),
    FunctionInfo::new(57, "FV", 3, 5, false),
    FunctionInfo::new(58, "NPER", 3, 5, false),
    FunctionInfo::new(59, "PMT", 3, 5, false),
    FunctionInfo::new(60, "RATE", 3, 6, false),
    FunctionInfo::new(61, "MIRR", 3, 3, false),
    FunctionInfo::new(62, "IRR", 1, 2, false),
    FunctionInfo::new(63, "RAND", 0, 0, true),
    FunctionInfo::new(64, "MATCH", 2, 3, false),
    FunctionInfo::new(65, "DATE", 3, 3, false),
    FunctionInfo::new(66, "TIME", 3, 3, false),
    FunctionInfo::new(67, "DAY", 1, 1, false),
    FunctionInfo::new(68, "MONTH", 1, 1, false),
    FunctionInfo::new(69, "YEAR", 1, 1, false),
    FunctionInfo::new(70, "WEEKDAY", 1, 2, false),
    FunctionInfo::new(71, "HOUR", 1, 1, false),
    FunctionInfo::new(72, "MINUTE", 1, 1, false),
    FunctionInfo::new(73, "SECOND", 1, 1, false),
    FunctionInfo::new(74, "NOW", 0, 0, true),
    FunctionInfo::new(75, "AREAS", 1, 1, false),
    FunctionInfo::new(76, "ROWS", 1, 1, false),
    FunctionInfo::new(77, "COLUMNS", 1, 1, false),
    FunctionInfo::new(78, "OFFSET", 3, 5, true),
    FunctionInfo::new(82, "SEARCH", 2, 3, false),
    FunctionInfo::new(83, "TRANSPOSE", 1, 1, false),
    FunctionInfo::new(86, "TYPE", 1, 1, false),
    FunctionInfo::new(97, "ATAN2", 2, 2, false),
    FunctionInfo::new(98, "ASIN", 1, 1, false),
    FunctionInfo::new(99, "ACOS", 1, 1, false),
    FunctionInfo::new(100, "CHOOSE", 2, 30, false),
    FunctionInfo::new(101, "HLOOKUP", 3, 4, false),
    FunctionInfo::new(102, "VLOOKUP", 3, 4, false),
    FunctionInfo::new(105, "ISREF", 1, 1, false),
    FunctionInfo::new(109, "LOG", 1, 2, false),
    FunctionInfo::new(111, "CHAR", 1, 1, false),
    FunctionInfo::new(112, "LOWER", 1, 1, false),
    FunctionInfo::new(113, "UPPER", 1, 1, false),
    FunctionInfo::new(114, "PROPER", 1, 1, false),
    FunctionInfo::new(115, "LEFT", 1, 2, false),
    FunctionInfo::new(116, "RIGHT", 1, 2, false),
    FunctionInfo::new(117, "EXACT", 2, 2, false),
    FunctionInfo::new(118, "TRIM", 1, 1, false),
    FunctionInfo::new(119, "REPLACE", 4, 4, false),
    FunctionInfo::new(120, "SUBSTITUTE", 3, 4, false),
    FunctionInfo::new(121, "CODE", 1, 1, false),
    FunctionInfo::new(124, "FIND", 2, 3, false),
    FunctionInfo::new(125, "CELL", 1, 2, true),
    FunctionInfo::new(126, "ISERR", 1, 1, false),
    FunctionInfo::new(127, "ISTEXT", 1, 1, false),
    FunctionInfo::new(128, "ISNUMBER", 1, 1, false),
    FunctionInfo::new(129, "ISBLANK", 1, 1, false),
    FunctionInfo::new(130, "T", 1, 1, false),
    FunctionInfo::new(131, "N", 1, 1, false),
    FunctionInfo::new(140, "DATEVALUE", 1, 1, false),
    FunctionInfo::new(141, "TIMEVALUE", 1, 1, false),
    FunctionInfo::new(142, "SLN", 3, 3, false),
    FunctionInfo::new(143, "SYD", 4, 4, false),
    FunctionInfo::new(144, "DDB", 4, 5, false),
    FunctionInfo::new(148, "INDIRECT", 1, 2, true),
    FunctionInfo::new(162, "CLEAN", 1, 1, false),
    FunctionInfo::new(163, "MDETERM", 1, 1, false),
    FunctionInfo::new(164, "MINVERSE", 1, 1, false),
    FunctionInfo::new(165, "MMULT", 2, 2, false),
    FunctionInfo::new(167, "IPMT", 4, 6, false),
    FunctionInfo::new(168, "PPMT", 4, 6, false),
    FunctionInfo::new(169, "COUNTA", 0, 30, false),
    FunctionInfo::new(183, "PRODUCT", 0, 30, false),
    FunctionInfo::new(184, "FACT", 1, 1, false),
    FunctionInfo::new(189, "DPRODUCT", 3, 3, false),
    FunctionInfo::new(190, "ISNONTEXT", 1, 1, false),
    FunctionInfo::new(193, "STDEVP", 1, 30, false),
    FunctionInfo::new(194, "VARP", 1, 30, false),
    FunctionInfo::new(195, "DSTDEVP", 3, 3, false),
    FunctionInfo::new(196, "DVARP", 3, 3, false),
    FunctionInfo::new(197, "TRUNC", 1, 2, false),
    FunctionInfo::new(198, "ISLOGICAL", 1, 1, false),
    FunctionInfo::new(199, "DCOUNTA", 3, 3, false),
    FunctionInfo::new(212, "ROUNDUP", 2, 2, false),
    FunctionInfo::new(213, "ROUNDDOWN", 2, 2, false),
    FunctionInfo::new(216, "RANK", 2, 3, false),
    FunctionInfo::new(219, "ADDRESS", 2, 5, false),
    FunctionInfo::new(220, "DAYS360", 2, 3, false),
    FunctionInfo::new(221, "TODAY", 0, 0, true),
    FunctionInfo::new(222, "VDB", 5, 7, false),
    FunctionInfo::new(227, "MEDIAN", 1, 30, false),
    FunctionInfo::new(228, "SUMPRODUCT", 1, 30, false),
    FunctionInfo::new(229, "SINH", 1, 1, false),
    FunctionInfo::new(230, "COSH", 1, 1, false),
    FunctionInfo::new(231, "TANH", 1, 1, false),
    FunctionInfo::new(232, "ASINH", 1, 1, false),
    FunctionInfo::new(233, "ACOSH", 1, 1, false),
    FunctionInfo::new(234, "ATANH", 1, 1, false),
    FunctionInfo::new(235, "DGET", 3, 3, false),
    FunctionInfo::new(244, "INFO", 1, 1, true),
    FunctionInfo::new(247, "DB", 4, 5, false),
    FunctionInfo::new(252, "FREQUENCY", 2, 2, false),
    FunctionInfo::new(255, "USER", 1, 30, false),
    FunctionInfo::new(261, "ERROR.TYPE", 1, 1, false),
    FunctionInfo::new(269, "AVEDEV", 1, 30, false),
    FunctionInfo::new(276, "COMBIN", 2, 2, false),
    FunctionInfo::new(279, "EVEN", 1, 1, false),
    FunctionInfo::new(285, "FLOOR", 2, 2, false),
    FunctionInfo::new(288, "CEILING", 2, 2, false),
    FunctionInfo::new(298, "ODD", 1, 1, false),
    FunctionInfo::new(299, "PERMUT", 2, 2, false),
    FunctionInfo::new(300, "POISSON", 3, 3, false),
    FunctionInfo::new(303, "SUMXMY2", 2, 2, false),
    FunctionInfo::new(304, "SUMX2MY2", 2, 2, false),
    FunctionInfo::new(305, "SUMX2PY2", 2, 2, false),
    FunctionInfo::new(307, "CORREL", 2, 2, false),
    FunctionInfo::new(308, "COVAR", 2, 2, false),
    FunctionInfo::new(309, "FORECAST", 3, 3, false),
    FunctionInfo::new(311, "INTERCEPT", 2, 2, false),
    FunctionInfo::new(312, "PEARSON", 2, 2, false),
    FunctionInfo::new(313, "RSQ", 2, 2, false),
    FunctionInfo::new(315, "SLOPE", 2, 2, false),
    FunctionInfo::new(318, "DEVSQ", 1, 30, false),
    FunctionInfo::new(319, "GEOMEAN", 1, 30, false),
    FunctionInfo::new(320, "HARMEAN", 1, 30, false),
    FunctionInfo::new(321, "SUMSQ", 0, 30, false),
    FunctionInfo::new(322, "KURT", 1, 30, false),
    FunctionInfo::new(323, "SKEW", 1, 30, false),
    FunctionInfo::new(325, "LARGE", 2, 2, false),
    FunctionInfo::new(326, "SMALL", 2, 2, false),
    FunctionInfo::new(327, "QUARTILE", 2, 2, false),
    FunctionInfo::new(328, "PERCENTILE", 2, 2, false),
    FunctionInfo::new(330, "MODE", 1, 30, false),
    FunctionInfo::new(331, "TRIMMEAN", 2, 2, false),
    FunctionInfo::new(336, "CONCATENATE", 0, 30, false),
    FunctionInfo::new(337, "POWER", 2, 2, false),
    FunctionInfo::new(342, "RADIANS", 1, 1, false),
    FunctionInfo::new(343, "DEGREES", 1, 1, false),
    FunctionInfo::new(344, "SUBTOTAL", 2, 30, false),
    FunctionInfo::new(345, "SUMIF", 2, 3, false),
    FunctionInfo::new(346, "COUNTIF", 2, 2, false),
    FunctionInfo::new(347, "COUNTBLANK", 1, 1, false),
    FunctionInfo::new(350, "ISPMT", 4, 4, false),
    FunctionInfo::new(351, "DATEDIF", 3, 3, false),
    FunctionInfo::new(354, "ROMAN", 1, 2, false),
    FunctionInfo::new(358, "GETPIVOTDATA", 2, 30, false),
    FunctionInfo::new(359, "HYPERLINK", 1, 2, false),
    FunctionInfo::new(361, "AVERAGEA", 1, 30, false),
    FunctionInfo::new(362, "MAXA", 1, 30, false),
    FunctionInfo::new(363, "MINA", 1, 30, false),
    FunctionInfo::new(364, "STDEVPA", 1, 30, false),
    FunctionInfo::new(365, "VARPA", 1, 30, false),
    FunctionInfo::new(366, "STDEVA", 1, 30, false),
    FunctionInfo::new(367, "VARA", 1, 30, false),
];

pub fn function_info(id: u16) -> Option<&'static FunctionInfo> {
    FUNCTIONS
        .binary_search_by_key(&id, |f| f.id)
        .ok()
        .map(|idx| &FUNCTIONS[idx])
}

pub fn function_name(id: u16) -> Option<&'static str> {
    function_info(id).map(|f| f.name)
}

/// Case-insensitive lookup by canonical name.
pub fn function_id(name: &str) -> Option<u16> {
    FUNCTIONS
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
        .map(|f| f.id)
}

/// Argument count implied by a `PtgFunc` call, or `None` if the id is unknown or variadic.
pub fn fixed_arity(id: u16) -> Option<u8> {
    function_info(id)
        .filter(|f| f.is_fixed_arity())
        .map(|f| f.min_args)
}

pub fn functions() -> impl Iterator<Item = &'static FunctionInfo> {
    FUNCTIONS.iter()
}
