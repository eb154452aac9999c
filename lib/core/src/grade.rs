//! Ordinal encodings for categorical diamond grades
//!
//! Lower scores mean better (or more standard) grades. Values that are
//! missing or not in a table resolve to a fixed penalty score instead of
//! failing the run.

/// Score for missing or unknown color and clarity grades (one past the worst)
pub const UNKNOWN_COLOR_SCORE: f64 = 11.0;
pub const UNKNOWN_CLARITY_SCORE: f64 = 11.0;
/// Score for missing or unknown cut, polish and symmetry grades
pub const UNKNOWN_FINISH_SCORE: f64 = 5.0;

const COLOR_GRADES: [&str; 10] = ["D", "E", "F", "G", "H", "I", "J", "K", "L", "M"];

const CLARITY_GRADES: [&str; 10] = [
    "FL", "IF", "VVS1", "VVS2", "VS1", "VS2", "SI1", "SI2", "I1", "I2",
];

const FINISH_GRADES: [&str; 5] = ["EX", "VG", "G", "F", "P"];

/// Which lookup table a grade is encoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeScale {
    Color,
    Clarity,
    /// Cut, polish and symmetry share one scale
    Finish,
}

impl GradeScale {
    fn table(self) -> &'static [&'static str] {
        match self {
            GradeScale::Color => &COLOR_GRADES,
            GradeScale::Clarity => &CLARITY_GRADES,
            GradeScale::Finish => &FINISH_GRADES,
        }
    }

    pub fn unknown_score(self) -> f64 {
        match self {
            GradeScale::Color => UNKNOWN_COLOR_SCORE,
            GradeScale::Clarity => UNKNOWN_CLARITY_SCORE,
            GradeScale::Finish => UNKNOWN_FINISH_SCORE,
        }
    }

    /// Encode a grade; position in the table plus one, or the unknown score
    pub fn score(self, grade: Option<&str>) -> f64 {
        grade
            .map(|g| g.trim().to_ascii_uppercase())
            .and_then(|g| self.table().iter().position(|known| *known == g))
            .map(|pos| (pos + 1) as f64)
            .unwrap_or_else(|| self.unknown_score())
    }
}
