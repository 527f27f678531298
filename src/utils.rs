use crate::schema::Period;

/// Month-name table used by filename and content period detection.
/// Lowercase full names first, then the 3-letter abbreviations.
const MONTH_NAMES: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

/// Resolves an english month name or 3-letter abbreviation to 1..=12.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .find(|(full, _)| *full == lower || full.starts_with(&lower[..3]) && lower.len() == 3)
        .map(|(_, m)| *m)
}

/// Number of months between two periods (positive when `end` is later).
pub fn months_between(start: Period, end: Period) -> i32 {
    (end.year - start.year) * 12 + (end.month as i32 - start.month as i32)
}

pub fn next_period(period: Period) -> Period {
    if period.month == 12 {
        Period {
            year: period.year + 1,
            month: 1,
        }
    } else {
        Period {
            year: period.year,
            month: period.month + 1,
        }
    }
}

pub fn prev_period(period: Period) -> Period {
    if period.month == 1 {
        Period {
            year: period.year - 1,
            month: 12,
        }
    } else {
        Period {
            year: period.year,
            month: period.month - 1,
        }
    }
}
