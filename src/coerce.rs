// Numeric coercion of raw cell text

/// Result of coercing a column: one entry per input value, `None` where the
/// value is not a number.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coerced {
    pub values: Vec<Option<f64>>,
    pub dropped: usize,
}

impl Coerced {
    pub fn valid(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().flatten().copied()
    }
}

/// Parse a single raw value, ignoring surrounding whitespace and `,`
/// thousands separators. Empty and non-finite values are not numbers.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|&c| c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Coerce a sequence of raw values, counting the ones that had to be dropped.
pub fn coerce_numeric<'a, I>(raw: I) -> Coerced
where
    I: IntoIterator<Item = &'a str>,
{
    let mut coerced = Coerced::default();
    for value in raw {
        let parsed = parse_number(value);
        if parsed.is_none() {
            coerced.dropped += 1;
        }
        coerced.values.push(parsed);
    }
    coerced
}

/// Coerce several columns of the same rows and add them up per row. A row is
/// dropped when any of its components is not a number.
pub fn coerce_row_sums(columns: &[Vec<&str>]) -> Coerced {
    let Some(first) = columns.first() else {
        return Coerced::default();
    };

    let mut coerced = Coerced::default();
    for row in 0..first.len() {
        let total = columns
            .iter()
            .map(|col| col.get(row).and_then(|raw| parse_number(raw)))
            .sum::<Option<f64>>();
        if total.is_none() {
            coerced.dropped += 1;
        }
        coerced.values.push(total);
    }
    coerced
}
