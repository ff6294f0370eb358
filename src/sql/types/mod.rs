use std::{cmp::Ordering, fmt::Display};

/// A row is a vector of field values, one per column
pub type Row = Vec<String>;

/// Comparison operators usable in a WHERE clause
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
}

impl Comparator {
    /// Tests `field <op> value`.
    ///
    /// Both sides are compared as numbers when both parse as finite numbers,
    /// and as strings otherwise, so words like `Nan` or `Inf` stay text.
    /// `Like` accepts `%` (any run) and `_` (any char).
    pub fn matches(&self, field: &str, value: &str) -> bool {
        if *self == Comparator::Like {
            return like(field, value);
        }
        let ord = match (number(field), number(value)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or_else(|| field.cmp(value)),
            _ => field.cmp(value),
        };
        match self {
            Comparator::Equal => ord == Ordering::Equal,
            Comparator::NotEqual => ord != Ordering::Equal,
            Comparator::LessThan => ord == Ordering::Less,
            Comparator::LessThanOrEqual => ord != Ordering::Greater,
            Comparator::GreaterThan => ord == Ordering::Greater,
            Comparator::GreaterThanOrEqual => ord != Ordering::Less,
            Comparator::Like => false,
        }
    }
}

/// Parses a finite number; `nan`, `inf` and `infinity` are not numbers here
fn number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Comparator::Equal => "=",
            Comparator::NotEqual => "!=",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
            Comparator::Like => "LIKE",
        })
    }
}

/// SQL LIKE pattern match over chars
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matched[j]: text[..i] matches pattern[..j]
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }
    for c in text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }
    matched[pattern.len()]
}

/// A resolved WHERE clause: `row[column] <comparator> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: usize,
    pub comparator: Comparator,
    pub value: String,
}

impl Filter {
    pub fn new(column: usize, comparator: Comparator, value: impl Into<String>) -> Self {
        Self {
            column,
            comparator,
            value: value.into(),
        }
    }

    /// Evaluates the filter against a row (missing filter matches everything,
    /// a column past the end of the row matches nothing)
    pub fn matches(filter: Option<&Filter>, row: &[String]) -> bool {
        match filter {
            None => true,
            Some(f) => row
                .get(f.column)
                .is_some_and(|field| f.comparator.matches(field, &f.value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Comparator, Filter};

    #[test]
    fn test_compare_numeric_and_text() {
        assert!(Comparator::Equal.matches("10", "10.0"));
        assert!(Comparator::LessThan.matches("9", "10"));
        // Lexicographic when either side is not a number
        assert!(Comparator::GreaterThan.matches("9a", "10"));
        assert!(Comparator::NotEqual.matches("pending", "done"));
        assert!(Comparator::GreaterThanOrEqual.matches("done", "done"));
        assert!(!Comparator::LessThanOrEqual.matches("b", "a"));
        assert!(Comparator::Equal.matches("1e2", "100"));
    }

    #[test]
    fn test_non_finite_words_compare_as_text() {
        assert!(Comparator::Equal.matches("Nan", "Nan"));
        assert!(Comparator::Equal.matches("inf", "inf"));
        assert!(!Comparator::Equal.matches("Inf", "Infinity"));
        assert!(Comparator::NotEqual.matches("Inf", "Infinity"));
        assert!(Comparator::LessThan.matches("Inf", "Infinity"));
        assert!(!Comparator::Equal.matches("NaN", "1"));
        assert!(Comparator::GreaterThan.matches("NaN", "1"));
    }

    #[test]
    fn test_like() {
        assert!(Comparator::Like.matches("Miami", "Mi%"));
        assert!(Comparator::Like.matches("Miami", "%am%"));
        assert!(Comparator::Like.matches("Miami", "M_ami"));
        assert!(Comparator::Like.matches("", "%"));
        assert!(!Comparator::Like.matches("Miami", "Mi"));
        assert!(!Comparator::Like.matches("Oxford", "%am%"));
    }

    #[test]
    fn test_filter() {
        let row = vec!["1".to_string(), "pending".to_string()];
        assert!(Filter::matches(None, &row));
        let f = Filter::new(1, Comparator::Equal, "pending");
        assert!(Filter::matches(Some(&f), &row));
        let f = Filter::new(0, Comparator::GreaterThan, "1");
        assert!(!Filter::matches(Some(&f), &row));
        let f = Filter::new(5, Comparator::NotEqual, "x");
        assert!(!Filter::matches(Some(&f), &row));
    }
}
