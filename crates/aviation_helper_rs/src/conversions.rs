//! Spoken-number normalization.
//!
//! Radiotelephony spells digits one by one ("flight level tree five zero").
//! Everything downstream compares digit strings, so runs of spelled digits are
//! folded into numbers before any extraction happens.

/// ICAO digit pronunciations together with the everyday spellings.
pub const DIGIT_WORDS: &[(&str, char)] = &[
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("tree", '3'),
    ("three", '3'),
    ("four", '4'),
    ("fower", '4'),
    ("five", '5'),
    ("fife", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("niner", '9'),
    ("nine", '9'),
];

pub fn digit_for_word(word: &str) -> Option<char> {
    let lower = word.to_lowercase();
    DIGIT_WORDS
        .iter()
        .find(|(w, _)| *w == lower)
        .map(|(_, d)| *d)
}

/// Splits trailing punctuation off a token: `"niner,"` -> `("niner", ",")`.
pub fn split_trailing_punctuation(token: &str) -> (&str, &str) {
    let end = token
        .char_indices()
        .rev()
        .take_while(|(_, c)| matches!(c, ',' | '.' | ';' | ':' | '!' | '?'))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    token.split_at(end)
}

#[derive(Default)]
struct NumberRun {
    digits: String,
    compound: Option<u64>,
}

impl NumberRun {
    fn scale(&mut self, factor: u64) -> bool {
        let Ok(value) = self.digits.parse::<u64>() else {
            return false;
        };
        self.compound = Some(self.compound.unwrap_or_default() + value * factor);
        self.digits.clear();
        true
    }

    fn take(&mut self) -> Option<String> {
        let run = std::mem::take(self);
        let digits = run.digits.trim_end_matches('.');
        match run.compound {
            Some(compound) => {
                let rest = digits.parse::<u64>().unwrap_or_default();
                Some((compound + rest).to_string())
            }
            None if !digits.is_empty() => Some(digits.to_string()),
            None => None,
        }
    }
}

/// Folds spelled digits into numbers.
///
/// * `"tree five zero"` -> `"350"`
/// * `"one two one decimal five"` -> `"121.5"`
/// * `"two thousand five hundred"` -> `"2500"`
/// * single written digits separated by spaces are joined as well (`"2 4"` -> `"24"`)
///
/// Trailing punctuation ends a run and stays attached to the number.
pub fn normalize_spoken_numbers(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut run = NumberRun::default();

    for raw in text.split_whitespace() {
        let (core, trailing) = split_trailing_punctuation(raw);
        let lower = core.to_lowercase();

        let consumed = if let Some(digit) = digit_for_word(&lower) {
            run.digits.push(digit);
            true
        } else if core.len() == 1 && core.chars().all(|c| c.is_ascii_digit()) {
            run.digits.push_str(core);
            true
        } else if lower == "thousand" && !run.digits.is_empty() {
            run.scale(1000)
        } else if lower == "hundred" && !run.digits.is_empty() {
            run.scale(100)
        } else if matches!(lower.as_str(), "decimal" | "point")
            && !run.digits.is_empty()
            && run.compound.is_none()
            && !run.digits.contains('.')
        {
            run.digits.push('.');
            true
        } else {
            false
        };

        if !consumed {
            if let Some(number) = run.take() {
                out.push(number);
            }
            out.push(raw.to_string());
            continue;
        }

        if !trailing.is_empty() {
            if let Some(number) = run.take() {
                out.push(format!("{number}{trailing}"));
            }
        }
    }

    if let Some(number) = run.take() {
        out.push(number);
    }
    out.join(" ")
}

/// Keeps only ASCII digits, so `"15,000"` and `"15000"` compare equal.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icao_digit_runs() {
        assert_eq!(
            normalize_spoken_numbers("climb flight level tree five zero"),
            "climb flight level 350"
        );
        assert_eq!(
            normalize_spoken_numbers("squawk two four six one, PAL456"),
            "squawk 2461, PAL456"
        );
        assert_eq!(normalize_spoken_numbers("heading zero niner zero"), "heading 090");
    }

    #[test]
    fn test_decimal_and_compounds() {
        assert_eq!(
            normalize_spoken_numbers("contact approach one two one decimal five"),
            "contact approach 121.5"
        );
        assert_eq!(
            normalize_spoken_numbers("descend two thousand five hundred feet"),
            "descend 2500 feet"
        );
        assert_eq!(
            normalize_spoken_numbers("climb one zero thousand feet"),
            "climb 10000 feet"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "cleared to land runway 24, wind 240 at 10 knots";
        assert_eq!(normalize_spoken_numbers(text), text);
        assert_eq!(normalize_spoken_numbers("runway 2 4 left"), "runway 24 left");
    }

    #[test]
    fn test_trailing_punctuation() {
        assert_eq!(split_trailing_punctuation("niner,"), ("niner", ","));
        assert_eq!(split_trailing_punctuation("PAL456."), ("PAL456", "."));
        assert_eq!(split_trailing_punctuation("roger"), ("roger", ""));
        assert_eq!(digits_only("15,000"), "15000");
    }
}
