use crate::error::Result;
use crate::font::{FontStyle, TextMeasurer};
use crate::types::Length;

/// The lines of one wrapped cell. Never empty: blank input keeps one empty
/// line so the cell still reserves a line of height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedCell {
    lines: Vec<String>,
}

impl WrappedCell {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn height(&self, line_height: Length) -> Length {
        line_height * (self.lines.len() as i32)
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Greedy word wrap. A word joins the current line only while the joined
/// line measures strictly less than `target`. A word that is wider than
/// `target` on its own gets a line to itself and overflows; words are never
/// split or hyphenated.
pub fn wrap_text(
    text: &str,
    target: Length,
    font: &FontStyle,
    measurer: &dyn TextMeasurer,
) -> Result<WrappedCell> {
    wrap_text_with(text, target, |line| measurer.measure(line, font))
}

/// [`wrap_text`] over any width function, such as a backend's `measure_text`.
pub fn wrap_text_with<F>(text: &str, target: Length, mut measure: F) -> Result<WrappedCell>
where
    F: FnMut(&str) -> Result<Length>,
{
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure(&candidate)? < target {
            current = candidate;
        } else {
            // An overwide first word opens the cell itself. No empty line is
            // pushed ahead of it, so it costs no extra line of row height.
            if !current.is_empty() {
                lines.push(current);
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    Ok(WrappedCell { lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::tests::MonoMeasurer;
    use crate::font::{CoreFontMetrics, FontVariant};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn body() -> FontStyle {
        FontStyle::helvetica(FontVariant::Regular, 10.0)
    }

    fn wrap(text: &str, target: i32) -> Vec<String> {
        wrap_text(text, Length::from_i32(target), &body(), &MonoMeasurer)
            .expect("wrap")
            .into_lines()
    }

    #[test]
    fn packs_words_while_strictly_narrower() {
        // "Taller de" = 9 < 10, "Taller de laboratorio" = 21.
        assert_eq!(
            wrap("Taller de laboratorio clinico", 10),
            vec!["Taller de", "laboratorio", "clinico"]
        );
    }

    #[test]
    fn exact_fit_breaks_the_line() {
        // "ab cd" = 5 is not < 5.
        assert_eq!(wrap("ab cd", 5), vec!["ab", "cd"]);
        assert_eq!(wrap("ab cd", 6), vec!["ab cd"]);
    }

    #[test]
    fn empty_and_blank_input_keep_one_line() {
        assert_eq!(wrap("", 10), vec![String::new()]);
        assert_eq!(wrap("   \t ", 10), vec![String::new()]);
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        assert_eq!(
            wrap("ok supercalifragilistic ok", 6),
            vec!["ok", "supercalifragilistic", "ok"]
        );
        // No empty line is emitted ahead of a leading oversized word.
        assert_eq!(wrap("supercalifragilistic ok", 6), vec!["supercalifragilistic", "ok"]);
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(wrap("  Reunion \n de   area ", 40), vec!["Reunion de area"]);
    }

    #[test]
    fn wraps_with_real_font_metrics() {
        let metrics = CoreFontMetrics::millimetres();
        let cell = wrap_text(
            "Apoyo administrativo en farmacia",
            Length::from_i32(30),
            &body(),
            &metrics,
        )
        .expect("wrap");
        assert!(cell.line_count() >= 2);
        for line in cell.lines() {
            assert!(metrics.measure(line, &body()).expect("measure") < Length::from_i32(30));
        }
        assert_eq!(cell.height(Length::from_i32(5)), Length::from_i32(5) * (cell.line_count() as i32));
    }

    proptest! {
        #[test]
        fn wrapped_lines_rejoin_to_normalized_input(
            words in proptest::collection::vec("[a-zA-Z]{1,12}", 0..20),
            seps in proptest::collection::vec("[ \t\n]{1,3}", 20),
            target in 1i32..40,
        ) {
            let mut text = String::new();
            for (word, sep) in words.iter().zip(seps.iter()) {
                text.push_str(word);
                text.push_str(sep);
            }
            let lines = wrap(&text, target);
            let normalized = words.join(" ");
            prop_assert_eq!(lines.join(" "), normalized);
        }

        #[test]
        fn every_multi_word_line_fits_strictly(
            words in proptest::collection::vec("[a-z]{1,15}", 1..20),
            target in 1i32..40,
        ) {
            let lines = wrap(&words.join(" "), target);
            prop_assert!(!lines.is_empty());
            for line in &lines {
                let width = line.chars().count() as i32;
                if width >= target {
                    // Only a lone word may reach the target width.
                    prop_assert!(!line.contains(' '));
                }
            }
        }
    }
}
