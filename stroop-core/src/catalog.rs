use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::trial::Condition;

/// One row of the experimental word table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub category: Condition,
}

/// Flat catalog of stimulus words: the experimental pool (categorized by
/// valence) plus the practice-only word list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusCatalog {
    entries: Vec<WordEntry>,
    practice: Vec<String>,
}

impl StimulusCatalog {
    pub fn new(entries: Vec<WordEntry>, practice: Vec<String>) -> Self {
        Self { entries, practice }
    }

    /// Parses the experimental word table from CSV text with `word` and
    /// `category` columns. Unknown categories are an error, not skipped.
    pub fn parse_word_table(csv: &str) -> Result<Vec<WordEntry>, CatalogError> {
        let mut lines = csv.lines().enumerate();
        let header = loop {
            match lines.next() {
                Some((_, l)) if l.trim().is_empty() => continue,
                Some((_, l)) => break l,
                None => return Err(CatalogError::Empty),
            }
        };
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let word_col = column_index(&columns, "word")?;
        let category_col = column_index(&columns, "category")?;

        let mut entries = Vec::new();
        for (i, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let word = fields
                .get(word_col)
                .filter(|w| !w.is_empty())
                .ok_or(CatalogError::Malformed { line: i + 1 })?;
            let raw = fields
                .get(category_col)
                .ok_or(CatalogError::Malformed { line: i + 1 })?;
            let category =
                Condition::parse(raw).ok_or_else(|| CatalogError::UnknownCategory {
                    line: i + 1,
                    value: (*raw).to_owned(),
                })?;
            entries.push(WordEntry {
                word: (*word).to_owned(),
                category,
            });
        }
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(entries)
    }

    /// Parses the practice word table: CSV text with at least a `word` column.
    pub fn parse_practice_table(csv: &str) -> Result<Vec<String>, CatalogError> {
        let mut lines = csv.lines().enumerate();
        let header = loop {
            match lines.next() {
                Some((_, l)) if l.trim().is_empty() => continue,
                Some((_, l)) => break l,
                None => return Err(CatalogError::Empty),
            }
        };
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let word_col = column_index(&columns, "word")?;

        let mut words = Vec::new();
        for (i, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let word = fields
                .get(word_col)
                .filter(|w| !w.is_empty())
                .ok_or(CatalogError::Malformed { line: i + 1 })?;
            words.push((*word).to_owned());
        }
        if words.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(words)
    }

    pub fn words_for(&self, condition: Condition) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.category == condition)
            .map(|e| e.word.as_str())
            .collect()
    }

    pub fn practice_words(&self) -> &[String] {
        &self.practice
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }
}

fn column_index(columns: &[&str], name: &str) -> Result<usize, CatalogError> {
    columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
        .ok_or_else(|| CatalogError::MissingColumn {
            name: name.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_word_table() {
        let csv = "word,category\njoy,positive\ngrief,negative\nchair,neutral\n";
        let entries = StimulusCatalog::parse_word_table(csv).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].word, "joy");
        assert_eq!(entries[1].category, Condition::Negative);
    }

    #[test]
    fn word_table_ignores_column_order_and_blank_lines() {
        let csv = "category,word\n\npositive,joy\n\n";
        let entries = StimulusCatalog::parse_word_table(csv).unwrap();
        assert_eq!(entries[0].word, "joy");
        assert_eq!(entries[0].category, Condition::Positive);
    }

    #[test]
    fn unknown_category_is_an_error() {
        let csv = "word,category\njoy,positiv\n";
        match StimulusCatalog::parse_word_table(csv) {
            Err(CatalogError::UnknownCategory { line, value }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "positiv");
            }
            other => panic!("expected UnknownCategory, got {other:?}"),
        }
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = StimulusCatalog::parse_word_table("word\njoy\n").unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { .. }));
    }

    #[test]
    fn parses_practice_table() {
        let csv = "word\ntable\nwindow\n";
        let words = StimulusCatalog::parse_practice_table(csv).unwrap();
        assert_eq!(words, vec!["table", "window"]);
    }

    #[test]
    fn words_for_filters_by_condition() {
        let entries =
            StimulusCatalog::parse_word_table("word,category\na,positive\nb,neutral\n").unwrap();
        let catalog = StimulusCatalog::new(entries, vec!["p".into()]);
        assert_eq!(catalog.words_for(Condition::Positive), vec!["a"]);
        assert_eq!(catalog.words_for(Condition::Negative).len(), 0);
    }
}
