//! Dictionary-based lemmatization over an odict.ru style word-form table.
//!
//! Each dictionary line is `lemma,part_of_speech,form,form,...`. The
//! lemmatizer inverts that table into a `form -> lemma` lookup and drops
//! function words (conjunctions, particles, prepositions and the like) so
//! they never reach an index.
//!
//! # How it works
//! 1. Lowercase the lemma, its tag and every form.
//! 2. Remember the tag; lemmas with an ignored tag join the ignored set.
//! 3. Map the lemma to its forms plus the lemma itself.
//! 4. Drop ignored lemmas, then flatten to `form -> lemma`.
//!
//! A form listed under several lemmas resolves to the lemma declared last
//! (lemmas are ordered by their first appearance in the input).
//!
//! # Example
//! ```
//! use odict_lemmatizer::Lemmatizer;
//!
//! let lem = Lemmatizer::from_lines(["стол,м,стола,столу", "и,союз"]).unwrap();
//! assert_eq!(lem.lookup("столу"), Some("стол"));
//! assert_eq!(lem.lookup("и"), None);
//! ```

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Tags of function words: interjection, conjunction, particle, preposition
/// and pronoun-adjective.
pub const IGNORED_PARTS_OF_SPEECH: [&str; 5] = ["межд.", "союз", "част.", "предл.", "мс-п"];

/// Lemmas excluded regardless of their tag.
pub const ALWAYS_IGNORED: [&str; 2] = ["я", "он"];

/// A record that does not have at least a lemma and a tag.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("malformed dictionary record `{record}`: {reason}")]
pub struct DictionaryFormatError {
    pub record: String,
    pub reason: &'static str,
}

#[derive(Debug, Error)]
pub enum LemmatizerError {
    #[error("failed to read dictionary {}: {error}", path.display())]
    Io { path: PathBuf, error: io::Error },
    #[error("dictionary line {line}: {error}")]
    Format {
        line: usize,
        error: DictionaryFormatError,
    },
}

/// One dictionary line, split but not yet normalized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DictionaryRecord {
    pub lemma: String,
    pub part_of_speech: String,
    pub forms: Vec<String>,
}

impl DictionaryRecord {
    pub fn parse(line: &str) -> Result<Self, DictionaryFormatError> {
        let mut fields = line.split(',').map(str::trim);
        let (Some(lemma), Some(part_of_speech)) = (fields.next(), fields.next()) else {
            return Err(DictionaryFormatError {
                record: line.to_string(),
                reason: "expected at least 2 fields",
            });
        };
        if lemma.is_empty() {
            return Err(DictionaryFormatError {
                record: line.to_string(),
                reason: "empty lemma",
            });
        }
        Ok(Self {
            lemma: lemma.to_string(),
            part_of_speech: part_of_speech.to_string(),
            forms: fields
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Immutable `form -> lemma` dictionary with part-of-speech data.
#[derive(Clone, Debug, Default)]
pub struct Lemmatizer {
    form_to_lemma: HashMap<String, String>,
    part_of_speech: HashMap<String, String>,
    ignored: HashSet<String>,
}

impl Lemmatizer {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = DictionaryRecord>,
    {
        let mut part_of_speech = HashMap::new();
        let mut ignored: HashSet<String> = ALWAYS_IGNORED.iter().map(|s| s.to_string()).collect();
        let mut declared: Vec<String> = Vec::new();
        let mut lemma_forms: HashMap<String, Vec<String>> = HashMap::new();

        for record in records {
            let lemma = record.lemma.to_lowercase();
            let tag = record.part_of_speech.to_lowercase();
            if IGNORED_PARTS_OF_SPEECH.contains(&tag.as_str()) {
                ignored.insert(lemma.clone());
            }
            part_of_speech.insert(lemma.clone(), tag);

            let mut forms: Vec<String> = record.forms.iter().map(|f| f.to_lowercase()).collect();
            forms.push(lemma.clone());
            // A repeated lemma keeps its first position but takes the later forms.
            if lemma_forms.insert(lemma.clone(), forms).is_none() {
                declared.push(lemma);
            }
        }

        let mut form_to_lemma = HashMap::new();
        for lemma in declared {
            if ignored.contains(&lemma) {
                debug!("skipping function word {lemma}");
                continue;
            }
            let Some(forms) = lemma_forms.remove(&lemma) else {
                continue;
            };
            for form in forms {
                form_to_lemma.insert(form, lemma.clone());
            }
        }

        info!(
            "dictionary: {} forms of {} lemmas ({} ignored)",
            form_to_lemma.len(),
            part_of_speech.len(),
            ignored.len()
        );
        Self {
            form_to_lemma,
            part_of_speech,
            ignored,
        }
    }

    /// Parse every non-blank line; the first malformed line fails the build.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, LemmatizerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records = Vec::new();
        for (lineno, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            let record = DictionaryRecord::parse(line).map_err(|error| LemmatizerError::Format {
                line: lineno + 1,
                error,
            })?;
            records.push(record);
        }
        Ok(Self::from_records(records))
    }

    /// Load a UTF-8 dictionary file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LemmatizerError> {
        let path = path.as_ref();
        let io_err = |error| LemmatizerError::Io {
            path: path.to_path_buf(),
            error,
        };
        let file = File::open(path).map_err(io_err)?;
        let lines = BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        Self::from_lines(lines)
    }

    /// Lemma of a lowercase word form, if the form is in the dictionary.
    pub fn lookup(&self, form: &str) -> Option<&str> {
        self.form_to_lemma.get(form).map(String::as_str)
    }

    pub fn part_of_speech(&self, lemma: &str) -> Option<&str> {
        self.part_of_speech.get(lemma).map(String::as_str)
    }

    /// Whether `lemma` was dropped as a function word.
    pub fn is_ignored(&self, lemma: &str) -> bool {
        self.ignored.contains(lemma)
    }

    /// Number of distinct word forms.
    pub fn len(&self) -> usize {
        self.form_to_lemma.len()
    }

    pub fn is_empty(&self) -> bool {
        self.form_to_lemma.is_empty()
    }
}
