use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use odict_lemmatizer::Lemmatizer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use wordnet_db::{Thesaurus, ThesaurusError};

use crate::report::wrapped_list;
use crate::tokenize::{page_of_line, tokenize};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to access {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed index snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("inconsistent index snapshot: {0}")]
    Corrupt(String),
}

/// A lemma together with its total number of occurrences.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WordFrequency {
    pub word: String,
    pub occurrences: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LemmaStats {
    lemma: String,
    /// Surface forms in the order they were first seen.
    forms: Vec<String>,
    lines: BTreeSet<usize>,
    pages: BTreeSet<usize>,
    occurrences: usize,
}

impl LemmaStats {
    fn new(lemma: &str) -> Self {
        Self {
            lemma: lemma.to_string(),
            forms: Vec::new(),
            lines: BTreeSet::new(),
            pages: BTreeSet::new(),
            occurrences: 0,
        }
    }
}

/// Inverted index over a corpus, aggregated by lemma.
///
/// Built in one pass and never modified afterwards. Per-lemma aggregates are
/// kept in the order lemmas were first met, which makes frequency ties
/// reproducible. The whole structure serializes to a JSON snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextIndex {
    lines: Vec<String>,
    form_to_lines: BTreeMap<String, BTreeSet<usize>>,
    lemmas: Vec<LemmaStats>,
    form_to_lemma: BTreeMap<String, String>,
    #[serde(skip)]
    lemma_slots: HashMap<String, usize>,
}

impl TextIndex {
    /// Index `lines` (expected to be non-blank). Line numbers are positions in
    /// `lines`.
    pub fn build(lines: Vec<String>, lemmatizer: &Lemmatizer) -> Self {
        let mut index = Self {
            lines: Vec::new(),
            form_to_lines: BTreeMap::new(),
            lemmas: Vec::new(),
            form_to_lemma: BTreeMap::new(),
            lemma_slots: HashMap::new(),
        };

        let mut tokens = 0usize;
        for (line_no, line) in lines.iter().enumerate() {
            for token in tokenize(line) {
                tokens += 1;
                index
                    .form_to_lines
                    .entry(token.clone())
                    .or_default()
                    .insert(line_no);
                let Some(lemma) = lemmatizer.lookup(&token) else {
                    continue;
                };

                let slot = index.slot(lemma);
                let stats = &mut index.lemmas[slot];
                if !stats.forms.contains(&token) {
                    stats.forms.push(token.clone());
                }
                stats.lines.insert(line_no);
                stats.pages.insert(page_of_line(line_no));
                stats.occurrences += 1;
                index.form_to_lemma.insert(token, lemma.to_string());
            }
        }
        index.lines = lines;

        info!(
            "indexed {} lines: {tokens} tokens, {} forms, {} lemmas",
            index.lines.len(),
            index.form_to_lines.len(),
            index.lemmas.len()
        );
        index
    }

    /// Read a corpus file, drop blank lines and index the rest.
    pub fn from_file(path: impl AsRef<Path>, lemmatizer: &Lemmatizer) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let io_err = |source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(io_err)?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(Self::build(lines, lemmatizer))
    }

    /// The `count` lemmas with the most occurrences, most frequent first.
    /// Ties keep first-seen order.
    pub fn most_frequent(&self, count: usize) -> Vec<WordFrequency> {
        let mut ranked: Vec<&LemmaStats> = self.lemmas.iter().collect();
        ranked.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        ranked
            .into_iter()
            .take(count)
            .map(|stats| WordFrequency {
                word: stats.lemma.clone(),
                occurrences: stats.occurrences,
            })
            .collect()
    }

    /// Lines containing any form of `word`'s lemma, or the literal token when
    /// it has no lemma, as `"<1-based number>: <text>"` in ascending order.
    pub fn find_lines(&self, word: &str) -> Vec<String> {
        let line_numbers = self
            .form_to_lemma
            .get(word)
            .and_then(|lemma| self.stats(lemma))
            .map(|stats| &stats.lines)
            .or_else(|| self.form_to_lines.get(word));

        line_numbers
            .into_iter()
            .flatten()
            .filter_map(|&n| self.lines.get(n).map(|text| format!("{}: {text}", n + 1)))
            .collect()
    }

    /// Occurrence count, used forms and pages of a lemma.
    pub fn generate_report(&self, word: &str) -> Vec<String> {
        let Some(stats) = self.stats(word).filter(|s| s.occurrences > 0) else {
            return vec![format!("{word}: no occurrences")];
        };

        let mut report = vec![format!("{word}: {} occurrences", stats.occurrences)];
        report.extend(wrapped_list("used forms", &stats.forms));
        report.extend(wrapped_list("found on pages", &stats.pages));
        report
    }

    /// Occurrences of every member of `group`'s hyponym closure, most frequent
    /// first, members without occurrences omitted.
    pub fn generate_group_report(
        &self,
        group: &str,
        thesaurus: &Thesaurus,
    ) -> Result<Vec<String>, ThesaurusError> {
        let members = thesaurus.hyponyms(group)?;
        debug!("group {group}: {} members", members.len());

        let mut found: Vec<(String, usize)> = members
            .into_iter()
            .map(|member| {
                let occurrences = self.occurrences(&member);
                (member, occurrences)
            })
            .filter(|(_, occurrences)| *occurrences > 0)
            .collect();
        found.sort_by(|a, b| b.1.cmp(&a.1));

        let total: usize = found.iter().map(|(_, n)| n).sum();
        let mut report = Vec::with_capacity(found.len() + 1);
        report.push(format!("{group}: total {total} occurrences"));
        report.extend(
            found
                .into_iter()
                .map(|(member, n)| format!("  {member}: {n} occurrences")),
        );
        Ok(report)
    }

    /// Total occurrences of a lemma, zero when it never occurs.
    pub fn occurrences(&self, lemma: &str) -> usize {
        self.stats(lemma).map_or(0, |s| s.occurrences)
    }

    /// Lemma of an observed word form.
    pub fn lemma_of(&self, form: &str) -> Option<&str> {
        self.form_to_lemma.get(form).map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lemma_count(&self) -> usize {
        self.lemmas.len()
    }

    /// Write the index as a JSON snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let path = path.as_ref();
        let io_err = |source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(io_err)?;
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save) and check it for
    /// consistency.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index: Self = serde_json::from_reader(BufReader::new(file))?;
        index.reindexed()
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let index: Self = serde_json::from_str(json)?;
        index.reindexed()
    }

    fn reindexed(mut self) -> Result<Self, IndexError> {
        let line_count = self.lines.len();
        let out_of_range = |lines: &BTreeSet<usize>| lines.last().is_some_and(|&n| n >= line_count);

        if let Some((form, _)) = self
            .form_to_lines
            .iter()
            .find(|(_, lines)| out_of_range(*lines))
        {
            return Err(IndexError::Corrupt(format!(
                "form `{form}` refers to a line past the end of the corpus"
            )));
        }

        let mut slots = HashMap::with_capacity(self.lemmas.len());
        for (slot, stats) in self.lemmas.iter().enumerate() {
            if out_of_range(&stats.lines) {
                return Err(IndexError::Corrupt(format!(
                    "lemma `{}` refers to a line past the end of the corpus",
                    stats.lemma
                )));
            }
            if slots.insert(stats.lemma.clone(), slot).is_some() {
                return Err(IndexError::Corrupt(format!(
                    "lemma `{}` appears twice",
                    stats.lemma
                )));
            }
        }

        let known: HashSet<&str> = slots.keys().map(String::as_str).collect();
        if let Some((form, lemma)) = self
            .form_to_lemma
            .iter()
            .find(|(_, lemma)| !known.contains(lemma.as_str()))
        {
            return Err(IndexError::Corrupt(format!(
                "form `{form}` maps to unknown lemma `{lemma}`"
            )));
        }

        self.lemma_slots = slots;
        Ok(self)
    }

    fn stats(&self, lemma: &str) -> Option<&LemmaStats> {
        self.lemma_slots.get(lemma).map(|&slot| &self.lemmas[slot])
    }

    fn slot(&mut self, lemma: &str) -> usize {
        if let Some(&slot) = self.lemma_slots.get(lemma) {
            return slot;
        }
        let slot = self.lemmas.len();
        self.lemmas.push(LemmaStats::new(lemma));
        self.lemma_slots.insert(lemma.to_string(), slot);
        slot
    }
}
