//! Synset graph built from WordNet `index.*`/`data.*` files, answering
//! transitive hyponym queries.
//!
//! The graph keeps, per synset, its member words and the targets of its
//! hyponym pointers (see [`wordnet_types::HYPONYM_SYMBOLS`]); everything else
//! in the data files is dropped after parsing. Callers either feed parsed
//! records through [`ThesaurusBuilder`] or load a dictionary directory with
//! [`Thesaurus::load_with_mode`], choosing memory-mapped or owned buffers via
//! [`LoadMode`].
//!
//! Large dictionaries are slow to parse, so [`LazyThesaurus`] wraps loading in
//! a one-shot initializer that can be shared between threads.
//!
//! # Example
//! ```no_run
//! use wordnet_db::{LoadMode, Thesaurus};
//!
//! # fn main() -> anyhow::Result<()> {
//! let thesaurus = Thesaurus::load_with_mode("/path/to/rwn3", LoadMode::Mmap)?;
//! for word in thesaurus.hyponyms("мебель")? {
//!     println!("{word}");
//! }
//! # Ok(()) }
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use memmap2::Mmap;
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, info};
use wordnet_types::{DataRecord, IndexRecord, Pos, RecordError, SynsetId};

/// Strategy for loading dictionary files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each WordNet file.
    Mmap,
    /// Read each file into an owned buffer (portable fallback).
    Owned,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown load mode `{0}` (expected mmap or owned)")]
pub struct UnknownLoadMode(pub String);

impl FromStr for LoadMode {
    type Err = UnknownLoadMode;

    /// Case-insensitive `mmap` or `owned`.
    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "mmap" => Ok(LoadMode::Mmap),
            "owned" => Ok(LoadMode::Owned),
            _ => Err(UnknownLoadMode(raw.to_string())),
        }
    }
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// Errors raised while answering a query against a built thesaurus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThesaurusError {
    /// A synset reached through the hyponym closure has no member words,
    /// which means the data files are corrupt or incomplete.
    #[error("synset {id} has no member words")]
    EmptySynset { id: SynsetId },
}

#[derive(Debug, Default)]
struct SynsetNode {
    words: Vec<String>,
    hyponyms: Vec<SynsetId>,
}

/// Immutable synset graph with hyponym edges.
#[derive(Debug, Default)]
pub struct Thesaurus {
    word_synsets: HashMap<String, Vec<SynsetId>>,
    synsets: HashMap<SynsetId, SynsetNode>,
}

/// Accumulates index and data records into a [`Thesaurus`].
///
/// Records may arrive in any order and from any category; a hyponym pointer
/// may name a synset whose data line has not been seen yet.
#[derive(Debug, Default)]
pub struct ThesaurusBuilder {
    inner: Thesaurus,
}

impl ThesaurusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the synsets of one `index.*` line. A lemma found in several
    /// categories accumulates the synsets of each.
    pub fn add_index(&mut self, record: IndexRecord) -> &mut Self {
        let synsets: Vec<SynsetId> = record.synsets().collect();
        self.inner
            .word_synsets
            .entry(record.lemma.to_lowercase())
            .or_default()
            .extend(synsets);
        self
    }

    /// Register the members and hyponym edges of one `data.*` line. A repeated
    /// synset replaces the earlier line.
    pub fn add_data(&mut self, record: DataRecord) -> &mut Self {
        let hyponyms = record.hyponyms().collect();
        self.inner.synsets.insert(
            record.id,
            SynsetNode {
                words: record.words,
                hyponyms,
            },
        );
        self
    }

    pub fn build(self) -> Thesaurus {
        self.inner
    }
}

impl Thesaurus {
    /// Build from already-parsed records.
    pub fn from_records<I, D>(index: I, data: D) -> Self
    where
        I: IntoIterator<Item = IndexRecord>,
        D: IntoIterator<Item = DataRecord>,
    {
        let mut builder = ThesaurusBuilder::new();
        for record in index {
            builder.add_index(record);
        }
        for record in data {
            builder.add_data(record);
        }
        builder.build()
    }

    /// Load from a directory containing `index.*` and `data.*` for all four
    /// categories, memory-mapping the files.
    pub fn load(dict_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_mode(dict_dir, LoadMode::Mmap)
    }

    /// Load choosing between mmap and owned buffers at runtime.
    pub fn load_with_mode(dict_dir: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let dir = dict_dir.as_ref();
        for pos in Pos::ALL {
            for kind in ["index", "data"] {
                let path = dir.join(format!("{kind}.{pos}"));
                if !path.exists() {
                    anyhow::bail!("missing required WordNet file: {}", path.display());
                }
            }
        }

        let mut builder = ThesaurusBuilder::new();
        for pos in Pos::ALL {
            let path = dir.join(format!("index.{pos}"));
            let buffer = load_file(&path, mode)?;
            let count = for_each_record(buffer.as_slice(), &path, |line| {
                builder.add_index(IndexRecord::parse(line)?);
                Ok(())
            })?;
            debug!("{count} index records in {}", path.display());

            let path = dir.join(format!("data.{pos}"));
            let buffer = load_file(&path, mode)?;
            let count = for_each_record(buffer.as_slice(), &path, |line| {
                builder.add_data(DataRecord::parse(line, pos)?);
                Ok(())
            })?;
            debug!("{count} data records in {}", path.display());
        }

        let thesaurus = builder.build();
        info!(
            "thesaurus loaded from {}: {} words, {} synsets",
            dir.display(),
            thesaurus.word_count(),
            thesaurus.synset_count()
        );
        Ok(thesaurus)
    }

    /// Synsets listed for `word` in the index files, or an empty slice.
    pub fn synsets_for_word(&self, word: &str) -> &[SynsetId] {
        self.word_synsets
            .get(&word.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Member words of a synset, if its data line was loaded.
    pub fn members(&self, id: SynsetId) -> Option<&[String]> {
        self.synsets.get(&id).map(|node| node.words.as_slice())
    }

    /// Every synset reachable from `seeds` through zero or more hyponym edges,
    /// seeds included.
    ///
    /// Each synset is expanded once, so cyclic graphs terminate. The result
    /// holds no duplicates and lists synsets in breadth-first discovery order.
    pub fn hyponym_closure<I>(&self, seeds: I) -> Vec<SynsetId>
    where
        I: IntoIterator<Item = SynsetId>,
    {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        for id in seeds {
            if seen.insert(id) {
                queue.push_back(id);
            }
        }

        let mut reached = Vec::with_capacity(queue.len());
        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.synsets.get(&id) {
                for &child in &node.hyponyms {
                    if seen.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
            reached.push(id);
        }
        reached
    }

    /// Distinct member words of every synset in the hyponym closure of
    /// `word`'s synsets, in discovery order. Unknown words yield no members.
    pub fn hyponyms(&self, word: &str) -> Result<Vec<String>, ThesaurusError> {
        let seeds = self.synsets_for_word(word);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut members = Vec::new();
        for id in self.hyponym_closure(seeds.iter().copied()) {
            let words = match self.members(id) {
                Some(words) if !words.is_empty() => words,
                _ => return Err(ThesaurusError::EmptySynset { id }),
            };
            for word in words {
                if seen.insert(word.as_str()) {
                    members.push(word.clone());
                }
            }
        }
        Ok(members)
    }

    /// Number of distinct words with index entries.
    pub fn word_count(&self) -> usize {
        self.word_synsets.len()
    }

    /// Number of synsets with a loaded data line.
    pub fn synset_count(&self) -> usize {
        self.synsets.len()
    }
}

type Loader = Box<dyn Fn() -> Result<Thesaurus> + Send + Sync>;

/// One-shot, thread-safe initializer for a [`Thesaurus`].
///
/// The loader runs on the first successful [`get`](Self::get) only; later
/// calls return the memoized graph. Concurrent first callers block until the
/// single load finishes. A failed load is returned to the caller and leaves
/// the cell empty, so the next call tries again.
pub struct LazyThesaurus {
    loader: Loader,
    cell: OnceCell<Thesaurus>,
}

impl LazyThesaurus {
    /// Defer loading a dictionary directory until first use.
    pub fn from_dir(dict_dir: impl Into<PathBuf>, mode: LoadMode) -> Self {
        let dir = dict_dir.into();
        Self::with_loader(move || Thesaurus::load_with_mode(&dir, mode))
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Thesaurus> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already-built thesaurus.
    pub fn preloaded(thesaurus: Thesaurus) -> Self {
        Self {
            loader: Box::new(|| -> Result<Thesaurus> { anyhow::bail!("thesaurus was preloaded") }),
            cell: OnceCell::with_value(thesaurus),
        }
    }

    pub fn get(&self) -> Result<&Thesaurus> {
        self.cell.get_or_try_init(|| {
            info!("loading thesaurus on first use");
            (self.loader)()
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for LazyThesaurus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyThesaurus")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    match mode {
        LoadMode::Mmap => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

/// Feed every record line to `parse`, skipping blank lines and the licence
/// header (lines starting with whitespace). Returns the number of records.
fn for_each_record<F>(bytes: &[u8], path: &Path, mut parse: F) -> Result<usize>
where
    F: FnMut(&str) -> std::result::Result<(), RecordError>,
{
    let mut count = 0;
    for (lineno, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = strip_cr(raw_line);
        if line.is_empty() || matches!(line.first(), Some(b' ' | b'\t')) {
            continue;
        }
        let line = std::str::from_utf8(line)
            .with_context(|| format!("{}:{} is not valid UTF-8", path.display(), lineno + 1))?;
        parse(line).with_context(|| format!("{}:{} malformed record", path.display(), lineno + 1))?;
        count += 1;
    }
    Ok(count)
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noun(offset: u32) -> SynsetId {
        SynsetId {
            pos: Pos::Noun,
            offset,
        }
    }

    #[test]
    fn load_mode_parses_case_insensitively() {
        assert_eq!("mmap".parse::<LoadMode>(), Ok(LoadMode::Mmap));
        assert_eq!("Owned".parse::<LoadMode>(), Ok(LoadMode::Owned));
        let err = "foo".parse::<LoadMode>().unwrap_err();
        assert_eq!(err, UnknownLoadMode("foo".to_string()));
        assert!(err.to_string().contains("expected mmap or owned"));
    }

    fn data(offset: u32, words: &[&str], children: &[u32]) -> DataRecord {
        DataRecord {
            id: noun(offset),
            lex_filenum: 3,
            words: words.iter().map(|w| w.to_string()).collect(),
            pointers: children
                .iter()
                .map(|&c| wordnet_types::PointerRecord {
                    symbol: "~".into(),
                    target: noun(c),
                    src_word: None,
                    dst_word: None,
                })
                .collect(),
        }
    }

    fn index(lemma: &str, offsets: &[u32]) -> IndexRecord {
        IndexRecord {
            lemma: lemma.into(),
            pos: Pos::Noun,
            ptr_symbols: vec!["~".into()],
            sense_cnt: offsets.len() as u32,
            tagsense_cnt: 0,
            synset_offsets: offsets.to_vec(),
        }
    }

    fn furniture() -> Thesaurus {
        Thesaurus::from_records(
            [index("мебель", &[1]), index("стол", &[2])],
            [
                data(1, &["мебель"], &[2, 3]),
                data(2, &["стол"], &[4]),
                data(3, &["диван", "софа"], &[]),
                data(4, &["парта", "стол"], &[]),
            ],
        )
    }

    #[test]
    fn closure_includes_seeds_and_descendants() {
        let th = furniture();
        let closure: HashSet<_> = th.hyponym_closure([noun(2)]).into_iter().collect();
        assert_eq!(closure, HashSet::from([noun(2), noun(4)]));
    }

    #[test]
    fn closure_is_idempotent() {
        let th = furniture();
        let once = th.hyponym_closure([noun(1)]);
        let twice = th.hyponym_closure(once.clone());
        let once: HashSet<_> = once.into_iter().collect();
        let twice: HashSet<_> = twice.into_iter().collect();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let th = Thesaurus::from_records(
            [index("а", &[10])],
            [data(10, &["а"], &[20]), data(20, &["б"], &[10])],
        );
        let closure = th.hyponym_closure([noun(10)]);
        assert_eq!(closure, vec![noun(10), noun(20)]);
        assert_eq!(th.hyponyms("а").unwrap(), vec!["а", "б"]);
    }

    #[test]
    fn hyponyms_are_distinct_in_discovery_order() {
        let th = furniture();
        assert_eq!(
            th.hyponyms("мебель").unwrap(),
            vec!["мебель", "стол", "диван", "софа", "парта"]
        );
    }

    #[test]
    fn unknown_word_has_no_hyponyms() {
        assert!(furniture().hyponyms("облако").unwrap().is_empty());
    }

    #[test]
    fn dangling_edge_is_a_data_integrity_error() {
        let th = Thesaurus::from_records([index("мебель", &[1])], [data(1, &["мебель"], &[99])]);
        assert_eq!(
            th.hyponyms("мебель"),
            Err(ThesaurusError::EmptySynset { id: noun(99) })
        );
        // The graph itself is untouched and other queries still work.
        assert_eq!(th.members(noun(1)), Some(&["мебель".to_string()][..]));
    }

    #[test]
    fn lemma_in_several_categories_collects_all_synsets() {
        let mut builder = ThesaurusBuilder::new();
        builder.add_index(index("бег", &[5]));
        builder.add_index(IndexRecord {
            pos: Pos::Verb,
            ..index("бег", &[6])
        });
        let th = builder.build();
        assert_eq!(
            th.synsets_for_word("бег"),
            &[
                noun(5),
                SynsetId {
                    pos: Pos::Verb,
                    offset: 6
                }
            ]
        );
    }

    #[test]
    fn lazy_thesaurus_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = LazyThesaurus::with_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(furniture())
        });
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.get().unwrap().synset_count(), 4);
        assert_eq!(lazy.get().unwrap().synset_count(), 4);
        assert!(lazy.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_thesaurus_loads_once_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = Arc::new(LazyThesaurus::with_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(furniture())
        }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = Arc::clone(&lazy);
                std::thread::spawn(move || lazy.get().map(|th| th.synset_count()).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 4);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_lazy_load_can_be_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = LazyThesaurus::with_loader(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("disk not ready");
            }
            Ok(furniture())
        });
        assert!(lazy.get().is_err());
        assert!(!lazy.is_loaded());
        assert!(lazy.get().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
