//! Owned record types that mirror WordNet's `index.*` / `data.*` lines.
//!
//! Only the fields a hyponym-aware thesaurus needs are kept as structured
//! data; glosses and verb frames are skipped while parsing. Each record can
//! be parsed from a single line, leaving file handling to the caller.
//!
//! ```rust
//! use wordnet_types::{DataRecord, Pos, SynsetId};
//!
//! let rec = DataRecord::parse("00000010 03 n 01 мебель 0 001 ~ 00000020 n 0000 | обстановка", Pos::Noun)
//!     .unwrap();
//! assert_eq!(rec.id, SynsetId { pos: Pos::Noun, offset: 10 });
//! assert!(rec.pointers[0].is_hyponym());
//! ```

use std::fmt;

use thiserror::Error;

/// Pointer symbols treated as "is-a child" edges: hyponym and member of
/// domain topic.
pub const HYPONYM_SYMBOLS: [&str; 2] = ["~", "-c"];

/// Part-of-speech marker as used by WordNet files (`n`, `v`, `a`/`s`, `r`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Pos {
    Noun,
    Verb,
    Adj,
    Adv,
}

impl Pos {
    /// Every category, in the order the dictionary files are read.
    pub const ALL: [Pos; 4] = [Pos::Noun, Pos::Verb, Pos::Adj, Pos::Adv];

    /// Parse a WordNet POS character into an enum. Satellites fold into `Adj`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(Pos::Noun),
            'v' => Some(Pos::Verb),
            'a' | 's' => Some(Pos::Adj),
            'r' => Some(Pos::Adv),
            _ => None,
        }
    }

    /// Emit the POS character used in `index.*`/`data.*`.
    pub fn to_char(self) -> char {
        match self {
            Pos::Noun => 'n',
            Pos::Verb => 'v',
            Pos::Adj => 'a',
            Pos::Adv => 'r',
        }
    }
}

impl fmt::Display for Pos {
    /// Writes the suffix of the matching `index.*`/`data.*` file name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pos::Noun => "noun",
            Pos::Verb => "verb",
            Pos::Adj => "adj",
            Pos::Adv => "adv",
        })
    }
}

/// `(offset, pos)` pair uniquely identifying a synset within the WordNet files.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SynsetId {
    pub pos: Pos,
    pub offset: u32,
}

impl fmt::Display for SynsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}-{}", self.offset, self.pos.to_char())
    }
}

/// Why a single line could not be turned into a record.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RecordError {
    #[error("expected at least {expected} fields, got {got}")]
    TooFewFields { expected: usize, got: usize },
    #[error("invalid {field}: `{value}`")]
    InvalidField { field: &'static str, value: String },
    #[error("synset_cnt mismatch (expected {expected}, got {got})")]
    SynsetCountMismatch { expected: usize, got: usize },
}

/// Index record from `index.*`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexRecord {
    pub lemma: String,
    pub pos: Pos,
    pub ptr_symbols: Vec<String>,
    pub sense_cnt: u32,
    pub tagsense_cnt: u32,
    pub synset_offsets: Vec<u32>,
}

impl IndexRecord {
    /// Parse `lemma pos synset_cnt p_cnt [ptr_symbol...] sense_cnt tagsense_cnt synset_offset...`.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 6 {
            return Err(RecordError::TooFewFields {
                expected: 6,
                got: tokens.len(),
            });
        }

        let lemma = tokens[0].to_string();
        let pos = parse_pos("pos", tokens[1])?;
        let synset_cnt: usize = parse_num("synset_cnt", tokens[2])?;
        let p_cnt: usize = parse_num("p_cnt", tokens[3])?;

        let mut idx = 4;
        // Pointer symbols, then sense_cnt and tagsense_cnt.
        let needed = block_end(idx + 2, p_cnt, 1, "p_cnt", tokens[3])?;
        if tokens.len() < needed {
            return Err(RecordError::TooFewFields {
                expected: needed,
                got: tokens.len(),
            });
        }
        let ptr_symbols = tokens[idx..idx + p_cnt]
            .iter()
            .map(|s| s.to_string())
            .collect();
        idx += p_cnt;
        let sense_cnt = parse_num("sense_cnt", tokens[idx])?;
        let tagsense_cnt = parse_num("tagsense_cnt", tokens[idx + 1])?;
        idx += 2;

        // Offsets are the trailing `synset_cnt` tokens; stray tokens before
        // them are skipped.
        let available = tokens.len() - idx;
        if available < synset_cnt {
            return Err(RecordError::SynsetCountMismatch {
                expected: synset_cnt,
                got: available,
            });
        }
        let synset_offsets = tokens[tokens.len() - synset_cnt..]
            .iter()
            .map(|t| parse_num("synset_offset", t))
            .collect::<Result<Vec<u32>, _>>()?;

        Ok(Self {
            lemma,
            pos,
            ptr_symbols,
            sense_cnt,
            tagsense_cnt,
            synset_offsets,
        })
    }

    /// Synset ids this lemma belongs to, in sense order.
    pub fn synsets(&self) -> impl Iterator<Item = SynsetId> + '_ {
        self.synset_offsets.iter().map(|&offset| SynsetId {
            pos: self.pos,
            offset,
        })
    }
}

/// One entry of a data line's pointer block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PointerRecord {
    pub symbol: String,
    pub target: SynsetId,
    pub src_word: Option<u16>,
    pub dst_word: Option<u16>,
}

impl PointerRecord {
    pub fn is_hyponym(&self) -> bool {
        HYPONYM_SYMBOLS.contains(&self.symbol.as_str())
    }
}

/// Synset record from `data.*`. Frames and gloss are not retained.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataRecord {
    pub id: SynsetId,
    pub lex_filenum: u8,
    pub words: Vec<String>,
    pub pointers: Vec<PointerRecord>,
}

impl DataRecord {
    /// Parse one `data.*` line. `pos` is the category of the file the line
    /// came from and becomes part of the synset id.
    pub fn parse(line: &str, pos: Pos) -> Result<Self, RecordError> {
        let left = match line.split_once('|') {
            Some((l, _gloss)) => l,
            None => line,
        };
        let tokens: Vec<&str> = left.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(RecordError::TooFewFields {
                expected: 4,
                got: tokens.len(),
            });
        }

        let offset: u32 = parse_num("offset", tokens[0])?;
        let lex_filenum: u8 = parse_num("lex_filenum", tokens[1])?;
        parse_pos("ss_type", tokens[2])?;
        let w_cnt = usize::from_str_radix(tokens[3], 16).map_err(|_| RecordError::InvalidField {
            field: "w_cnt",
            value: tokens[3].to_string(),
        })?;

        let mut idx = 4;
        // Words, lex_ids and the pointer count.
        let needed = block_end(idx + 1, w_cnt, 2, "w_cnt", tokens[3])?;
        if tokens.len() < needed {
            return Err(RecordError::TooFewFields {
                expected: needed,
                got: tokens.len(),
            });
        }
        let words_end = needed - 1;
        let words = tokens[idx..words_end]
            .chunks_exact(2)
            .map(|pair| pair[0].to_string())
            .collect();
        idx = words_end;

        let p_cnt: usize = parse_num("p_cnt", tokens[idx])?;
        let pointers_end = block_end(idx + 1, p_cnt, 4, "p_cnt", tokens[idx])?;
        idx += 1;
        if tokens.len() < pointers_end {
            return Err(RecordError::TooFewFields {
                expected: pointers_end,
                got: tokens.len(),
            });
        }
        let pointers = tokens[idx..pointers_end]
            .chunks_exact(4)
            .map(|ptr| -> Result<PointerRecord, RecordError> {
                let (src_word, dst_word) = decode_st(ptr[3]);
                Ok(PointerRecord {
                    symbol: ptr[0].to_string(),
                    target: SynsetId {
                        pos: parse_pos("pointer pos", ptr[2])?,
                        offset: parse_num("pointer offset", ptr[1])?,
                    },
                    src_word,
                    dst_word,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: SynsetId { pos, offset },
            lex_filenum,
            words,
            pointers,
        })
    }

    /// Targets of the pointers that count as hyponym edges, in file order.
    pub fn hyponyms(&self) -> impl Iterator<Item = SynsetId> + '_ {
        self.pointers
            .iter()
            .filter(|p| p.is_hyponym())
            .map(|p| p.target)
    }
}

/// Decode the four-hex source/target field used in pointer blocks.
///
/// High byte is the source word number, low byte is the target word number.
/// Zero indicates "not specified" per WordNet conventions.
pub fn decode_st(hex4: &str) -> (Option<u16>, Option<u16>) {
    if hex4.len() != 4 {
        return (None, None);
    }

    match u16::from_str_radix(hex4, 16) {
        Ok(val) => {
            let src = val >> 8;
            let dst = val & 0x00FF;
            let src = if src == 0 { None } else { Some(src) };
            let dst = if dst == 0 { None } else { Some(dst) };
            (src, dst)
        }
        Err(_) => (None, None),
    }
}

/// Index just past `count` entries of `width` tokens each, starting at `start`.
/// A count too large to address is reported against its raw token.
fn block_end(
    start: usize,
    count: usize,
    width: usize,
    field: &'static str,
    raw: &str,
) -> Result<usize, RecordError> {
    count
        .checked_mul(width)
        .and_then(|len| len.checked_add(start))
        .ok_or_else(|| RecordError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

fn parse_num<T: std::str::FromStr>(field: &'static str, token: &str) -> Result<T, RecordError> {
    token.parse().map_err(|_| RecordError::InvalidField {
        field,
        value: token.to_string(),
    })
}

fn parse_pos(field: &'static str, token: &str) -> Result<Pos, RecordError> {
    let mut chars = token.chars();
    match (chars.next().and_then(Pos::from_char), chars.next()) {
        (Some(pos), None) => Ok(pos),
        _ => Err(RecordError::InvalidField {
            field,
            value: token.to_string(),
        }),
    }
}
