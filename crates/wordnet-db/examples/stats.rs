use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use wordnet_db::{LoadMode, Thesaurus};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let dict_dir = args
        .next()
        .map(PathBuf::from)
        .context("usage: cargo run -p wordnet-db --example stats -- <path-to-wordnet-dir> [group...]")?;

    let th = Thesaurus::load_with_mode(&dict_dir, LoadMode::Mmap)
        .with_context(|| format!("loading thesaurus from {}", dict_dir.display()))?;

    println!("Dictionary: {}", dict_dir.display());
    println!("Indexed words: {}", th.word_count());
    println!("Synsets      : {}", th.synset_count());

    for group in args {
        let members = th.hyponyms(&group)?;
        println!("{group}: {} members", members.len());
        for member in members {
            println!("  {member}");
        }
    }

    Ok(())
}
