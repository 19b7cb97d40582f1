use anyhow::{Context, Result};
use clap::Parser;
use gazeswipe::layouts;
use gazeswipe_core::{KeyLayout, NGramModel, VocabularyIndex};
use std::fs;
use std::path::{Path, PathBuf};

/// Build the runtime vocabulary artifacts for a layout.
///
/// Writes `vocab.fst` + `vocab.bincode` into the output directory, and
/// `ngram.bincode` when a corpus is given.
#[derive(Parser, Debug)]
#[command(name = "build_vocab")]
struct Args {
    /// Word list: one word per line, anything after the first whitespace is
    /// ignored (so `word<TAB>count` files work as-is)
    #[arg(short, long)]
    words: PathBuf,

    /// Layout name (`standard`, `compact`) or JSON layout file
    #[arg(short, long, default_value = "standard")]
    layout: String,

    /// Output directory
    #[arg(short, long, default_value = "data")]
    out: PathBuf,

    /// Plain-text corpus for the n-gram model
    #[arg(short, long)]
    corpus: Option<PathBuf>,

    /// Add-k smoothing constant for the n-gram model
    #[arg(short = 'k', long, default_value_t = 1.0)]
    smoothing: f64,
}

/// First whitespace-separated token of each non-comment line.
fn read_words(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_whitespace().next())
        .map(|w| w.to_string())
        .collect())
}

fn build(layout: &KeyLayout, words: &[String], out: &Path) -> Result<VocabularyIndex> {
    let vocab = VocabularyIndex::from_words(layout, words);
    vocab
        .save_to_fst_bincode(out)
        .with_context(|| format!("write vocabulary to {}", out.display()))?;
    Ok(vocab)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let layout = layouts::resolve(&args.layout)?;
    let words = read_words(&args.words)?;
    println!("Read {} words from {}", words.len(), args.words.display());

    let vocab = build(&layout, &words, &args.out)?;
    println!(
        "Wrote {} representation keys to {}",
        vocab.len(),
        args.out.display()
    );

    if let Some(corpus) = &args.corpus {
        let text =
            fs::read_to_string(corpus).with_context(|| format!("open {}", corpus.display()))?;
        let model = NGramModel::from_corpus(&text, args.smoothing);
        let path = args.out.join("ngram.bincode");
        model.save_bincode(&path)?;
        println!(
            "Wrote n-gram model ({} words) to {}",
            model.vocabulary_size(),
            path.display()
        );
    }

    Ok(())
}
