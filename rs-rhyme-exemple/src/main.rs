use clap::Parser;

use rs_rhyme_core::io::normalize_folder;
use rs_rhyme_core::model::bert::load_model;
use rs_rhyme_core::model::{RhymeGenerator, RhymeSession, SessionConfig};
use rs_rhyme_core::rhyme::{query_rhyme_words, DatamuseClient, DATAMUSE_URL};
use rs_rhyme_core::Language;

/// Rhyme a first line in the terminal.
#[derive(Parser, Debug)]
#[command(name = "rs-rhyme-exemple", version, about)]
struct Args {
    /// First line; punctuation is removed
    #[arg(default_value = "Machines will take over the world soon")]
    query: String,

    /// english or dutch
    #[arg(short, long, default_value = "english")]
    language: Language,

    /// Directory holding one sub-directory per language model
    #[arg(long, env = "RHYME_DATA_DIR", default_value = "./data")]
    data_dir: String,

    #[arg(long, env = "DATAMUSE_URL", default_value = DATAMUSE_URL)]
    datamuse_url: String,

    /// Print every iteration, not only the final lines
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    // Default session: 10 rhymes, 5 mutations per word of the first line
    let config = SessionConfig { language: args.language, ..SessionConfig::default() };

    // Punctuation is stripped, an empty line falls back to the default query
    let query = config.prepare_query(&args.query);

    // Words rhyming with the last word of the query
    let datamuse = DatamuseClient::new(&args.datamuse_url)?;
    let rhyme_words = query_rhyme_words(&datamuse, &query, Some(config.n_rhymes))?;
    if rhyme_words.is_empty() {
        println!("No rhyme words found");
        return Ok(());
    }
    println!("Rhyming with: {}", rhyme_words.join(", "));

    // Load the model and tokenizer of the selected language
    let model_dir = args.language.model_dir(normalize_folder(&args.data_dir));
    let (model, tokenizer) = load_model(&model_dir)?;

    let generator = RhymeGenerator::new(model, tokenizer)?;
    let mut session = RhymeSession::start(generator, &config, &query, &rhyme_words)?;

    // Changed words are shown between brackets
    let sentences = session.run(|step| {
        if !args.verbose {
            return;
        }
        println!("--- {}/{} ({:.0}%)", step.iteration + 1, step.max_iterations, step.progress * 100.0);
        for line in &step.lines {
            let words: Vec<&str> = line.text.split_whitespace().collect();
            match line.changed {
                Some((start, end)) => println!(
                    "  {} [{}] {}",
                    words[..start].join(" "),
                    words[start..end].join(" "),
                    words[end..].join(" ")
                ),
                None => println!("  {}", line.text),
            }
        }
    })?;

    println!();
    println!("{query},");
    for sentence in sentences {
        println!("  {}", rs_rhyme_core::text::second_line(&sentence));
    }

    Ok(())
}
