use anyhow::{bail, Context};
use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget};
use pretty_duration::pretty_duration;
use rand::{rngs::StdRng, Rng, SeedableRng};
use simbucket::{Embedding, EmbeddingPrecision, Indexer, IndexerOptions, ItemId};
use std::io::Write;
use std::io::{stdout, BufWriter};
use std::path::{Path, PathBuf};
use ticky::Stopwatch;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const INSERT_BATCH_SIZE: usize = 1000;

#[derive(Parser)]
#[command(version, about, long_about = None, arg_required_else_help(true))]
struct Cli {
    #[command(flatten)]
    options: OptionArgs,
    #[arg(short, long, global = true, help = "Log each bucket and page as it is created.")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct OptionArgs {
    #[arg(long, global = true, env = "SIMBUCKET_SEED", default_value_t = IndexerOptions::default().seed, help = "The seed the hyperplanes are generated from.")]
    seed: u64,
    #[arg(long, global = true, env = "SIMBUCKET_BITSIZE", default_value_t = IndexerOptions::default().bitsize, help = "The number of bits in a bucket key (1 to 32).")]
    bitsize: usize,
    #[arg(long, global = true, env = "SIMBUCKET_VECSIZE", default_value_t = IndexerOptions::default().vecsize, help = "The number of dimensions of each vector.")]
    vecsize: usize,
}

impl From<&OptionArgs> for IndexerOptions {
    fn from(args: &OptionArgs) -> Self {
        Self {
            seed: args.seed,
            bitsize: args.bitsize,
            vecsize: args.vecsize,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        about = "Index vectors from a file and query them.",
        arg_required_else_help(true)
    )]
    Index {
        #[arg(help = "A file with one vector per line, as an identifier followed by its components.")]
        vectors: PathBuf,
        #[arg(short, long, help = "A file with one query vector per line.")]
        queries: Option<PathBuf>,
        #[arg(short, long, default_value_t = 10, help = "The minimum number of results per query.")]
        limit: usize,
        #[arg(short, long, help = "Print the layout of the index.")]
        dump: bool,
    },
    #[command(about = "Index and query random vectors.")]
    Random {
        #[arg(short, long, default_value_t = 10000, help = "The number of vectors to index.")]
        count: usize,
        #[arg(short, long, default_value_t = 100, help = "The number of indexed vectors to query.")]
        queries: usize,
        #[arg(short, long, default_value_t = 10, help = "The minimum number of results per query.")]
        limit: usize,
        #[arg(short, long, help = "Print the layout of the index.")]
        dump: bool,
    },
}

fn parse_components<'a>(
    fields: impl Iterator<Item = &'a str>,
    path: &Path,
    line: usize,
) -> anyhow::Result<Embedding> {
    fields
        .map(|x| {
            x.parse::<EmbeddingPrecision>()
                .with_context(|| format!("{}:{}: invalid component {:?}", path.display(), line, x))
        })
        .collect()
}

fn lines(path: &Path) -> anyhow::Result<Vec<(usize, String)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    Ok(text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim().to_owned()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .collect())
}

fn read_vectors(path: &Path, vecsize: usize) -> anyhow::Result<Vec<(ItemId, Embedding)>> {
    lines(path)?
        .into_iter()
        .map(|(line, text)| {
            let mut fields = text.split_whitespace();
            let id = fields
                .next()
                .unwrap_or_default()
                .parse::<ItemId>()
                .with_context(|| format!("{}:{}: invalid identifier", path.display(), line))?;
            let vector = parse_components(fields, path, line)?;
            if vector.len() != vecsize {
                bail!(
                    "{}:{}: expected {} components, found {}",
                    path.display(),
                    line,
                    vecsize,
                    vector.len()
                );
            }
            Ok((id, vector))
        })
        .collect()
}

fn read_queries(path: &Path, vecsize: usize) -> anyhow::Result<Vec<Embedding>> {
    lines(path)?
        .into_iter()
        .map(|(line, text)| {
            let vector = parse_components(text.split_whitespace(), path, line)?;
            if vector.len() != vecsize {
                bail!(
                    "{}:{}: expected {} components, found {}",
                    path.display(),
                    line,
                    vecsize,
                    vector.len()
                );
            }
            Ok(vector)
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = IndexerOptions::from(&cli.options);
    let mut sw = Stopwatch::start_new();
    match cli.command {
        Some(Commands::Index {
            vectors,
            queries,
            limit,
            dump,
        }) => {
            let mut buffer = BufWriter::new(stdout().lock());
            let records = read_vectors(&vectors, options.vecsize)?;
            let queries = match queries {
                Some(path) => read_queries(&path, options.vecsize)?,
                None => Vec::new(),
            };
            let mut idx = Indexer::new(&options)?;
            idx.add_batch(&records)?;
            sw.stop();
            writeln!(
                buffer,
                "{} vector(s) indexed into {} bucket(s) in {}.",
                records.len(),
                idx.bucket_count(),
                pretty_duration(&sw.elapsed(), None)
            )?;

            sw.reset();
            sw.start();
            for (i, query) in queries.iter().enumerate() {
                let results = idx.search(query, limit);
                debug!(query = i, results = results.len(), "searched");
                let results: Vec<String> = results.iter().map(|x| x.to_string()).collect();
                writeln!(buffer, "{}.\t{}", i + 1, results.join(" "))?;
            }
            sw.stop();
            if !queries.is_empty() {
                writeln!(
                    buffer,
                    "Queried {} vector(s) in {}.",
                    queries.len(),
                    pretty_duration(&sw.elapsed(), None)
                )?;
            }
            if dump {
                writeln!(buffer, "{}", idx.dump())?;
            }
        }
        Some(Commands::Random {
            count,
            queries,
            limit,
            dump,
        }) => {
            let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(1));
            let mut idx = Indexer::new(&options)?;
            let progress_bar = ProgressBar::with_draw_target(
                Some(count.try_into()?),
                ProgressDrawTarget::hidden(),
            )
            .with_message(format!("Indexing {} random vector(s).", count));
            let mut vectors: Vec<(ItemId, Embedding)> = Vec::with_capacity(count);
            let mut batch = Vec::with_capacity(INSERT_BATCH_SIZE);
            for id in 0..count as ItemId {
                let vector: Embedding = (0..options.vecsize)
                    .map(|_| rng.random_range(-1.0..1.0))
                    .collect();
                batch.push((id, vector));
                // Insert vectors in batches of INSERT_BATCH_SIZE.
                if batch.len() == INSERT_BATCH_SIZE {
                    idx.add_batch(&batch)?;
                    progress_bar.inc(batch.len() as u64);
                    vectors.append(&mut batch);
                }
                if progress_bar.is_hidden() {
                    progress_bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(100));
                }
            }
            // Insert the remaining vectors, if any.
            if !batch.is_empty() {
                idx.add_batch(&batch)?;
                progress_bar.inc(batch.len() as u64);
                vectors.append(&mut batch);
            }
            sw.stop();
            progress_bar.finish_and_clear();
            info!(
                items = idx.len(),
                buckets = idx.bucket_count(),
                pages = idx.page_count(),
                "indexed random vectors"
            );

            let mut buffer = BufWriter::new(stdout().lock());
            writeln!(
                buffer,
                "{} vector(s) indexed into {} bucket(s) in {}.",
                count,
                idx.bucket_count(),
                pretty_duration(&sw.elapsed(), None)
            )?;

            sw.reset();
            sw.start();
            let queries = queries.min(vectors.len());
            let mut found = 0;
            let mut returned = 0;
            for (id, vector) in vectors.iter().take(queries) {
                let results = idx.search(vector, limit);
                returned += results.len();
                if results.contains(id) {
                    found += 1;
                }
            }
            sw.stop();
            if queries > 0 {
                writeln!(
                    buffer,
                    "Queried {} vector(s) in {}; {} of them found themselves, with {:.1} result(s) on average.",
                    queries,
                    pretty_duration(&sw.elapsed(), None),
                    found,
                    returned as f64 / queries as f64
                )?;
            }
            if dump {
                writeln!(buffer, "{}", idx.dump())?;
            }
        }
        _ => unreachable!(),
    }
    Ok(())
}
