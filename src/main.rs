use clap::Parser;
use tracing_subscriber::EnvFilter;

use chunkfuse::{
    builder::{self, BuildManifest, BuildOutcome, BuildParams, MANIFEST_FILE},
    cli::{BuildArgs, Cli, Command, SearchArgs, StatusArgs},
    embedding::HashEmbedder,
    error::{Error, Result},
    search::{self, IndexSession},
};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("CHUNKFUSE_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build(args) => cmd_build(&args)?,
        Command::Search(args) => cmd_search(&args)?,
        Command::Status(args) => cmd_status(&args)?,
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn cmd_build(args: &BuildArgs) -> Result<()> {
    let embedder = HashEmbedder::new(args.dim);
    let outcome = builder::build_index(
        &BuildParams {
            source_dir: args.source_dir.clone(),
            index_dir: args.index_dir.clone(),
            chunk_chars: args.chunk_chars,
            overlap_chars: args.overlap_chars,
            batch_size: args.batch_size,
            force: args.force,
        },
        &embedder,
    )?;

    if let BuildOutcome::Built {
        document_count,
        chunk_count,
    } = outcome
    {
        println!(
            "Indexed {document_count} documents ({chunk_count} chunks) into {}",
            args.index_dir.display()
        );
    }
    Ok(())
}

fn cmd_search(args: &SearchArgs) -> Result<()> {
    let session = IndexSession::load(&args.index_dir)?;

    // The query embedder must match the dimension recorded at build time.
    let manifest = BuildManifest::load(&args.index_dir.join(MANIFEST_FILE))?;
    if manifest.dim != session.dense.dimension() {
        return Err(Error::Config(format!(
            "manifest dim {} disagrees with dense index dim {}",
            manifest.dim,
            session.dense.dimension()
        )));
    }
    let embedder = HashEmbedder::new(manifest.dim);

    let output = search::run_search(
        &session,
        &embedder,
        &args.query,
        args.topk,
        args.mode,
        args.rrf_k,
    )?;

    if args.json {
        println!("{}", search::format_json(&output)?);
    } else {
        search::format_human(&output);
    }
    Ok(())
}

fn cmd_status(args: &StatusArgs) -> Result<()> {
    let manifest_path = args.index_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(Error::IndexNotFound(manifest_path));
    }
    let manifest = BuildManifest::load(&manifest_path)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        println!("Index directory: {}", args.index_dir.display());
        println!("Documents: {}", manifest.document_count);
        println!("Chunks: {}", manifest.chunk_count);
        println!(
            "Embedding model: {} (dim {})",
            manifest.embedding_model, manifest.dim
        );
        println!(
            "Chunking: {} chars, {} overlap",
            manifest.chunk_chars, manifest.overlap_chars
        );
        println!("Fingerprint: {}", manifest.fingerprint);
    }
    Ok(())
}
