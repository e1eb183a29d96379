/// 定跡ファイルの検査・検索・マージを行う CLI。
///
/// # 使用例
///
/// 定跡ファイルの概要を表示:
/// ```shell
/// cargo run -p tools --bin bookdb -- info user_book1.db
/// ```
///
/// 局面の定跡手を検索（大きなファイルは on-the-fly で開く）:
/// ```shell
/// cargo run -p tools --bin bookdb -- query standard_book.db \
///   --threshold-mb 64 \
///   --sfen "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1"
/// ```
///
/// Apery 形式の定跡をマージ:
/// ```shell
/// cargo run -p tools --bin bookdb -- merge --output merged.bin book1.bin book2.bin
/// ```
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser as _;
use log::info;

use shogi_book::apery;
use shogi_book::book::AperyBook;
use shogi_book::yaneuraou;
use shogi_book::zobrist::hash_sfen;
use shogi_book::{Book, BookStore, OpenOptions};

#[derive(clap::Parser, Debug)]
#[command(about = "inspect, query and merge shogi opening book files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// 定跡ファイルの概要を表示する
    Info {
        /// 定跡ファイル（.db はやねうら王形式、それ以外は Apery 形式)
        book: PathBuf,
    },
    /// 局面の定跡手を検索する
    Query {
        book: PathBuf,

        /// 検索する局面（SFEN）
        #[arg(long)]
        sfen: String,

        /// このサイズ（MB）を超えるファイルを on-the-fly で開く
        #[arg(long = "threshold-mb")]
        threshold_mb: Option<f64>,

        /// JSON で出力する
        #[arg(long)]
        json: bool,
    },
    /// 局面の Apery 互換 64bit ハッシュを表示する
    Hash {
        /// 局面（SFEN）
        sfen: String,
    },
    /// やねうら王形式の定跡が局面順に整列しているか検査する
    Validate { book: PathBuf },
    /// やねうら王形式の定跡を Apery 形式に変換する
    Convert {
        /// 変換元（.db）
        input: PathBuf,

        /// 変換結果の出力先（.bin）
        #[arg(long, short)]
        output: PathBuf,
    },
    /// 複数の Apery 形式定跡を 1 つにマージする
    Merge {
        /// マージ元（.bin、2 個以上）
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// マージ結果の出力先（.bin）
        #[arg(long, short)]
        output: PathBuf,
    },
}

fn open_store(book: &PathBuf, threshold_mb: Option<f64>) -> Result<BookStore> {
    let mut store = BookStore::new();
    let options = threshold_mb.map(|mb| OpenOptions {
        on_the_fly_threshold_mb: mb,
    });
    store
        .open(book, options.as_ref())
        .with_context(|| format!("failed to open book: {}", book.display()))?;
    Ok(store)
}

fn run_info(book: PathBuf) -> Result<()> {
    let store = open_store(&book, None)?;
    println!("format: {}", store.format().name());
    println!("mode: {}", store.loading_mode().name());
    if let Some(count) = store.entry_count() {
        println!("entries: {count}");
    }
    if let Some(count) = store.duplicate_count() {
        println!("duplicates: {count}");
    }
    Ok(())
}

fn run_query(book: PathBuf, sfen: String, threshold_mb: Option<f64>, json: bool) -> Result<()> {
    let store = open_store(&book, threshold_mb)?;
    let moves = store
        .search_moves(&sfen)
        .with_context(|| format!("failed to search moves: {sfen}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&moves)?);
        return Ok(());
    }
    for mv in &moves {
        println!(
            "{} {} {} {} {}",
            mv.usi,
            mv.usi2.as_deref().unwrap_or("-"),
            mv.score.map_or_else(|| "-".to_string(), |v| v.to_string()),
            mv.depth.map_or_else(|| "-".to_string(), |v| v.to_string()),
            mv.count.map_or_else(|| "-".to_string(), |v| v.to_string()),
        );
    }
    Ok(())
}

fn run_hash(sfen: String) -> Result<()> {
    let key = hash_sfen(&sfen).with_context(|| format!("failed to parse sfen: {sfen}"))?;
    println!("{key:016x}");
    Ok(())
}

fn run_validate(book: PathBuf) -> Result<()> {
    let file = File::open(&book).with_context(|| format!("failed to open: {}", book.display()))?;
    if !yaneuraou::validate_ordering(BufReader::new(file))? {
        bail!("book is not ordered by position: {}", book.display());
    }
    println!("ok");
    Ok(())
}

fn run_convert(input: PathBuf, output: PathBuf) -> Result<()> {
    if input.extension().and_then(|e| e.to_str()) != Some("db") {
        bail!(
            "conversion source must be a yaneuraou book (.db): {}",
            input.display()
        );
    }
    if output.extension().and_then(|e| e.to_str()) != Some("bin") {
        bail!("output must be an apery book (.bin): {}", output.display());
    }
    let file = File::open(&input).with_context(|| format!("failed to open: {}", input.display()))?;
    let yane = yaneuraou::load_book(BufReader::new(file))
        .with_context(|| format!("failed to load book: {}", input.display()))?;

    // SFEN キーをハッシュし直して Apery 形式に詰め替える。
    // Apery 形式が持てない値（usi2 / depth / コメント）はここで落ちる。
    let mut converted = Book::Apery(AperyBook::default());
    for (sfen, entry) in yane.iter() {
        for mv in &entry.moves {
            converted.upsert_move(sfen, mv.clone())?;
        }
    }
    let mut out = BufWriter::new(
        File::create(&output).with_context(|| format!("failed to create: {}", output.display()))?,
    );
    match &converted {
        Book::Apery(book) => {
            apery::store_book(book, &mut out)?;
            out.flush()?;
            println!("converted {} entries", book.entry_count());
        }
        Book::Yaneuraou(_) => unreachable!(),
    }
    Ok(())
}

fn run_merge(inputs: Vec<PathBuf>, output: PathBuf) -> Result<()> {
    if output.extension().and_then(|e| e.to_str()) != Some("bin") {
        bail!("output must be an apery book (.bin): {}", output.display());
    }
    let mut book = AperyBook::default();
    for path in &inputs {
        info!("merging: {}", path.display());
        let file = File::open(path).with_context(|| format!("failed to open: {}", path.display()))?;
        let mut input = BufReader::with_capacity(128 * 1024, file);
        apery::load_into(&mut book, &mut input)
            .with_context(|| format!("failed to load book: {}", path.display()))?;
    }
    let mut out = BufWriter::new(
        File::create(&output).with_context(|| format!("failed to create: {}", output.display()))?,
    );
    apery::store_book(&book, &mut out)?;
    out.flush()?;
    println!(
        "merged {} files: {} entries ({} duplicates dropped)",
        inputs.len(),
        book.entry_count(),
        book.duplicate_count()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Info { book } => run_info(book),
        Command::Query {
            book,
            sfen,
            threshold_mb,
            json,
        } => run_query(book, sfen, threshold_mb, json),
        Command::Hash { sfen } => run_hash(sfen),
        Command::Validate { book } => run_validate(book),
        Command::Convert { input, output } => run_convert(input, output),
        Command::Merge { inputs, output } => run_merge(inputs, output),
    }
}
