use std::collections::HashSet;
use std::ffi::OsStr;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;
use walkdir::{DirEntry, WalkDir};

use photodupes::imagehash::{average_hash, grey_histogram};
use photodupes::{find, Config, Fingerprint, Group, ImageSource, Strategy};

mod logging;


//List of known image file extensions
const KNOWN_EXTENSIONS: [&str; 8] = [ "jpg", "jpeg", "png", "tif", "tiff", "gif", "bmp", "webp" ];

#[derive(Parser, Debug)]
#[command(name = "photodupes", version, about = "Groups visually near-duplicate images")]
struct Cli {
	/// Files or directories to inspect. Paths are read from stdin, one per line, when none are given.
	targets: Vec<PathBuf>,

	/// Clustering strategy: "bucket" (identical average hash) or "pairwise" (histogram correlation)
	#[arg(short, long, default_value = "bucket")]
	strategy: String,

	/// Average hash grid size for the bucket strategy, a power of two. Lower values give more false positives
	#[arg(long, value_name = "N")]
	hash_size: Option<u32>,

	/// Correlation threshold between 0 and 1 (exclusive) for the pairwise strategy
	#[arg(long, value_name = "F")]
	threshold: Option<f64>,

	/// Number of worker threads (default: available CPUs)
	#[arg(short = 't', long = "threads", value_name = "N")]
	num_threads: Option<usize>,

	/// Descend into directories given as targets
	#[arg(short, long)]
	recursive: bool,

	/// Test every file regardless of file extension. Allows image files with no extension
	#[arg(short = 'y', long)]
	any_file: bool,

	/// Print the fingerprint of every image and debug logs
	#[arg(short, long)]
	verbose: bool,

	/// Compare exactly two images and explain whether they match
	#[arg(short = 'g', long, conflicts_with_all = ["recursive", "any_file"])]
	debug: bool,

	/// Run CMD once per group with the group's paths as arguments
	#[arg(short = 'x', long, value_name = "CMD", conflicts_with = "debug")]
	execute: Option<String>,
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init( cli.verbose );

	let strategy = match Strategy::from_name( &cli.strategy, cli.hash_size, cli.threshold ) {
		Ok(strategy) => strategy,
		Err(e) => {
			eprintln!("Error: {}", e);
			return ExitCode::FAILURE;
		}
	};

	if cli.debug {
		return debug_mode( &cli.targets, strategy );
	}

	let path_list = if cli.targets.is_empty() { gather_file_list_from_stdin() } else { cli.targets.clone() };
	let images = gather_file_list( &path_list, cli.recursive, !cli.any_file );
	if images.is_empty() {
		eprintln!("Didn't find any image files to test");
		return ExitCode::SUCCESS;
	}
	eprintln!("{}", found_summary( images.len() ));

	let progress_bar = ProgressBar::new( images.len() as u64 );
	progress_bar.set_style( ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}").unwrap_or_else(|_| ProgressStyle::default_bar()) );

	let pb = progress_bar.clone();
	let verbose = cli.verbose;
	let mut config = Config::new(strategy).on_progress( move |img: &PathBuf, fp| {
		if verbose {
			pb.println( fingerprint_line( img, fp ) );
		}
		pb.set_message( img.display().to_string() );
		pb.inc(1);
	});
	if let Some(n) = cli.num_threads {
		config = config.with_threads(n);
	}

	let groups = match find( &images, config ) {
		Ok(groups) => groups,
		Err(e) => {
			progress_bar.abandon();
			eprintln!("Error: {}", e);
			return ExitCode::FAILURE;
		}
	};
	progress_bar.finish_and_clear();

	output_results( &groups, cli.execute.as_deref() );
	return ExitCode::SUCCESS;
}

//Compare two files and report the internal statistics
fn debug_mode( paths: &[PathBuf], strategy: Strategy ) -> ExitCode {
	if paths.len() != 2 {
		eprintln!("Error: Debug mode requires exactly 2 paths to images.");
		return ExitCode::FAILURE;
	}

	let hash_size = match strategy {
		Strategy::Bucket { hash_size } => hash_size,
		Strategy::Pairwise { .. } => photodupes::DEFAULT_HASH_SIZE,
	};

	let (a, b) = match ( paths[0].load(), paths[1].load() ) {
		(Ok(a), Ok(b)) => (a, b),
		(Err(e), _) | (_, Err(e)) => {
			eprintln!("{}", e);
			return ExitCode::FAILURE;
		}
	};

	let hash_a = average_hash( &a, hash_size );
	let hash_b = average_hash( &b, hash_size );
	let correlation = grey_histogram(&a).correlation( &grey_histogram(&b) );

	eprintln!("Average hash First:  {}", hash_a);
	eprintln!("Average hash Second: {}", hash_b);
	eprintln!("Are hashes identical?: {}", hash_a == hash_b);
	eprintln!("Histogram similarity: {:.5}%", correlation * 100.0);

	let is_dupe = match strategy {
		Strategy::Bucket { .. } => hash_a == hash_b,
		Strategy::Pairwise { threshold } => correlation > threshold,
	};
	eprintln!("Are both images duplicates ({})?: {}", strategy.name(), is_dupe);

	return if is_dupe { ExitCode::SUCCESS } else { ExitCode::FAILURE };
}

fn found_summary( num_images: usize ) -> String {
	format!("Found {} images", num_images)
}

//One verbose line per image, the fingerprint printed in full
fn fingerprint_line( img: &Path, fp: Option<&Fingerprint> ) -> String {
	match fp {
		Some(Fingerprint::AverageHash(hash)) => format!("{}: hash={}", img.display(), hash),
		Some(fp) => format!("{}: histogram={}", img.display(), fp),
		None => format!("{}: unreadable", img.display()),
	}
}

//Read in the list of paths to inspect from stdin
fn gather_file_list_from_stdin() -> Vec<PathBuf> {
	let mut path_list = Vec::new();

	let stdin = io::stdin();
	for line in stdin.lock().lines() {
		match line {
			Ok(line) => {
				if !line.is_empty() {
					path_list.push( PathBuf::from(line) );
				}
			},
			Err(e) => {
				error!("Error reading from stdin: {}", e);
			}
		}
	}

	return path_list;
}

//Only allows certain file extensions that may be images
fn valid_file_extension( fpath: &Path ) -> bool {
	match fpath.extension().and_then(OsStr::to_str) {
		Some(extension) => KNOWN_EXTENSIONS.contains( &extension.to_lowercase().as_str() ),
		None => false,
	}
}

//Filter out invisible directories
fn dir_filter( entry: &DirEntry ) -> bool {
	entry.depth() > 0 && entry.file_name()
		.to_str()
		.map(|s| s.starts_with("."))
		.unwrap_or(false)
}

//Expand the targets into an ordered list of unique candidate files
fn gather_file_list( path_list: &[PathBuf], recursive: bool, only_known_extensions: bool ) -> Vec<PathBuf> {
	let mut seen = HashSet::new();
	let mut output_image_paths = Vec::new();

	let mut add = |path: &Path| {
		if only_known_extensions && !valid_file_extension(path) {
			return;
		}
		if seen.insert( path.to_path_buf() ) {
			output_image_paths.push( path.to_path_buf() );
		}
	};

	for file_or_dir in path_list {
		if file_or_dir.is_file() {
			add(file_or_dir);
		}else if file_or_dir.is_dir() {
			if !recursive {
				eprintln!("{}: not a file", file_or_dir.display());
				continue;
			}
			//Sorted so the engine sees the same order on every run
			let walker = WalkDir::new(file_or_dir).sort_by_file_name().into_iter();
			for entry in walker.filter_entry(|e| !dir_filter(e)) {
				match entry {
					Ok(entry) => {
						if entry.file_type().is_file() {
							add( entry.path() );
						}
					},
					Err(e) => error!("Failed to read directory entry: {}", e),
				}
			}
		}else{
			eprintln!("ERROR: Failed to read: {}", file_or_dir.display());
		}
	}

	return output_image_paths;
}

//Run the user's command with one group's paths. Failures are logged, never fatal
fn run_command( cmd: &str, paths: &[PathBuf] ) -> bool {
	match Command::new(cmd).args(paths).status() {
		Ok(status) => {
			if !status.success() {
				error!("{} exited with {}", cmd, status);
			}
			status.success()
		},
		Err(e) => {
			error!("Failed to run {}: {}", cmd, e);
			false
		}
	}
}

//Print one line per group, quoting each path
fn output_results( groups: &[Group<PathBuf>], execute: Option<&str> ) {
	let mut num_dupe_images = 0;

	for (idx, group) in groups.iter().enumerate() {
		let paths: Vec<String> = group.images.iter()
			.map(|p| format!("'{}'", p.display().to_string().replace('\'', "'\\''")))
			.collect();

		match &group.hash {
			Some(hash) => println!("Group {} ({}): {}", idx + 1, hash, paths.join(" ")),
			None => println!("Group {}: {}", idx + 1, paths.join(" ")),
		}
		num_dupe_images += group.len();

		if let Some(cmd) = execute {
			run_command( cmd, &group.images );
		}
	}

	eprintln!("Groups: {} Images in groups: {}", groups.len(), num_dupe_images);
}
