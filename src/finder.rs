use std::sync::Arc;

use tracing::{debug, warn};

use crate::cluster::{self, Group};
use crate::image_error::{ConfigError, ExtractError};
use crate::imagehash::{self, Fingerprint};
use crate::mapper;
use crate::source::ImageSource;


pub const DEFAULT_HASH_SIZE: u32 = 8;
pub const DEFAULT_THRESHOLD: f64 = 0.90;
//A 256x256 grid is already a 16 KiB hex string
pub const MAX_HASH_SIZE: u32 = 256;

/// How fingerprints are computed and compared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
	//Exact match on an average hash of a hash_size x hash_size grid
	Bucket { hash_size: u32 },
	//Histogram correlation strictly above threshold
	Pairwise { threshold: f64 },
}

impl Default for Strategy {
	fn default() -> Self {
		Strategy::Bucket { hash_size: DEFAULT_HASH_SIZE }
	}
}

impl Strategy {

	/// Resolve a strategy by name, filling in the defaults for options not given.
	pub fn from_name( name: &str, hash_size: Option<u32>, threshold: Option<f64> ) -> Result<Strategy, ConfigError> {
		let strategy = match name.to_ascii_lowercase().as_str() {
			"bucket" => Strategy::Bucket { hash_size: hash_size.unwrap_or(DEFAULT_HASH_SIZE) },
			"pairwise" => Strategy::Pairwise { threshold: threshold.unwrap_or(DEFAULT_THRESHOLD) },
			_ => return Err(ConfigError::UnknownStrategy(name.to_string())),
		};
		strategy.validate()?;
		return Ok(strategy);
	}

	pub fn name(&self) -> &'static str {
		match self {
			Strategy::Bucket { .. } => "bucket",
			Strategy::Pairwise { .. } => "pairwise",
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		match *self {
			Strategy::Bucket { hash_size } => {
				if !hash_size.is_power_of_two() || hash_size > MAX_HASH_SIZE {
					return Err(ConfigError::InvalidHashSize(hash_size));
				}
			},
			Strategy::Pairwise { threshold } => {
				//Written so that NaN fails too
				if !(threshold > 0.0 && threshold < 1.0) {
					return Err(ConfigError::InvalidThreshold(threshold));
				}
			},
		}
		Ok(())
	}
}

/// Called once per input image from the worker that fingerprinted it, with `None`
/// when extraction failed. Calls arrive concurrently from several workers.
pub type ProgressFn<T> = Arc<dyn Fn(&T, Option<&Fingerprint>) + Send + Sync>;

pub struct Config<T> {
	pub strategy: Strategy,
	//Defaults to the available parallelism
	pub num_threads: Option<usize>,
	pub on_progress: Option<ProgressFn<T>>,
}

impl<T> Clone for Config<T> {
	fn clone(&self) -> Self {
		Config { strategy: self.strategy, num_threads: self.num_threads, on_progress: self.on_progress.clone() }
	}
}

impl<T> Default for Config<T> {
	fn default() -> Self {
		Config::new( Strategy::default() )
	}
}

impl<T> Config<T> {

	pub fn new( strategy: Strategy ) -> Config<T> {
		Config { strategy, num_threads: None, on_progress: None }
	}

	pub fn with_threads( mut self, num_threads: usize ) -> Config<T> {
		self.num_threads = Some(num_threads);
		self
	}

	pub fn on_progress<F>( mut self, f: F ) -> Config<T>
	where
		F: Fn(&T, Option<&Fingerprint>) + Send + Sync + 'static,
	{
		self.on_progress = Some(Arc::new(f));
		self
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.strategy.validate()?;
		if self.num_threads == Some(0) {
			return Err(ConfigError::InvalidThreadCount);
		}
		Ok(())
	}
}

/// The outcome of fingerprinting one image. Results come back in input order.
#[derive(Debug)]
pub struct FingerprintResult<T> {
	pub image: T,
	pub fingerprint: Result<Fingerprint, ExtractError>,
}

/// Fingerprints a collection on a worker pool and clusters it with one strategy.
pub struct DuplicateFinder<T> {
	config: Config<T>,
}

impl<T: ImageSource> DuplicateFinder<T> {

	/// Checks the configuration up front so that no work starts on a bad one.
	pub fn new( config: Config<T> ) -> Result<DuplicateFinder<T>, ConfigError> {
		config.validate()?;
		Ok(DuplicateFinder { config })
	}

	/// Fingerprint every image, one result per input in input order.
	pub fn fingerprint_all( &self, images: &[T] ) -> Vec<FingerprintResult<T>> {
		let strategy = self.config.strategy;
		let on_progress = self.config.on_progress.clone();
		let num_threads = self.config.num_threads.unwrap_or_else(mapper::default_num_threads);

		let results = mapper::map_ordered( Arc::new(images.to_vec()), num_threads, move |image: &T| {
			let fingerprint = imagehash::fingerprint( image, &strategy );
			if let Err(e) = &fingerprint {
				warn!("{}", e);
			}
			if let Some(cb) = &on_progress {
				cb( image, fingerprint.as_ref().ok() );
			}
			FingerprintResult { image: image.clone(), fingerprint }
		});

		assert_eq!( results.len(), images.len(), "fingerprint results out of step with input" );
		return results;
	}

	/// Groups of two or more images judged duplicates. Images that fail to decode are left out.
	pub fn find( &self, images: &[T] ) -> Vec<Group<T>> {
		debug!(strategy = self.config.strategy.name(), images = images.len(), "finding duplicates");

		let results = self.fingerprint_all(images);
		let valid = results.into_iter().filter_map(|r| match r.fingerprint {
			Ok(fp) => Some((r.image, fp)),
			Err(_) => None,
		});

		let groups = match self.config.strategy {
			Strategy::Bucket { .. } => {
				let hashed: Vec<(T, String)> = valid.filter_map(|(image, fp)| match fp {
					Fingerprint::AverageHash(h) => Some((image, h)),
					Fingerprint::Histogram(_) => None,
				}).collect();
				cluster::bucket_groups(hashed)
			},
			Strategy::Pairwise { threshold } => {
				let histograms: Vec<_> = valid.filter_map(|(image, fp)| match fp {
					Fingerprint::Histogram(h) => Some((image, h)),
					Fingerprint::AverageHash(_) => None,
				}).collect();
				cluster::pairwise_groups( &histograms, threshold )
			},
		};

		return groups;
	}
}

/// Validate `config`, then fingerprint and cluster `images`.
pub fn find<T: ImageSource>( images: &[T], config: Config<T> ) -> Result<Vec<Group<T>>, ConfigError> {
	let finder = DuplicateFinder::new(config)?;
	Ok( finder.find(images) )
}
