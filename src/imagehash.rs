use std::fmt;

use image::{DynamicImage, GrayImage, Luma};
use image::imageops::{self, FilterType};

use crate::finder::Strategy;
use crate::image_error::ExtractError;
use crate::source::ImageSource;


pub const HISTOGRAM_BINS: usize = 256;

/// A 256 bin grey level histogram scaled to unit L2 length.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
	bins: Vec<f32>,
}

/// The similarity key computed once per image.
#[derive(Clone, Debug, PartialEq)]
pub enum Fingerprint {
	//Average hash of a hash_size x hash_size grey grid, rendered as hex
	AverageHash(String),
	Histogram(Histogram),
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Fingerprint::AverageHash(h) => f.write_str(h),
			Fingerprint::Histogram(hist) => {
				for v in &hist.bins {
					for b in v.to_le_bytes() {
						write!(f, "{:02x}", b)?;
					}
				}
				Ok(())
			}
		}
	}
}

impl Histogram {

	/// Build a histogram from raw counts, normalising it to unit length.
	/// An empty histogram stays all zero.
	pub fn from_counts( counts: &[u64] ) -> Histogram {
		let norm = counts.iter().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt();

		let bins = counts.iter().map(|&c| {
			if norm > 0.0 { ((c as f64) / norm) as f32 } else { 0.0 }
		}).collect();

		return Histogram { bins };
	}

	pub fn bins(&self) -> &[f32] {
		&self.bins
	}

	/// Pearson correlation between two histograms, roughly in [-1,1].
	/// Two flat histograms have nothing to correlate and score 1.0.
	pub fn correlation( &self, other: &Histogram ) -> f64 {
		let n = self.bins.len().min(other.bins.len());
		if n == 0 {
			return 1.0;
		}

		let mean_a = self.bins[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;
		let mean_b = other.bins[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;

		let mut num = 0.0;
		let mut sq_a = 0.0;
		let mut sq_b = 0.0;
		for i in 0..n {
			let da = self.bins[i] as f64 - mean_a;
			let db = other.bins[i] as f64 - mean_b;
			num += da * db;
			sq_a += da * da;
			sq_b += db * db;
		}

		let denom = (sq_a * sq_b).sqrt();
		if denom <= f64::EPSILON {
			return 1.0;
		}

		return num / denom;
	}
}

//Render a row-major bit grid as hex, first bit most significant, left padded to whole nibbles
fn bits_to_hex( bits: &[bool] ) -> String {
	let pad = (4 - bits.len() % 4) % 4;
	let padded: Vec<bool> = std::iter::repeat(false).take(pad).chain(bits.iter().copied()).collect();

	padded.chunks(4).map(|nibble| {
		let v = nibble.iter().fold(0u32, |acc, &b| (acc << 1) | (b as u32));
		//A nibble is always a valid hex digit
		char::from_digit(v, 16).unwrap_or('0')
	}).collect()
}

/// Threshold an already downsampled grey grid against its mean and render it as hex.
/// A pixel sets its bit only when strictly brighter than the mean.
pub fn hash_from_grid( grid: &[u8] ) -> String {
	if grid.is_empty() {
		return String::new();
	}

	let total: u64 = grid.iter().map(|&p| p as u64).sum();
	let average = total as f64 / grid.len() as f64;

	let bits: Vec<bool> = grid.iter().map(|&p| (p as f64) > average).collect();
	return bits_to_hex(&bits);
}

/// Grey levels with the Rec.601 weights (0.299 R + 0.587 G + 0.114 B), rounded.
/// Both fingerprints are taken on this image; alpha is ignored.
pub fn to_grey( img: &DynamicImage ) -> GrayImage {
	let rgb = img.to_rgb8();
	GrayImage::from_fn( rgb.width(), rgb.height(), |x, y| {
		let [r, g, b] = rgb.get_pixel(x, y).0;
		let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000;
		Luma([luma as u8])
	})
}

/// Average hash: grey, Lanczos downsample to hash_size x hash_size, threshold on the mean.
pub fn average_hash( img: &DynamicImage, hash_size: u32 ) -> String {
	let grey = to_grey(img);
	let scaled = imageops::resize( &grey, hash_size, hash_size, FilterType::Lanczos3 );
	return hash_from_grid( scaled.as_raw() );
}

/// Normalised 256 bin histogram of the grey levels of the whole image.
pub fn grey_histogram( img: &DynamicImage ) -> Histogram {
	let mut counts = [0u64; HISTOGRAM_BINS];
	for p in to_grey(img).as_raw() {
		counts[*p as usize] += 1;
	}
	return Histogram::from_counts(&counts);
}

/// Decode one source and compute the fingerprint the strategy clusters on.
pub fn fingerprint<T: ImageSource>( source: &T, strategy: &Strategy ) -> Result<Fingerprint, ExtractError> {
	let img = source.load()?;

	let fp = match strategy {
		Strategy::Bucket { hash_size } => Fingerprint::AverageHash( average_hash( &img, *hash_size ) ),
		Strategy::Pairwise { .. } => Fingerprint::Histogram( grey_histogram(&img) ),
	};

	return Ok(fp);
}

/// Histogram correlation of two sources, as used by the pairwise strategy.
pub fn similarity<A: ImageSource, B: ImageSource>( a: &A, b: &B ) -> Result<f64, ExtractError> {
	let hist_a = grey_histogram( &a.load()? );
	let hist_b = grey_histogram( &b.load()? );
	return Ok( hist_a.correlation(&hist_b) );
}
