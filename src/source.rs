use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use image::io::Reader;

use crate::image_error::ExtractError;


/// A candidate image handed to the finder by the caller.
///
/// The finder only ever clones, describes and decodes a source; it never creates
/// or destroys the underlying file or buffer.
pub trait ImageSource: Clone + Send + Sync + 'static {
	/// Label used in log lines and error messages
	fn describe(&self) -> String;

	/// Decode the whole image, guessing the format from the content
	fn load(&self) -> Result<DynamicImage, ExtractError>;
}

impl ImageSource for PathBuf {

	fn describe(&self) -> String {
		self.display().to_string()
	}

	//Open an image from the specific path
	//Tries to guess the format if it's not known
	fn load(&self) -> Result<DynamicImage, ExtractError> {
		let path = self.describe();

		let reader = Reader::open(self)
			.map_err(|source| ExtractError::FileError { path: path.clone(), source })?;

		let format_guessed = reader.with_guessed_format()
			.map_err(|source| ExtractError::FileError { path: path.clone(), source })?;

		return format_guessed.decode()
			.map_err(|e| ExtractError::DecodeFail { path, reason: e.to_string() });
	}
}

/// An image that is already held in memory, e.g. extracted from an archive or a motion photo.
#[derive(Clone, Debug)]
pub struct MemoryImage {
	pub name: String,
	pub bytes: Arc<[u8]>,
}

impl MemoryImage {
	pub fn new( name: impl Into<String>, bytes: impl Into<Arc<[u8]>> ) -> MemoryImage {
		MemoryImage { name: name.into(), bytes: bytes.into() }
	}
}

impl ImageSource for MemoryImage {

	fn describe(&self) -> String {
		self.name.clone()
	}

	fn load(&self) -> Result<DynamicImage, ExtractError> {
		let reader = Reader::new( Cursor::new( &self.bytes[..] ) )
			.with_guessed_format()
			.map_err(|source| ExtractError::FileError { path: self.name.clone(), source })?;

		return reader.decode()
			.map_err(|e| ExtractError::DecodeFail { path: self.name.clone(), reason: e.to_string() });
	}
}
