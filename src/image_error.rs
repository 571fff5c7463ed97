use thiserror::Error;


/// ExtractError enumerates the per-image failures. These never abort a batch.
#[derive(Error, Debug)]
pub enum ExtractError {

	//Probably retrieving the image file
	#[error("Failed to read image file {path}: {source}")]
	FileError {
		path: String,
		#[source]
		source: std::io::Error,
	},

	//The image library couldn't identify or decode the content as an image
	#[error("Failed to decode image {path}: {reason}")]
	DecodeFail {
		path: String,
		reason: String,
	},
}

/// ConfigError is returned before any work starts when the configuration is unusable.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {

	#[error("hash size must be a power of two from 1 to 256, got {0}")]
	InvalidHashSize(u32),

	#[error("threshold must lie strictly between 0 and 1, got {0}")]
	InvalidThreshold(f64),

	#[error("number of threads must be greater than 0")]
	InvalidThreadCount,

	#[error("unknown strategy \"{0}\" (expected \"bucket\" or \"pairwise\")")]
	UnknownStrategy(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_messages_name_the_image() {
		let e = ExtractError::DecodeFail { path: "a.jpg".to_string(), reason: "truncated".to_string() };
		assert_eq!( e.to_string(), "Failed to decode image a.jpg: truncated" );

		let io = std::io::Error::new( std::io::ErrorKind::NotFound, "missing" );
		let e = ExtractError::FileError { path: "b.png".to_string(), source: io };
		assert!( e.to_string().starts_with("Failed to read image file b.png"), "Path is in the message" );
	}

	#[test]
	fn test_config_messages() {
		assert_eq!( ConfigError::InvalidHashSize(6).to_string(), "hash size must be a power of two from 1 to 256, got 6" );
		assert_eq!( ConfigError::UnknownStrategy("fuzzy".to_string()).to_string(),
			"unknown strategy \"fuzzy\" (expected \"bucket\" or \"pairwise\")" );
	}
}
