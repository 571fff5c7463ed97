use tracing::{debug, trace};

use crate::imagehash::Histogram;


/// Images judged duplicates of each other. Always holds at least two images.
#[derive(Clone, Debug, PartialEq)]
pub struct Group<T> {
	pub images: Vec<T>,
	//The shared average hash, only known for bucket clustering
	pub hash: Option<String>,
}

impl<T> Group<T> {
	pub fn len(&self) -> usize {
		self.images.len()
	}

	pub fn is_empty(&self) -> bool {
		self.images.is_empty()
	}
}

/**
 * Group images whose hashes are identical.
 *
 * The pairs are stable sorted by hash so that images sharing a hash stay in their
 * input order, then adjacent runs with an unchanged hash form a bucket. Buckets of
 * one are dropped.
 */
pub fn bucket_groups<T>( mut items: Vec<(T, String)> ) -> Vec<Group<T>> {

	//sort_by is stable
	items.sort_by(|a, b| a.1.cmp(&b.1));

	let mut groups = Vec::new();
	let mut current: Vec<T> = Vec::new();
	let mut current_hash: Option<String> = None;

	for (image, hash) in items {
		if current_hash.as_deref() != Some(hash.as_str()) {
			close_bucket( &mut groups, &mut current, current_hash.take() );
			current_hash = Some(hash);
		}
		current.push(image);
	}
	close_bucket( &mut groups, &mut current, current_hash );

	debug!(groups = groups.len(), "bucket clustering done");
	return groups;
}

fn close_bucket<T>( groups: &mut Vec<Group<T>>, current: &mut Vec<T>, hash: Option<String> ) {
	let images = std::mem::take(current);
	if images.len() >= 2 {
		groups.push( Group { images, hash } );
	}
}

/**
 * Group images by thresholded histogram correlation with a greedy anchor scan.
 *
 * Every image in turn is an anchor and is compared with each image after it. Any
 * image scoring strictly above the threshold joins the anchor's group. Matched
 * images are not removed: an image already in one group is still an anchor later
 * and can start a second, overlapping group. There is no transitive merge, so two
 * images that each match a third but not each other need not share a group.
 */
pub fn pairwise_groups<T: Clone>( items: &[(T, Histogram)], threshold: f64 ) -> Vec<Group<T>> {
	let mut groups = Vec::new();

	for (i, (anchor, anchor_hist)) in items.iter().enumerate() {
		let matches: Vec<T> = items[i + 1..].iter()
			.filter(|(_, hist)| anchor_hist.correlation(hist) > threshold)
			.map(|(image, _)| image.clone())
			.collect();

		trace!(anchor = i, matches = matches.len(), "matched histograms");

		if !matches.is_empty() {
			let mut images = Vec::with_capacity(matches.len() + 1);
			images.push( anchor.clone() );
			images.extend(matches);
			groups.push( Group { images, hash: None } );
		}
	}

	debug!(groups = groups.len(), threshold, "pairwise clustering done");
	return groups;
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::imagehash::HISTOGRAM_BINS;

	fn hashed( pairs: &[(&'static str, &str)] ) -> Vec<(&'static str, String)> {
		pairs.iter().map(|(n, h)| (*n, h.to_string())).collect()
	}

	//Histogram with the given counts in its first bins and zero elsewhere
	fn hist( head: &[u64] ) -> Histogram {
		let mut counts = vec![0u64; HISTOGRAM_BINS];
		counts[..head.len()].copy_from_slice(head);
		Histogram::from_counts(&counts)
	}

	#[test]
	fn test_identical_hashes_share_a_group() {
		let items = hashed(&[ ("a", "ff00"), ("b", "ff00"), ("c", "ff00") ]);
		let groups = bucket_groups(items);

		assert_eq!( groups.len(), 1, "One group" );
		assert_eq!( groups[0].images, vec!["a", "b", "c"], "Input order kept" );
		assert_eq!( groups[0].hash.as_deref(), Some("ff00") );
	}

	#[test]
	fn test_unique_hashes_form_no_groups() {
		let items: Vec<(usize, String)> = (0..10).map(|i| (i, format!("{:04x}", i * 17))).collect();
		assert!( bucket_groups(items).is_empty(), "All hashes unique" );
	}

	#[test]
	fn test_buckets_ordered_by_hash_members_by_input() {
		let items = hashed(&[
			("d", "b0"), ("a", "a0"), ("lonely", "c0"), ("e", "b0"), ("b", "a0"), ("f", "b0"),
		]);
		let groups = bucket_groups(items);

		assert_eq!( groups.len(), 2 );
		assert_eq!( groups[0].images, vec!["a", "b"] );
		assert_eq!( groups[1].images, vec!["d", "e", "f"] );
		assert!( groups.iter().all(|g| !g.images.contains(&"lonely")), "Singletons dropped" );
	}

	#[test]
	fn test_bucket_empty_input() {
		assert!( bucket_groups(Vec::<(u8, String)>::new()).is_empty() );
	}

	#[test]
	fn test_pairwise_match_above_threshold() {
		let a = hist(&[10, 5, 1]);
		let b = hist(&[10, 5, 2]);
		let score = a.correlation(&b);
		assert!( score > 0.9, "Fixture is well above threshold, got {}", score );

		let groups = pairwise_groups( &[("a", a), ("b", b)], 0.90 );
		assert_eq!( groups.len(), 1 );
		assert_eq!( groups[0].images, vec!["a", "b"] );
		assert_eq!( groups[0].hash, None );
	}

	#[test]
	fn test_pairwise_threshold_is_exclusive() {
		let a = hist(&[10, 5, 1]);
		let b = hist(&[3, 9, 4]);
		let score = a.correlation(&b);

		let items = [("a", a), ("b", b)];
		assert!( pairwise_groups(&items, score).is_empty(), "A score equal to the threshold does not match" );
		assert_eq!( pairwise_groups(&items, score - 1e-9).len(), 1, "Just below the score matches" );
	}

	#[test]
	fn test_pairwise_is_not_transitive() {
		//b sits between a and c; a and c are too different to match directly
		let a = hist(&[10, 0, 0, 0]);
		let b = hist(&[10, 10, 0, 0]);
		let c = hist(&[0, 10, 0, 0]);
		let threshold = a.correlation(&c).max(0.0) + 0.1;
		assert!( a.correlation(&b) > threshold && b.correlation(&c) > threshold, "Fixture chains through b" );

		let groups = pairwise_groups( &[("a", a), ("b", b), ("c", c)], threshold );

		//b is both a follower of a and the anchor of its own group
		assert_eq!( groups.len(), 2, "No transitive merge" );
		assert_eq!( groups[0].images, vec!["a", "b"] );
		assert_eq!( groups[1].images, vec!["b", "c"] );
	}

	#[test]
	fn test_pairwise_overlapping_groups() {
		let h = hist(&[4, 4, 1]);
		let items = [("a", h.clone()), ("b", h.clone()), ("c", h)];
		let groups = pairwise_groups( &items, 0.9 );

		assert_eq!( groups.len(), 2, "Each anchor with later matches forms a group" );
		assert_eq!( groups[0].images, vec!["a", "b", "c"] );
		assert_eq!( groups[1].images, vec!["b", "c"] );
	}

	#[test]
	fn test_pairwise_lower_threshold_only_adds() {
		let items = [
			("a", hist(&[10, 5, 1])), ("b", hist(&[9, 6, 1])),
			("c", hist(&[1, 5, 10])), ("d", hist(&[2, 4, 9])), ("e", hist(&[5, 5, 5, 5])),
		];

		let mut previous: Vec<Vec<&str>> = Vec::new();
		for threshold in [0.99, 0.95, 0.9, 0.7, 0.5, 0.2] {
			let current: Vec<Vec<&str>> = pairwise_groups(&items, threshold).into_iter().map(|g| g.images).collect();
			for group in &previous {
				let anchor = group[0];
				let grown = current.iter().find(|g| g[0] == anchor).expect("Anchor group survives");
				assert!( group.iter().all(|img| grown.contains(img)), "Members survive at {}", threshold );
			}
			previous = current;
		}
	}

	#[test]
	fn test_pairwise_single_or_empty_input() {
		assert!( pairwise_groups::<&str>( &[], 0.9 ).is_empty() );
		assert!( pairwise_groups( &[("a", hist(&[1, 2]))], 0.9 ).is_empty() );
	}
}
