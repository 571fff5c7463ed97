use std::sync::Arc;
use std::sync::mpsc::channel;

use threadpool::ThreadPool;
use tracing::debug;


/// Number of workers used when the caller doesn't say.
pub fn default_num_threads() -> usize {
	std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Run `f` over every item on a fixed size thread pool.
///
/// The output is aligned with the input: `output[i]` is `f(&items[i])` whatever order
/// the workers finish in. Each job tags its result with the item index before sending
/// it back over the channel, and the collector slots it into place.
///
/// A failure inside one item is the extraction function's business to encode in `R`;
/// nothing here cancels sibling jobs. A job that panics leaves a hole in the output,
/// which is an invariant violation and panics the caller.
pub fn map_ordered<T, R, F>( items: Arc<Vec<T>>, num_threads: usize, f: F ) -> Vec<R>
where
	T: Send + Sync + 'static,
	R: Send + 'static,
	F: Fn(&T) -> R + Send + Sync + 'static,
{
	let num_items = items.len();
	if num_items == 0 {
		return Vec::new();
	}

	//No point spinning up more threads than there are items
	let num_threads = num_threads.clamp(1, num_items);
	debug!(num_items, num_threads, "starting worker pool");

	let pool = ThreadPool::new(num_threads);
	let f = Arc::new(f);

	let (tx, rx) = channel();
	for idx in 0..num_items {
		let tx = tx.clone();
		let items = Arc::clone(&items);
		let f = Arc::clone(&f);
		pool.execute(move || {
			let result = f(&items[idx]);
			//The receiver lives until every sender is gone
			let _ = tx.send((idx, result));
		});
	}
	drop(tx);

	//Collate the output of the threads
	let mut slots: Vec<Option<R>> = (0..num_items).map(|_| None).collect();
	for (idx, result) in rx.into_iter() {
		slots[idx] = Some(result);
	}

	return slots.into_iter().enumerate().map(|(idx, slot)| {
		match slot {
			Some(result) => result,
			None => panic!("worker pool produced no result for item {}", idx),
		}
	}).collect();
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;
	use std::sync::Mutex;
	use std::thread;
	use std::time::Duration;

	#[test]
	fn test_output_aligned_with_input() {
		let items: Vec<u64> = (0..40).collect();
		//Early items sleep longest so they complete last
		let out = map_ordered( Arc::new(items.clone()), 8, |&n| {
			thread::sleep( Duration::from_millis( (40 - n) % 7 ) );
			n * 10
		});

		assert_eq!( out.len(), items.len(), "One result per item" );
		for (i, v) in out.iter().enumerate() {
			assert_eq!( *v, (i as u64) * 10, "Result {} is in input position", i );
		}
	}

	#[test]
	fn test_length_independent_of_worker_count() {
		for threads in [1, 2, 3, 16, 100] {
			let out = map_ordered( Arc::new((0..23).collect::<Vec<i32>>()), threads, |&n| n );
			assert_eq!( out, (0..23).collect::<Vec<i32>>(), "{} threads", threads );
		}
	}

	#[test]
	fn test_empty_input() {
		let calls = Arc::new(Mutex::new(0));
		let c = Arc::clone(&calls);
		let out: Vec<i32> = map_ordered( Arc::new(Vec::<i32>::new()), 4, move |&n| { *c.lock().unwrap() += 1; n } );
		assert!( out.is_empty() );
		assert_eq!( *calls.lock().unwrap(), 0, "Nothing is called for an empty list" );
	}

	#[test]
	fn test_failures_do_not_affect_siblings() {
		let out = map_ordered( Arc::new((0..10).collect::<Vec<i32>>()), 3, |&n| {
			if n % 3 == 0 { Err(n) } else { Ok(n) }
		});
		assert_eq!( out.iter().filter(|r| r.is_err()).count(), 4 );
		assert_eq!( out[4], Ok(4) );
		assert_eq!( out[9], Err(9) );
	}

	#[test]
	fn test_runs_on_several_threads() {
		let seen = Arc::new(Mutex::new(HashSet::new()));
		let s = Arc::clone(&seen);
		map_ordered( Arc::new((0..32).collect::<Vec<i32>>()), 4, move |_| {
			thread::sleep( Duration::from_millis(5) );
			s.lock().unwrap().insert( thread::current().id() );
		});
		let workers = seen.lock().unwrap().len();
		assert!( workers > 1 && workers <= 4, "Work spread over the pool, got {} threads", workers );
	}
}
