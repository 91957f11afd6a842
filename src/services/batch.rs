//! Splitting an ordered slice into contiguous batches.
//!
//! Both the embedding pipeline and the upload path consume batches through
//! this module, so the two stay consistent about ordering and offsets.

/// Lazy iterator over contiguous sub-slices of a source slice.
///
/// Yields `(offset, chunk)` pairs where `offset` is the index of the chunk's
/// first element in the source. Chunks never overlap, are never empty, and
/// concatenate back to the source in order. Re-splitting the same slice with
/// the same parameters yields identical boundaries.
#[derive(Debug, Clone)]
pub struct Batches<'a, T> {
    items: &'a [T],
    sizes: std::vec::IntoIter<usize>,
    offset: usize,
}

impl<'a, T> Iterator for Batches<'a, T> {
    type Item = (usize, &'a [T]);

    fn next(&mut self) -> Option<Self::Item> {
        let size = self.sizes.next()?;
        let start = self.offset;
        let end = start + size;
        self.offset = end;
        Some((start, &self.items[start..end]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.sizes.size_hint()
    }
}

impl<T> ExactSizeIterator for Batches<'_, T> {}

/// Split into successive chunks of `size` elements, the last chunk absorbing
/// any remainder.
///
/// When the rounded chunk count `round(len / size)` is 0 or 1 the whole slice
/// is yielded as a single chunk, so small tables never split and a table
/// smaller than `size` never rounds down to zero chunks.
pub fn split_by_size<T>(items: &[T], size: usize) -> Batches<'_, T> {
    let size = size.max(1);
    let len = items.len();

    let sizes = if len == 0 {
        Vec::new()
    } else {
        let rounded = (len as f64 / size as f64).round() as usize;
        if rounded <= 1 {
            vec![len]
        } else {
            let full = len / size;
            let rem = len % size;
            let mut sizes = vec![size; full];
            if rem > 0 {
                sizes.push(rem);
            }
            sizes
        }
    };

    Batches {
        items,
        sizes: sizes.into_iter(),
        offset: 0,
    }
}

/// Split as evenly as possible into `count` chunks.
///
/// Asking for more chunks than elements falls back to one chunk per element.
pub fn split_into_count<T>(items: &[T], count: usize) -> Batches<'_, T> {
    let len = items.len();

    let sizes = if len == 0 {
        Vec::new()
    } else {
        let count = count.clamp(1, len);
        let base = len / count;
        let rem = len % count;
        (0..count)
            .map(|i| if i < rem { base + 1 } else { base })
            .collect()
    };

    Batches {
        items,
        sizes: sizes.into_iter(),
        offset: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(items: &[u32], batches: Vec<(usize, &[u32])>) {
        let mut rebuilt = Vec::new();
        let mut expected_offset = 0;
        for (offset, chunk) in &batches {
            assert!(!chunk.is_empty(), "empty chunk at offset {offset}");
            assert_eq!(*offset, expected_offset);
            expected_offset += chunk.len();
            rebuilt.extend_from_slice(chunk);
        }
        assert_eq!(rebuilt, items);
    }

    #[test]
    fn test_split_by_size_partitions() {
        let items: Vec<u32> = (0..1000).collect();
        for size in [1, 3, 7, 100, 300, 999, 1000, 5000] {
            let batches: Vec<_> = split_by_size(&items, size).collect();
            assert_partition(&items, batches);
        }
    }

    #[test]
    fn test_split_by_size_large_table() {
        let items: Vec<u32> = (0..25_000).collect();
        let batches: Vec<_> = split_by_size(&items, 300).collect();

        assert_eq!(batches.len(), 84);
        assert!(batches[..83].iter().all(|(_, c)| c.len() == 300));
        assert_eq!(batches[83].1.len(), 100);
        assert_partition(&items, batches);
    }

    #[test]
    fn test_split_by_size_small_table_single_chunk() {
        // round(10 / 300) == 0 must still yield one chunk
        let items: Vec<u32> = (0..10).collect();
        let batches: Vec<_> = split_by_size(&items, 300).collect();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1.len(), 10);
    }

    #[test]
    fn test_split_by_size_near_one_chunk_rounds_down() {
        // round(400 / 300) == 1: the remainder is not split off
        let items: Vec<u32> = (0..400).collect();
        let batches: Vec<_> = split_by_size(&items, 300).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1.len(), 400);
    }

    #[test]
    fn test_split_by_size_empty() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(split_by_size(&items, 300).count(), 0);
    }

    #[test]
    fn test_split_by_size_idempotent() {
        let items: Vec<u32> = (0..2500).collect();
        let first: Vec<_> = split_by_size(&items, 64)
            .map(|(o, c)| (o, c.len()))
            .collect();
        let second: Vec<_> = split_by_size(&items, 64)
            .map(|(o, c)| (o, c.len()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_into_count_even() {
        let items: Vec<u32> = (0..10).collect();
        let batches: Vec<_> = split_into_count(&items, 3).collect();

        assert_eq!(batches.len(), 3);
        let lens: Vec<usize> = batches.iter().map(|(_, c)| c.len()).collect();
        assert_eq!(lens, vec![4, 3, 3]);
        assert_partition(&items, batches);
    }

    #[test]
    fn test_split_into_count_more_chunks_than_elements() {
        let items: Vec<u32> = (0..3).collect();
        let batches: Vec<_> = split_into_count(&items, 10).collect();

        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|(_, c)| c.len() == 1));
        assert_partition(&items, batches);
    }

    #[test]
    fn test_split_into_count_zero_count() {
        let items: Vec<u32> = (0..5).collect();
        let batches: Vec<_> = split_into_count(&items, 0).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1.len(), 5);
    }
}
