/// Groups `items` into consecutive batches whose cumulated size stays within `ceiling`.
///
/// Batches are filled greedily in input order: an item that would push the running
/// sum over `ceiling` closes the current batch and opens the next one. An item larger
/// than `ceiling` on its own still gets a batch, alone. No batch is ever empty.
pub fn batch_by_size<T, F>(items: impl IntoIterator<Item = T>, ceiling: u64, size_of: F) -> Vec<Vec<T>>
where
    F: Fn(&T) -> u64,
{
    let mut batches = vec![];
    let mut current = vec![];
    let mut current_size = 0u64;

    for item in items {
        let size = size_of(&item);
        if !current.is_empty() && current_size.saturating_add(size) > ceiling {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size = current_size.saturating_add(size);
        current.push(item);
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
