//! Native stack growth for the recursive parts of the engine.
//!
//! Parsing, code generation and native re-entry into the interpreter all
//! recurse on the Rust stack. Each recursive step runs through [`guarded`],
//! which moves onto a fresh heap-allocated segment when the current one is
//! nearly used up. Depth limits elsewhere bound how far this can go.

/// Space that must remain on the current segment before a step runs.
const RED_ZONE: usize = 256 * 1024;

/// Size of each additional segment.
const SEGMENT_SIZE: usize = 4 * 1024 * 1024;

/// Runs `f`, switching to a new stack segment first if less than the red
/// zone is left.
#[inline]
pub(crate) fn guarded<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: u32) -> u32 {
        let padding = [n; 64];
        if n == 0 {
            return padding[0];
        }
        guarded(|| depth(n - 1)) + padding[63] - n + 1
    }

    #[test]
    fn test_deep_recursion_on_small_thread() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| depth(20_000))
            .unwrap();
        assert_eq!(handle.join().unwrap(), 20_000);
    }
}
