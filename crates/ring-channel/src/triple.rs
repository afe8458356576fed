//! Latest-value SPSC exchange channel (triple buffer).
//!
//! Backed by the `triple_buffer` crate, which implements the same
//! Published/Writing/Reading three-slot rotation spec'd in §4.B: the
//! producer always writes into the slot not currently published, then
//! atomically swaps it in; the consumer swaps the published slot into its
//! own reading slot and returns a reference to it.

/// Producer half of a triple buffer.
pub struct Publisher<T> {
    input: triple_buffer::Input<T>,
}

/// Consumer half of a triple buffer.
pub struct Subscriber<T> {
    output: triple_buffer::Output<T>,
}

/// Creates a triple buffer seeded with `initial`.
pub fn triple_buffer<T: Clone + Send>(initial: T) -> (Publisher<T>, Subscriber<T>) {
    let (input, output) = triple_buffer::TripleBuffer::new(&initial).split();
    (Publisher { input }, Subscriber { output })
}

impl<T: Clone + Send> Publisher<T> {
    /// Publishes a new value, making it the latest value observable by the
    /// consumer's next `consume_latest` call.
    pub fn publish(&mut self, value: T) {
        self.input.write(value);
    }
}

impl<T: Clone + Send> Subscriber<T> {
    /// Returns the latest published value. If the producer has not
    /// published since the last call, the previously returned snapshot is
    /// returned again rather than blocking.
    pub fn consume_latest(&mut self) -> &T {
        self.output.read()
    }

    /// Returns whether a value newer than the last `consume_latest` call
    /// is waiting, without consuming it.
    pub fn has_update(&self) -> bool {
        self.output.updated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn skipping_scenario_from_spec() {
        // spec.md §8 scenario 2.
        let (mut tx, mut rx) = triple_buffer('a');
        tx.publish('A');
        tx.publish('B');
        tx.publish('C');
        assert_eq!(*rx.consume_latest(), 'C');
        assert_eq!(*rx.consume_latest(), 'C');
        tx.publish('D');
        assert_eq!(*rx.consume_latest(), 'D');
    }

    #[test]
    fn never_returns_stale_before_first_publish_is_consumed() {
        let (mut tx, mut rx) = triple_buffer(0_i32);
        tx.publish(1);
        tx.publish(2);
        assert_eq!(*rx.consume_latest(), 2);
    }
}
