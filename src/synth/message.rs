use rtrb::{Consumer, Producer, RingBuffer};

/// Discrete note events consumed by the render thread.
///
/// Velocity is part of the boundary contract and travels with the event, but
/// the registry currently ignores it: every note starts silent and the
/// envelope alone shapes its level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoteEvent {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    AllNotesOff,
}

/// Producer half of the note-event queue.
///
/// The queue is bounded; pushing onto a full queue fails and the newest event
/// is dropped. Unbounded growth is disallowed on principle - a stalled render
/// thread must not turn into unbounded memory use on the producer side.
pub struct EventSender {
    tx: Producer<NoteEvent>,
}

impl EventSender {
    /// Returns false if the queue was full and the event was dropped.
    pub fn send(&mut self, event: NoteEvent) -> bool {
        match self.tx.push(event) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("note-event queue full, dropping {event:?}");
                false
            }
        }
    }
}

/// Create the single-producer/single-consumer note-event queue. The consumer
/// side is drained only at the top of a render iteration, which serializes
/// all registry mutation onto the render thread without locks.
pub fn event_queue(capacity: usize) -> (EventSender, Consumer<NoteEvent>) {
    let (tx, rx) = RingBuffer::new(capacity);
    (EventSender { tx }, rx)
}
