//! Byte queue between the pipeline core and the UART core.
//!
//! At 1200 baud a 4-byte report takes 30 ms on the wire. The pipeline
//! core only pushes bytes into the queue and goes back to servicing USB;
//! a dedicated consumer on the second core pops them and performs the
//! slow blocking writes.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::link::{ControlLine, SerialLink};

/// Bounded FIFO of bytes, safe to share between cores.
pub struct ByteQueue<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, u8, N>,
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteQueue<N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue a byte if there is room.
    pub fn try_push(&self, byte: u8) -> bool {
        self.channel.try_send(byte).is_ok()
    }

    /// Queue a byte, calling `idle` while the queue is full.
    pub fn push_blocking(&self, byte: u8, mut idle: impl FnMut()) {
        let mut byte = byte;
        loop {
            match self.channel.try_send(byte) {
                Ok(()) => return,
                Err(TrySendError::Full(b)) => {
                    byte = b;
                    idle();
                }
            }
        }
    }

    /// Wait for the next byte.
    pub async fn pop(&self) -> u8 {
        self.channel.receive().await
    }

    /// Next byte, if any.
    pub fn try_pop(&self) -> Option<u8> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

/// Receive side and handshake input of the firmware link.
pub trait LinkPort {
    /// Read whatever the UART has buffered.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize;

    /// Host handshake level, already corrected for line driver inversion.
    fn handshake_asserted(&mut self) -> bool;

    /// Called while waiting for queue space or for the queue to drain.
    fn idle(&mut self) {}
}

/// [`SerialLink`] whose writes go through a [`ByteQueue`].
pub struct QueueLink<'q, const N: usize, P> {
    queue: &'q ByteQueue<N>,
    port: P,
}

impl<'q, const N: usize, P: LinkPort> QueueLink<'q, N, P> {
    pub fn new(queue: &'q ByteQueue<N>, port: P) -> Self {
        Self { queue, port }
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl<const N: usize, P: LinkPort> SerialLink for QueueLink<'_, N, P> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        for &b in bytes {
            let port = &mut self.port;
            self.queue.push_blocking(b, || port.idle());
        }
        bytes.len()
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize {
        self.port.read_nonblocking(buf)
    }

    fn handshake_asserted(&mut self) -> bool {
        self.port.handshake_asserted()
    }

    fn set_control_line(&mut self, line: ControlLine, level: bool) {
        // RTS/DTR are inputs on the mouse side of the cable
        trace!("Ignoring {:?} = {}", line, level);
    }

    /// Wait for the consumer to take every queued byte. The last one may
    /// still be shifting out of the UART when this returns.
    fn flush(&mut self) {
        while !self.queue.is_empty() {
            self.port.idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation;
    use crate::protocol::Protocol;
    use critical_section as _;
    use embassy_futures::block_on;

    struct Port {
        idles: usize,
    }

    impl LinkPort for Port {
        fn read_nonblocking(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
        fn handshake_asserted(&mut self) -> bool {
            true
        }
        fn idle(&mut self) {
            self.idles += 1;
        }
    }

    #[test]
    fn fifo_order() {
        let q: ByteQueue<4> = ByteQueue::new();
        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert_eq!(block_on(q.pop()), 1);
        assert_eq!(q.try_pop(), Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_rejects() {
        let q: ByteQueue<2> = ByteQueue::new();
        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert!(!q.try_push(3));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn push_blocking_waits_for_room() {
        let q: ByteQueue<1> = ByteQueue::new();
        q.try_push(7);
        let mut spins = 0;
        q.push_blocking(8, || {
            spins += 1;
            q.try_pop();
        });
        assert_eq!(spins, 1);
        assert_eq!(q.try_pop(), Some(8));
    }

    /// Port whose `idle` plays the UART core: it moves one queued byte
    /// onto the wire. Each handshake sample records how much had reached
    /// the wire by then.
    struct Uart<'q> {
        queue: &'q ByteQueue<8>,
        wire: std::vec::Vec<u8>,
        levels: std::vec::Vec<bool>,
        sampled_at: std::vec::Vec<usize>,
    }

    impl LinkPort for Uart<'_> {
        fn read_nonblocking(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
        fn handshake_asserted(&mut self) -> bool {
            self.sampled_at.push(self.wire.len());
            if self.levels.is_empty() {
                false
            } else {
                self.levels.remove(0)
            }
        }
        fn idle(&mut self) {
            if let Some(b) = self.queue.try_pop() {
                self.wire.push(b);
            }
        }
    }

    #[test]
    fn flush_waits_for_consumer() {
        let q: ByteQueue<8> = ByteQueue::new();
        let uart = Uart {
            queue: &q,
            wire: std::vec::Vec::new(),
            levels: std::vec::Vec::new(),
            sampled_at: std::vec::Vec::new(),
        };
        let mut link = QueueLink::new(&q, uart);
        link.write(&[1, 2, 3]);
        link.flush();
        assert!(q.is_empty());
        assert_eq!(link.port_mut().wire, [1, 2, 3]);
    }

    #[test]
    fn ident_abort_is_checked_at_wire_time() {
        let q: ByteQueue<8> = ByteQueue::new();
        let uart = Uart {
            queue: &q,
            wire: std::vec::Vec::new(),
            levels: std::vec![false, true],
            sampled_at: std::vec::Vec::new(),
        };
        let mut link = QueueLink::new(&q, uart);

        let outcome = negotiation::send_ident(&mut link, Protocol::MsWheel);

        assert_eq!(outcome, negotiation::IdentOutcome::Aborted { sent: 1 });
        let port = link.port_mut();
        assert_eq!(port.wire, b"M");
        // the second sample only happened once 'M' had left the queue
        assert_eq!(port.sampled_at, [0, 1]);
    }

    #[test]
    fn link_writes_through_queue() {
        let q: ByteQueue<8> = ByteQueue::new();
        let mut link = QueueLink::new(&q, Port { idles: 0 });
        assert_eq!(link.write(b"MZ"), 2);
        assert!(link.handshake_asserted());
        assert_eq!(q.try_pop(), Some(b'M'));
        assert_eq!(q.try_pop(), Some(b'Z'));
        assert_eq!(link.port_mut().idles, 0);
    }
}
