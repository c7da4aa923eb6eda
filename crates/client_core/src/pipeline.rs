use std::collections::VecDeque;

use crate::request::OutgoingRequest;

/// FIFO pairing of requests with responses on one connection.
///
/// Requests move `send_queue -> in_flight -> handler`. The server answers in
/// send order, so the oldest in-flight request always owns the next response.
#[derive(Debug)]
pub struct Pipeline {
    send_queue: VecDeque<OutgoingRequest>,
    in_flight: VecDeque<OutgoingRequest>,
    depth: usize,
    next_seq: u64,
}

impl Pipeline {
    pub fn new(depth: usize) -> Self {
        Self {
            send_queue: VecDeque::new(),
            in_flight: VecDeque::new(),
            depth: depth.max(1),
            next_seq: 1,
        }
    }

    pub fn enqueue(&mut self, mut request: OutgoingRequest) -> u64 {
        request.seq = self.next_seq;
        self.next_seq += 1;
        let seq = request.seq;
        self.send_queue.push_back(request);
        seq
    }

    /// Queues a new request ahead of everything already waiting.
    pub fn enqueue_front(&mut self, mut request: OutgoingRequest) -> u64 {
        request.seq = self.next_seq;
        self.next_seq += 1;
        let seq = request.seq;
        self.send_queue.push_front(request);
        seq
    }

    /// Returns a request to the head of the queue, ahead of newer work.
    pub fn push_front(&mut self, request: OutgoingRequest) {
        self.send_queue.push_front(request);
    }

    pub fn next_ready(&mut self) -> Option<OutgoingRequest> {
        if self.in_flight.len() >= self.depth {
            return None;
        }
        self.send_queue.pop_front()
    }

    pub fn mark_sent(&mut self, mut request: OutgoingRequest) {
        request.mark_sent();
        self.in_flight.push_back(request);
    }

    /// Pairs a fully received response with its request.
    ///
    /// # Panics
    /// When nothing is in flight; a response without a request means the
    /// stream and the queue have diverged.
    pub fn on_response(&mut self) -> OutgoingRequest {
        let Some(mut request) = self.in_flight.pop_front() else {
            panic!("response received with no request in flight");
        };
        request.mark_received();
        request
    }

    /// Moves unanswered requests back in front of the queue, oldest first.
    pub fn requeue_in_flight(&mut self) -> usize {
        let count = self.in_flight.len();
        while let Some(request) = self.in_flight.pop_back() {
            self.send_queue.push_front(request);
        }
        count
    }

    pub fn discard_in_flight(&mut self) -> usize {
        let count = self.in_flight.len();
        self.in_flight.clear();
        count
    }

    pub fn retain_queued(&mut self, keep: impl FnMut(&OutgoingRequest) -> bool) {
        self.send_queue.retain(keep);
    }

    pub fn queued_len(&self) -> usize {
        self.send_queue.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn queued(&self) -> impl Iterator<Item = &OutgoingRequest> {
        self.send_queue.iter()
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &OutgoingRequest> {
        self.in_flight.iter()
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
