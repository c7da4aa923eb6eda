use super::*;
use crate::{
    http::HttpRequest,
    request::{OutgoingRequest, RequestKind},
};
use proptest::prelude::*;

fn request(kind: RequestKind) -> OutgoingRequest {
    OutgoingRequest::new(kind, HttpRequest::get("/_matrix/client/r0/sync"))
}

#[test]
fn depth_one_holds_back_until_response() {
    let mut pipeline = Pipeline::new(1);
    pipeline.enqueue(request(RequestKind::Login));
    pipeline.enqueue(request(RequestKind::Sync));

    let first = pipeline.next_ready().expect("first ready");
    assert_eq!(first.kind, RequestKind::Login);
    pipeline.mark_sent(first);
    assert!(pipeline.next_ready().is_none());

    let answered = pipeline.on_response();
    assert_eq!(answered.kind, RequestKind::Login);
    assert!(answered.marks.sent.is_some());
    assert!(answered.marks.received.is_some());
    assert_eq!(pipeline.in_flight_len(), 0);
    assert_eq!(pipeline.next_ready().map(|r| r.kind), Some(RequestKind::Sync));
}

#[test]
fn requeue_puts_in_flight_ahead_of_newer_requests() {
    let mut pipeline = Pipeline::new(2);
    let a = pipeline.enqueue(request(RequestKind::Sync));
    let b = pipeline.enqueue(request(RequestKind::SendMessage));
    let c = pipeline.enqueue(request(RequestKind::Redact));

    for _ in 0..2 {
        let ready = pipeline.next_ready().expect("ready");
        pipeline.mark_sent(ready);
    }
    assert_eq!(pipeline.requeue_in_flight(), 2);
    assert_eq!(pipeline.in_flight_len(), 0);

    let order: Vec<u64> = pipeline.queued().map(|r| r.seq).collect();
    assert_eq!(order, vec![a, b, c]);
}

#[test]
fn discard_drops_only_in_flight() {
    let mut pipeline = Pipeline::new(1);
    pipeline.enqueue(request(RequestKind::Sync));
    pipeline.enqueue(request(RequestKind::SendMessage));
    let ready = pipeline.next_ready().expect("ready");
    pipeline.mark_sent(ready);

    assert_eq!(pipeline.discard_in_flight(), 1);
    assert_eq!(pipeline.queued_len(), 1);
    assert_eq!(pipeline.in_flight_len(), 0);
}

#[test]
#[should_panic(expected = "no request in flight")]
fn response_without_request_is_fatal() {
    let mut pipeline = Pipeline::new(1);
    pipeline.on_response();
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    Transmit,
    Respond,
    Fail,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Enqueue),
        3 => Just(Op::Transmit),
        3 => Just(Op::Respond),
        1 => Just(Op::Fail),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn responses_pair_with_oldest_transmitted_request(
        depth in 1usize..4,
        ops in prop::collection::vec(op_strategy(), 0..80),
    ) {
        let mut pipeline = Pipeline::new(depth);
        let mut model_queue: std::collections::VecDeque<u64> = Default::default();
        let mut model_in_flight: std::collections::VecDeque<u64> = Default::default();

        for op in ops {
            match op {
                Op::Enqueue => {
                    let seq = pipeline.enqueue(request(RequestKind::Sync));
                    model_queue.push_back(seq);
                }
                Op::Transmit => {
                    if let Some(ready) = pipeline.next_ready() {
                        prop_assert_eq!(Some(ready.seq), model_queue.pop_front());
                        model_in_flight.push_back(ready.seq);
                        pipeline.mark_sent(ready);
                    } else {
                        prop_assert!(model_queue.is_empty() || model_in_flight.len() >= depth);
                    }
                }
                Op::Respond => {
                    if let Some(expected) = model_in_flight.pop_front() {
                        prop_assert_eq!(pipeline.on_response().seq, expected);
                    }
                }
                Op::Fail => {
                    pipeline.requeue_in_flight();
                    while let Some(seq) = model_in_flight.pop_back() {
                        model_queue.push_front(seq);
                    }
                }
            }
            prop_assert!(pipeline.in_flight_len() <= depth);
            prop_assert_eq!(pipeline.in_flight_len(), model_in_flight.len());
            prop_assert_eq!(pipeline.queued_len(), model_queue.len());
        }
    }
}
