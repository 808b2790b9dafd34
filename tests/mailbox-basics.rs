// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::time::Duration;

use mqtt_mailbox_tokio::mqtt_mb::{Event, EventKind, Mailbox};

mod common;

#[tokio::test]
async fn test_dequeue_preserves_fifo_order() {
    common::init_tracing();

    let mailbox = Mailbox::new();
    mailbox.enqueue(Event::Published { id: 1 });
    mailbox.enqueue(Event::Subscribed {
        id: 2,
        granted: vec![0],
    });
    mailbox.enqueue(Event::Published { id: 3 });

    let timeout = Duration::from_millis(100);
    assert_eq!(mailbox.dequeue(timeout).await, Event::Published { id: 1 });
    assert_eq!(
        mailbox.dequeue(timeout).await,
        Event::Subscribed {
            id: 2,
            granted: vec![0],
        }
    );
    assert_eq!(mailbox.dequeue(timeout).await, Event::Published { id: 3 });
}

#[tokio::test]
async fn test_dequeue_timeout_yields_sentinel() {
    common::init_tracing();

    let mailbox = Mailbox::new();

    let started = tokio::time::Instant::now();
    let event = mailbox.dequeue(Duration::from_millis(50)).await;

    assert_eq!(event.kind(), EventKind::None);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_dequeue_picks_up_late_arrival() {
    common::init_tracing();

    let mailbox = std::sync::Arc::new(Mailbox::new());

    let producer = std::sync::Arc::clone(&mailbox);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        producer.enqueue(Event::Unsubscribed { id: 10 });
    });

    let started = tokio::time::Instant::now();
    let event = mailbox.dequeue(Duration::from_secs(5)).await;

    assert_eq!(event, Event::Unsubscribed { id: 10 });
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_requeue_places_event_behind_queued_ones() {
    common::init_tracing();

    let mailbox = Mailbox::new();
    mailbox.enqueue(Event::Published { id: 1 });
    mailbox.enqueue(Event::Subscribed {
        id: 2,
        granted: vec![1],
    });

    let timeout = Duration::from_millis(100);

    // Pull the head, decide it was meant for someone else, put it back.
    let head = mailbox.dequeue(timeout).await;
    assert_eq!(head, Event::Published { id: 1 });
    mailbox.requeue(head);

    // The event already waiting in the queue comes out first.
    assert_eq!(
        mailbox.dequeue(timeout).await,
        Event::Subscribed {
            id: 2,
            granted: vec![1],
        }
    );
    assert_eq!(mailbox.dequeue(timeout).await, Event::Published { id: 1 });
}

#[tokio::test]
async fn test_enqueue_from_many_tasks_never_drops() {
    common::init_tracing();

    let mailbox = std::sync::Arc::new(Mailbox::new());

    let mut producers = Vec::new();
    for task in 0u16..10 {
        let producer = std::sync::Arc::clone(&mailbox);
        producers.push(tokio::spawn(async move {
            for n in 0u16..20 {
                producer.enqueue(Event::Published { id: task * 100 + n });
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let mut seen = 0;
    loop {
        let event = mailbox.dequeue(Duration::from_millis(50)).await;
        if event.kind() == EventKind::None {
            break;
        }
        assert_eq!(event.kind(), EventKind::Published);
        seen += 1;
    }
    assert_eq!(seen, 200);
}
