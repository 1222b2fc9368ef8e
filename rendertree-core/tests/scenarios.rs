//! End-to-end scenarios S1-S7 and the testable properties they exercise.
//!
//! Each test is named after the scenario it covers so a failure points
//! straight back to the behavior it pins down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use rendertree_core::{
    create_context, create_element, create_render_context, fragment, memo, render, render_stream,
    Node, Props, RenderContextOptions, RenderFrame, RenderOptions, Segment, Tag, APPEND_ONLY,
};

async fn render_text(node: Node) -> String {
    let ctx = create_render_context(RenderContextOptions::new());
    render(node, &ctx, RenderOptions::new())
        .await
        .unwrap()
        .into_text()
        .unwrap()
}

#[tokio::test(flavor = "current_thread")]
async fn s1_render_hello() {
    assert_eq!(render_text(Node::text("hello")).await, "hello");
}

#[tokio::test(flavor = "current_thread")]
async fn s2_fragment_of_three_strings() {
    let node = Node::Element(fragment(vec![Node::text("a"), Node::text("b"), Node::text("c")]));
    assert_eq!(render_text(node).await, "abc");
}

#[tokio::test(flavor = "current_thread")]
async fn s3_component_returns_fragment_with_prop() {
    let greet = Tag::component(|props: Props, _cx| {
        let name = props.get::<String>("name").cloned().unwrap_or_default();
        Ok(Node::Element(fragment(vec![Node::text("hi "), Node::text(name)])))
    });
    let el = create_element(greet, Props::new().insert("name", "x".to_string()), vec![]);
    assert_eq!(render_text(Node::Element(el)).await, "hi x");
}

#[tokio::test(flavor = "current_thread")]
async fn s4_lazy_producer_cumulative_mode() {
    let ctx = create_render_context(RenderContextOptions::new());
    let producer = rendertree_core::LazyNode::new(async_stream::stream! {
        for word in ["a", "ab", "abc"] {
            yield Ok(Node::text(word));
        }
    });

    let mut frames = Vec::new();
    let mut stream = Box::pin(render_stream(
        Node::Lazy(producer),
        &ctx,
        RenderOptions::new(),
    ));
    while let Some(frame) = stream.next().await {
        match frame.unwrap() {
            RenderFrame::Text(t) => frames.push(t),
            RenderFrame::Segments(_) => panic!("no stop predicate in play"),
        }
    }
    assert_eq!(frames, vec!["a", "ab", "abc"]);

    let producer2 = rendertree_core::LazyNode::new(async_stream::stream! {
        for word in ["a", "ab", "abc"] {
            yield Ok(Node::text(word));
        }
    });
    let out = render(Node::Lazy(producer2), &ctx, RenderOptions::new())
        .await
        .unwrap();
    assert_eq!(out.into_text().as_deref(), Some("abc"));
}

#[tokio::test(flavor = "current_thread")]
async fn s5_append_only_producer_both_modes() {
    let ctx = create_render_context(RenderContextOptions::new());

    // append-only mode: the stream yields deltas.
    let producer = rendertree_core::LazyNode::new(async_stream::stream! {
        yield Ok(APPEND_ONLY);
        for delta in ["x", "y", "z"] {
            yield Ok(Node::text(delta));
        }
    });
    let mut deltas = Vec::new();
    let mut stream = Box::pin(render_stream(
        Node::Lazy(producer),
        &ctx,
        RenderOptions::new(),
    ));
    while let Some(frame) = stream.next().await {
        match frame.unwrap() {
            RenderFrame::Text(t) => deltas.push(t),
            RenderFrame::Segments(_) => panic!("no stop predicate in play"),
        }
    }
    assert_eq!(deltas, vec!["x", "y", "z"]);

    // cumulative mode forced over the same discipline: frames grow.
    let producer2 = rendertree_core::LazyNode::new(async_stream::stream! {
        yield Ok(APPEND_ONLY);
        for delta in ["x", "y", "z"] {
            yield Ok(Node::text(delta));
        }
    });
    let out = render(Node::Lazy(producer2), &ctx, RenderOptions::new())
        .await
        .unwrap();
    assert_eq!(out.into_text().as_deref(), Some("xyz"));
}

#[tokio::test(flavor = "current_thread")]
async fn s6_memo_of_producer_counted_seven_times() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let el = create_element(
        Tag::component(move |_props, _cx| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Node::text("hi"))
        }),
        Props::new(),
        vec![],
    );
    let memoized = memo(Node::Element(el));

    let mut children = Vec::new();
    for _ in 0..7 {
        children.push(memoized.clone());
    }
    let tree = fragment(children);

    let ctx = create_render_context(RenderContextOptions::new());
    let out = render(Node::Element(tree), &ctx, RenderOptions::new())
        .await
        .unwrap();
    assert_eq!(out.into_text().as_deref(), Some("hihihihihihihi"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn s7_stop_predicate_surfaces_nested_element_untouched() {
    let inner_calls = Arc::new(AtomicUsize::new(0));
    let inner_calls_clone = inner_calls.clone();
    let leaf_component = Tag::component(move |_props, _cx| {
        inner_calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(Node::text("should not run"))
    });
    let leaf = create_element(leaf_component, Props::new(), vec![]);

    let marker = Tag::component(|_props, _cx| Ok(Node::empty()));
    let m = create_element(marker, Props::new(), vec![Node::Element(leaf)]);
    let m_id = m.id();

    let tree = fragment(vec![
        Node::text("a"),
        Node::Element(fragment(vec![Node::Element(m)])),
        Node::text("b"),
    ]);

    let ctx = create_render_context(RenderContextOptions::new());
    let out = render(
        Node::Element(tree),
        &ctx,
        RenderOptions::new().stop(move |el| el.id() == m_id),
    )
    .await
    .unwrap();

    let segments = out.into_segments();
    assert!(segments.iter().any(|s| matches!(s, Segment::Element(e) if e.id() == m_id)));
    assert_eq!(inner_calls.load(Ordering::SeqCst), 0, "children of a stopped element must not be evaluated");
}

#[tokio::test(flavor = "current_thread")]
async fn context_scoping_provider_and_siblings() {
    let (key, provider) = create_context("default".to_string());
    let read = {
        let key = key.clone();
        Tag::component(move |_props, cx| Ok(Node::text((*cx.get_context(&key)).clone())))
    };

    let provided = provider.provide(
        "provided".to_string(),
        vec![Node::Element(create_element(read.clone(), Props::new(), vec![]))],
    );

    let tree = fragment(vec![
        Node::Element(provided),
        Node::text("|"),
        Node::Element(create_element(read, Props::new(), vec![])),
    ]);

    assert_eq!(render_text(Node::Element(tree)).await, "provided|default");
}

#[tokio::test(flavor = "current_thread")]
async fn cancellation_terminates_stream_without_further_frames() {
    use tokio_util::sync::CancellationToken;

    let signal = CancellationToken::new();
    let producer = rendertree_core::LazyNode::new(async_stream::stream! {
        yield Ok(Node::text("a"));
        // Never yields again; the test cancels before a second pull.
        std::future::pending::<()>().await;
    });

    let ctx = create_render_context(RenderContextOptions::new());
    let opts = RenderOptions::new().signal(signal.clone());
    let mut stream = Box::pin(render_stream(Node::Lazy(producer), &ctx, opts));

    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, RenderFrame::Text(t) if t == "a"));

    signal.cancel();
    tokio::time::timeout(std::time::Duration::from_millis(200), async {
        loop {
            match stream.next().await {
                Some(Err(e)) => {
                    assert!(e.is_cancellation());
                    break;
                }
                Some(Ok(_)) => continue,
                None => panic!("stream ended without a cancellation error"),
            }
        }
    })
    .await
    .expect("cancellation should terminate the stream promptly");
}
