//! `memo()` makes a non-idempotent component (here standing in for an LLM
//! call charged per invocation) safe to observe more than once in the same
//! context: the underlying call runs exactly once no matter how many times
//! the memoized node appears in the tree.
//!
//! Run with:
//! ```bash
//! cargo run --example memoized_model_call
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rendertree_core::{create_element, create_render_context, fragment, memo, render};
use rendertree_core::{Node, Props, RenderContextOptions, RenderOptions, Tag};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_component = calls.clone();

    let expensive_model_call = Tag::component(move |_props: Props, _cx| {
        let n = calls_for_component.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Node::text(format!("response #{n}")))
    });

    let call = create_element(expensive_model_call, Props::new(), vec![]);
    let memoized = memo(Node::Element(call));

    // The same memoized node appears three times in the tree; the
    // underlying component still only runs once.
    let tree = fragment(vec![memoized.clone(), Node::text(" | "), memoized.clone(), Node::text(" | "), memoized]);

    let ctx = create_render_context(RenderContextOptions::new());
    let out = render(Node::Element(tree), &ctx, RenderOptions::new()).await?;
    println!("{}", out.into_text().unwrap());
    println!("underlying calls: {}", calls.load(Ordering::SeqCst));

    Ok(())
}
