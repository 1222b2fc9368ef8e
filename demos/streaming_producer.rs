//! A lazy incremental producer streamed in cumulative mode: each frame is
//! the running complete string, growing monotonically.
//!
//! Run with:
//! ```bash
//! cargo run --example streaming_producer
//! ```

use futures_util::StreamExt;
use rendertree_core::{create_render_context, render_stream, LazyNode, Node, RenderContextOptions, RenderOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let ctx = create_render_context(RenderContextOptions::new());

    let producer = LazyNode::new(async_stream::stream! {
        for word in ["a", "ab", "abc"] {
            yield Ok(Node::text(word));
        }
    });

    let mut stream = Box::pin(render_stream(Node::Lazy(producer), &ctx, RenderOptions::new()));
    while let Some(frame) = stream.next().await {
        match frame? {
            rendertree_core::RenderFrame::Text(t) => println!("frame: {t}"),
            rendertree_core::RenderFrame::Segments(_) => unreachable!("no stop predicate in play"),
        }
    }

    Ok(())
}
