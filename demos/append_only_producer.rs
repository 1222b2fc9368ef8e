//! An append-only producer: it yields `APPEND_ONLY` first, then deltas.
//! `render_stream` in append-only mode surfaces the deltas directly;
//! `render` still concatenates everything into the final string.
//!
//! Run with:
//! ```bash
//! cargo run --example append_only_producer
//! ```

use futures_util::StreamExt;
use rendertree_core::{
    create_render_context, render, render_stream, LazyNode, Node, RenderContextOptions, RenderFrame,
    RenderOptions, APPEND_ONLY,
};

fn token_stream() -> LazyNode {
    LazyNode::new(async_stream::stream! {
        yield Ok(APPEND_ONLY);
        for delta in ["x", "y", "z"] {
            yield Ok(Node::text(delta));
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let ctx = create_render_context(RenderContextOptions::new());

    let mut stream = Box::pin(render_stream(
        Node::Lazy(token_stream()),
        &ctx,
        RenderOptions::new(),
    ));
    while let Some(frame) = stream.next().await {
        if let RenderFrame::Text(delta) = frame? {
            println!("delta: {delta:?}");
        }
    }

    let out = render(Node::Lazy(token_stream()), &ctx, RenderOptions::new()).await?;
    println!("final: {}", out.into_text().unwrap());

    Ok(())
}
