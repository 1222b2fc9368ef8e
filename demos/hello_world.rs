//! The smallest possible render: a string leaf.
//!
//! Run with:
//! ```bash
//! cargo run --example hello_world
//! ```

use rendertree_core::{create_render_context, render, Node, RenderContextOptions, RenderOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let ctx = create_render_context(RenderContextOptions::new());
    let output = render(Node::text("hello"), &ctx, RenderOptions::new()).await?;
    println!("{}", output.into_text().unwrap());
    Ok(())
}
