//! A stop predicate arrests expansion of a specific element: it surfaces in
//! the result as an opaque element value, its children untouched. Useful
//! for a caller that wants to inspect a `<ToolCall>`-shaped element before
//! deciding whether to run it.
//!
//! Run with:
//! ```bash
//! cargo run --example stop_predicate
//! ```

use rendertree_core::{create_element, create_render_context, fragment, render, Segment};
use rendertree_core::{Node, Props, RenderContextOptions, RenderOptions, Tag};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let tool_call = Tag::component(|_props: Props, _cx| Ok(Node::text("{\"name\": \"search\"}")));
    let tool_call_el = create_element(tool_call, Props::new(), vec![]);
    let tool_call_id = tool_call_el.id();

    let tree = fragment(vec![
        Node::text("before "),
        Node::Element(tool_call_el),
        Node::text(" after"),
    ]);

    let ctx = create_render_context(RenderContextOptions::new());
    let out = render(
        Node::Element(tree),
        &ctx,
        RenderOptions::new().stop(move |el| el.id() == tool_call_id),
    )
    .await?;

    for segment in out.into_segments() {
        match segment {
            Segment::Text(t) => println!("text: {t:?}"),
            Segment::Element(el) => println!("opaque element: {}", el.id()),
        }
    }

    Ok(())
}
