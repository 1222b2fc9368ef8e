//! Fragments group siblings; components compose fragments and props into
//! larger Nodes.
//!
//! Run with:
//! ```bash
//! cargo run --example fragments_and_components
//! ```

use rendertree_core::{
    create_element, create_render_context, fragment, render, Node, Props, RenderContextOptions,
    RenderOptions, Tag,
};

fn greet(props: Props, _cx: rendertree_core::ComponentContext) -> Result<Node, rendertree_core::RenderError> {
    let name = props.get::<String>("name").cloned().unwrap_or_default();
    Ok(Node::Element(fragment(vec![Node::text("hi "), Node::text(name)])))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let ctx = create_render_context(RenderContextOptions::new());

    let abc = Node::Element(fragment(vec![Node::text("a"), Node::text("b"), Node::text("c")]));
    let out = render(abc, &ctx, RenderOptions::new()).await?;
    println!("fragment: {}", out.into_text().unwrap());

    let el = create_element(
        Tag::component(greet),
        Props::new().insert("name", "world".to_string()),
        vec![],
    );
    let out = render(Node::Element(el), &ctx, RenderOptions::new()).await?;
    println!("component: {}", out.into_text().unwrap());

    Ok(())
}
