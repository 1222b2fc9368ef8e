//! Context propagation: a Provider rebinds a context key for its subtree;
//! siblings outside it see the default.
//!
//! Run with:
//! ```bash
//! cargo run --example context_provider
//! ```

use rendertree_core::{create_context, create_element, create_render_context, fragment, render};
use rendertree_core::{Node, Props, RenderContextOptions, RenderOptions, Tag};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let (model_name, model_name_provider) = create_context("gpt-default".to_string());

    let read_model_name = {
        let model_name = model_name.clone();
        Tag::component(move |_props: Props, cx| Ok(Node::text((*cx.get_context(&model_name)).clone())))
    };

    let provided = model_name_provider.provide(
        "claude-sonnet".to_string(),
        vec![Node::Element(create_element(
            read_model_name.clone(),
            Props::new(),
            vec![],
        ))],
    );

    let tree = fragment(vec![
        Node::Element(provided),
        Node::text(" / "),
        Node::Element(create_element(read_model_name, Props::new(), vec![])),
    ]);

    let ctx = create_render_context(RenderContextOptions::new());
    let out = render(Node::Element(tree), &ctx, RenderOptions::new()).await?;
    println!("{}", out.into_text().unwrap());

    Ok(())
}
