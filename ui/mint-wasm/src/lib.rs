//! KnotNFT mint page, in Rust + WASM.
//!
//! Binds the page elements, wires `window.ethereum` into a [`MintClient`] and
//! re-renders the page whenever the client's state changes.

pub mod dom;
pub mod eip1193;
pub mod events;
pub mod render;
pub mod state;

use knot_client::MintClient;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// WASM entry point, called when the module is instantiated.
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    init().await
}

async fn init() -> Result<(), JsValue> {
    let els = dom::Elements::bind()?;
    let config = els.config()?;

    let provider = Rc::new(eip1193::Eip1193Provider::detect());
    provider.listen();
    provider.spawn_block_watcher();

    let client = Rc::new(MintClient::new(config, provider));
    state::set_client(Rc::clone(&client));
    events::bind_events(&els)?;
    events::rerender(&els);

    let mut changes = client.subscribe();
    let render_els = els.clone();
    wasm_bindgen_futures::spawn_local(async move {
        while changes.changed().await {
            events::rerender(&render_els);
        }
    });

    if let Some(session) = client.start().await {
        gloo_console::log!(format!("restored session: {session:?}"));
    }
    Ok(())
}
