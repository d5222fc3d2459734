//! Event binding.
//!
//! Actions only reach the client; the re-render loop in `lib.rs` picks up
//! the resulting state changes. Draft edits re-render directly since they
//! live outside the client.

use crate::dom::{self, Elements};
use crate::render;
use crate::state;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

fn on<E>(target: &web_sys::EventTarget, event: &str, handler: impl FnMut(E) + 'static) -> Result<(), JsValue>
where
    E: wasm_bindgen::convert::FromWasmAbi + 'static,
{
    let cb = Closure::wrap(Box::new(handler) as Box<dyn FnMut(E)>);
    target.add_event_listener_with_callback(event, cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}

pub fn rerender(els: &Elements) {
    let Some(view) = state::view() else {
        return;
    };
    if let Err(err) = render::render(els, &view) {
        gloo_console::error!("render failed:", err);
    }
}

/// Bind all UI event listeners. Call once after init.
pub fn bind_events(els: &Elements) -> Result<(), JsValue> {
    // Connector buttons are rebuilt on every render; listen on the list.
    on(&els.connector_list, "click", |event: web_sys::MouseEvent| {
        let connector = event
            .target()
            .and_then(|target| target.dyn_into::<web_sys::Element>().ok())
            .and_then(|el| el.get_attribute("data-connector"));
        let (Some(connector), Some(client)) = (connector, state::client()) else {
            return;
        };
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = client.connect(&connector).await {
                gloo_console::warn!(format!("connect via {connector} failed: {err}"));
            }
        });
    })?;

    on(&els.disconnect_btn, "click", |_: web_sys::MouseEvent| {
        let Some(client) = state::client() else {
            return;
        };
        wasm_bindgen_futures::spawn_local(async move {
            client.disconnect().await;
        });
    })?;

    on(&els.mint_btn, "click", |_: web_sys::MouseEvent| {
        let Some(client) = state::client() else {
            return;
        };
        if let Err(err) = client.mint() {
            gloo_console::warn!(format!("mint rejected: {err}"));
        }
    })?;

    {
        let els2 = els.clone();
        on(&els.whitelist_input, "input", move |_: web_sys::Event| {
            state::set_draft(dom::input_value(&els2.whitelist_input));
            rerender(&els2);
        })?;
    }

    {
        let els2 = els.clone();
        on(&els.whitelist_btn, "click", move |_: web_sys::MouseEvent| {
            let Some(client) = state::client() else {
                return;
            };
            let candidate = state::take_draft();
            els2.whitelist_input.set_value("");
            if let Err(err) = client.add_to_whitelist(&candidate) {
                gloo_console::warn!(format!("whitelist rejected: {err}"));
            }
            rerender(&els2);
        })?;
    }

    Ok(())
}
